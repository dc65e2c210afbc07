//! 파일 파이프라인 설정
//!
//! [`FilePipelineConfig`]는 core의 [`FileConfig`]를 기반으로 한 불변 설정이며,
//! [`resolve_files`]는 파일마다 grok 패턴을 컴파일하고 레이블 맵을 검증합니다.
//! 여기서 발생한 `Grammar` 에러는 어떤 파이프라인도 시작하기 전에 프로세스를 중단시킵니다.
//!
//! # 사용 예시
//! ```ignore
//! use log_exporter_core::config::ExporterConfig;
//! use log_exporter_pipeline::config::resolve_files;
//! use log_exporter_pipeline::grok::PatternLibrary;
//!
//! let config = ExporterConfig::load("config.toml").await?;
//! let library = PatternLibrary::with_builtins();
//! let resolved = resolve_files(&config.files, &library)?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use log_exporter_core::config::FileConfig;
use log_exporter_core::pipeline::FieldExtractor;

use crate::collector::StartPosition;
use crate::error::LogPipelineError;
use crate::grok::PatternLibrary;

/// 노출 레이블 이름 → 패턴 캡처 이름
///
/// 키는 유일하며, 추적 대상 캡처를 정의합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMap {
    bindings: Vec<(String, String)>,
}

impl LabelMap {
    /// (레이블 이름, 캡처 이름) 목록에서 레이블 맵을 생성합니다.
    ///
    /// 레이블 이름이 중복되거나 비어있으면 에러를 반환합니다.
    pub fn new<I, K, V>(bindings: I) -> Result<Self, LogPipelineError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::default();
        for (label, capture) in bindings {
            let label = label.into();
            let capture = capture.into();
            if label.is_empty() || capture.is_empty() {
                return Err(LogPipelineError::Config {
                    field: "labels".to_owned(),
                    reason: "label and capture names must not be empty".to_owned(),
                });
            }
            if map.bindings.iter().any(|(existing, _)| *existing == label) {
                return Err(LogPipelineError::Config {
                    field: "labels".to_owned(),
                    reason: format!("duplicate label '{label}'"),
                });
            }
            map.bindings.push((label, capture));
        }
        Ok(map)
    }

    /// 레이블 이름 반복자
    pub fn label_names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(label, _)| label.as_str())
    }

    /// (레이블 이름, 캡처 이름) 반복자
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings
            .iter()
            .map(|(label, capture)| (label.as_str(), capture.as_str()))
    }

    /// 레이블 수
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// 레이블이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// 모든 캡처가 추출기에 있는지 확인합니다.
    fn check_captures(&self, extractor: &dyn FieldExtractor) -> Result<(), LogPipelineError> {
        let available = extractor.capture_names();
        for (label, capture) in self.iter() {
            if !available.iter().any(|name| name == capture) {
                return Err(LogPipelineError::Grammar {
                    pattern: extractor.pattern().to_owned(),
                    reason: format!(
                        "label '{label}' refers to capture '{capture}' which the pattern does not define"
                    ),
                });
            }
        }
        Ok(())
    }
}

/// 파일 하나의 파이프라인 설정 (생성 후 불변)
#[derive(Debug, Clone)]
pub struct FilePipelineConfig {
    /// 감시할 파일 경로
    pub path: PathBuf,
    /// 라인 소스 시작 위치
    pub start: StartPosition,
    /// 워커 수 (1 이상)
    pub workers: usize,
    /// 추출 패턴 원문
    pub pattern: String,
    /// 노출 레이블 → 캡처 매핑
    pub labels: LabelMap,
    /// 이 파일 전용 커스텀 grok 조각
    pub custom_patterns: Vec<String>,
}

impl FilePipelineConfig {
    /// core 파일 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(file: &FileConfig) -> Result<Self, LogPipelineError> {
        if file.workers == 0 {
            return Err(LogPipelineError::Config {
                field: "workers".to_owned(),
                reason: format!("{}: must be at least 1", file.path),
            });
        }

        Ok(Self {
            path: PathBuf::from(&file.path),
            start: StartPosition::from_replay(file.read_all),
            workers: file.workers,
            pattern: file.pattern.clone(),
            labels: LabelMap::new(file.labels.iter().map(|(k, v)| (k.as_str(), v.as_str())))?,
            custom_patterns: file.custom_patterns.clone(),
        })
    }

    /// 파일 경로 문자열 (메트릭 `file` 레이블 값)
    pub fn path_label(&self) -> String {
        self.path.display().to_string()
    }
}

/// 패턴 컴파일과 레이블 검증이 끝난 파일 설정
#[derive(Clone)]
pub struct ResolvedFile {
    /// 파이프라인 설정
    pub config: FilePipelineConfig,
    /// 컴파일된 필드 추출기
    pub extractor: Arc<dyn FieldExtractor>,
}

impl std::fmt::Debug for ResolvedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFile")
            .field("config", &self.config)
            .field("pattern", &self.extractor.pattern())
            .finish()
    }
}

impl ResolvedFile {
    /// 파일 설정 하나를 해석합니다.
    ///
    /// 공유 라이브러리를 복제해 파일 전용 조각을 더한 뒤 패턴을 컴파일하고,
    /// 모든 레이블의 캡처가 패턴에 있는지 확인합니다.
    pub fn resolve(
        config: FilePipelineConfig,
        library: &PatternLibrary,
    ) -> Result<Self, LogPipelineError> {
        let scoped = library.with_fragments(&config.custom_patterns)?;
        let pattern = scoped.compile(&config.pattern)?;
        config.labels.check_captures(&pattern)?;

        Ok(Self {
            config,
            extractor: Arc::new(pattern),
        })
    }
}

/// 모든 파일 설정을 해석합니다. 하나라도 실패하면 즉시 에러를 반환합니다.
pub fn resolve_files(
    files: &[FileConfig],
    library: &PatternLibrary,
) -> Result<Vec<ResolvedFile>, LogPipelineError> {
    files
        .iter()
        .map(|file| {
            let config = FilePipelineConfig::from_core(file)?;
            let resolved = ResolvedFile::resolve(config, library)?;
            tracing::debug!(
                path = %file.path,
                workers = file.workers,
                labels = resolved.config.labels.len(),
                "resolved file pipeline config"
            );
            Ok(resolved)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn file_config(pattern: &str, labels: &[(&str, &str)]) -> FileConfig {
        FileConfig {
            path: "/var/log/app.log".to_owned(),
            read_all: true,
            workers: 2,
            pattern: pattern.to_owned(),
            custom_patterns: Vec::new(),
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn from_core_maps_fields() {
        let file = file_config("%{WORD:w}", &[("word", "w")]);
        let config = FilePipelineConfig::from_core(&file).unwrap();
        assert_eq!(config.start, StartPosition::Beginning);
        assert_eq!(config.workers, 2);
        assert_eq!(config.labels.len(), 1);
        assert_eq!(config.path_label(), "/var/log/app.log");
    }

    #[test]
    fn zero_workers_rejected() {
        let mut file = file_config("%{WORD:w}", &[("word", "w")]);
        file.workers = 0;
        assert!(FilePipelineConfig::from_core(&file).is_err());
    }

    #[test]
    fn label_map_rejects_duplicates_and_empty_names() {
        assert!(LabelMap::new([("a", "x"), ("a", "y")]).is_err());
        assert!(LabelMap::new([("", "x")]).is_err());
        assert!(LabelMap::new([("a", "")]).is_err());
        let map = LabelMap::new([("route", "path"), ("code", "status")]).unwrap();
        assert_eq!(map.label_names().collect::<Vec<_>>(), vec!["route", "code"]);
    }

    #[test]
    fn resolve_compiles_pattern() {
        let file = file_config(
            "%{WORD:method} %{URIPATH:path} %{NUMBER:status}",
            &[("route", "path"), ("code", "status")],
        );
        let resolved = resolve_files(&[file], &PatternLibrary::with_builtins()).unwrap();
        assert_eq!(resolved.len(), 1);
        let fields = resolved[0].extractor.extract("GET /a 200").unwrap();
        assert_eq!(fields["path"], "/a");
    }

    #[test]
    fn unknown_capture_is_grammar_error() {
        let file = file_config("%{WORD:method}", &[("route", "path")]);
        let err = resolve_files(&[file], &PatternLibrary::with_builtins()).unwrap_err();
        assert!(matches!(err, LogPipelineError::Grammar { .. }));
        assert!(err.to_string().contains("path"));
    }

    #[test]
    fn unknown_pattern_is_grammar_error() {
        let file = file_config("%{MISSING:x}", &[("x", "x")]);
        let err = resolve_files(&[file], &PatternLibrary::with_builtins()).unwrap_err();
        assert!(matches!(err, LogPipelineError::Grammar { .. }));
    }

    #[test]
    fn custom_patterns_are_scoped_per_file() {
        let mut with_custom = file_config("%{APPCODE:code}", &[("code", "code")]);
        with_custom.custom_patterns = vec!["APPCODE E[0-9]{4}".to_owned()];
        let mut without_custom = file_config("%{APPCODE:code}", &[("code", "code")]);
        without_custom.path = "/var/log/other.log".to_owned();

        let library = PatternLibrary::with_builtins();
        assert!(resolve_files(std::slice::from_ref(&with_custom), &library).is_ok());
        assert!(resolve_files(&[with_custom, without_custom], &library).is_err());
    }
}
