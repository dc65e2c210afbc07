//! 설정 관리 — log-exporter TOML 파싱 및 런타임 설정
//!
//! [`ExporterConfig`]는 데몬과 모든 파일 파이프라인의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선, 로그 레벨/형식만)
//! 2. 환경변수 (`LOG_EXPORTER_METRICS_PORT=9100` 형식)
//! 3. 설정 파일 (`config.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), log_exporter_core::error::ExporterError> {
//! use log_exporter_core::config::ExporterConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ExporterConfig::load("config.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ExporterConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ExporterError};

/// 파일당 최대 워커 수
pub const MAX_WORKERS_PER_FILE: usize = 256;

/// log-exporter 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 메트릭 노출 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// grok 패턴 설정
    #[serde(default)]
    pub grok: GrokConfig,
    /// 파일 tail 설정
    #[serde(default)]
    pub tail: TailConfig,
    /// 감시 대상 파일 목록
    #[serde(default)]
    pub files: Vec<FileConfig>,
}

impl ExporterConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ExporterError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ExporterError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExporterError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ExporterError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ExporterError> {
        toml::from_str(toml_str).map_err(|e| {
            ExporterError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOG_EXPORTER_{SECTION}_{FIELD}`
    /// 파일 목록(`[[files]]`)은 오버라이드 대상이 아닙니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOG_EXPORTER_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOG_EXPORTER_GENERAL_LOG_FORMAT");
        override_u64(
            &mut self.general.shutdown_timeout_secs,
            "LOG_EXPORTER_GENERAL_SHUTDOWN_TIMEOUT_SECS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOG_EXPORTER_METRICS_ENABLED");
        override_string(
            &mut self.metrics.listen_addr,
            "LOG_EXPORTER_METRICS_LISTEN_ADDR",
        );
        override_u16(&mut self.metrics.port, "LOG_EXPORTER_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "LOG_EXPORTER_METRICS_ENDPOINT");
        override_u64(
            &mut self.metrics.scrape_interval_secs,
            "LOG_EXPORTER_METRICS_SCRAPE_INTERVAL_SECS",
        );

        // Grok
        override_string(&mut self.grok.pattern_dir, "LOG_EXPORTER_GROK_PATTERN_DIR");

        // Tail
        override_u64(
            &mut self.tail.poll_interval_ms,
            "LOG_EXPORTER_TAIL_POLL_INTERVAL_MS",
        );
        override_usize(
            &mut self.tail.max_line_length,
            "LOG_EXPORTER_TAIL_MAX_LINE_LENGTH",
        );
        override_usize(
            &mut self.tail.channel_capacity,
            "LOG_EXPORTER_TAIL_CHANNEL_CAPACITY",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 파일 존재 여부는 검사하지 않습니다. 열 수 없는 파일은
    /// 해당 파이프라인만 시작 단계에서 건너뜁니다.
    pub fn validate(&self) -> Result<(), ExporterError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.shutdown_timeout_secs == 0 {
            return Err(invalid(
                "general.shutdown_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(invalid("metrics.port", "must not be 0".to_owned()));
            }
            if self.metrics.endpoint != "/metrics" {
                return Err(invalid(
                    "metrics.endpoint",
                    "only '/metrics' is currently supported".to_owned(),
                ));
            }
        }

        if self.metrics.scrape_interval_secs == 0 {
            return Err(invalid(
                "metrics.scrape_interval_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        self.tail.validate()?;

        let mut seen_paths = HashSet::new();
        for (idx, file) in self.files.iter().enumerate() {
            file.validate(idx)?;
            if !seen_paths.insert(file.path.as_str()) {
                return Err(invalid(
                    &format!("files[{idx}].path"),
                    format!("duplicate path '{}'", file.path),
                ));
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> ExporterError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 종료 시 파이프라인 정지를 기다리는 최대 시간 (초)
    pub shutdown_timeout_secs: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            shutdown_timeout_secs: 10,
        }
    }
}

/// 메트릭 노출 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 리스닝 주소
    pub listen_addr: String,
    /// 리스닝 포트
    pub port: u16,
    /// 스크레이프 경로
    pub endpoint: String,
    /// 수집(Collect) 태스크 주기 (초)
    pub scrape_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: "0.0.0.0".to_owned(),
            port: 9898,
            endpoint: "/metrics".to_owned(),
            scrape_interval_secs: 5,
        }
    }
}

/// grok 패턴 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GrokConfig {
    /// 추가 패턴 파일 디렉토리 (빈 문자열이면 내장 패턴만 사용)
    pub pattern_dir: String,
}

/// 파일 tail 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TailConfig {
    /// 파일 상태 체크 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 최대 라인 길이 (바이트). 초과 라인은 버립니다.
    pub max_line_length: usize,
    /// tailer → 워커 라인 채널 용량
    pub channel_capacity: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_line_length: 64 * 1024, // 64KB
            channel_capacity: 1024,
        }
    }
}

impl TailConfig {
    fn validate(&self) -> Result<(), ExporterError> {
        if self.poll_interval_ms == 0 {
            return Err(invalid(
                "tail.poll_interval_ms",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.max_line_length == 0 {
            return Err(invalid(
                "tail.max_line_length",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(invalid(
                "tail.channel_capacity",
                "must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }
}

/// 감시 대상 파일 하나의 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// 파일 경로
    pub path: String,
    /// true면 파일 처음부터 재생, false면 새로 추가되는 라인만 집계
    #[serde(default)]
    pub read_all: bool,
    /// 워커 수
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// grok 추출 패턴
    #[serde(rename = "match")]
    pub pattern: String,
    /// 이 파일에만 적용되는 커스텀 grok 패턴 (`"NAME definition"`)
    #[serde(default)]
    pub custom_patterns: Vec<String>,
    /// 노출 레이블 이름 → 패턴 capture 이름
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

fn default_workers() -> usize {
    1
}

impl FileConfig {
    fn validate(&self, idx: usize) -> Result<(), ExporterError> {
        if self.path.trim().is_empty() {
            return Err(invalid(
                &format!("files[{idx}].path"),
                "must not be empty".to_owned(),
            ));
        }

        if self.workers == 0 || self.workers > MAX_WORKERS_PER_FILE {
            return Err(invalid(
                &format!("files[{idx}].workers"),
                format!("must be 1-{MAX_WORKERS_PER_FILE}"),
            ));
        }

        if self.pattern.trim().is_empty() {
            return Err(invalid(
                &format!("files[{idx}].match"),
                "must not be empty".to_owned(),
            ));
        }

        if self.labels.is_empty() {
            return Err(invalid(
                &format!("files[{idx}].labels"),
                "at least one label must be configured".to_owned(),
            ));
        }

        for (name, capture) in &self.labels {
            if name.trim().is_empty() || capture.trim().is_empty() {
                return Err(invalid(
                    &format!("files[{idx}].labels"),
                    "label names and capture names must not be empty".to_owned(),
                ));
            }
        }

        Ok(())
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
