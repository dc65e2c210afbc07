//! grok 패턴 컴파일러 -- 선언적 패턴을 라인 → 필드 추출기로 변환합니다.
//!
//! [`PatternLibrary`]는 패턴 이름 → 정의 테이블을 관리하고,
//! [`PatternLibrary::compile`]은 `%{SYNTAX:name}` 참조를 재귀적으로 펼쳐
//! 하나의 정규식으로 컴파일한 [`GrokPattern`]을 만듭니다.
//!
//! # 참조 문법
//! - `%{SYNTAX}`: 캡처 없이 펼침
//! - `%{SYNTAX:name}`: `name`으로 캡처
//! - `%{SYNTAX:name:type}`: 타입 접미사는 허용하지만 무시 (값은 항상 문자열로 집계)
//! - `(?P<name>...)`: 패턴에 직접 쓴 이름 있는 그룹도 그대로 캡처
//!
//! # 사용 예시
//! ```ignore
//! use log_exporter_pipeline::grok::PatternLibrary;
//!
//! let library = PatternLibrary::with_builtins();
//! let pattern = library.compile("%{WORD:method} %{URIPATH:path} %{NUMBER:status}")?;
//! let fields = pattern.try_extract("GET /index.html 200")?;
//! assert_eq!(fields["status"], "200");
//! ```

mod builtin;
pub mod pattern;

pub use pattern::GrokPattern;

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;

use crate::error::LogPipelineError;

/// 패턴 참조 최대 중첩 깊이 (순환 정의 감지)
const MAX_EXPANSION_DEPTH: usize = 32;

/// 컴파일된 정규식 최대 크기 (바이트)
const REGEX_SIZE_LIMIT: usize = 64 * 1024 * 1024;

/// 패턴 파일 최대 크기
const MAX_PATTERN_FILE_SIZE: u64 = 1024 * 1024; // 1MB

/// `%{SYNTAX}`, `%{SYNTAX:name}`, `%{SYNTAX:name:type}` 참조
const REFERENCE_PATTERN: &str =
    r"%\{(?P<syntax>[A-Za-z0-9_]+)(?::(?P<name>[^:}]+))?(?::(?P<kind>[^}]+))?\}";

/// 생성된 캡처 그룹 이름 접두어
pub(crate) const GENERATED_GROUP_PREFIX: &str = "grok";

/// grok 패턴 라이브러리
///
/// 이름 → 정의 테이블입니다. 전역 라이브러리(내장 패턴 + 패턴 디렉토리)를
/// 한 번 만든 뒤, 파일마다 [`with_fragments`](Self::with_fragments)로 복제해
/// 해당 파일 전용 커스텀 패턴을 추가합니다.
#[derive(Debug, Clone, Default)]
pub struct PatternLibrary {
    patterns: HashMap<String, String>,
}

impl PatternLibrary {
    /// 빈 라이브러리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 내장 표준 패턴으로 라이브러리를 생성합니다.
    pub fn with_builtins() -> Self {
        let patterns = builtin::BUILTIN_PATTERNS
            .iter()
            .map(|(name, definition)| ((*name).to_owned(), (*definition).to_owned()))
            .collect();
        Self { patterns }
    }

    /// 등록된 패턴 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// 라이브러리가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// 해당 이름의 패턴이 있는지 확인합니다.
    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    /// 패턴을 추가합니다. 같은 이름이 있으면 덮어씁니다.
    pub fn add_pattern(
        &mut self,
        name: impl Into<String>,
        definition: impl Into<String>,
    ) -> Result<(), LogPipelineError> {
        let name = name.into();
        let definition = definition.into();

        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(LogPipelineError::Grammar {
                pattern: name,
                reason: "pattern name must be non-empty [A-Za-z0-9_]".to_owned(),
            });
        }
        if definition.is_empty() {
            return Err(LogPipelineError::Grammar {
                pattern: name,
                reason: "pattern definition must not be empty".to_owned(),
            });
        }

        self.patterns.insert(name, definition);
        Ok(())
    }

    /// `"NAME definition"` 형식의 조각을 추가합니다.
    ///
    /// 이름과 정의는 첫 번째 공백 구간에서 나눕니다. 정의 안의 공백은 유지됩니다.
    pub fn add_fragment(&mut self, fragment: &str) -> Result<(), LogPipelineError> {
        let fragment = fragment.trim();
        let Some((name, definition)) = fragment.split_once(char::is_whitespace) else {
            return Err(LogPipelineError::Grammar {
                pattern: fragment.to_owned(),
                reason: "expected 'NAME definition'".to_owned(),
            });
        };
        self.add_pattern(name, definition.trim_start())
    }

    /// 패턴 파일 내용을 읽어 추가합니다.
    ///
    /// 빈 줄과 `#`으로 시작하는 줄은 무시합니다. 추가한 패턴 수를 반환합니다.
    pub fn load_str(&mut self, content: &str) -> Result<usize, LogPipelineError> {
        let mut added = 0;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.add_fragment(line)?;
            added += 1;
        }
        Ok(added)
    }

    /// 디렉토리의 모든 패턴 파일을 로드합니다.
    ///
    /// 일반 파일만 처리하며 하위 디렉토리는 건너뜁니다.
    /// 잘못된 패턴 정의는 설정 오류이므로 첫 에러에서 중단합니다.
    pub async fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize, LogPipelineError> {
        let dir = dir.as_ref();

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| LogPipelineError::Config {
                field: "grok.pattern_dir".to_owned(),
                reason: format!("failed to read directory {}: {e}", dir.display()),
            })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| LogPipelineError::Config {
                field: "grok.pattern_dir".to_owned(),
                reason: format!("failed to read directory entry: {e}"),
            })?
        {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            if metadata.len() > MAX_PATTERN_FILE_SIZE {
                tracing::warn!(
                    path = %entry.path().display(),
                    size = metadata.len(),
                    "pattern file too large, skipping"
                );
                continue;
            }
            paths.push(entry.path());
        }

        // 같은 이름이 여러 파일에 있을 때 결과가 디렉토리 순서에 좌우되지 않도록 정렬
        paths.sort();

        let mut total = 0;
        for path in paths {
            let content = tokio::fs::read_to_string(&path).await?;
            let added = self.load_str(&content).map_err(|e| match e {
                LogPipelineError::Grammar { pattern, reason } => LogPipelineError::Grammar {
                    pattern,
                    reason: format!("{reason} (in {})", path.display()),
                },
                other => other,
            })?;
            tracing::debug!(path = %path.display(), patterns = added, "loaded grok pattern file");
            total += added;
        }

        Ok(total)
    }

    /// 이 라이브러리를 복제하고 커스텀 조각을 추가한 새 라이브러리를 반환합니다.
    pub fn with_fragments(&self, fragments: &[String]) -> Result<Self, LogPipelineError> {
        let mut scoped = self.clone();
        for fragment in fragments {
            scoped.add_fragment(fragment)?;
        }
        Ok(scoped)
    }

    /// 패턴을 컴파일합니다.
    ///
    /// # Errors
    /// - 존재하지 않는 패턴 참조
    /// - 중첩 깊이 초과 (순환 정의)
    /// - 펼친 결과가 유효한 정규식이 아님
    pub fn compile(&self, pattern: &str) -> Result<GrokPattern, LogPipelineError> {
        let reference = Regex::new(REFERENCE_PATTERN)?;
        let mut captures = Vec::new();
        let mut expanded = String::with_capacity(pattern.len() * 4);

        self.expand(&reference, pattern, pattern, 0, &mut captures, &mut expanded)?;

        let regex = regex::RegexBuilder::new(&expanded)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|e| LogPipelineError::Grammar {
                pattern: pattern.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(GrokPattern::new(pattern.to_owned(), regex, captures))
    }

    fn expand(
        &self,
        reference: &Regex,
        root: &str,
        pattern: &str,
        depth: usize,
        captures: &mut Vec<(String, String)>,
        out: &mut String,
    ) -> Result<(), LogPipelineError> {
        if depth > MAX_EXPANSION_DEPTH {
            return Err(LogPipelineError::Grammar {
                pattern: root.to_owned(),
                reason: format!(
                    "pattern nesting exceeds {MAX_EXPANSION_DEPTH} levels (recursive definition?)"
                ),
            });
        }

        let mut last = 0;
        for caps in reference.captures_iter(pattern) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&pattern[last..whole.start()]);

            let syntax = &caps["syntax"];
            let definition =
                self.patterns
                    .get(syntax)
                    .ok_or_else(|| LogPipelineError::Grammar {
                        pattern: root.to_owned(),
                        reason: format!("unknown pattern '{syntax}'"),
                    })?;

            match caps.name("name") {
                Some(name) => {
                    let group = format!("{GENERATED_GROUP_PREFIX}{}", captures.len());
                    captures.push((name.as_str().to_owned(), group.clone()));
                    out.push_str("(?P<");
                    out.push_str(&group);
                    out.push('>');
                }
                None => out.push_str("(?:"),
            }
            self.expand(reference, root, definition, depth + 1, captures, out)?;
            out.push(')');

            last = whole.end();
        }
        out.push_str(&pattern[last..]);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_loaded() {
        let library = PatternLibrary::with_builtins();
        assert!(library.contains("WORD"));
        assert!(library.contains("COMBINEDAPACHELOG"));
        assert!(!library.is_empty());
    }

    #[test]
    fn every_builtin_compiles() {
        let library = PatternLibrary::with_builtins();
        for (name, _) in builtin::BUILTIN_PATTERNS {
            let compiled = library.compile(&format!("%{{{name}:value}}"));
            assert!(compiled.is_ok(), "{name} failed: {:?}", compiled.err());
        }
    }

    #[test]
    fn unknown_pattern_is_grammar_error() {
        let library = PatternLibrary::with_builtins();
        let err = library.compile("%{NOPE:x}").unwrap_err();
        assert!(matches!(err, LogPipelineError::Grammar { .. }));
        assert!(err.to_string().contains("NOPE"));
    }

    #[test]
    fn invalid_regex_is_grammar_error() {
        let library = PatternLibrary::with_builtins();
        let err = library.compile("%{WORD:x} (unclosed").unwrap_err();
        assert!(matches!(err, LogPipelineError::Grammar { .. }));
    }

    #[test]
    fn recursive_definition_is_grammar_error() {
        let mut library = PatternLibrary::new();
        library.add_pattern("A", "%{B}").unwrap();
        library.add_pattern("B", "x%{A}").unwrap();
        let err = library.compile("%{A:a}").unwrap_err();
        assert!(err.to_string().contains("nesting"));
    }

    #[test]
    fn fragment_splits_at_first_whitespace() {
        let mut library = PatternLibrary::new();
        library.add_fragment("STATUS_LINE [0-9]{3} [A-Z]+").unwrap();
        let pattern = library.compile("%{STATUS_LINE:line}").unwrap();
        let fields = pattern.try_extract("got 404 NOTFOUND").unwrap();
        assert_eq!(fields["line"], "404 NOTFOUND");
    }

    #[test]
    fn malformed_fragment_is_rejected() {
        let mut library = PatternLibrary::new();
        assert!(library.add_fragment("ONLYNAME").is_err());
        assert!(library.add_fragment("BAD-NAME x").is_err());
    }

    #[test]
    fn load_str_skips_comments_and_blank_lines() {
        let mut library = PatternLibrary::new();
        let added = library
            .load_str("# comment\n\nMETHOD (?:GET|POST)\n  CODE [0-9]{3}\n")
            .unwrap();
        assert_eq!(added, 2);
        assert!(library.contains("METHOD"));
        assert!(library.contains("CODE"));
    }

    #[test]
    fn scoped_fragments_do_not_leak_into_parent() {
        let base = PatternLibrary::with_builtins();
        let scoped = base
            .with_fragments(&["APPID app-[0-9]+".to_owned()])
            .unwrap();
        assert!(scoped.contains("APPID"));
        assert!(!base.contains("APPID"));
        assert!(base.compile("%{APPID:id}").is_err());
    }

    #[tokio::test]
    async fn load_dir_reads_every_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("web"), "VERB (?:GET|PUT)\n").unwrap();
        std::fs::write(dir.path().join("app"), "# app\nAPP_LEVEL [A-Z]+\n").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let mut library = PatternLibrary::new();
        let added = library.load_dir(dir.path()).await.unwrap();
        assert_eq!(added, 2);
        assert!(library.contains("VERB"));
        assert!(library.contains("APP_LEVEL"));
    }

    #[tokio::test]
    async fn load_dir_missing_directory_fails() {
        let mut library = PatternLibrary::new();
        let err = library
            .load_dir("/nonexistent/log-exporter/patterns")
            .await
            .unwrap_err();
        assert!(matches!(err, LogPipelineError::Config { .. }));
    }
}
