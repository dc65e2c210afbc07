//! 컴파일된 grok 패턴

use regex::{Captures, Regex};

use log_exporter_core::pipeline::{FieldExtractor, Fields};

use super::GENERATED_GROUP_PREFIX;
use crate::error::LogPipelineError;

/// 컴파일된 grok 패턴
///
/// 펼친 정규식과 캡처 그룹 인덱스 → 의미 이름 매핑을 가집니다.
/// 매칭은 앵커 없이 라인의 어느 위치에서든 시작할 수 있습니다.
#[derive(Debug, Clone)]
pub struct GrokPattern {
    source: String,
    regex: Regex,
    /// (의미 이름, 캡처 그룹 인덱스). 같은 이름이 여러 번 나오면 먼저 참여한 그룹이 우선합니다.
    fields: Vec<(String, usize)>,
}

impl GrokPattern {
    pub(crate) fn new(source: String, regex: Regex, generated: Vec<(String, String)>) -> Self {
        let mut fields = Vec::with_capacity(generated.len());

        for (index, group) in regex.capture_names().enumerate() {
            let Some(group) = group else {
                continue;
            };
            if let Some((semantic, _)) = generated.iter().find(|(_, g)| g == group) {
                fields.push((semantic.clone(), index));
            } else if !is_generated(group) {
                fields.push((group.to_owned(), index));
            }
        }

        Self {
            source,
            regex,
            fields,
        }
    }

    /// 라인에서 필드를 추출합니다.
    ///
    /// 참여하지 않은 캡처는 결과에 포함되지 않습니다.
    pub fn try_extract(&self, line: &str) -> Result<Fields, LogPipelineError> {
        self.regex
            .captures(line)
            .map(|caps| self.fields_from(&caps))
            .ok_or_else(|| LogPipelineError::NoMatch {
                pattern: self.source.clone(),
            })
    }

    fn fields_from(&self, caps: &Captures<'_>) -> Fields {
        let mut fields = Fields::with_capacity(self.fields.len());
        for (name, index) in &self.fields {
            if let Some(m) = caps.get(*index) {
                fields
                    .entry(name.clone())
                    .or_insert_with(|| m.as_str().to_owned());
            }
        }
        fields
    }
}

impl FieldExtractor for GrokPattern {
    fn pattern(&self) -> &str {
        &self.source
    }

    // 워커의 핫 패스: 매칭 실패마다 에러를 만들지 않습니다.
    fn extract(&self, line: &str) -> Option<Fields> {
        self.regex.captures(line).map(|caps| self.fields_from(&caps))
    }

    fn capture_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.fields.len());
        for (name, _) in &self.fields {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

fn is_generated(group: &str) -> bool {
    group
        .strip_prefix(GENERATED_GROUP_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::super::PatternLibrary;
    use super::*;

    fn compile(pattern: &str) -> GrokPattern {
        PatternLibrary::with_builtins().compile(pattern).unwrap()
    }

    #[test]
    fn extracts_semantic_fields() {
        let pattern = compile("%{WORD:method} %{URIPATH:path} %{NUMBER:status}");
        let fields = pattern.try_extract("GET /a 200").unwrap();
        assert_eq!(fields["method"], "GET");
        assert_eq!(fields["path"], "/a");
        assert_eq!(fields["status"], "200");
    }

    #[test]
    fn match_is_unanchored() {
        let pattern = compile("status=%{INT:code}");
        let fields = pattern
            .try_extract("2024-01-01 request done status=503 elapsed=3ms")
            .unwrap();
        assert_eq!(fields["code"], "503");
    }

    #[test]
    fn no_match_returns_error() {
        let pattern = compile("%{WORD:method} %{NUMBER:status}");
        let err = pattern.try_extract("!!!").unwrap_err();
        assert!(matches!(err, LogPipelineError::NoMatch { .. }));
        assert!(pattern.extract("!!!").is_none());
    }

    #[test]
    fn extract_agrees_with_try_extract() {
        let pattern = compile("%{WORD:method} %{URIPATH:path}(?: %{NUMBER:status})?");
        for line in ["GET /a 200", "POST /b", "???", ""] {
            assert_eq!(pattern.extract(line), pattern.try_extract(line).ok(), "{line}");
        }
    }

    #[test]
    fn type_suffix_is_accepted() {
        let pattern = compile("took %{NUMBER:ms:float}ms");
        let fields = pattern.try_extract("took 12.5ms").unwrap();
        assert_eq!(fields["ms"], "12.5");
    }

    #[test]
    fn raw_named_group_is_reported() {
        let pattern = compile(r"(?P<level>[A-Z]+) %{GREEDYDATA:message}");
        let names = pattern.capture_names();
        assert!(names.contains(&"level".to_owned()));
        assert!(names.contains(&"message".to_owned()));
        let fields = pattern.try_extract("WARN disk almost full").unwrap();
        assert_eq!(fields["level"], "WARN");
        assert_eq!(fields["message"], "disk almost full");
    }

    #[test]
    fn nested_captures_are_reported() {
        let pattern = compile("%{COMMONAPACHELOG}");
        let line = r#"127.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "GET /apache_pb.gif HTTP/1.0" 200 2326"#;
        let fields = pattern.try_extract(line).unwrap();
        assert_eq!(fields["clientip"], "127.0.0.1");
        assert_eq!(fields["verb"], "GET");
        assert_eq!(fields["response"], "200");
        assert_eq!(fields["bytes"], "2326");
    }

    #[test]
    fn non_participating_capture_is_absent() {
        let pattern = compile("%{WORD:verb}(?: %{INT:code})?");
        let fields = pattern.try_extract("ping").unwrap();
        assert_eq!(fields["verb"], "ping");
        assert!(!fields.contains_key("code"));
    }

    #[test]
    fn capture_names_are_deduplicated() {
        let pattern = compile("(?:%{INT:n}|x%{WORD:n})");
        assert_eq!(pattern.capture_names(), vec!["n".to_owned()]);
    }

    #[test]
    fn generated_group_names_are_hidden() {
        let pattern = compile("%{WORD:method}");
        let names = pattern.capture_names();
        assert!(!names.iter().any(|n| n.starts_with(GENERATED_GROUP_PREFIX)));
    }

    #[test]
    fn is_generated_recognizes_only_numbered_groups() {
        assert!(is_generated("grok0"));
        assert!(is_generated("grok17"));
        assert!(!is_generated("grok"));
        assert!(!is_generated("grokker"));
        assert!(!is_generated("level"));
    }
}
