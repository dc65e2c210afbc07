//! 파이프라인 seam — 필드 추출기 trait과 건강 상태

use std::collections::HashMap;

use serde::Serialize;

/// 한 라인에서 추출된 필드: capture 이름 → 추출 문자열
pub type Fields = HashMap<String, String>;

/// 라인에서 이름 있는 필드를 추출하는 trait
///
/// grok 이외의 추출 방식을 붙이려면 이 trait을 구현합니다.
/// 구현체는 여러 워커 태스크에서 동시에 호출되므로 `Send + Sync`여야 하며,
/// `extract`는 블로킹 없이 짧은 시간 안에 끝나야 합니다.
pub trait FieldExtractor: Send + Sync {
    /// 추출에 사용하는 원본 패턴 (로그/진단용)
    fn pattern(&self) -> &str;

    /// 라인에서 필드를 추출합니다. 매칭되지 않으면 `None`.
    fn extract(&self, line: &str) -> Option<Fields>;

    /// 추출 결과에 나타날 수 있는 capture 이름 목록
    fn capture_names(&self) -> Vec<String>;
}

/// 파이프라인 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작하지만 일부 기능 저하
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}
