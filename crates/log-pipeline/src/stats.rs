//! 프로세스 전역 실패 카운터

use std::sync::atomic::{AtomicU64, Ordering};

/// 파싱/병합/시작 실패 카운터
///
/// 파이프라인 세트가 소유하고 모든 파이프라인과 워커가 `Arc`로 공유합니다.
/// `log_exporter_failure_total`은 세 값의 합입니다.
#[derive(Debug, Default)]
pub struct FailureStats {
    parse: AtomicU64,
    merge: AtomicU64,
    startup: AtomicU64,
}

impl FailureStats {
    /// 새 카운터를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 패턴에 매칭되지 않은 라인 하나를 기록합니다.
    pub fn record_parse_failure(&self) {
        self.parse.fetch_add(1, Ordering::Relaxed);
    }

    /// 수집 패스에서 실패한 병합 하나를 기록합니다.
    pub fn record_merge_failure(&self) {
        self.merge.fetch_add(1, Ordering::Relaxed);
    }

    /// 시작하지 못한 파이프라인 하나를 기록합니다.
    pub fn record_startup_failure(&self) {
        self.startup.fetch_add(1, Ordering::Relaxed);
    }

    pub fn parse_failures(&self) -> u64 {
        self.parse.load(Ordering::Relaxed)
    }

    pub fn merge_failures(&self) -> u64 {
        self.merge.load(Ordering::Relaxed)
    }

    pub fn startup_failures(&self) -> u64 {
        self.startup.load(Ordering::Relaxed)
    }

    /// 모든 실패의 합
    pub fn total(&self) -> u64 {
        self.parse_failures()
            .saturating_add(self.merge_failures())
            .saturating_add(self.startup_failures())
    }
}
