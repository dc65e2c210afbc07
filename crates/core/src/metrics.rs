//! 메트릭 상수 및 설명 등록
//!
//! 노출되는 모든 Prometheus 메트릭의 이름, 레이블 차원, 설명을 중앙에서 정의합니다.
//! 파이프라인 세트의 describe 단계와 exposition 브리지는 모두 이 정의를 사용합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `log_exporter_`
//! - 접미어: `_total` (counter), `_seconds` (지속 시간), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 파일 경로 레이블 키
pub const LABEL_FILE: &str = "file";

/// 노출 레이블 이름 키 (설정의 `labels` 테이블 키)
pub const LABEL_NAME: &str = "label_name";

/// 추출된 레이블 값 키
pub const LABEL_VALUE: &str = "label_value";

/// 수집 단계 레이블 키
pub const LABEL_ACTION: &str = "action";

/// 빌드 버전 레이블 키
pub const LABEL_VERSION: &str = "version";

/// `action` 레이블 값: 파일 스냅샷 병합 단계
pub const ACTION_FILE_SCRAPE: &str = "file_scrape";

// ─── 메트릭 이름 ────────────────────────────────────────────────────

/// (file, label_name, label_value)별 누적 발생 수 (counter)
pub const LOG_TOTAL: &str = "log_exporter_total";

/// 마지막 수집 패스에서 병합에 성공한 파이프라인 수 (gauge)
pub const OPEN_FILES_NUMBER: &str = "log_exporter_open_files_number";

/// 누적 실패 수: 파싱 실패 + 병합 실패 + 시작 실패 (counter)
pub const FAILURE_TOTAL: &str = "log_exporter_failure_total";

/// 마지막 수집 패스 소요 시간 (gauge, 초, label: action)
pub const FREEZE_TIME_COLLECTOR_DURATION_SECONDS: &str =
    "log_exporter_freeze_time_collector_duration_seconds";

/// 빌드 정보 (gauge, 항상 1, label: version)
pub const BUILD_INFO: &str = "log_exporter_build_info";

// ─── 디스크립터 ─────────────────────────────────────────────────────

/// 메트릭 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// 단조 증가 카운터
    Counter,
    /// 임의 값 게이지
    Gauge,
}

/// 메트릭의 정적 형태 (이름, 종류, 레이블 차원, 설명)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    /// 메트릭 이름
    pub name: &'static str,
    /// 메트릭 종류
    pub kind: MetricKind,
    /// 레이블 차원
    pub labels: &'static [&'static str],
    /// HELP 텍스트
    pub help: &'static str,
}

/// 파이프라인 세트가 노출하는 메트릭의 정적 형태를 반환합니다.
///
/// 파이프라인 상태와 무관하게 항상 같은 값을 반환합니다.
pub fn descriptors() -> [MetricDescriptor; 4] {
    [
        MetricDescriptor {
            name: LOG_TOTAL,
            kind: MetricKind::Counter,
            labels: &[LABEL_FILE, LABEL_NAME, LABEL_VALUE],
            help: "Counter of log labels",
        },
        MetricDescriptor {
            name: OPEN_FILES_NUMBER,
            kind: MetricKind::Gauge,
            labels: &[],
            help: "files number for parser process",
        },
        MetricDescriptor {
            name: FAILURE_TOTAL,
            kind: MetricKind::Counter,
            labels: &[],
            help: "Number of failures while grok the log file",
        },
        MetricDescriptor {
            name: FREEZE_TIME_COLLECTOR_DURATION_SECONDS,
            kind: MetricKind::Gauge,
            labels: &[LABEL_ACTION],
            help: "log_exporter: Duration of a collector freeze.",
        },
    ]
}

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 데몬 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    for descriptor in descriptors() {
        match descriptor.kind {
            MetricKind::Counter => describe_counter!(descriptor.name, descriptor.help),
            MetricKind::Gauge => describe_gauge!(descriptor.name, descriptor.help),
        }
    }

    describe_gauge!(BUILD_INFO, "log_exporter build information (always 1)");
}
