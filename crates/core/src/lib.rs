//! log-exporter 공통 크레이트
//!
//! 데몬과 파이프라인 크레이트가 공유하는 에러 타입, TOML 설정,
//! 메트릭 이름/디스크립터, 필드 추출 seam을 정의합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ExporterError, PipelineError};

// 설정
pub use config::{ExporterConfig, FileConfig, TailConfig};

// 파이프라인 seam
pub use pipeline::{FieldExtractor, Fields, HealthStatus};
