//! log-exporter 수집/집계 엔진
//!
//! 로그 파일을 tail하고, grok 패턴으로 필드를 추출하고, 워커별 샤드에 카운트를 쌓은 뒤
//! 수집 시점에 샤드를 경합 없이 병합합니다.
//!
//! # 모듈 구성
//!
//! - [`collector`]: 파일 tailer와 다중 소비자 라인 큐
//! - [`grok`]: grok 패턴 라이브러리와 컴파일러
//! - [`config`]: 파일별 파이프라인 설정과 레이블 맵 해석
//! - [`shard`]: 워커별 카운터 샤드와 병합 스냅샷
//! - [`pipeline`]: 파일 하나의 수집/카운팅 파이프라인
//! - [`pipeline_set`]: 모든 파이프라인의 생명주기와 집계 읽기
//! - [`exposition`]: 수집 결과를 `metrics` 레코더에 기록
//! - [`stats`]: 프로세스 전역 실패 카운터
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! FileTailer -> LineQueue -> workers (grok) -> CounterShard x N
//!                                                   |
//! PipelineSet::collect -> FilePipeline::merge -> Snapshot -> exposition -> Prometheus
//! ```

pub mod collector;
pub mod config;
pub mod error;
pub mod exposition;
pub mod grok;
pub mod pipeline;
pub mod pipeline_set;
pub mod shard;
pub mod stats;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{FilePipeline, MergeReport, PipelineState};
pub use pipeline_set::{Collection, CounterSample, PipelineSet};

// 설정
pub use config::{FilePipelineConfig, LabelMap, ResolvedFile, resolve_files};

// 에러
pub use error::LogPipelineError;

// grok
pub use grok::{GrokPattern, PatternLibrary};

// 수집기
pub use collector::{FileTailer, LineQueue, StartPosition};

// 카운터
pub use shard::{CounterShard, LabelValueCounts, Snapshot, SnapshotBuilder};
pub use stats::FailureStats;
