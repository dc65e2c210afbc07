//! 파일 파이프라인 -- 한 파일의 수집과 카운팅을 담당합니다.
//!
//! [`FilePipeline`]은 라인 소스 하나, 워커 풀, 워커별 [`CounterShard`]를 소유하고
//! 요청 시 모든 샤드를 [`Snapshot`]으로 병합합니다.
//!
//! # 내부 아키텍처
//! ```text
//! FileTailer -> mpsc -> LineQueue -+-> worker 0 -> grok -> CounterShard 0 -+
//!                                  +-> worker 1 -> grok -> CounterShard 1 -+-> merge() -> Snapshot
//!                                  +-> worker N -> grok -> CounterShard N -+
//! ```
//!
//! # 상태 전이
//! `Created -> Starting -> Running -> ShuttingDown -> Stopped`
//!
//! 병합은 `Running`에서만 가능하며 다른 상태에서는 `PipelineUnavailable`을 즉시 반환합니다.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use log_exporter_core::config::TailConfig;
use log_exporter_core::pipeline::{FieldExtractor, HealthStatus};

use crate::collector::{FileTailer, LineQueue};
use crate::config::{FilePipelineConfig, LabelMap};
use crate::error::LogPipelineError;
use crate::shard::{CounterShard, Snapshot, SnapshotBuilder};
use crate::stats::FailureStats;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// 생성됨, 아직 시작하지 않음
    Created,
    /// 워커를 띄우는 중
    Starting,
    /// 실행 중
    Running,
    /// 종료 중
    ShuttingDown,
    /// 정지됨
    Stopped,
}

impl PipelineState {
    /// 상태 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 병합 결과
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// 모든 샤드를 합친 스냅샷
    pub snapshot: Snapshot,
    /// 병합에 참여한 샤드 수
    pub shards: usize,
}

/// 파일 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use log_exporter_pipeline::FilePipeline;
///
/// let mut pipeline = FilePipeline::open(config, extractor, &tail, failures)?;
/// pipeline.start(&cancel)?;
/// let report = pipeline.merge()?;
/// pipeline.shutdown().await;
/// ```
pub struct FilePipeline {
    config: FilePipelineConfig,
    path_label: String,
    extractor: Arc<dyn FieldExtractor>,
    labels: Arc<LabelMap>,
    queue: LineQueue,
    /// 시작 전까지 보관하는 tailer (주입된 큐를 쓰면 None)
    tailer: Option<FileTailer>,
    shards: Vec<Arc<Mutex<CounterShard>>>,
    state: RwLock<PipelineState>,
    cancel: CancellationToken,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    failures: Arc<FailureStats>,
    lines_processed: Arc<AtomicU64>,
    parse_failures: Arc<AtomicU64>,
}

impl FilePipeline {
    /// 파일을 열어 파이프라인을 생성합니다.
    ///
    /// 시작 위치는 설정의 재생 플래그를 따릅니다.
    /// 파일을 열 수 없으면 `SourceUnavailable`을 반환하며, 이 에러는 이 파일에만 영향을 줍니다.
    pub fn open(
        config: FilePipelineConfig,
        extractor: Arc<dyn FieldExtractor>,
        tail: &TailConfig,
        failures: Arc<FailureStats>,
    ) -> Result<Self, LogPipelineError> {
        let (tx, queue) = LineQueue::channel(tail.channel_capacity);
        let tailer = FileTailer::open(&config.path, config.start, tail, tx)?;
        let mut pipeline = Self::from_queue(config, extractor, queue, failures);
        pipeline.tailer = Some(tailer);
        Ok(pipeline)
    }

    /// 외부에서 주입한 라인 큐로 파이프라인을 생성합니다.
    pub fn from_queue(
        config: FilePipelineConfig,
        extractor: Arc<dyn FieldExtractor>,
        queue: LineQueue,
        failures: Arc<FailureStats>,
    ) -> Self {
        let labels = Arc::new(config.labels.clone());
        Self {
            path_label: config.path_label(),
            config,
            extractor,
            labels,
            queue,
            tailer: None,
            shards: Vec::new(),
            state: RwLock::new(PipelineState::Created),
            cancel: CancellationToken::new(),
            tasks: tokio::sync::Mutex::new(Vec::new()),
            failures,
            lines_processed: Arc::new(AtomicU64::new(0)),
            parse_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &FilePipelineConfig {
        &self.config
    }

    /// 메트릭 `file` 레이블 값
    pub fn path_label(&self) -> &str {
        &self.path_label
    }

    /// 현재 상태
    pub fn state(&self) -> PipelineState {
        *self.state.read()
    }

    /// 워커가 처리한 라인 수 (매칭 실패 포함)
    pub fn lines_processed(&self) -> u64 {
        self.lines_processed.load(Ordering::Acquire)
    }

    /// 이 파이프라인에서 매칭에 실패한 라인 수
    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    /// 워커와 tailer를 시작합니다.
    ///
    /// 워커마다 새 샤드를 만들고, 모든 워커가 같은 라인 큐를 공유합니다.
    /// `parent`가 취소되면 이 파이프라인도 함께 멈춥니다.
    pub fn start(&mut self, parent: &CancellationToken) -> Result<(), LogPipelineError> {
        {
            let mut state = self.state.write();
            if *state != PipelineState::Created {
                return Err(self.unavailable(*state));
            }
            *state = PipelineState::Starting;
        }

        self.cancel = parent.child_token();
        let label_names: Vec<&str> = self.labels.label_names().collect();
        let mut handles = Vec::with_capacity(self.config.workers + 1);

        if let Some(tailer) = self.tailer.take() {
            handles.push(tailer.spawn(self.cancel.clone()));
        }

        for id in 0..self.config.workers {
            let shard = Arc::new(Mutex::new(CounterShard::new(label_names.iter().copied())));
            self.shards.push(Arc::clone(&shard));

            let worker = Worker {
                id,
                path: self.path_label.clone(),
                queue: self.queue.clone(),
                extractor: Arc::clone(&self.extractor),
                labels: Arc::clone(&self.labels),
                shard,
                failures: Arc::clone(&self.failures),
                lines_processed: Arc::clone(&self.lines_processed),
                parse_failures: Arc::clone(&self.parse_failures),
            };
            handles.push(tokio::spawn(worker.run(self.cancel.clone())));
        }

        *self.tasks.get_mut() = handles;
        *self.state.write() = PipelineState::Running;

        tracing::info!(
            path = %self.path_label,
            workers = self.config.workers,
            pattern = self.extractor.pattern(),
            "file pipeline started"
        );
        Ok(())
    }

    /// 모든 샤드를 병합해 스냅샷을 만듭니다.
    ///
    /// 샤드마다 잠금을 짧게 잡고 복사한 뒤 바로 놓습니다.
    /// 수집을 멈추지 않으며, `Running`이 아니면 즉시 `PipelineUnavailable`을 반환합니다.
    pub fn merge(&self) -> Result<MergeReport, LogPipelineError> {
        let state = self.state();
        if state != PipelineState::Running {
            return Err(self.unavailable(state));
        }

        let mut builder = SnapshotBuilder::new();
        for shard in &self.shards {
            let guard = shard.lock();
            builder.add_shard(&guard);
        }

        Ok(MergeReport {
            snapshot: builder.build(),
            shards: self.shards.len(),
        })
    }

    /// 워커와 tailer를 취소하고 모두 끝날 때까지 기다립니다.
    ///
    /// 여러 번 호출해도 안전합니다.
    pub async fn shutdown(&self) {
        let previous = {
            let mut state = self.state.write();
            let previous = *state;
            *state = match previous {
                PipelineState::Running => PipelineState::ShuttingDown,
                PipelineState::Created | PipelineState::Starting => PipelineState::Stopped,
                other => other,
            };
            previous
        };

        match previous {
            PipelineState::ShuttingDown | PipelineState::Stopped => return,
            PipelineState::Created | PipelineState::Starting => {
                self.cancel.cancel();
                self.queue.close().await;
                return;
            }
            PipelineState::Running => {}
        }

        tracing::info!(path = %self.path_label, "stopping file pipeline");
        self.cancel.cancel();

        let handles = std::mem::take(&mut *self.tasks.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(path = %self.path_label, error = %e, "pipeline task ended abnormally");
            }
        }
        self.queue.close().await;

        *self.state.write() = PipelineState::Stopped;
        tracing::info!(
            path = %self.path_label,
            lines = self.lines_processed(),
            parse_failures = self.parse_failures(),
            "file pipeline stopped"
        );
    }

    /// 파이프라인 건강 상태
    pub fn health_check(&self) -> HealthStatus {
        match self.state() {
            PipelineState::Running => HealthStatus::Healthy,
            PipelineState::Created | PipelineState::Starting => {
                HealthStatus::Degraded(format!("{} not running yet", self.path_label))
            }
            PipelineState::ShuttingDown | PipelineState::Stopped => {
                HealthStatus::Unhealthy(format!("{} stopped", self.path_label))
            }
        }
    }

    fn unavailable(&self, state: PipelineState) -> LogPipelineError {
        LogPipelineError::PipelineUnavailable {
            path: self.path_label.clone(),
            state: state.to_string(),
        }
    }
}

/// 워커 태스크 하나의 실행 컨텍스트
struct Worker {
    id: usize,
    path: String,
    queue: LineQueue,
    extractor: Arc<dyn FieldExtractor>,
    labels: Arc<LabelMap>,
    shard: Arc<Mutex<CounterShard>>,
    failures: Arc<FailureStats>,
    lines_processed: Arc<AtomicU64>,
    parse_failures: Arc<AtomicU64>,
}

impl Worker {
    async fn run(self, cancel: CancellationToken) {
        tracing::debug!(path = %self.path, worker = self.id, "worker started");

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                line = self.queue.next_line() => line,
            };

            let Some(line) = line else {
                tracing::debug!(path = %self.path, worker = self.id, "line source closed");
                break;
            };
            self.process(&line);
        }

        tracing::debug!(path = %self.path, worker = self.id, "worker stopped");
    }

    fn process(&self, line: &str) {
        match self.extractor.extract(line) {
            Some(fields) => {
                let mut shard = self.shard.lock();
                for (label, capture) in self.labels.iter() {
                    if let Some(value) = fields.get(capture) {
                        shard.increment(label, value);
                    }
                }
            }
            None => {
                self.failures.record_parse_failure();
                self.parse_failures.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    path = %self.path,
                    worker = self.id,
                    pattern = self.extractor.pattern(),
                    "line does not match pattern"
                );
            }
        }
        self.lines_processed.fetch_add(1, Ordering::Release);
    }
}
