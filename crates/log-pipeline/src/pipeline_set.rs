//! 파이프라인 세트 -- 프로세스의 모든 파일 파이프라인을 관리합니다.
//!
//! [`PipelineSet`]은 시작 시 고정된 파이프라인 목록을 소유하고,
//! 노출 레이어가 사용하는 집계 읽기([`PipelineSet::collect`])와
//! 전체 생명주기(시작/종료)를 조율합니다.
//!
//! 한 파일의 실패는 그 파일에만 영향을 줍니다.
//! 열 수 없는 파일은 건너뛰고, 병합 실패는 실패 카운터에 쌓일 뿐 수집 패스를 중단하지 않습니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use log_exporter_core::config::TailConfig;
use log_exporter_core::metrics::{self, MetricDescriptor};
use log_exporter_core::pipeline::HealthStatus;

use crate::config::ResolvedFile;
use crate::pipeline::{FilePipeline, PipelineState};
use crate::stats::FailureStats;

/// `log_exporter_total` 시계열 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterSample {
    /// 파일 경로
    pub file: String,
    /// 노출 레이블 이름
    pub label_name: String,
    /// 추출된 레이블 값
    pub label_value: String,
    /// 누적 카운트
    pub value: u64,
}

/// 수집 패스 한 번의 결과
#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// 이번 패스에서 병합에 성공한 파이프라인 수
    pub open_files: usize,
    /// (file, label_name, label_value)별 누적 카운트
    pub series: Vec<CounterSample>,
    /// 이번 패스에서 병합에 실패한 파이프라인 수
    pub merge_failures: usize,
    /// 누적 실패 수 (파싱 + 병합 + 시작)
    pub failures_total: u64,
    /// 패스 전체 소요 시간
    pub duration: Duration,
}

impl Collection {
    /// 특정 시계열 값을 찾습니다.
    pub fn value(&self, file: &str, label_name: &str, label_value: &str) -> Option<u64> {
        self.series
            .iter()
            .find(|s| s.file == file && s.label_name == label_name && s.label_value == label_value)
            .map(|s| s.value)
    }

    /// 특정 파일의 시계열이 하나라도 있는지 확인합니다.
    pub fn has_file(&self, file: &str) -> bool {
        self.series.iter().any(|s| s.file == file)
    }
}

/// 파이프라인 세트
pub struct PipelineSet {
    /// 아직 열지 않은 파일 설정
    pending: Vec<ResolvedFile>,
    tail: TailConfig,
    pipelines: Vec<FilePipeline>,
    failures: Arc<FailureStats>,
    cancel: CancellationToken,
}

impl PipelineSet {
    /// 해석된 파일 설정으로 세트를 만듭니다. 파일은 [`start`](Self::start)에서 엽니다.
    pub fn build(resolved: Vec<ResolvedFile>, tail: TailConfig) -> Self {
        Self {
            pending: resolved,
            tail,
            pipelines: Vec::new(),
            failures: Arc::new(FailureStats::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// 세트가 공유하는 실패 카운터
    pub fn failure_stats(&self) -> Arc<FailureStats> {
        Arc::clone(&self.failures)
    }

    /// 이미 만든 파이프라인을 추가합니다 (외부 라인 소스 주입용).
    ///
    /// 파이프라인은 [`failure_stats`](Self::failure_stats)로 받은 카운터를 공유해야 합니다.
    pub fn add_pipeline(&mut self, pipeline: FilePipeline) {
        self.pipelines.push(pipeline);
    }

    /// 모든 파이프라인을 열고 시작합니다.
    ///
    /// 열거나 시작하지 못한 파일은 경고 로그와 시작 실패 카운트를 남기고 건너뜁니다.
    /// 실행 중인 파이프라인 수를 반환합니다.
    pub fn start(&mut self) -> usize {
        for resolved in std::mem::take(&mut self.pending) {
            let path = resolved.config.path_label();
            match FilePipeline::open(
                resolved.config,
                resolved.extractor,
                &self.tail,
                Arc::clone(&self.failures),
            ) {
                Ok(pipeline) => self.pipelines.push(pipeline),
                Err(e) => {
                    self.failures.record_startup_failure();
                    tracing::warn!(path = %path, error = %e, "skipping file pipeline");
                }
            }
        }

        let mut started = Vec::with_capacity(self.pipelines.len());
        for mut pipeline in std::mem::take(&mut self.pipelines) {
            if pipeline.state() == PipelineState::Created {
                if let Err(e) = pipeline.start(&self.cancel) {
                    self.failures.record_startup_failure();
                    tracing::warn!(path = %pipeline.path_label(), error = %e, "failed to start file pipeline");
                    continue;
                }
            }
            started.push(pipeline);
        }
        self.pipelines = started;

        let running = self.running();
        tracing::info!(
            running,
            skipped = self.failures.startup_failures(),
            "pipeline set started"
        );
        running
    }

    /// 노출되는 메트릭의 정적 형태를 반환합니다. 파이프라인 상태를 읽지 않습니다.
    pub fn describe(&self) -> [MetricDescriptor; 4] {
        metrics::descriptors()
    }

    /// 모든 파이프라인을 병합해 한 번의 수집 결과를 만듭니다.
    ///
    /// 병합에 실패한 파이프라인은 실패 카운터에 기록되고 결과에서 빠집니다.
    pub fn collect(&self) -> Collection {
        let started = Instant::now();
        let mut collection = Collection::default();

        for pipeline in &self.pipelines {
            match pipeline.merge() {
                Ok(report) => {
                    collection.open_files += 1;
                    let file = pipeline.path_label();
                    collection
                        .series
                        .extend(report.snapshot.iter().map(|(label, value, count)| CounterSample {
                            file: file.to_owned(),
                            label_name: label.to_owned(),
                            label_value: value.to_owned(),
                            value: count,
                        }));
                }
                Err(e) => {
                    collection.merge_failures += 1;
                    self.failures.record_merge_failure();
                    tracing::warn!(path = %pipeline.path_label(), error = %e, "merge failed");
                }
            }
        }

        collection.failures_total = self.failures.total();
        collection.duration = started.elapsed();

        tracing::debug!(
            open_files = collection.open_files,
            series = collection.series.len(),
            merge_failures = collection.merge_failures,
            duration_ms = collection.duration.as_millis() as u64,
            "collect pass finished"
        );
        collection
    }

    /// 모든 파이프라인을 종료합니다.
    ///
    /// `timeout` 안에 멈추지 않은 파이프라인은 경고 로그를 남기고 포기합니다.
    pub async fn shutdown(&self, timeout: Duration) {
        tracing::info!(pipelines = self.pipelines.len(), "shutting down pipeline set");
        self.cancel.cancel();

        let deadline = tokio::time::Instant::now() + timeout;
        let mut abandoned = 0usize;
        for pipeline in &self.pipelines {
            if tokio::time::timeout_at(deadline, pipeline.shutdown())
                .await
                .is_err()
            {
                abandoned += 1;
                tracing::warn!(
                    path = %pipeline.path_label(),
                    timeout_secs = timeout.as_secs(),
                    "file pipeline did not stop before deadline, abandoning"
                );
            }
        }

        tracing::info!(abandoned, "pipeline set stopped");
    }

    /// 세트 전체의 건강 상태
    pub fn health(&self) -> HealthStatus {
        let running = self.running();
        let skipped = self.failures.startup_failures();

        if running == 0 {
            return HealthStatus::Unhealthy("no file pipeline running".to_owned());
        }
        let stopped: Vec<&str> = self
            .pipelines
            .iter()
            .filter(|p| p.state() != PipelineState::Running)
            .map(FilePipeline::path_label)
            .collect();
        if !stopped.is_empty() {
            return HealthStatus::Degraded(format!("not running: {}", stopped.join(", ")));
        }
        if skipped > 0 {
            return HealthStatus::Degraded(format!("{skipped} file(s) skipped at startup"));
        }
        HealthStatus::Healthy
    }

    /// 세트에 있는 파이프라인 수 (시작에 실패한 파일 제외)
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// 파이프라인이 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// 파이프라인 반복자 (설정 순서)
    pub fn iter(&self) -> impl Iterator<Item = &FilePipeline> {
        self.pipelines.iter()
    }

    /// 세트에 있는 파일 경로 목록
    pub fn paths(&self) -> Vec<&str> {
        self.pipelines.iter().map(FilePipeline::path_label).collect()
    }

    /// 경로로 파이프라인을 찾습니다.
    pub fn get(&self, path: &str) -> Option<&FilePipeline> {
        self.pipelines.iter().find(|p| p.path_label() == path)
    }

    fn running(&self) -> usize {
        self.pipelines
            .iter()
            .filter(|p| p.state() == PipelineState::Running)
            .count()
    }
}
