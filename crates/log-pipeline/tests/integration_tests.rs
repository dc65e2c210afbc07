//! 통합 테스트 -- 파일 tail부터 수집 패스까지 전체 흐름 검증

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use log_exporter_core::config::{FileConfig, TailConfig};
use log_exporter_pipeline::{
    FailureStats, FilePipeline, LineQueue, PatternLibrary, PipelineSet, ResolvedFile, Snapshot,
    resolve_files,
};

const ACCESS_PATTERN: &str = "%{WORD:method} %{URIPATH:path} %{NUMBER:status}";

fn file_config(path: &Path, workers: usize) -> FileConfig {
    FileConfig {
        path: path.display().to_string(),
        read_all: true,
        workers,
        pattern: ACCESS_PATTERN.to_owned(),
        custom_patterns: Vec::new(),
        labels: BTreeMap::from([
            ("route".to_owned(), "path".to_owned()),
            ("code".to_owned(), "status".to_owned()),
        ]),
    }
}

fn fast_tail() -> TailConfig {
    TailConfig {
        poll_interval_ms: 10,
        ..TailConfig::default()
    }
}

fn resolve(files: &[FileConfig]) -> Vec<ResolvedFile> {
    resolve_files(files, &PatternLibrary::with_builtins()).unwrap()
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// 재생 모드 파일 3줄, 워커 2개 → route{/a}=2, route{/b}=1, code{200}=2, code{404}=1
#[tokio::test]
async fn replayed_file_is_counted_across_workers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    std::fs::write(&path, "GET /a 200\nGET /b 404\nGET /a 200\n").unwrap();
    let file = path.display().to_string();

    let mut set = PipelineSet::build(resolve(&[file_config(&path, 2)]), fast_tail());
    assert_eq!(set.start(), 1);

    wait_until(|| set.get(&file).is_some_and(|p| p.lines_processed() == 3)).await;

    let collection = set.collect();
    assert_eq!(collection.open_files, 1);
    assert_eq!(collection.merge_failures, 0);
    assert_eq!(collection.value(&file, "route", "/a"), Some(2));
    assert_eq!(collection.value(&file, "route", "/b"), Some(1));
    assert_eq!(collection.value(&file, "code", "200"), Some(2));
    assert_eq!(collection.value(&file, "code", "404"), Some(1));
    assert_eq!(collection.series.len(), 4);
    assert_eq!(collection.failures_total, 0);

    set.shutdown(Duration::from_secs(5)).await;
}

/// 매칭되지 않는 라인 → 실패 카운터 +1, 레이블 카운트 변화 없음
#[tokio::test]
async fn unmatched_line_increments_failure_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    std::fs::write(&path, "GET /a 200\n").unwrap();
    let file = path.display().to_string();

    let mut set = PipelineSet::build(resolve(&[file_config(&path, 1)]), fast_tail());
    set.start();
    wait_until(|| set.get(&file).is_some_and(|p| p.lines_processed() == 1)).await;
    let before = set.collect();

    let mut handle = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    handle.write_all(b"this is not an access log line\n").unwrap();
    wait_until(|| set.get(&file).is_some_and(|p| p.lines_processed() == 2)).await;

    let after = set.collect();
    assert_eq!(after.failures_total, before.failures_total + 1);
    assert_eq!(after.series, before.series);
    assert_eq!(set.failure_stats().parse_failures(), 1);

    set.shutdown(Duration::from_secs(5)).await;
}

/// 존재하지 않는 경로 → 세트는 시작되고 해당 파일만 빠짐
#[tokio::test]
async fn nonexistent_path_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let present = dir.path().join("present.log");
    std::fs::write(&present, "GET /ok 200\n").unwrap();
    let missing = dir.path().join("missing.log");
    let present_label = present.display().to_string();
    let missing_label = missing.display().to_string();

    let mut set = PipelineSet::build(
        resolve(&[file_config(&missing, 1), file_config(&present, 1)]),
        fast_tail(),
    );
    assert_eq!(set.start(), 1);
    assert_eq!(set.failure_stats().startup_failures(), 1);

    wait_until(|| set.get(&present_label).is_some_and(|p| p.lines_processed() == 1)).await;

    let collection = set.collect();
    assert_eq!(collection.open_files, 1);
    assert!(!collection.has_file(&missing_label));
    assert_eq!(collection.value(&present_label, "route", "/ok"), Some(1));
    assert_eq!(collection.failures_total, 1);

    set.shutdown(Duration::from_secs(5)).await;
}

/// 수집 없이 두 번 병합하면 같은 스냅샷
#[tokio::test]
async fn merge_is_idempotent_without_new_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.log");
    std::fs::write(&path, "GET /a 200\nGET /c 500\n").unwrap();
    let file = path.display().to_string();

    let mut set = PipelineSet::build(resolve(&[file_config(&path, 3)]), fast_tail());
    set.start();
    wait_until(|| set.get(&file).is_some_and(|p| p.lines_processed() == 2)).await;

    let pipeline = set.get(&file).unwrap();
    let first = pipeline.merge().unwrap();
    let second = pipeline.merge().unwrap();
    assert_eq!(first.snapshot, second.snapshot);
    assert_eq!(first.shards, 3);

    set.shutdown(Duration::from_secs(5)).await;
}

/// 수집과 병합이 동시에 일어나도 카운트는 감소하지 않음
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_merges_are_monotonic() {
    const LINES: u64 = 2_000;

    let config = log_exporter_pipeline::FilePipelineConfig::from_core(&file_config(
        Path::new("/injected/access.log"),
        4,
    ))
    .unwrap();
    let resolved = ResolvedFile::resolve(config, &PatternLibrary::with_builtins()).unwrap();
    let (tx, queue) = LineQueue::channel(64);
    let mut pipeline = FilePipeline::from_queue(
        resolved.config,
        resolved.extractor,
        queue,
        Arc::new(FailureStats::new()),
    );
    pipeline.start(&CancellationToken::new()).unwrap();

    let producer = tokio::spawn(async move {
        for i in 0..LINES {
            let status = if i % 2 == 0 { 200 } else { 503 };
            tx.send(format!("GET /r{} {status}", i % 5)).await.unwrap();
        }
    });

    let mut previous = Snapshot::default();
    loop {
        let current = pipeline.merge().unwrap().snapshot;
        for (label, value, count) in previous.iter() {
            assert!(
                current.get(label, value) >= count,
                "{label}={value} decreased from {count}"
            );
        }
        previous = current;
        if pipeline.lines_processed() == LINES {
            break;
        }
        tokio::task::yield_now().await;
    }
    producer.await.unwrap();

    let last = pipeline.merge().unwrap().snapshot;
    assert_eq!(last.total("route"), LINES);
    assert_eq!(last.get("code", "200"), LINES / 2);
    assert_eq!(last.get("code", "503"), LINES / 2);

    pipeline.shutdown().await;
}

fn count_with_workers(lines: &[String], workers: usize) -> Snapshot {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        let config = log_exporter_pipeline::FilePipelineConfig::from_core(&file_config(
            Path::new("/injected/prop.log"),
            workers,
        ))
        .unwrap();
        let resolved = ResolvedFile::resolve(config, &PatternLibrary::with_builtins()).unwrap();
        let (tx, queue) = LineQueue::channel(16);
        let mut pipeline = FilePipeline::from_queue(
            resolved.config,
            resolved.extractor,
            queue,
            Arc::new(FailureStats::new()),
        );
        pipeline.start(&CancellationToken::new()).unwrap();

        for line in lines {
            tx.send(line.clone()).await.unwrap();
        }
        let expected = lines.len() as u64;
        wait_until(|| pipeline.lines_processed() == expected).await;

        let snapshot = pipeline.merge().unwrap().snapshot;
        pipeline.shutdown().await;
        snapshot
    })
}

fn access_line() -> impl Strategy<Value = String> {
    prop_oneof![
        (
            prop::sample::select(vec!["GET", "POST"]),
            prop::sample::select(vec!["/a", "/b", "/c"]),
            prop::sample::select(vec![200u16, 404, 500]),
        )
            .prop_map(|(m, p, s)| format!("{m} {p} {s}")),
        Just("garbage".to_owned()),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// 최종 카운트는 워커 수와 무관
    #[test]
    fn counts_do_not_depend_on_worker_count(
        lines in prop::collection::vec(access_line(), 0..60),
        workers in 2usize..6,
    ) {
        let single = count_with_workers(&lines, 1);
        let many = count_with_workers(&lines, workers);
        prop_assert_eq!(single, many);
    }
}
