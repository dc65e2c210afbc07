//! 파일 기반 라인 수집기
//!
//! 로그 파일을 감시하며 새로운 라인이 추가되면 수집합니다.
//! `tail -f`와 유사한 동작을 비동기 폴링 방식으로 구현합니다.
//!
//! # 로테이션 감지
//! - inode 변경 감지 (logrotate 등, Unix 전용) → 새 파일을 처음부터 읽음
//! - 파일 크기 축소 감지 (truncation) → 오프셋 0부터 다시 읽음
//! - 파일이 잠시 사라진 경우 → 다시 나타날 때까지 계속 폴링

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use log_exporter_core::config::TailConfig;

use super::StartPosition;
use crate::error::LogPipelineError;

/// 한 번의 폴링에서 읽을 최대 바이트 수
const MAX_READ_CHUNK_BYTES: u64 = 8 * 1024 * 1024; // 8MB

/// 파일 tailer
///
/// 파일 하나를 주기적으로 폴링하여 완성된 라인(`\n` 종료)을 채널로 보냅니다.
/// 마지막 줄이 아직 완성되지 않았으면 다음 폴링까지 버퍼에 보관합니다.
pub struct FileTailer {
    path: PathBuf,
    poll_interval: Duration,
    max_line_length: usize,
    tx: mpsc::Sender<String>,
    /// 다음 읽기 위치 (바이트 오프셋)
    offset: u64,
    /// 현재 파일의 inode (Unix 전용)
    inode: Option<u64>,
    /// 아직 개행이 오지 않은 마지막 라인 조각
    partial: Vec<u8>,
    /// 최대 길이를 넘은 라인의 나머지를 버리는 중
    skipping: bool,
    /// 한 번의 폴링에서 읽을 최대 바이트 수
    read_chunk: u64,
    /// 마지막 폴링이 `read_chunk`에 막혀 읽을 내용이 남아 있음
    backlog: bool,
}

impl FileTailer {
    /// 파일을 열고 시작 위치를 정합니다.
    ///
    /// 파일을 열 수 없으면 `SourceUnavailable`을 반환합니다.
    pub fn open(
        path: impl Into<PathBuf>,
        start: StartPosition,
        config: &TailConfig,
        tx: mpsc::Sender<String>,
    ) -> Result<Self, LogPipelineError> {
        let path = path.into();
        let unavailable = |e: std::io::Error| LogPipelineError::SourceUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let file = std::fs::File::open(&path).map_err(unavailable)?;
        let metadata = file.metadata().map_err(unavailable)?;
        if !metadata.is_file() {
            return Err(LogPipelineError::SourceUnavailable {
                path: path.display().to_string(),
                reason: "not a regular file".to_owned(),
            });
        }

        let offset = match start {
            StartPosition::Beginning => 0,
            StartPosition::End => metadata.len(),
        };

        tracing::debug!(path = %path.display(), offset, ?start, "opened log file");

        Ok(Self {
            path,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            max_line_length: config.max_line_length,
            tx,
            offset,
            inode: inode_of(&metadata),
            partial: Vec::new(),
            skipping: false,
            read_chunk: MAX_READ_CHUNK_BYTES,
            backlog: false,
        })
    }

    /// 감시 중인 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 다음 읽기 위치
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 폴링 루프를 별도 태스크로 시작합니다.
    ///
    /// `cancel`이 취소되거나 수신 측 큐가 닫히면 종료합니다.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(mut self, cancel: CancellationToken) {
        tracing::info!(path = %self.path.display(), offset = self.offset, "tailer started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.poll_once() => {
                    if let Err(e) = result {
                        tracing::warn!(path = %self.path.display(), error = %e, "failed to read log file");
                    }
                }
            }

            if self.tx.is_closed() {
                tracing::debug!(path = %self.path.display(), "line queue closed");
                break;
            }

            // 밀린 내용이 있으면 쉬지 않고 바로 다음 조각을 읽습니다.
            if self.backlog {
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::info!(path = %self.path.display(), "tailer stopped");
    }

    /// 새로 추가된 내용을 한 번 읽고 완성된 라인을 보냅니다.
    ///
    /// 보낸 라인 수를 반환합니다. 파일이 잠시 없으면 0을 반환합니다.
    pub async fn poll_once(&mut self) -> Result<usize, LogPipelineError> {
        self.backlog = false;
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "file unavailable, retrying");
                return Ok(0);
            }
        };

        let inode = inode_of(&metadata);
        if inode.is_some() && self.inode.is_some() && inode != self.inode {
            tracing::info!(path = %self.path.display(), "file rotated, reopening from start");
            self.reset();
        }
        self.inode = inode;

        let len = metadata.len();
        if len < self.offset {
            tracing::warn!(
                path = %self.path.display(),
                previous_offset = self.offset,
                current_size = len,
                "file truncated, reading from start"
            );
            self.reset();
        }
        if len == self.offset {
            return Ok(0);
        }

        let remaining = len - self.offset;
        let to_read = remaining.min(self.read_chunk);
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(self.offset)).await?;

        let mut buf = Vec::with_capacity(to_read as usize);
        let read = file.take(to_read).read_to_end(&mut buf).await?;
        self.offset += read as u64;
        self.backlog = read as u64 == to_read && remaining > to_read;

        self.emit_lines(&buf).await
    }

    async fn emit_lines(&mut self, chunk: &[u8]) -> Result<usize, LogPipelineError> {
        self.partial.extend_from_slice(chunk);

        let mut sent = 0;
        let mut start = 0;
        while let Some(pos) = self.partial[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let mut line = &self.partial[start..end];
            start = end + 1;

            if self.skipping {
                self.skipping = false;
                continue;
            }
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if line.len() > self.max_line_length {
                tracing::warn!(
                    path = %self.path.display(),
                    length = line.len(),
                    max = self.max_line_length,
                    "line exceeds max length, dropped"
                );
                continue;
            }

            let text = String::from_utf8_lossy(line).into_owned();
            if self.tx.send(text).await.is_err() {
                self.partial.clear();
                return Ok(sent);
            }
            sent += 1;
        }
        self.partial.drain(..start);

        if self.partial.len() > self.max_line_length {
            tracing::warn!(
                path = %self.path.display(),
                length = self.partial.len(),
                max = self.max_line_length,
                "unterminated line exceeds max length, dropped"
            );
            self.partial.clear();
            self.skipping = true;
        }

        Ok(sent)
    }

    fn reset(&mut self) {
        self.offset = 0;
        self.partial.clear();
        self.skipping = false;
    }
}

#[cfg(unix)]
fn inode_of(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn inode_of(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}
