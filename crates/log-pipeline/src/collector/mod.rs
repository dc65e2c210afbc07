//! 라인 수집 모듈 -- 감시 중인 파일에서 원시 라인을 수집합니다.
//!
//! # 구성
//! - [`FileTailer`]: 파일 감시 (tail -f 방식, truncation/로테이션 처리)
//! - [`LineQueue`]: 여러 워커가 공유하는 라인 큐 (라인당 단일 전달)
//!
//! # 아키텍처
//! tailer는 자체 tokio 태스크에서 실행되며, 완성된 라인을
//! `tokio::mpsc::Sender<String>` 채널로 보냅니다. 수신 측은 [`LineQueue`]로
//! 감싸져 같은 파일의 모든 워커가 경쟁적으로 소비합니다.

pub mod file;

pub use file::FileTailer;

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

/// 라인 소스의 시작 위치
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartPosition {
    /// 파일 처음부터 기존 내용을 재생
    Beginning,
    /// 현재 파일 끝부터 새로 추가되는 라인만
    #[default]
    End,
}

impl StartPosition {
    /// 재생 플래그(`read_all`)에서 시작 위치를 결정합니다.
    pub fn from_replay(read_all: bool) -> Self {
        if read_all { Self::Beginning } else { Self::End }
    }
}

/// 다중 소비자 라인 큐
///
/// `mpsc::Receiver`는 단일 소비자이므로 `tokio::sync::Mutex`로 감싸 공유합니다.
/// 한 라인은 정확히 하나의 워커에게만 전달됩니다.
/// `recv()`는 cancel-safe이므로 `select!`에서 취소되어도 라인이 유실되지 않습니다.
#[derive(Debug, Clone)]
pub struct LineQueue {
    inner: Arc<Mutex<mpsc::Receiver<String>>>,
}

impl LineQueue {
    /// 수신 채널을 큐로 감쌉니다.
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rx)),
        }
    }

    /// 용량이 `capacity`인 채널을 만들고 (송신자, 큐)를 반환합니다.
    pub fn channel(capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }

    /// 다음 라인을 기다립니다.
    ///
    /// 모든 송신자가 닫히고 큐가 비면 `None`(Closed)을 반환합니다.
    pub async fn next_line(&self) -> Option<String> {
        let mut rx = self.inner.lock().await;
        rx.recv().await
    }

    /// 큐를 닫습니다. 이미 버퍼된 라인은 계속 소비할 수 있습니다.
    pub async fn close(&self) {
        self.inner.lock().await.close();
    }
}
