//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 tail, grok 추출, 집계, 병합 과정에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for ExporterError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! # 전파 정책
//! - `SourceUnavailable`: 해당 파일 파이프라인만 치명적, 프로세스는 계속
//! - `Grammar`: 설정 오류이므로 시작 단계에서 프로세스 전체를 중단
//! - `NoMatch`: 라인 단위로 복구 가능, 실패 카운터만 증가
//! - `PipelineUnavailable`: 수집 패스에서 파이프라인별 실패로 기록

use log_exporter_core::error::{ExporterError, PipelineError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 파일을 열거나 감시할 수 없음
    #[error("source unavailable: {path}: {reason}")]
    SourceUnavailable {
        /// 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// grok 패턴 문법 오류 (존재하지 않는 패턴, 잘못된 정규식, 순환 참조 등)
    #[error("grammar error in '{pattern}': {reason}")]
    Grammar {
        /// 문제가 된 패턴 또는 패턴 정의
        pattern: String,
        /// 실패 사유
        reason: String,
    },

    /// 라인이 패턴에 매칭되지 않음
    #[error("line does not match pattern '{pattern}'")]
    NoMatch {
        /// 매칭에 사용한 패턴
        pattern: String,
    },

    /// 실행 중이 아닌 파이프라인에 병합 요청
    #[error("pipeline unavailable: {path} is {state}")]
    PipelineUnavailable {
        /// 파일 경로
        path: String,
        /// 요청 시점의 상태
        state: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for ExporterError {
    fn from(err: LogPipelineError) -> Self {
        ExporterError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}
