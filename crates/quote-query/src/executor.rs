//! 타임아웃이 있는 팬아웃 실행기.
//!
//! 서로 독립적인 작업을 동시에 실행하고, 각 작업의 타임아웃과 panic을
//! 해당 작업의 실패로 바꿉니다. 한 작업의 실패는 다른 작업에 영향을 주지 않습니다.
//!
//! 타임아웃이 나면 작업 future는 drop되어 취소됩니다. 작업이 spawn한
//! 백그라운드 쓰기는 계속 진행될 수 있으므로 멱등이어야 합니다.

use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

/// 작업 실패 사유.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// 예산 시간 초과
    Timeout,
    /// 작업 중 panic
    Panicked(String),
    /// 작업이 오류 반환
    Failed(String),
}

impl FailureReason {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FailureReason::Timeout)
    }

    /// 메트릭 라벨용 고정 문자열.
    pub fn label(&self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::Panicked(_) => "panicked",
            FailureReason::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Panicked(msg) => write!(f, "panicked: {}", msg),
            FailureReason::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

/// 작업 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Failure(FailureReason),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// 성공 값.
    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }
}

impl<T, E: fmt::Display> Outcome<Result<T, E>> {
    /// 작업이 반환한 `Err`를 실패로 펼칩니다.
    pub fn flatten(self) -> Outcome<T> {
        match self {
            Outcome::Success(Ok(value)) => Outcome::Success(value),
            Outcome::Success(Err(e)) => Outcome::Failure(FailureReason::Failed(e.to_string())),
            Outcome::Failure(reason) => Outcome::Failure(reason),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 단일 작업을 타임아웃과 panic 보호 아래 실행합니다.
pub async fn run_guarded<F, T>(op: F, timeout: Option<Duration>) -> Outcome<T>
where
    F: Future<Output = T>,
{
    let guarded = AssertUnwindSafe(op).catch_unwind();

    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(result) => result,
            Err(_) => return Outcome::Failure(FailureReason::Timeout),
        },
        None => guarded.await,
    };

    match result {
        Ok(value) => Outcome::Success(value),
        Err(payload) => Outcome::Failure(FailureReason::Panicked(panic_message(payload))),
    }
}

/// 모든 작업을 동시에 실행하고 입력 순서대로 결과를 반환합니다.
///
/// 각 작업은 `timeout`과 개별적으로 경쟁합니다.
pub async fn run_all<F, T>(ops: Vec<F>, timeout: Option<Duration>) -> Vec<Outcome<T>>
where
    F: Future<Output = T>,
{
    join_all(ops.into_iter().map(|op| run_guarded(op, timeout))).await
}
