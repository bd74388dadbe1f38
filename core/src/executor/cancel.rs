use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;

/// Why a run stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// `cancel()` was called on the signal (or a parent token)
    Cancelled,
    /// The signal's deadline passed
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled by caller"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Cooperative cancellation shared by every suspension point of a run.
///
/// Wraps a [`CancellationToken`] plus an optional deadline. Clones observe the same
/// token, so a CLI signal handler can hold one clone while the executor holds another.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-blocking poll; explicit cancellation wins over an expired deadline.
    pub fn reason(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn check(&self) -> Result<(), ExecutorError> {
        match self.reason() {
            Some(reason) => Err(ExecutorError::Cancelled(reason)),
            None => Ok(()),
        }
    }

    /// Resolves once the signal fires.
    pub async fn cancelled(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }

    /// Race `fut` against the signal. The future is dropped when the signal fires first.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ExecutorError>
    where
        F: Future,
    {
        self.check()?;
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(ExecutorError::Cancelled(reason)),
            out = fut => Ok(out),
        }
    }

    /// Cancellable timer used for retry backoff.
    pub async fn sleep(&self, delay: Duration) -> Result<(), ExecutorError> {
        self.run(tokio::time::sleep(delay)).await
    }
}
