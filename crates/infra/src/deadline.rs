//! Caller-supplied deadlines for store and cache calls.
//!
//! Abandoning a call means dropping its future. Every multi-record write goes
//! through a single store commit, so a dropped call either landed completely
//! or not at all.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("deadline exceeded during {operation}")]
pub struct DeadlineExceeded {
    pub operation: &'static str,
}

/// Point in time after which the caller no longer wants an answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline: calls run until the backend answers.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn instant(&self) -> Option<Instant> {
        self.0
    }

    pub fn is_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    /// Run `fut`, giving up once the deadline passes.
    ///
    /// An already expired deadline never polls `fut`.
    pub async fn run<F>(self, operation: &'static str, fut: F) -> Result<F::Output, DeadlineExceeded>
    where
        F: Future,
    {
        match self.0 {
            None => Ok(fut.await),
            Some(at) if Instant::now() >= at => Err(DeadlineExceeded { operation }),
            Some(at) => tokio::time::timeout_at(at, fut)
                .await
                .map_err(|_| DeadlineExceeded { operation }),
        }
    }
}
