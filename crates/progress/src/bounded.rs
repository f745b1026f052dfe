//! Bounded attempt with fallback.
//!
//! Run the primary computation under a deadline. If it errors or the deadline
//! passes, compute the fallback instead. On timeout the primary future is
//! dropped, which cancels it; the fallback never waits on it.

use std::future::Future;
use std::time::Duration;
use serde::Serialize;

use crate::remote::RecomputeError;

/// Which path produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Primary (remote) path
    Remote,
    /// Local fallback
    Local,
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Remote => f.write_str("remote"),
            Source::Local => f.write_str("local"),
        }
    }
}

/// Result of a bounded attempt.
#[derive(Debug)]
pub struct Attempt<T> {
    /// The adopted value
    pub value: T,
    /// Where it came from
    pub source: Source,
    /// Why the primary path was abandoned, if it was tried and failed
    pub primary_error: Option<RecomputeError>,
}

impl<T> Attempt<T> {
    /// A value produced locally without trying a primary path.
    pub fn local(value: T) -> Self {
        Self {
            value,
            source: Source::Local,
            primary_error: None,
        }
    }
}

/// Run `primary` with `deadline`; on error or timeout use `fallback`.
pub async fn attempt_with_fallback<T, P, F>(deadline: Duration, primary: P, fallback: F) -> Attempt<T>
where
    P: Future<Output = Result<T, RecomputeError>>,
    F: FnOnce() -> T,
{
    let error = match tokio::time::timeout(deadline, primary).await {
        Ok(Ok(value)) => {
            return Attempt {
                value,
                source: Source::Remote,
                primary_error: None,
            }
        }
        Ok(Err(e)) => e,
        Err(_) => RecomputeError::Timeout(deadline),
    };

    Attempt {
        value: fallback(),
        source: Source::Local,
        primary_error: Some(error),
    }
}
