//! Bounded "check until terminal" loop.
//!
//! The check runs once immediately and then once per interval until the
//! observed value is terminal or the overall timeout elapses. Errors from the
//! check itself are never retried.

use std::future::Future;
use std::time::Duration;

use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

#[derive(Debug)]
pub enum PollError<T, E> {
    /// The check call itself failed.
    Check(E),
    /// A terminal failure was observed; carries the value that showed it.
    Failed(T),
    TimedOut(Duration),
}

enum Attempt<T, E> {
    Pending,
    Failed(T),
    Check(E),
}

/// Repeats `check` until `is_done` or `is_failure` accepts the observed
/// value, or `policy.timeout` runs out.
///
/// # Errors
///
/// * [`PollError::Check`] as soon as `check` fails.
/// * [`PollError::Failed`] with the value `is_failure` accepted.
/// * [`PollError::TimedOut`] when the timeout elapses first.
pub async fn poll_until<T, E, F, Fut, D, X>(
    policy: PollPolicy,
    check: F,
    is_done: D,
    is_failure: X,
) -> Result<T, PollError<T, E>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    D: Fn(&T) -> bool,
    X: Fn(&T) -> bool,
{
    let is_done = &is_done;
    let is_failure = &is_failure;
    let check = &check;

    let attempts = RetryIf::spawn(
        FixedInterval::new(policy.interval),
        || async move {
            let value = match check().await {
                Ok(value) => value,
                Err(e) => return Err(Attempt::Check(e)),
            };
            if is_done(&value) {
                return Ok(value);
            }
            if is_failure(&value) {
                return Err(Attempt::Failed(value));
            }
            debug!("Poll check not terminal yet");
            Err(Attempt::Pending)
        },
        |attempt: &Attempt<T, E>| matches!(attempt, Attempt::Pending),
    );

    match tokio::time::timeout(policy.timeout, attempts).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(Attempt::Failed(value))) => Err(PollError::Failed(value)),
        Ok(Err(Attempt::Check(e))) => Err(PollError::Check(e)),
        // FixedInterval never runs out, so a pending result only surfaces
        // through the timeout arm.
        Ok(Err(Attempt::Pending)) | Err(_) => Err(PollError::TimedOut(policy.timeout)),
    }
}
