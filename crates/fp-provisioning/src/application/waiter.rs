//! Response Waiter - bounded wait on a call's resolution.
//!
//! The waiter parks on the call's `watch` channel instead of polling. The
//! wait is split into `max_attempts` slices of `poll_interval` so progress
//! can be reported after each slice; once all slices elapse the call is
//! expired in the store, where a reply that raced in first still wins.

use crate::application::store::CorrelationStore;
use crate::domain::{CallHandle, CallState};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout, Instant};
use tracing::info;

/// Default time between progress reports.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of poll intervals before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Bound on a single wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Length of one attempt.
    pub poll_interval: Duration,
    /// Number of attempts.
    pub max_attempts: u32,
}

impl WaitPolicy {
    /// Policy with the given interval and attempt count.
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            poll_interval,
            max_attempts,
        }
    }

    /// Upper bound on the whole wait.
    pub fn total(&self) -> Duration {
        self.poll_interval.saturating_mul(self.max_attempts)
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    /// Reply on the accepted topic.
    Success(Value),
    /// Reply on the rejected topic.
    Failure(Value),
    /// No reply within the bound.
    Timeout {
        /// Attempts waited
        attempts: u32,
        /// Time waited
        waited: Duration,
    },
}

/// The wait could not be carried out.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// Handle does not refer to an in-flight call.
    #[error("no call in flight for {0}")]
    UnknownCall(CallHandle),

    /// The call was discarded or replaced while waiting.
    #[error("call {0} was abandoned while waiting")]
    Abandoned(CallHandle),
}

/// Wait for `handle` to resolve, bounded by `policy`.
pub async fn await_response(
    store: &CorrelationStore,
    handle: &CallHandle,
    policy: WaitPolicy,
) -> Result<WaitOutcome, WaitError> {
    let mut rx = store
        .watch(handle)
        .ok_or(WaitError::UnknownCall(*handle))?;
    let started = Instant::now();

    for attempt in 1..=policy.max_attempts {
        let resolved = timeout(policy.poll_interval, async {
            rx.wait_for(CallState::is_resolved)
                .await
                .map(|state| (*state).clone())
        })
        .await;

        match resolved {
            Ok(Ok(state)) => return Ok(into_outcome(state, attempt, started.elapsed())),
            Ok(Err(_)) => return Err(WaitError::Abandoned(*handle)),
            Err(_) => {
                info!(
                    operation = %handle.operation,
                    call_id = %handle.call_id,
                    attempt,
                    max_attempts = policy.max_attempts,
                    "Waiting for response"
                );
            }
        }
    }

    let state = store
        .expire(handle)
        .ok_or(WaitError::Abandoned(*handle))?;
    Ok(into_outcome(state, policy.max_attempts, started.elapsed()))
}

fn into_outcome(state: CallState, attempts: u32, waited: Duration) -> WaitOutcome {
    match state {
        CallState::Succeeded(payload) => WaitOutcome::Success(payload),
        CallState::Failed(payload) => WaitOutcome::Failure(payload),
        CallState::TimedOut | CallState::Pending => WaitOutcome::Timeout { attempts, waited },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Operation;
    use serde_json::json;
    use std::sync::Arc;

    fn fast() -> WaitPolicy {
        WaitPolicy::new(Duration::from_millis(10), 3)
    }

    #[test]
    fn test_default_policy_matches_device_sample() {
        let policy = WaitPolicy::default();
        assert_eq!(policy.poll_interval, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.total(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_already_resolved_returns_immediately() {
        let store = CorrelationStore::new();
        let handle = store.begin_call(Operation::IssueCredentials);
        store.resolve_success(Operation::IssueCredentials, json!({"certificateId": "a"}));

        let outcome = await_response(&store, &handle, fast()).await.unwrap();
        assert_eq!(outcome, WaitOutcome::Success(json!({"certificateId": "a"})));
    }

    #[tokio::test]
    async fn test_failure_is_distinct_from_timeout() {
        let store = Arc::new(CorrelationStore::new());
        let handle = store.begin_call(Operation::IssueCredentials);

        let writer = Arc::clone(&store);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            writer.resolve_failure(
                Operation::IssueCredentials,
                json!({"errorCode": "InvalidCertificateId"}),
            );
        });

        let outcome = await_response(&store, &handle, WaitPolicy::new(Duration::from_secs(1), 3))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            WaitOutcome::Failure(json!({"errorCode": "InvalidCertificateId"}))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_times_out_after_all_attempts() {
        let store = CorrelationStore::new();
        let handle = store.begin_call(Operation::RegisterDevice);

        let outcome = await_response(&store, &handle, WaitPolicy::default())
            .await
            .unwrap();

        match outcome {
            WaitOutcome::Timeout { attempts, waited } => {
                assert_eq!(attempts, 10);
                assert!(waited >= Duration::from_secs(10));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(store.peek(&handle), Some(CallState::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_in_later_attempt() {
        let store = Arc::new(CorrelationStore::new());
        let handle = store.begin_call(Operation::RegisterDevice);

        let writer = Arc::clone(&store);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            writer.resolve_success(Operation::RegisterDevice, json!({"thingName": "thing-42"}));
        });

        let outcome = await_response(&store, &handle, WaitPolicy::default())
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Success(json!({"thingName": "thing-42"})));
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let store = CorrelationStore::new();
        let handle = store.begin_call(Operation::IssueCredentials);
        store.discard(&handle);

        let err = await_response(&store, &handle, fast()).await.unwrap_err();
        assert_eq!(err, WaitError::UnknownCall(handle));
    }

    #[tokio::test]
    async fn test_replaced_call_is_abandoned() {
        let store = Arc::new(CorrelationStore::new());
        let handle = store.begin_call(Operation::IssueCredentials);

        let replacer = Arc::clone(&store);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            replacer.begin_call(Operation::IssueCredentials);
        });

        let err = await_response(&store, &handle, WaitPolicy::new(Duration::from_secs(1), 2))
            .await
            .unwrap_err();
        assert_eq!(err, WaitError::Abandoned(handle));
    }
}
