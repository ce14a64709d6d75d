//! Correlation Store - bridges broker callbacks to the waiting caller.
//!
//! Replies carry no request id, so calls are keyed by operation: at most one
//! call per operation is in flight. Each call owns a `watch` channel; the
//! delivery callback writes it once and the waiter parks on it.
//!
//! Flow:
//! 1. Session calls `begin_call()` before publishing the request
//! 2. Delivery callbacks call `resolve_success()` / `resolve_failure()`
//! 3. The waiter observes the resolution through `watch()`, or gives up via `expire()`
//! 4. Session calls `discard()` once it has consumed the result

use crate::domain::{CallHandle, CallState, CorrelationId, LogicalCall, Operation, Resolution};
use dashmap::DashMap;
use fleet_telemetry::{
    metric_inc, CALLS_STARTED, CALL_DURATION, CALL_TIMEOUTS, DUPLICATE_RESPONSES,
    RESPONSES_RECEIVED, UNSOLICITED_RESPONSES,
};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, warn};

/// An in-flight call.
struct CallEntry {
    /// Instance id
    call_id: CorrelationId,
    /// Single-assignment resolution cell
    state: watch::Sender<CallState>,
    /// When the call began
    created_at: Instant,
}

/// Statistics for the correlation store
#[derive(Debug, Default)]
pub struct CorrelationStats {
    /// Calls begun
    pub begun: AtomicU64,
    /// Replies that resolved a call
    pub resolved: AtomicU64,
    /// Replies dropped because the call was already resolved
    pub duplicates: AtomicU64,
    /// Replies with no call in flight
    pub unsolicited: AtomicU64,
    /// Calls resolved as timed out
    pub timeouts: AtomicU64,
}

impl CorrelationStats {
    fn load(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Calls begun so far.
    pub fn begun(&self) -> u64 {
        Self::load(&self.begun)
    }

    /// Replies that resolved a call.
    pub fn resolved(&self) -> u64 {
        Self::load(&self.resolved)
    }

    /// Replies dropped as duplicates.
    pub fn duplicates(&self) -> u64 {
        Self::load(&self.duplicates)
    }

    /// Replies dropped as unsolicited.
    pub fn unsolicited(&self) -> u64 {
        Self::load(&self.unsolicited)
    }

    /// Calls that timed out.
    pub fn timeouts(&self) -> u64 {
        Self::load(&self.timeouts)
    }
}

/// Holds the outcome of each in-flight call.
///
/// All methods take `&self` and are safe to call from delivery tasks
/// concurrently with the waiter. The first resolution of a call wins; later
/// ones are logged, counted and dropped.
pub struct CorrelationStore {
    /// In-flight calls by operation
    calls: DashMap<Operation, CallEntry>,
    /// Statistics
    stats: Arc<CorrelationStats>,
}

impl CorrelationStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            calls: DashMap::new(),
            stats: Arc::new(CorrelationStats::default()),
        }
    }

    /// Begin a call for `operation`.
    ///
    /// A previous call of the same operation is replaced; its waiter sees
    /// the call as abandoned.
    pub fn begin_call(&self, operation: Operation) -> CallHandle {
        let call_id = CorrelationId::new();
        let (state, _) = watch::channel(CallState::Pending);

        let entry = CallEntry {
            call_id,
            state,
            created_at: Instant::now(),
        };

        if let Some(previous) = self.calls.insert(operation, entry) {
            warn!(
                operation = %operation,
                call_id = %previous.call_id,
                "Replacing call that was never discarded"
            );
        }
        self.stats.begun.fetch_add(1, Ordering::Relaxed);
        metric_inc!(CALLS_STARTED, &[operation.as_str()]);

        debug!(operation = %operation, call_id = %call_id, "Call begun");

        CallHandle { operation, call_id }
    }

    /// Record a reply from the accepted topic.
    pub fn resolve_success(&self, operation: Operation, payload: Value) -> Resolution {
        self.resolve(operation, CallState::Succeeded(payload))
    }

    /// Record a reply from the rejected topic.
    pub fn resolve_failure(&self, operation: Operation, payload: Value) -> Resolution {
        self.resolve(operation, CallState::Failed(payload))
    }

    fn resolve(&self, operation: Operation, resolution: CallState) -> Resolution {
        let outcome = match &resolution {
            CallState::Failed(_) => "rejected",
            _ => "accepted",
        };

        debug!(
            operation = %operation,
            outcome,
            payload = ?resolution,
            "Response received"
        );

        let Some(entry) = self.calls.get(&operation) else {
            self.stats.unsolicited.fetch_add(1, Ordering::Relaxed);
            metric_inc!(UNSOLICITED_RESPONSES, &[operation.as_str()]);
            warn!(operation = %operation, outcome, "Response with no call in flight, dropped");
            return Resolution::Unsolicited;
        };

        let applied = entry.state.send_if_modified(|state| {
            if state.is_resolved() {
                return false;
            }
            *state = resolution;
            true
        });

        if applied {
            self.stats.resolved.fetch_add(1, Ordering::Relaxed);
            metric_inc!(RESPONSES_RECEIVED, &[operation.as_str(), outcome]);
            CALL_DURATION
                .with_label_values(&[operation.as_str()])
                .observe(entry.created_at.elapsed().as_secs_f64());
            debug!(
                operation = %operation,
                call_id = %entry.call_id,
                outcome,
                elapsed_ms = entry.created_at.elapsed().as_millis(),
                "Call resolved"
            );
            Resolution::Applied
        } else {
            self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
            metric_inc!(DUPLICATE_RESPONSES, &[operation.as_str()]);
            warn!(
                operation = %operation,
                call_id = %entry.call_id,
                outcome,
                current = entry.state.borrow().label(),
                "Call already resolved, response dropped"
            );
            Resolution::Duplicate
        }
    }

    /// Current state of the call, or `None` if the handle no longer refers
    /// to an in-flight call.
    pub fn peek(&self, handle: &CallHandle) -> Option<CallState> {
        self.calls
            .get(&handle.operation)
            .filter(|entry| entry.call_id == handle.call_id)
            .map(|entry| entry.state.borrow().clone())
    }

    /// Receiver that observes the call's resolution.
    pub fn watch(&self, handle: &CallHandle) -> Option<watch::Receiver<CallState>> {
        self.calls
            .get(&handle.operation)
            .filter(|entry| entry.call_id == handle.call_id)
            .map(|entry| entry.state.subscribe())
    }

    /// Resolve the call as timed out, unless a reply got there first.
    ///
    /// Returns the state the call ends up in.
    pub fn expire(&self, handle: &CallHandle) -> Option<CallState> {
        let entry = self
            .calls
            .get(&handle.operation)
            .filter(|entry| entry.call_id == handle.call_id)?;

        let expired = entry.state.send_if_modified(|state| {
            if state.is_resolved() {
                return false;
            }
            *state = CallState::TimedOut;
            true
        });

        if expired {
            self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
            metric_inc!(CALL_TIMEOUTS, &[handle.operation.as_str()]);
            warn!(
                operation = %handle.operation,
                call_id = %handle.call_id,
                waited_ms = entry.created_at.elapsed().as_millis(),
                "Call timed out"
            );
        }

        let state = entry.state.borrow().clone();
        Some(state)
    }

    /// Remove the call once its result has been consumed, returning its
    /// final state.
    ///
    /// Replies arriving afterwards are unsolicited and have no effect.
    pub fn discard(&self, handle: &CallHandle) -> Option<LogicalCall> {
        let (operation, entry) = self
            .calls
            .remove_if(&handle.operation, |_, entry| entry.call_id == handle.call_id)?;
        let state = entry.state.borrow().clone();
        debug!(
            operation = %operation,
            call_id = %entry.call_id,
            state = state.label(),
            "Call discarded"
        );
        Some(LogicalCall {
            operation,
            call_id: entry.call_id,
            state,
        })
    }

    /// Drop a reply that arrived on a topic the current session no longer
    /// listens to.
    pub fn reject_stray(&self, operation: Operation, topic: &str) -> Resolution {
        self.stats.unsolicited.fetch_add(1, Ordering::Relaxed);
        metric_inc!(UNSOLICITED_RESPONSES, &[operation.as_str()]);
        warn!(operation = %operation, topic = %topic, "Response on a stale topic, dropped");
        Resolution::Unsolicited
    }

    /// Number of calls still pending.
    pub fn in_flight(&self) -> usize {
        self.calls
            .iter()
            .filter(|entry| !entry.state.borrow().is_resolved())
            .count()
    }

    /// Get statistics
    pub fn stats(&self) -> Arc<CorrelationStats> {
        Arc::clone(&self.stats)
    }
}

impl Default for CorrelationStore {
    fn default() -> Self {
        Self::new()
    }
}
