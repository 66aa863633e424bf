//! Pending-call table - maps correlation ids to the callers waiting on them.
//!
//! Flow:
//! 1. The bus calls `register()` with the outgoing envelope and gets a
//!    oneshot receiver back
//! 2. The envelope is broadcast
//! 3. The bus listener sees a response and calls `complete()`
//! 4. The caller's receiver settles; the entry is gone
//!
//! Responses whose id has no entry are counted as unroutable and dropped.

use bridge_types::{BridgeError, CorrelationId, RequestEnvelope, ResponseEnvelope};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// Result delivered to a waiting caller.
pub type CallResult = Result<Value, BridgeError>;

/// A call waiting for its response.
struct PendingCall {
    /// Channel to settle the caller's future.
    sender: oneshot::Sender<CallResult>,
    /// When the call was registered.
    created_at: Instant,
    /// Request type (for logging).
    request_type: String,
}

/// Counters for the pending-call table.
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Calls registered.
    pub total_registered: AtomicU64,
    /// Calls settled by a matching response.
    pub total_completed: AtomicU64,
    /// Responses that matched no pending call.
    pub total_unroutable: AtomicU64,
    /// Calls dropped without a response (caller gave up or teardown).
    pub total_abandoned: AtomicU64,
}

/// Point-in-time copy of [`PendingStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub unroutable: u64,
    pub abandoned: u64,
    pub outstanding: usize,
}

/// Outstanding calls of one bus instance.
#[derive(Default)]
pub struct PendingCallTable {
    pending: DashMap<CorrelationId, PendingCall>,
    stats: PendingStats,
}

impl PendingCallTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call and get the receiver its response will arrive on.
    ///
    /// If the envelope's id is already outstanding, a fresh id is drawn and
    /// written back into the envelope before it is broadcast, so ids stay
    /// unique among concurrently outstanding calls.
    pub fn register(&self, envelope: &mut RequestEnvelope) -> oneshot::Receiver<CallResult> {
        let (tx, rx) = oneshot::channel();
        let mut call = Some(PendingCall {
            sender: tx,
            created_at: Instant::now(),
            request_type: envelope.request_type.clone(),
        });

        while let Some(next) = call.take() {
            match self.pending.entry(envelope.id) {
                Entry::Occupied(_) => {
                    let fresh = CorrelationId::random();
                    debug!(
                        collided = %envelope.id,
                        fresh = %fresh,
                        "Correlation id already outstanding, redrawing"
                    );
                    envelope.id = fresh;
                    call = Some(next);
                }
                Entry::Vacant(slot) => {
                    slot.insert(next);
                }
            }
        }

        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = %envelope.id,
            request_type = %envelope.request_type,
            "Registered pending call"
        );
        rx
    }

    /// Settle the call matching `id` with `response`.
    ///
    /// Returns false when no call is pending under `id`; such responses
    /// belong to some other consumer of the channel and are ignored.
    pub fn complete(&self, id: CorrelationId, response: ResponseEnvelope) -> bool {
        let Some((_, call)) = self.pending.remove(&id) else {
            self.stats.total_unroutable.fetch_add(1, Ordering::Relaxed);
            trace!(correlation_id = %id, "Unroutable bus response ignored");
            return false;
        };

        let elapsed = call.created_at.elapsed();
        if call.sender.send(response.into_result()).is_err() {
            self.stats.total_abandoned.fetch_add(1, Ordering::Relaxed);
            debug!(
                correlation_id = %id,
                request_type = %call.request_type,
                "Caller went away before its response arrived"
            );
            return false;
        }

        self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
        debug!(
            correlation_id = %id,
            request_type = %call.request_type,
            elapsed_ms = elapsed.as_millis(),
            "Completed pending call"
        );
        true
    }

    /// Drop the call under `id` without settling it.
    pub fn cancel(&self, id: CorrelationId) -> bool {
        if self.pending.remove(&id).is_some() {
            self.stats.total_abandoned.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Drop every outstanding call. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let ids: Vec<CorrelationId> = self.pending.iter().map(|entry| *entry.key()).collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    pub fn is_pending(&self, id: CorrelationId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn snapshot(&self) -> PendingSnapshot {
        PendingSnapshot {
            registered: self.stats.total_registered.load(Ordering::Relaxed),
            completed: self.stats.total_completed.load(Ordering::Relaxed),
            unroutable: self.stats.total_unroutable.load(Ordering::Relaxed),
            abandoned: self.stats.total_abandoned.load(Ordering::Relaxed),
            outstanding: self.pending.len(),
        }
    }
}
