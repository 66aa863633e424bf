//! # Fallback Bus
//!
//! Request/response over the page-global [`PageChannel`], for contexts that
//! cannot reach the background worker through native messaging.
//!
//! The channel has no reply handles, so correlation is manual: every request
//! is registered in a [`PendingCallTable`] under its id, and the listener task
//! settles the matching entry when a `BRIDGE_RESPONSE` with that id shows up.
//! Everything else on the channel (our own requests, other responders'
//! traffic, unrelated page messages) is ignored.

use crate::channel::{ChannelSubscription, PageChannel};
use crate::pending::{PendingCallTable, PendingSnapshot};
use bridge_types::{BridgeError, BusMessage, CorrelationId, RequestEnvelope};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::AbortHandle;
use tracing::{debug, info, instrument, trace};

/// One instance per page realm. Dropping it tears it down.
pub struct PostMessageBus {
    channel: PageChannel,
    pending: Arc<PendingCallTable>,
    listener: AbortHandle,
    closed: AtomicBool,
}

impl PostMessageBus {
    /// Start listening on `channel`.
    ///
    /// The subscription is taken before this returns, so a response posted
    /// right after the first `send_request` cannot be missed.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn attach(channel: PageChannel) -> Self {
        let subscription = channel.subscribe();
        let pending = Arc::new(PendingCallTable::new());
        let task = tokio::spawn(listen(subscription, Arc::clone(&pending)));

        info!(listeners = channel.subscriber_count(), "Fallback bus attached");
        Self {
            channel,
            pending,
            listener: task.abort_handle(),
            closed: AtomicBool::new(false),
        }
    }

    /// Broadcast `envelope` and wait for the response carrying its id.
    ///
    /// If the id is already outstanding on this bus a fresh one is drawn.
    /// There is no timeout: a request nobody answers stays pending until the
    /// caller drops the future or the bus is torn down.
    pub async fn send_request(&self, mut envelope: RequestEnvelope) -> Result<Value, BridgeError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::transport_closed("fallback bus has been torn down"));
        }

        let rx = self.pending.register(&mut envelope);
        let _guard = PendingGuard {
            table: &self.pending,
            id: envelope.id,
        };
        // A teardown that ran between the check above and `register` has
        // already cleared the table and stopped the listener.
        if self.closed.load(Ordering::SeqCst) {
            return Err(BridgeError::transport_closed("fallback bus has been torn down"));
        }

        trace!(
            correlation_id = %envelope.id,
            request_type = %envelope.request_type,
            "Posting bus request"
        );
        self.channel.post(BusMessage::Request(envelope).to_value());

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::transport_closed(
                "fallback bus torn down before a response arrived",
            )),
        }
    }

    /// Stop listening and reject every outstanding call with
    /// `TRANSPORT_CLOSED`. Later sends reject immediately.
    pub fn teardown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.listener.abort();
        let dropped = self.pending.clear();
        info!(dropped, "Fallback bus torn down");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    #[must_use]
    pub fn stats(&self) -> PendingSnapshot {
        self.pending.snapshot()
    }

    /// The channel this bus posts on.
    #[must_use]
    pub fn channel(&self) -> &PageChannel {
        &self.channel
    }
}

impl Drop for PostMessageBus {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Removes the caller's entry if its future is dropped before settling.
struct PendingGuard<'a> {
    table: &'a PendingCallTable,
    id: CorrelationId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        // No-op when the entry was already completed.
        if self.table.cancel(self.id) {
            debug!(correlation_id = %self.id, "Caller dropped pending bus request");
        }
    }
}

#[instrument(skip_all, name = "bus_listener")]
async fn listen(mut subscription: ChannelSubscription, pending: Arc<PendingCallTable>) {
    while let Some(raw) = subscription.recv().await {
        match BusMessage::from_value(&raw) {
            Some(BusMessage::Response(response)) => {
                let (id, envelope) = response.into_parts();
                pending.complete(id, envelope);
            }
            Some(BusMessage::Request(request)) => {
                trace!(correlation_id = %request.id, "Ignoring bus request");
            }
            None => trace!("Ignoring foreign page message"),
        }
    }
    debug!("Page channel closed, bus listener stopping");
}
