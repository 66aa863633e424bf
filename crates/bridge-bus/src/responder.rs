//! # Bus Responder
//!
//! The answering side of the fallback bus. Listens for `BRIDGE_REQUEST`
//! messages on a [`PageChannel`], hands each one to a [`RequestSink`] and
//! posts the result back as a `BRIDGE_RESPONSE` carrying the request id.
//!
//! Requests are served concurrently; response order follows completion. A
//! `BRIDGE_REQUEST` that carries a numeric id but does not decode is still
//! answered, with the decode error, so its caller never waits forever.

use crate::channel::{ChannelSubscription, PageChannel};
use async_trait::async_trait;
use bridge_types::{BusMessage, BusResponse, RequestEnvelope, ResponseEnvelope};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace};

/// Something that turns a request into a response.
///
/// Implemented by the dispatcher (answer locally) and by the native
/// forwarder (relay to the background worker).
#[async_trait]
pub trait RequestSink: Send + Sync {
    async fn deliver(&self, envelope: RequestEnvelope) -> ResponseEnvelope;
}

pub struct BusResponder {
    channel: PageChannel,
    subscription: ChannelSubscription,
    sink: Arc<dyn RequestSink>,
}

impl BusResponder {
    /// Subscribes immediately; requests posted after this call are served
    /// once [`run`](Self::run) is driven.
    pub fn new(channel: &PageChannel, sink: Arc<dyn RequestSink>) -> Self {
        Self {
            channel: channel.clone(),
            subscription: channel.subscribe(),
            sink,
        }
    }

    /// Serve until the channel closes.
    #[instrument(skip_all, name = "bus_responder")]
    pub async fn run(mut self) {
        debug!("Bus responder started");
        while let Some(raw) = self.subscription.recv().await {
            let Some(id) = BusMessage::request_id(&raw) else {
                trace!("Ignoring page message that is not a bridge request");
                continue;
            };

            let request = match RequestEnvelope::from_value(raw) {
                Ok(request) => request,
                Err(err) => {
                    debug!(correlation_id = %id, error = %err, "Rejecting undecodable bus request");
                    let response = BusResponse::new(id, ResponseEnvelope::from_error(&err));
                    self.channel.post(BusMessage::Response(response).to_value());
                    continue;
                }
            };

            let sink = Arc::clone(&self.sink);
            let channel = self.channel.clone();
            tokio::spawn(async move {
                let id = request.id;
                let response = sink.deliver(request).await;
                trace!(correlation_id = %id, error = response.is_error(), "Posting bus response");
                channel.post(BusMessage::Response(BusResponse::new(id, response)).to_value());
            });
        }
        debug!("Page channel closed, bus responder stopping");
    }

    /// Run on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
