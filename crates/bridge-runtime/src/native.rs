//! # Native Messaging
//!
//! The browser's built-in cross-context messaging, reframed for tokio:
//!
//! - a listener registers under an extension id and gets a [`NativeInbox`];
//! - a sender hands an envelope plus the target id to [`NativeMessenger`];
//! - each delivered [`IncomingMessage`] carries a [`Responder`], a one-shot
//!   reply handle that is consumed when used, so a message can be answered
//!   at most once. Dropping it unanswered closes the caller's port.
//!
//! Envelopes cross as `serde_json::Value`, never by reference.

use async_trait::async_trait;
use bridge_bus::RequestSink;
use bridge_types::{BridgeError, RequestEnvelope, ResponseEnvelope};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

/// A message as delivered to the listening context.
#[derive(Debug)]
pub struct IncomingMessage {
    /// The raw envelope; not yet validated.
    pub envelope: Value,
    /// Reply handle for this message.
    pub reply: Responder,
}

/// One-shot reply handle. Answering consumes it.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<ResponseEnvelope>,
}

impl Responder {
    /// Returns false if the caller is no longer waiting.
    pub fn send(self, response: ResponseEnvelope) -> bool {
        self.tx.send(response).is_ok()
    }

    /// Whether the caller has given up.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving end of a listener registration.
pub struct NativeInbox {
    extension_id: String,
    rx: mpsc::Receiver<IncomingMessage>,
}

impl NativeInbox {
    /// `None` once every route to this inbox is gone.
    pub async fn recv(&mut self) -> Option<IncomingMessage> {
        self.rx.recv().await
    }

    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }
}

type Routes = Arc<DashMap<String, mpsc::Sender<IncomingMessage>>>;

/// The platform messaging hub shared by every context of one browser
/// profile.
#[derive(Clone, Default)]
pub struct NativeMessaging {
    routes: Routes,
}

impl NativeMessaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the listener for `extension_id`, replacing any previous one.
    pub fn listen(&self, extension_id: impl Into<String>, capacity: usize) -> NativeInbox {
        let extension_id = extension_id.into();
        let (tx, rx) = mpsc::channel(capacity.max(1));
        if self.routes.insert(extension_id.clone(), tx).is_some() {
            debug!(%extension_id, "Replaced existing native listener");
        }
        info!(%extension_id, capacity, "Native listener registered");
        NativeInbox { extension_id, rx }
    }

    /// Remove the listener for `extension_id`. Later sends fail as
    /// unreachable.
    pub fn unlisten(&self, extension_id: &str) -> bool {
        let removed = self.routes.remove(extension_id).is_some();
        if removed {
            info!(%extension_id, "Native listener removed");
        }
        removed
    }

    pub fn is_listening(&self, extension_id: &str) -> bool {
        self.routes.contains_key(extension_id)
    }

    /// A sending handle for any context.
    pub fn messenger(&self) -> NativeMessenger {
        NativeMessenger {
            routes: Arc::clone(&self.routes),
        }
    }
}

/// `runtime.sendMessage` for one context.
#[derive(Clone)]
pub struct NativeMessenger {
    routes: Routes,
}

impl NativeMessenger {
    /// Send `envelope` to the listener of `extension_id` and wait for its
    /// single reply.
    ///
    /// # Errors
    ///
    /// - `UNREACHABLE_EXTENSION` when nobody listens under `extension_id`
    /// - `TRANSPORT_CLOSED` when the listener drops the reply handle
    pub async fn send_message(
        &self,
        extension_id: &str,
        envelope: &RequestEnvelope,
    ) -> Result<ResponseEnvelope, BridgeError> {
        let value = serde_json::to_value(envelope)
            .map_err(|e| BridgeError::serialization(e.to_string()))?;
        trace!(
            %extension_id,
            correlation_id = %envelope.id,
            request_type = %envelope.request_type,
            "Sending native message"
        );
        self.send_value(extension_id, value).await
    }

    /// Send an arbitrary JSON message, as `runtime.sendMessage` allows.
    /// Same errors as [`send_message`](Self::send_message).
    pub async fn send_value(
        &self,
        extension_id: &str,
        message: Value,
    ) -> Result<ResponseEnvelope, BridgeError> {
        // Clone the sender out so no map guard is held across an await.
        let route = self
            .routes
            .get(extension_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BridgeError::unreachable_extension(extension_id))?;

        let (tx, rx) = oneshot::channel();
        let message = IncomingMessage {
            envelope: message,
            reply: Responder { tx },
        };

        if route.send(message).await.is_err() {
            // Listener went away without unregistering.
            self.routes
                .remove_if(extension_id, |_, sender| sender.is_closed());
            return Err(BridgeError::unreachable_extension(extension_id));
        }
        trace!(%extension_id, "Native message delivered");

        rx.await.map_err(|_| {
            BridgeError::transport_closed(
                "the message port closed before a response was received",
            )
        })
    }
}

/// Relays requests to the background worker over native messaging.
///
/// Used by the content script to answer page-realm bus requests.
#[derive(Clone)]
pub struct NativeForwarder {
    messenger: NativeMessenger,
    extension_id: String,
}

impl NativeForwarder {
    pub fn new(messenger: NativeMessenger, extension_id: impl Into<String>) -> Self {
        Self {
            messenger,
            extension_id: extension_id.into(),
        }
    }
}

#[async_trait]
impl RequestSink for NativeForwarder {
    async fn deliver(&self, envelope: RequestEnvelope) -> ResponseEnvelope {
        match self.messenger.send_message(&self.extension_id, &envelope).await {
            Ok(response) => response,
            Err(err) => {
                debug!(
                    correlation_id = %envelope.id,
                    error = %err,
                    "Relay to background failed"
                );
                ResponseEnvelope::from_error(&err)
            }
        }
    }
}
