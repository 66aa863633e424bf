//! # Dispatcher
//!
//! The privileged-context listener. For every request envelope:
//!
//! 1. reject unknown protocol versions (`UNSUPPORTED_VERSION`)
//! 2. resolve the handler (`UNKNOWN_REQUEST_TYPE`)
//! 3. run it, catching errors and panics (`HANDLER_FAILURE`)
//! 4. answer exactly once over the transport that carried the request
//!
//! No failure escapes as a fault; every outcome becomes a
//! [`ResponseEnvelope`].

use crate::native::{IncomingMessage, NativeInbox};
use crate::registry::HandlerRegistry;
use async_trait::async_trait;
use bridge_bus::RequestSink;
use bridge_types::{BridgeError, RequestEnvelope, ResponseEnvelope};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Dispatch a raw inbound message.
    ///
    /// A foreign protocol version is answered with `UNSUPPORTED_VERSION` even
    /// when the rest of the message would not decode; anything else that is
    /// not a request envelope gets `MALFORMED_ENVELOPE`.
    pub async fn dispatch_value(&self, raw: Value) -> ResponseEnvelope {
        match RequestEnvelope::from_value(raw) {
            Ok(envelope) => self.dispatch(envelope).await,
            Err(err) => {
                debug!(error = %err, "Rejecting undecodable native message");
                ResponseEnvelope::from_error(&err)
            }
        }
    }

    #[instrument(
        skip(self, envelope),
        fields(correlation_id = %envelope.id, request_type = %envelope.request_type)
    )]
    pub async fn dispatch(&self, envelope: RequestEnvelope) -> ResponseEnvelope {
        if !envelope.is_current_version() {
            let err = BridgeError::unsupported_version(
                envelope.version,
                RequestEnvelope::CURRENT_VERSION,
            );
            warn!(version = envelope.version, "Unsupported protocol version");
            return ResponseEnvelope::from_error(&err);
        }

        let handler = match self.registry.resolve(&envelope.request_type) {
            Ok(handler) => Arc::clone(handler),
            Err(err) => {
                warn!("No handler registered");
                return ResponseEnvelope::from_error(&err);
            }
        };

        match AssertUnwindSafe(handler.call(envelope.request))
            .catch_unwind()
            .await
        {
            Ok(Ok(response)) => {
                debug!("Handler succeeded");
                ResponseEnvelope::success(response)
            }
            Ok(Err(err)) => {
                warn!(error = %err, "Handler failed");
                ResponseEnvelope::from_error(&err)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic = %message, "Handler panicked");
                ResponseEnvelope::from_error(&BridgeError::handler_failure(format!(
                    "handler panicked: {message}"
                )))
            }
        }
    }

    /// Answer native messages until the inbox closes.
    ///
    /// Each message is served on its own task, so a slow handler never
    /// holds up the next request.
    #[instrument(skip_all, name = "native_dispatcher", fields(extension_id = %inbox.extension_id()))]
    pub async fn serve_native(self: Arc<Self>, mut inbox: NativeInbox) {
        info!("Dispatcher listening for native messages");
        while let Some(IncomingMessage { envelope, reply }) = inbox.recv().await {
            let dispatcher = Arc::clone(&self);
            tokio::spawn(async move {
                let response = dispatcher.dispatch_value(envelope).await;
                if !reply.send(response) {
                    debug!("Caller closed its port before the reply");
                }
            });
        }
        info!("Native inbox closed, dispatcher stopping");
    }

    /// Run [`serve_native`](Self::serve_native) on a background task.
    pub fn spawn_native(self: &Arc<Self>, inbox: NativeInbox) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).serve_native(inbox))
    }
}

#[async_trait]
impl RequestSink for Dispatcher {
    async fn deliver(&self, envelope: RequestEnvelope) -> ResponseEnvelope {
        self.dispatch(envelope).await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
