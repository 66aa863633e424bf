//! # Client API
//!
//! The single entry point every context uses to issue requests:
//!
//! ```rust,ignore
//! let client = BridgeClient::for_context(ctx, &config, hub.messenger(), &page);
//! let price = client
//!     .send(FetchPrice, FetchPriceRequest { name: "AK-47 | Redline".into() })
//!     .await?;
//! ```
//!
//! Native messaging is used wherever the context can reach the background
//! worker directly; a Firefox page realm falls back to the postMessage bus,
//! which a content-script relay forwards.

use crate::config::BridgeConfig;
use crate::context::ExecutionContext;
use crate::native::NativeMessenger;
use bridge_bus::{PageChannel, PendingSnapshot, PostMessageBus};
use bridge_types::{BridgeError, RequestDescriptor, RequestEnvelope, ResponseEnvelope};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Which transport a client settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Native,
    FallbackBus,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::FallbackBus => f.write_str("fallback-bus"),
        }
    }
}

enum Transport {
    Native {
        messenger: NativeMessenger,
        extension_id: String,
    },
    Bus(Arc<PostMessageBus>),
}

/// Issues typed requests from one context.
pub struct BridgeClient {
    context: ExecutionContext,
    transport: Transport,
}

impl BridgeClient {
    /// Pick the transport `context` supports.
    ///
    /// For contexts that fall back to the bus, a [`PostMessageBus`] is
    /// attached to `page`; this needs a Tokio runtime.
    pub fn for_context(
        context: ExecutionContext,
        config: &BridgeConfig,
        messenger: NativeMessenger,
        page: &PageChannel,
    ) -> Self {
        if context.can_use_native_messaging() {
            Self::native(context, messenger, config.extension_id.clone())
        } else {
            Self::fallback(context, Arc::new(PostMessageBus::attach(page.clone())))
        }
    }

    pub fn native(
        context: ExecutionContext,
        messenger: NativeMessenger,
        extension_id: impl Into<String>,
    ) -> Self {
        let extension_id = extension_id.into();
        debug!(%context, %extension_id, "Bridge client using native messaging");
        Self {
            context,
            transport: Transport::Native {
                messenger,
                extension_id,
            },
        }
    }

    pub fn fallback(context: ExecutionContext, bus: Arc<PostMessageBus>) -> Self {
        debug!(%context, "Bridge client using fallback bus");
        Self {
            context,
            transport: Transport::Bus(bus),
        }
    }

    /// Address native sends to another extension id, e.g. the id a page
    /// learned from the injected script. No effect on the fallback bus.
    #[must_use]
    pub fn with_extension_id(mut self, id: impl Into<String>) -> Self {
        if let Transport::Native { extension_id, .. } = &mut self.transport {
            *extension_id = id.into();
        }
        self
    }

    pub fn context(&self) -> ExecutionContext {
        self.context
    }

    pub fn transport_kind(&self) -> TransportKind {
        match self.transport {
            Transport::Native { .. } => TransportKind::Native,
            Transport::Bus(_) => TransportKind::FallbackBus,
        }
    }

    /// Native target, if this client uses native messaging.
    pub fn extension_id(&self) -> Option<&str> {
        match &self.transport {
            Transport::Native { extension_id, .. } => Some(extension_id.as_str()),
            Transport::Bus(_) => None,
        }
    }

    /// Pending-call counters of the fallback bus.
    pub fn bus_stats(&self) -> Option<PendingSnapshot> {
        match &self.transport {
            Transport::Bus(bus) => Some(bus.stats()),
            Transport::Native { .. } => None,
        }
    }

    /// Send a typed request and decode its typed response.
    pub async fn send<D: RequestDescriptor>(
        &self,
        _descriptor: D,
        request: D::Request,
    ) -> Result<D::Response, BridgeError> {
        let payload = serde_json::to_value(request).map_err(|e| {
            BridgeError::serialization(format!("could not encode {} request: {e}", D::REQUEST_TYPE))
        })?;

        let value = self
            .send_envelope(RequestEnvelope::new(D::REQUEST_TYPE.as_str(), payload))
            .await?;

        serde_json::from_value(value).map_err(|e| {
            BridgeError::serialization(format!(
                "could not decode {} response: {e}",
                D::REQUEST_TYPE
            ))
        })
    }

    /// Send an untyped request under any tag.
    pub async fn send_raw(&self, request_type: &str, payload: Value) -> Result<Value, BridgeError> {
        self.send_envelope(RequestEnvelope::new(request_type, payload))
            .await
    }

    /// [`send`](Self::send), rejecting with `DEADLINE_ELAPSED` if it has not
    /// settled within `deadline`. A late response is discarded.
    pub async fn send_with_deadline<D: RequestDescriptor>(
        &self,
        descriptor: D,
        request: D::Request,
        deadline: Duration,
    ) -> Result<D::Response, BridgeError> {
        tokio::time::timeout(deadline, self.send(descriptor, request))
            .await
            .map_err(|_| BridgeError::deadline_elapsed(deadline))?
    }

    /// Send a prepared envelope over this client's transport.
    #[instrument(
        skip(self, envelope),
        fields(
            correlation_id = %envelope.id,
            request_type = %envelope.request_type,
            transport = %self.transport_kind()
        )
    )]
    pub async fn send_envelope(&self, envelope: RequestEnvelope) -> Result<Value, BridgeError> {
        let result = match &self.transport {
            Transport::Native {
                messenger,
                extension_id,
            } => messenger
                .send_message(extension_id, &envelope)
                .await
                .and_then(ResponseEnvelope::into_result),
            Transport::Bus(bus) => bus.send_request(envelope).await,
        };

        match &result {
            Ok(_) => debug!("Request resolved"),
            Err(err) => debug!(error = %err, "Request rejected"),
        }
        result
    }
}
