//! # Handler Registry
//!
//! The canonical `request_type -> handler` table of the privileged context.
//!
//! Handlers are registered against a typed [`RequestDescriptor`] so the
//! payload shapes are checked at compile time; the registry stores them
//! type-erased (`Value -> Value`) because the dispatcher only sees JSON.
//!
//! ```rust,ignore
//! let mut builder = HandlerRegistry::builder();
//! builder.register(FetchPrice, PriceHandler::new(fetcher))?;
//! builder.register(ExtensionVersion, ExtensionVersionHandler::new())?;
//! let registry = Arc::new(builder.build());
//! ```

use async_trait::async_trait;
use bridge_types::{BridgeError, RequestDescriptor, RequestType};
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info};

/// Business logic for one request type.
///
/// Any error is reported to the caller as a `HANDLER_FAILURE` carrying the
/// error's full context chain.
#[async_trait]
pub trait RequestHandler<D: RequestDescriptor>: Send + Sync + 'static {
    async fn handle(&self, request: D::Request) -> anyhow::Result<D::Response>;
}

/// A handler with its payload types erased.
#[async_trait]
pub trait ErasedHandler: Send + Sync {
    /// Decode the payload, run the handler, encode its result.
    async fn call(&self, payload: Value) -> Result<Value, BridgeError>;
}

/// Shared handle to an erased handler.
pub type DynHandler = Arc<dyn ErasedHandler>;

struct Typed<D, H> {
    handler: H,
    _descriptor: PhantomData<fn() -> D>,
}

#[async_trait]
impl<D, H> ErasedHandler for Typed<D, H>
where
    D: RequestDescriptor,
    H: RequestHandler<D>,
{
    async fn call(&self, payload: Value) -> Result<Value, BridgeError> {
        let request: D::Request = serde_json::from_value(payload).map_err(|e| {
            BridgeError::handler_failure(format!("invalid {} payload: {e}", D::REQUEST_TYPE))
        })?;

        let response = self
            .handler
            .handle(request)
            .await
            .map_err(|e| BridgeError::handler_failure(format!("{e:#}")))?;

        serde_json::to_value(response).map_err(|e| {
            BridgeError::handler_failure(format!("could not encode {} response: {e}", D::REQUEST_TYPE))
        })
    }
}

/// Registry construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A second handler for a request type that already has one
    #[error("duplicate handler for request type {0}")]
    DuplicateRequestType(RequestType),
}

/// Collects handlers at startup. Consumed by [`build`](Self::build).
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<RequestType, DynHandler>,
}

impl HandlerRegistryBuilder {
    /// Register `handler` for the descriptor's request type.
    ///
    /// Fails if the type already has a handler; the first one is kept.
    pub fn register<D, H>(&mut self, _descriptor: D, handler: H) -> Result<&mut Self, RegistryError>
    where
        D: RequestDescriptor,
        H: RequestHandler<D>,
    {
        let request_type = D::REQUEST_TYPE;
        if self.handlers.contains_key(&request_type) {
            return Err(RegistryError::DuplicateRequestType(request_type));
        }

        self.handlers.insert(
            request_type,
            Arc::new(Typed {
                handler,
                _descriptor: PhantomData::<fn() -> D>,
            }),
        );
        debug!(%request_type, "Handler registered");
        Ok(self)
    }

    /// Freeze the table.
    pub fn build(self) -> HandlerRegistry {
        let registry = HandlerRegistry {
            handlers: self.handlers,
        };
        info!(
            handlers = registry.len(),
            types = ?registry.registered_types(),
            "Handler registry built"
        );
        registry
    }
}

/// Immutable `request_type -> handler` table.
pub struct HandlerRegistry {
    handlers: HashMap<RequestType, DynHandler>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Look up the handler for a wire tag.
    ///
    /// Tags outside the known catalog and known tags without a handler both
    /// resolve to `UNKNOWN_REQUEST_TYPE`.
    pub fn resolve(&self, request_type: &str) -> Result<&DynHandler, BridgeError> {
        request_type
            .parse::<RequestType>()
            .ok()
            .and_then(|ty| self.handlers.get(&ty))
            .ok_or_else(|| BridgeError::unknown_request_type(request_type))
    }

    pub fn contains(&self, request_type: RequestType) -> bool {
        self.handlers.contains_key(&request_type)
    }

    /// Registered types in catalog order.
    pub fn registered_types(&self) -> Vec<RequestType> {
        let mut types: Vec<_> = self.handlers.keys().copied().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}
