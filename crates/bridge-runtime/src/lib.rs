//! # Bridge Runtime
//!
//! Typed request/response across the isolated contexts of a browser
//! extension.
//!
//! ## Request Flow
//!
//! ```text
//! BridgeClient::send(FetchPrice, req)
//!     │  RequestEnvelope { version, request_type, request, id }
//!     ├── native messaging ────────────────┐
//!     └── fallback bus ─▶ content relay ───┤
//!                                          ▼
//!                                     Dispatcher
//!                             version ─▶ registry ─▶ handler
//!                                          │
//!     ◀──────────── ResponseEnvelope { response | error }
//! ```
//!
//! ## Modules
//!
//! - [`client`]: the entry point for issuing requests
//! - [`registry`] / [`handlers`]: the privileged context's handler table
//! - [`dispatcher`]: validates, routes and answers requests
//! - [`native`]: the platform messaging hub
//! - [`wiring`]: background worker and content-script relay start-up
//! - [`fetch`]: the network primitive handlers use
//! - [`config`] / [`telemetry`]: environment configuration and logging

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod fetch;
pub mod handlers;
pub mod native;
pub mod registry;
pub mod telemetry;
pub mod wiring;

pub use client::{BridgeClient, TransportKind};
pub use config::{BridgeConfig, ConfigError};
pub use context::{BrowserFamily, ExecutionContext, Realm};
pub use dispatcher::Dispatcher;
pub use fetch::{Credentials, FetchError, FetchRequest, FetchResponse, Fetcher, HttpFetcher};
pub use handlers::{ExtensionVersionHandler, SimpleHandler};
pub use native::{
    IncomingMessage, NativeForwarder, NativeInbox, NativeMessaging, NativeMessenger, Responder,
};
pub use registry::{
    DynHandler, ErasedHandler, HandlerRegistry, HandlerRegistryBuilder, RegistryError,
    RequestHandler,
};
pub use telemetry::{init_logging, TelemetryError};
pub use wiring::{BackgroundWorker, ContentScriptRelay, WiringError};
