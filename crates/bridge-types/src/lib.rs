//! # Bridge Types Crate
//!
//! This crate contains the request/response envelopes, the correlation id,
//! the error taxonomy and the typed request catalog shared by every
//! execution context (background worker, content scripts, page realm).
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every value that crosses a context boundary
//!   is defined here.
//! - **Copied, never shared**: envelopes travel as serialized JSON values.
//! - **String errors on the wire**: structured kinds are recovered from the
//!   `error` text on the receiving side.

pub mod correlation;
pub mod envelope;
pub mod errors;
pub mod requests;

pub use correlation::CorrelationId;
pub use envelope::{BusMessage, BusResponse, ProtocolVersion, RequestEnvelope, ResponseEnvelope};
pub use errors::{BridgeError, ErrorKind};
pub use requests::*;
