//! # Error Types
//!
//! The bridge error taxonomy. Only a human-readable string crosses the wire
//! (`ResponseEnvelope::error`); dispatcher-originated failures carry their
//! kind as a textual prefix (`"UNKNOWN_REQUEST_TYPE: ..."`) so the receiving
//! side can recover a structured [`BridgeError`] with [`BridgeError::from_wire`].
//! Handler failures are sent verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Categories of bridge failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Envelope declares a protocol version the dispatcher does not understand.
    UnsupportedVersion,
    /// No handler registered for the request type.
    UnknownRequestType,
    /// The handler failed, or its downstream call did.
    HandlerFailure,
    /// A bus response matched no pending call. Never surfaced to callers.
    TransportUnroutable,
    /// The inbound message is not a bridge envelope.
    MalformedEnvelope,
    /// The reply channel closed before an answer arrived.
    TransportClosed,
    /// No listener for the target extension id.
    UnreachableExtension,
    /// A caller-imposed deadline elapsed.
    DeadlineElapsed,
    /// Typed payload could not be encoded or decoded on the client side.
    Serialization,
}

impl ErrorKind {
    /// Kinds that travel as a `KIND: message` prefix.
    const PREFIXED: [ErrorKind; 5] = [
        ErrorKind::UnsupportedVersion,
        ErrorKind::UnknownRequestType,
        ErrorKind::MalformedEnvelope,
        ErrorKind::TransportClosed,
        ErrorKind::UnreachableExtension,
    ];

    /// Stable wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedVersion => "UNSUPPORTED_VERSION",
            Self::UnknownRequestType => "UNKNOWN_REQUEST_TYPE",
            Self::HandlerFailure => "HANDLER_FAILURE",
            Self::TransportUnroutable => "TRANSPORT_UNROUTABLE",
            Self::MalformedEnvelope => "MALFORMED_ENVELOPE",
            Self::TransportClosed => "TRANSPORT_CLOSED",
            Self::UnreachableExtension => "UNREACHABLE_EXTENSION",
            Self::DeadlineElapsed => "DEADLINE_ELAPSED",
            Self::Serialization => "SERIALIZATION",
        }
    }

    fn from_prefix(tag: &str) -> Option<Self> {
        Self::PREFIXED.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed bridge call, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", wire_text(.kind, .message))]
pub struct BridgeError {
    /// Error kind.
    pub kind: ErrorKind,
    /// Human-readable error message.
    pub message: String,
}

impl BridgeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unsupported_version(received: impl fmt::Display, supported: u32) -> Self {
        Self::new(
            ErrorKind::UnsupportedVersion,
            format!("protocol version {received} is not supported (expected {supported})"),
        )
    }

    pub fn unknown_request_type(request_type: &str) -> Self {
        Self::new(
            ErrorKind::UnknownRequestType,
            format!("no handler registered for {request_type:?}"),
        )
    }

    pub fn handler_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::HandlerFailure, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedEnvelope, message)
    }

    pub fn transport_closed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransportClosed, message)
    }

    pub fn unreachable_extension(extension_id: &str) -> Self {
        Self::new(
            ErrorKind::UnreachableExtension,
            format!("could not establish connection, receiving end does not exist for {extension_id:?}"),
        )
    }

    pub fn deadline_elapsed(deadline: Duration) -> Self {
        Self::new(
            ErrorKind::DeadlineElapsed,
            format!("request did not settle within {}ms", deadline.as_millis()),
        )
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    /// The string placed in `ResponseEnvelope::error`.
    pub fn to_wire(&self) -> String {
        self.to_string()
    }

    /// Recover a structured error from an `error` string.
    ///
    /// Anything without a recognised kind prefix is a handler failure whose
    /// message is the whole string.
    pub fn from_wire(error: &str) -> Self {
        if let Some((tag, message)) = error.split_once(": ") {
            if let Some(kind) = ErrorKind::from_prefix(tag) {
                return Self::new(kind, message);
            }
        }
        Self::handler_failure(error)
    }
}

/// Handler failures travel verbatim; every other kind is prefixed.
fn wire_text(kind: &ErrorKind, message: &str) -> String {
    match kind {
        ErrorKind::HandlerFailure => message.to_string(),
        kind => format!("{kind}: {message}"),
    }
}
