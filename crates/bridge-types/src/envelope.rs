//! # Bridge Envelopes
//!
//! The wrapper for every request and response crossing a context boundary.
//!
//! ## Wire Shape
//!
//! ```text
//! Request:  { version: int, request_type: string, request: <opaque>, id: int }
//! Response: { response?: <opaque>, error?: string }
//! Bus:      { type: "BRIDGE_REQUEST",  ...Request }
//!           { type: "BRIDGE_RESPONSE", id: int, response?: <opaque>, error?: string }
//! ```
//!
//! Native messaging responses need no `id`: the platform's one-shot callback
//! already correlates them. The fallback bus is page-global, so its responses
//! repeat the request `id` for routing.

use crate::correlation::CorrelationId;
use crate::errors::BridgeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Protocol version carried by every request.
pub type ProtocolVersion = u32;

/// A request on its way to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Protocol version for forward compatibility.
    /// MUST be checked by the dispatcher before resolving the handler.
    pub version: ProtocolVersion,

    /// Tag naming the handler to invoke.
    pub request_type: String,

    /// Handler-specific payload. Absent payloads decode as `null`.
    #[serde(default)]
    pub request: Value,

    /// Caller-generated correlation id.
    pub id: CorrelationId,
}

impl RequestEnvelope {
    /// Current protocol version.
    pub const CURRENT_VERSION: ProtocolVersion = 1;

    /// Build a current-version envelope with a fresh correlation id.
    pub fn new(request_type: impl Into<String>, request: Value) -> Self {
        Self::with_id(CorrelationId::random(), request_type, request)
    }

    pub fn with_id(id: CorrelationId, request_type: impl Into<String>, request: Value) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            request_type: request_type.into(),
            request,
            id,
        }
    }

    #[must_use]
    pub fn is_current_version(&self) -> bool {
        self.version == Self::CURRENT_VERSION
    }

    /// Decode an inbound request.
    ///
    /// A numeric `version` other than the current one is reported as
    /// `UNSUPPORTED_VERSION` before anything else is decoded, whatever its
    /// magnitude. Any other decode failure is `MALFORMED_ENVELOPE`.
    pub fn from_value(raw: Value) -> Result<Self, BridgeError> {
        if let Some(Value::Number(version)) = raw.get("version") {
            if version.as_u64() != Some(u64::from(Self::CURRENT_VERSION)) {
                return Err(BridgeError::unsupported_version(
                    version,
                    Self::CURRENT_VERSION,
                ));
            }
        }
        serde_json::from_value(raw)
            .map_err(|e| BridgeError::malformed(format!("not a bridge request envelope: {e}")))
    }
}

/// The answer to one request. Exactly one field is populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Handler result. A present `null` still counts as a result.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub response: Option<Value>,

    /// Human-readable failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn success(response: Value) -> Self {
        Self {
            response: Some(response),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            response: None,
            error: Some(error.into()),
        }
    }

    pub fn from_error(error: &BridgeError) -> Self {
        Self::failure(error.to_wire())
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Settle the caller's side of the call.
    ///
    /// An envelope with neither field populated rejects as malformed.
    pub fn into_result(self) -> Result<Value, BridgeError> {
        match (self.response, self.error) {
            (_, Some(error)) => Err(BridgeError::from_wire(&error)),
            (Some(response), None) => Ok(response),
            (None, None) => Err(BridgeError::malformed(
                "response carried neither a payload nor an error",
            )),
        }
    }
}

impl From<Result<Value, BridgeError>> for ResponseEnvelope {
    fn from(result: Result<Value, BridgeError>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(err) => Self::from_error(&err),
        }
    }
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// A response as posted on the fallback bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusResponse {
    /// The originating request's correlation id.
    pub id: CorrelationId,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_value"
    )]
    pub response: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BusResponse {
    pub fn new(id: CorrelationId, envelope: ResponseEnvelope) -> Self {
        Self {
            id,
            response: envelope.response,
            error: envelope.error,
        }
    }

    pub fn into_parts(self) -> (CorrelationId, ResponseEnvelope) {
        (
            self.id,
            ResponseEnvelope {
                response: self.response,
                error: self.error,
            },
        )
    }
}

/// Everything the bridge posts on the page-global channel.
///
/// The `type` discriminator separates requests from responses and lets
/// listeners drop unrelated page traffic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BusMessage {
    #[serde(rename = "BRIDGE_REQUEST")]
    Request(RequestEnvelope),
    #[serde(rename = "BRIDGE_RESPONSE")]
    Response(BusResponse),
}

impl BusMessage {
    /// Parse a raw channel message, returning `None` for anything that is not
    /// a bridge envelope.
    pub fn from_value(value: &Value) -> Option<Self> {
        // Cheap pre-check before a full decode of arbitrary page traffic.
        let tag = value.get("type")?.as_str()?;
        if tag != "BRIDGE_REQUEST" && tag != "BRIDGE_RESPONSE" {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Id of a `BRIDGE_REQUEST`, read without decoding the rest so that a
    /// request which fails to decode can still be answered.
    pub fn request_id(value: &Value) -> Option<CorrelationId> {
        if value.get("type")?.as_str()? != "BRIDGE_REQUEST" {
            return None;
        }
        value.get("id")?.as_u64().map(CorrelationId::from_raw)
    }

    pub fn to_value(&self) -> Value {
        // Envelopes only hold JSON values, strings and integers.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
