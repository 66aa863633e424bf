//! # Request Catalog
//!
//! The closed set of request types the bridge knows about, and a typed
//! descriptor per type binding its tag to its request/response payloads.
//!
//! The wire keeps `request_type` as a plain string so that unknown tags can
//! still be carried (and rejected) by the dispatcher.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Every request type with a handler somewhere in the privileged context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    FetchPrice,
    FetchInspectInfo,
    FetchSkinModel,
    FetchStall,
    FetchPendingTrades,
    FetchBulkFloats,
    FetchRecommendedPrice,
    CreateTradeOffer,
    ListItem,
    ExtensionVersion,
}

impl RequestType {
    pub const ALL: [RequestType; 10] = [
        RequestType::FetchPrice,
        RequestType::FetchInspectInfo,
        RequestType::FetchSkinModel,
        RequestType::FetchStall,
        RequestType::FetchPendingTrades,
        RequestType::FetchBulkFloats,
        RequestType::FetchRecommendedPrice,
        RequestType::CreateTradeOffer,
        RequestType::ListItem,
        RequestType::ExtensionVersion,
    ];

    /// Stable wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchPrice => "FETCH_PRICE",
            Self::FetchInspectInfo => "FETCH_INSPECT_INFO",
            Self::FetchSkinModel => "FETCH_SKIN_MODEL",
            Self::FetchStall => "FETCH_STALL",
            Self::FetchPendingTrades => "FETCH_PENDING_TRADES",
            Self::FetchBulkFloats => "FETCH_BULK_FLOATS",
            Self::FetchRecommendedPrice => "FETCH_RECOMMENDED_PRICE",
            Self::CreateTradeOffer => "CREATE_TRADE_OFFER",
            Self::ListItem => "LIST_ITEM",
            Self::ExtensionVersion => "EXTENSION_VERSION",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a wire tag names no known request type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown request type {0:?}")]
pub struct UnknownRequestType(pub String);

impl FromStr for RequestType {
    type Err = UnknownRequestType;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.as_str() == tag)
            .ok_or_else(|| UnknownRequestType(tag.to_string()))
    }
}

/// Binds a request tag to its payload types.
///
/// Descriptors are zero-sized markers passed to the client's `send` and to
/// the registry's `register`, so both ends agree on the payload shapes at
/// compile time.
pub trait RequestDescriptor: Copy + Send + Sync + 'static {
    type Request: Serialize + DeserializeOwned + Send + 'static;
    type Response: Serialize + DeserializeOwned + Send + 'static;

    const REQUEST_TYPE: RequestType;
}

macro_rules! request_descriptor {
    ($(#[$meta:meta])* $name:ident, $tag:expr, $req:ty => $resp:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name;

        impl RequestDescriptor for $name {
            type Request = $req;
            type Response = $resp;
            const REQUEST_TYPE: RequestType = $tag;
        }
    };
}

// =============================================================================
// MARKET DATA
// =============================================================================

request_descriptor!(
    /// Current market price of an item by its market hash name.
    FetchPrice, RequestType::FetchPrice, FetchPriceRequest => FetchPriceResponse
);
request_descriptor!(
    /// Float/pattern data for one inspect link.
    FetchInspectInfo, RequestType::FetchInspectInfo, FetchInspectInfoRequest => FetchInspectInfoResponse
);
request_descriptor!(
    /// Float/pattern data for many inspect links in one backend call.
    FetchBulkFloats, RequestType::FetchBulkFloats, FetchBulkFloatsRequest => FetchBulkFloatsResponse
);
request_descriptor!(
    /// Screenshot / 3D model links for an inspect link.
    FetchSkinModel, RequestType::FetchSkinModel, FetchSkinModelRequest => FetchSkinModelResponse
);
request_descriptor!(
    /// Recommended listing price for an item.
    FetchRecommendedPrice, RequestType::FetchRecommendedPrice, FetchRecommendedPriceRequest => FetchRecommendedPriceResponse
);

/// Request for `FETCH_PRICE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPriceRequest {
    pub name: String,
}

/// Price in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPriceResponse {
    pub price: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchInspectInfoRequest {
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_price: Option<u64>,
}

/// Item attributes decoded from an inspect link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub floatvalue: f64,
    pub paintseed: u32,
    pub paintindex: u32,
    pub defindex: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_item_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchInspectInfoResponse {
    pub iteminfo: ItemInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchBulkFloatsRequest {
    pub links: Vec<String>,
}

/// Keyed by the asset id embedded in each inspect link.
pub type FetchBulkFloatsResponse = BTreeMap<String, ItemInfo>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSkinModelRequest {
    pub inspect_link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSkinModelResponse {
    #[serde(rename = "modelLink", default, skip_serializing_if = "Option::is_none")]
    pub model_link: Option<String>,
    #[serde(rename = "screenshotLink", default, skip_serializing_if = "Option::is_none")]
    pub screenshot_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRecommendedPriceRequest {
    pub market_hash_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRecommendedPriceResponse {
    pub price: u64,
}

// =============================================================================
// BACKEND ACCOUNT (credentialed)
// =============================================================================

request_descriptor!(
    /// Public stall listings of a user.
    FetchStall, RequestType::FetchStall, FetchStallRequest => FetchStallResponse
);
request_descriptor!(
    /// The signed-in user's pending trades; requires backend cookies.
    FetchPendingTrades, RequestType::FetchPendingTrades, () => FetchPendingTradesResponse
);
request_descriptor!(
    /// Create a backend listing for an owned asset.
    ListItem, RequestType::ListItem, ListItemRequest => ListItemResponse
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStallRequest {
    pub steam_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StallListing {
    pub id: String,
    pub price: u64,
    #[serde(default)]
    pub item: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStallResponse {
    #[serde(default)]
    pub data: Vec<StallListing>,
}

/// Backend trade objects are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPendingTradesResponse {
    #[serde(default)]
    pub trades_to_send: Vec<Value>,
    #[serde(default)]
    pub trades_to_receive: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItemRequest {
    pub asset_id: String,
    /// Price in cents.
    pub price: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItemResponse {
    pub id: String,
}

// =============================================================================
// MARKETPLACE SESSION (page cookies)
// =============================================================================

request_descriptor!(
    /// Send a marketplace trade offer on behalf of the signed-in user.
    CreateTradeOffer, RequestType::CreateTradeOffer, CreateTradeOfferRequest => CreateTradeOfferResponse
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTradeOfferRequest {
    #[serde(rename = "toSteamID64")]
    pub to_steam_id64: String,
    #[serde(rename = "tradeToken")]
    pub trade_token: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "assetIDsToGive", default)]
    pub asset_ids_to_give: Vec<String>,
    #[serde(rename = "assetIDsToReceive", default)]
    pub asset_ids_to_receive: Vec<String>,
    #[serde(rename = "sessionID")]
    pub session_id: String,
}

/// Serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTradeOfferResponse {}

// =============================================================================
// EXTENSION
// =============================================================================

request_descriptor!(
    /// Version of the running extension.
    ExtensionVersion, RequestType::ExtensionVersion, () => ExtensionVersionResponse
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionVersionResponse {
    pub version: String,
}
