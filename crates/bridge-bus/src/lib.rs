//! # Bridge Bus - postMessage Fallback Transport
//!
//! Request/response over a page-global broadcast channel, used when native
//! extension messaging is unavailable (Firefox page realm).
//!
//! ```text
//! ┌──────────────┐   BRIDGE_REQUEST {id}   ┌──────────────┐
//! │ PostMessage  │ ──────────────────────▶ │ BusResponder │
//! │     Bus      │                         │  (relay)     │
//! │              │ ◀────────────────────── │              │
//! └──────────────┘   BRIDGE_RESPONSE {id}  └──────────────┘
//!         ▲                 PageChannel
//!         └─ PendingCallTable: id -> waiting caller
//! ```
//!
//! Every listener sees every message, in posting order and without loss, so
//! both sides filter on the `type` discriminator and the bus matches
//! responses to callers by id.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod channel;
pub mod pending;
pub mod post_message_bus;
pub mod responder;

pub use channel::{ChannelSubscription, PageChannel};
pub use pending::{CallResult, PendingCallTable, PendingSnapshot, PendingStats};
pub use post_message_bus::PostMessageBus;
pub use responder::{BusResponder, RequestSink};
