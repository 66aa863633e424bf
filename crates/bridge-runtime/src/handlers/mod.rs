//! Handler building blocks and the handlers the runtime ships itself.
//!
//! Business handlers (prices, trade offers, listings) live with the
//! extension; they plug in through [`RequestHandler`](crate::RequestHandler)
//! or [`SimpleHandler`].

mod extension_version;
mod simple;

pub use extension_version::ExtensionVersionHandler;
pub use simple::SimpleHandler;
