//! # Page Channel
//!
//! The page-global broadcast medium the fallback bus rides on. One channel
//! exists per page-realm document; every participant sees every message,
//! including messages it posted itself and traffic that has nothing to do
//! with the bridge.
//!
//! Like `window.postMessage`, delivery never drops a message: each listener
//! has its own unbounded queue, and a slow listener only builds a backlog.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// A `window.postMessage`-like channel.
///
/// Cloning yields another handle to the same document channel.
#[derive(Clone, Default)]
pub struct PageChannel {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    /// One queue per live listener. Posting holds the lock, so every
    /// listener observes the same message order.
    listeners: Mutex<Vec<mpsc::UnboundedSender<Value>>>,

    /// Total messages posted.
    posted: AtomicU64,
}

impl PageChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Broadcast a message to every current listener.
    ///
    /// Returns the number of listeners that received it. Like
    /// `postMessage`, posting with nobody listening is not an error.
    pub fn post(&self, message: Value) -> usize {
        self.shared.posted.fetch_add(1, Ordering::Relaxed);

        let mut listeners = self.shared.listeners.lock();
        // Dropped subscriptions are pruned here.
        listeners.retain(|tx| tx.send(message.clone()).is_ok());

        let receivers = listeners.len();
        if receivers == 0 {
            debug!("Page message dropped (no listeners)");
        } else {
            trace!(receivers, "Page message posted");
        }
        receivers
    }

    /// Start listening. Only messages posted after this call are seen.
    #[must_use]
    pub fn subscribe(&self) -> ChannelSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared.listeners.lock().push(tx);
        ChannelSubscription { receiver: rx }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        let mut listeners = self.shared.listeners.lock();
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }

    #[must_use]
    pub fn messages_posted(&self) -> u64 {
        self.shared.posted.load(Ordering::Relaxed)
    }
}

/// A listener on a [`PageChannel`]. Dropping it stops listening.
pub struct ChannelSubscription {
    receiver: mpsc::UnboundedReceiver<Value>,
}

impl ChannelSubscription {
    /// Receive the next message.
    ///
    /// # Returns
    ///
    /// - `Some(message)` - The next message on the channel
    /// - `None` - Every channel handle was dropped (document gone)
    pub async fn recv(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }

    /// Receive without waiting. `None` when nothing is queued or the channel
    /// is closed.
    pub fn try_recv(&mut self) -> Option<Value> {
        self.receiver.try_recv().ok()
    }
}
