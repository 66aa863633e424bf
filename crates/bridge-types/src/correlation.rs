//! Correlation ID for matching a reply to its call.
//!
//! Drawn uniformly from `1..=100_000_000_000` per call, so birthday collisions
//! among the handful of calls a context keeps in flight are negligible.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-generated identifier carried as the envelope's `id` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// Upper bound (inclusive) of the id range.
    pub const MAX: u64 = 100_000_000_000;

    /// Draw a fresh id.
    pub fn random() -> Self {
        Self(rand::thread_rng().gen_range(1..=Self::MAX))
    }

    /// Wrap an id received off the wire.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CorrelationId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
