//! Cross-context integration tests.

pub mod harness;

mod concurrency;
mod scenarios;
