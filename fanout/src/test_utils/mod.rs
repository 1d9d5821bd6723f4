//! Utilities for testing fan-out batches.
//!
//! - [`notify`] wraps [`tokio::sync::Notify`] with a timeout so waiting tests fail instead of
//!   hanging.
//! - [`failpoints`] scopes fail point configuration to a single test.
//! - [`work`] provides work functions with controlled behavior: plain values, random delays,
//!   failures, panics, stalls and concurrency probes.

#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod notify;
pub mod work;
