//! Fan-out worker pool with a completion-gated channel close.
//!
//! A batch runs `N` independent work items concurrently. Every producer hands its result to a
//! single consumer through a shared channel, and the channel is closed exactly once, by the
//! coordinator, after the last producer has finished. The consumer drains the channel with a
//! plain stream loop that ends when the channel is closed.
//!
//! ```rust,no_run
//! use fanout::run_fan_out;
//! use fanout::error::FanOutResult;
//! use futures::StreamExt;
//!
//! # async fn example() {
//! let mut results = run_fan_out(5, |index: usize| async move {
//!     FanOutResult::Ok(index * index)
//! });
//!
//! while let Some(item) = results.next().await {
//!     println!("{}: {:?}", item.index, item.outcome);
//! }
//! # }
//! ```

pub mod clients;
pub mod concurrency;
pub mod error;
pub mod failpoints;
mod macros;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;

pub use workers::pool::{FanOut, FanOutHandle, FanOutPool, run_fan_out};
