//! Concurrency primitives coordinating a fan-out batch.
//!
//! A batch is made of one coordinator, `N` producers and one consumer which communicate only
//! through the primitives in this module:
//!
//! - [`completion`] counts producers that are still running. Producers release their slot by
//!   dropping a guard, so the count is correct no matter how a producer ends.
//! - [`handoff`] is the results channel. Producers only hold weak senders and the coordinator
//!   owns the single handle able to close it.
//! - [`stream`] is the consumer's drain loop over the channel.
//! - [`signal`] publishes the [`BatchPhase`](crate::types::BatchPhase) of a batch.
//! - [`shutdown`] broadcasts cancellation requests to coordinators.
//!
//! The coordinator closes the channel only after the completion count reached zero, which is
//! what makes the consumer loop terminate without ever losing a result.

pub mod completion;
pub mod handoff;
pub mod shutdown;
pub mod signal;
pub mod stream;
