//! Coordinator and producer workers of a fan-out batch.

pub mod base;
pub mod pool;
pub mod producer;
