pub mod tracing;

pub use tracing::{LogFlusher, TracingError, init_test_tracing, init_tracing};
