//! Shared configuration types for fan-out services.

mod base;
mod fanout;
mod proxy;
mod runner;

pub use base::ValidationError;
pub use fanout::FanOutConfig;
pub use proxy::ProxyConfig;
pub use runner::RunnerConfig;
