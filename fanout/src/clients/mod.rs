//! Clients for collaborators reached over the network.

pub mod http;

pub use http::{BoundedHttpClient, UpstreamResponse};
