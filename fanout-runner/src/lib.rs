pub mod config;
pub mod core;
pub mod demo;
pub mod error;
pub mod routes;
pub mod startup;
