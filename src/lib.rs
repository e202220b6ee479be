//! Body-based routing sidecar: command-line configuration.
//!
//! Parses and validates the options the sidecar is started with. Server
//! bootstrap consumes the validated [`ServerOptions`].

pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::server::ServerOptions;
pub use config::plugin::{PluginSpec, PluginSpecs};
pub use observability::logging::LoggingOptions;
