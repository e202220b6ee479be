//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! argv
//!     → flags.rs (clap parse, change tracking)
//!     → plugin.rs (each --plugin occurrence parsed and appended)
//!     → server.rs (ServerOptions::complete, derives the log level)
//!     → validation.rs (port ranges, port collisions, verbosity)
//!     → ServerOptions (validated, read-only) handed to bootstrap
//! ```
//!
//! # Design Decisions
//! - Options are plain structs; clap only fills them in
//! - Change tracking is an explicit `FlagSet` threaded into `complete`
//! - Validation short-circuits on the first failure

pub mod flags;
pub mod plugin;
pub mod server;
pub mod validation;

pub use flags::{FlagSet, FlagValue, ValueType};
pub use plugin::{PluginSpec, PluginSpecError, PluginSpecs};
pub use server::ServerOptions;
pub use validation::OptionsError;
