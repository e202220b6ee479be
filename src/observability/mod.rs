//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! -v / --zap-* flags
//!     → logging.rs (LoggingOptions::complete resolves the level)
//!     → tracing subscriber installed once at startup
//! ```

pub mod logging;
