//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Parse flags → Complete → Validate → Install logging → Report
//! ```
//!
//! # Design Decisions
//! - Fail fast: any configuration error is fatal
//! - Logging is installed only after the options are known to be valid

pub mod startup;
