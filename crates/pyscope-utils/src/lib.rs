//! # pyscope Utilities
//!
//! Shared logging setup for the pyscope workspace.
//!
//! The decoder in `pyscope-core` only emits `tracing` events. Installing a
//! subscriber is left to binaries, which call into this crate once at start.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_with_settings, LogFormat, LogLevel, LogSettings, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
