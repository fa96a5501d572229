//! services/watcher/src/error.rs
//!
//! Defines the primary error type for the watcher service.

use crate::config::ConfigError;
use owl_watcher_core::ports::PortError;

/// The primary error type for the `watcher` service.
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),
}
