//! crates/owl_watcher_core/src/ports.rs
//!
//! Defines the service contracts (traits) the watcher depends on.
//! These traits form the boundary of the hexagonal architecture, so the
//! scheduling logic never touches a browser, an HTTP client or the wall clock
//! directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domain::MatchRecord;

//=========================================================================================
// Port Error and Result Types
//=========================================================================================

/// The error type shared by every port operation.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The schedule payload could not be parsed or had an unexpected shape.
    #[error("Malformed schedule data: {0}")]
    DataFormat(String),
    /// The schedule could not be fetched.
    #[error("Schedule transport failed: {0}")]
    Transport(String),
    /// The viewer session could not be opened or closed.
    #[error("Session error: {0}")]
    Session(String),
    /// The adapter does not support the requested capability.
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait StreamSession: Send + Sync {
    /// Starts showing the stream.
    async fn open(&self) -> PortResult<()>;

    /// Stops showing the stream and releases whatever backs it.
    async fn close(&self) -> PortResult<()>;

    /// Silences the stream. Callers treat failures as best-effort.
    async fn mute(&self) -> PortResult<()>;
}

#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Fetches every match currently published, ordered by start time.
    async fn fetch_matches(&self) -> PortResult<Vec<MatchRecord>>;
}

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}
