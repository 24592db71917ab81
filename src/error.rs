//! Error types for Radiomon
//!
//! Steady-state tick failures are logged and contained inside
//! [`StatsMonitor::process`](crate::StatsMonitor::process); these errors
//! surface from the store, the configuration layer and the report builder.

use thiserror::Error;

use crate::mac::MacAddr;

/// Result type alias for Radiomon operations
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Main error type for Radiomon operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MonitorError {
    /// The monitor has no store or transport attached
    #[error("Monitor is not attached")]
    NotAttached,

    /// Station not present in the store
    #[error("Station not found: {0}")]
    StationNotFound(MacAddr),

    /// VAP not present in the store
    #[error("VAP not found: {0}")]
    VapNotFound(u8),

    /// VAP id outside of the supported range
    #[error("Invalid VAP id: {0} (max {})", crate::store::MAX_VAP_ID)]
    InvalidVapId(u8),

    /// Outbound message has no room for another section
    #[error("Message capacity exceeded: need {needed} bytes, have {available}")]
    CapacityExceeded { needed: usize, available: usize },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed MAC address string
    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    /// Liveness probe cannot run for this station
    #[error("Probe unavailable for {mac}: {reason}")]
    ProbeUnavailable { mac: MacAddr, reason: String },

    /// I/O failure while reading configuration
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for MonitorError {
    fn from(err: std::io::Error) -> Self {
        MonitorError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Parse(err.to_string())
    }
}
