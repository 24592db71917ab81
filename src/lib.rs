//! # Radiomon - Wireless statistics monitoring engine
//!
//! The statistics and threshold-alerting core of a Wi-Fi mesh agent.
//!
//! ## Key Features
//!
//! - **Windowed aggregation**: per-radio, per-VAP and per-station load
//!   percentages computed once per measurement window
//! - **Hysteresis alerting**: load and activity notifications that do not
//!   flap around their thresholds
//! - **Fragmented reports**: whole-radio reports split across as many
//!   bounded messages as the transport needs
//! - **Liveness probing**: address-resolution bursts with retry and
//!   timeout per station
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use radiomon::{MacAddr, MemoryTransport, StatsMonitor, StatsStore};
//!
//! let store = Arc::new(Mutex::new(StatsStore::new()));
//! let transport = Arc::new(MemoryTransport::new());
//! let mut monitor = StatsMonitor::default();
//! monitor.attach(Some(store.clone()), Some(transport.clone()));
//!
//! {
//!     let mut store = store.lock().unwrap();
//!     store.vap_add("wlan0", 0).unwrap();
//!     store.sta_add("02:00:00:00:00:01".parse().unwrap(), 0);
//!     store.set_channel_load(95);
//! }
//!
//! monitor.add_request(1, false, MacAddr::ZERO);
//! monitor.process(true);
//!
//! // one hostap report and one load notification
//! assert_eq!(transport.message_count(), 2);
//! ```
//!
//! ## Modules
//!
//! - [`store`]: radio, VAP and station records
//! - [`poll`]: polling cadence and measurement window
//! - [`load`]: window load aggregation and hysteresis
//! - [`activity`]: ACTIVE/IDLE classification
//! - [`liveness`]: per-station probe state machine
//! - [`queue`]: measurement request FIFO
//! - [`report`]: outbound messages and the report builder
//! - [`monitor`]: the tick entry point

// Modules
pub mod activity;
pub mod clock;
pub mod config;
pub mod error;
pub mod hal;
pub mod liveness;
pub mod load;
pub mod mac;
pub mod monitor;
pub mod poll;
pub mod queue;
pub mod report;
pub mod store;
pub mod transport;
pub mod wireless;

// Re-exports for convenient access
pub use activity::{ActivityMode, ActivityModeTracker};
pub use clock::{ClockSource, ManualClock, MonotonicClock};
pub use config::{
    ActivityConfig, ArpConfig, ClientsMeasurementMode, LoadConfig, MeasurementConfig,
    MonitorConfig, PollingConfig,
};
pub use error::{MonitorError, Result};
pub use hal::{EstimatedServiceParams, RadioHalStats, StaHalStats, VapHalStats};
pub use liveness::{ArpBurst, ArpState, LivenessProbe, ProbeOutcome, ProbeSource};
pub use load::{LoadAggregator, LoadTrigger, WindowOutcome};
pub use mac::MacAddr;
pub use monitor::{MonitorCounters, SharedStore, SharedTransport, StatsMonitor};
pub use poll::PollScheduler;
pub use queue::{MeasurementRequest, RequestQueue};
pub use report::{
    ActivityNotification, ApMetricsReport, HostapStatsReport, LoadNotification,
    OutboundMessage, ReportBuilder, ReportSection, StaLinkMetricsReport,
};
pub use store::{RadioRecord, StationRecord, StatsStore, VapRecord};
pub use transport::{MemoryTransport, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
