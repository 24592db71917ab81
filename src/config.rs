// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Monitor configuration.
//!
//! Every threshold the engine consumes lives here. The embedding agent fills
//! it from its platform configuration; the engine never reads files on its
//! own except through [`MonitorConfig::from_file`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Master configuration for the statistics monitor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Polling cadence and measurement window.
    pub polling: PollingConfig,

    /// Address-resolution liveness probing.
    pub arp: ArpConfig,

    /// Radio activity (ACTIVE/IDLE) classification.
    pub activity: ActivityConfig,

    /// Load-notification hysteresis.
    pub load: LoadConfig,

    /// Which measurements are enabled.
    pub measurement: MeasurementConfig,
}

/// Polling cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Interval between two HAL polls (ms).
    pub polling_rate_ms: u32,

    /// Polls per measurement window.
    pub window_poll_count: u8,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            polling_rate_ms: 250,
            window_poll_count: 4,
        }
    }
}

impl PollingConfig {
    /// Length of one measurement window (ms), saturating at `u32::MAX`.
    pub fn window_ms(&self) -> u32 {
        self.polling_rate_ms
            .saturating_mul(u32::from(self.window_poll_count))
    }
}

/// Liveness probe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArpConfig {
    /// Probes sent in one burst.
    pub burst_pkt_num: u8,

    /// Delay between two probes of a burst (ms).
    pub burst_delay_ms: u16,

    /// Time allowed for one probe attempt (ms).
    pub timeout_ms: u32,

    /// Replies needed to declare the station reachable.
    pub success_count: u8,

    /// Attempts before the station is declared unreachable.
    pub max_retries: u8,
}

impl Default for ArpConfig {
    fn default() -> Self {
        Self {
            burst_pkt_num: 6,
            burst_delay_ms: 0,
            timeout_ms: 550,
            success_count: 4,
            max_retries: 10,
        }
    }
}

/// Radio activity thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Below twice this many bytes per window the radio counts as idle.
    pub idle_threshold_bytes: u32,

    /// Above twice this many bytes per window an idle radio wakes up.
    pub active_threshold_bytes: u32,

    /// Idle time required before reporting IDLE (seconds).
    pub idle_stable_time_sec: u16,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            idle_threshold_bytes: 10_000,
            active_threshold_bytes: 20_000,
            idle_stable_time_sec: 600,
        }
    }
}

/// Load-notification hysteresis thresholds (percentages).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Channel load below which an elevated radio is cleared.
    pub channel_load_lo_th_percent: u8,

    /// Channel load at or above which the radio is elevated.
    pub channel_load_hi_th_percent: u8,

    /// Channel-load movement that re-notifies while elevated.
    pub channel_load_delta_th_percent: u8,

    /// Active station count that arms the client-load rules.
    pub min_active_client_count: u32,

    /// Per-station tx+rx load that counts a station as active.
    pub active_client_th_percent: u8,

    /// Client-load movement that re-notifies while armed.
    pub client_load_delta_th_percent: u8,

    /// Run window bookkeeping only when a measurement request is pending.
    pub gate_on_pending_request: bool,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            channel_load_lo_th_percent: 20,
            channel_load_hi_th_percent: 90,
            channel_load_delta_th_percent: 30,
            min_active_client_count: 2,
            active_client_th_percent: 3,
            client_load_delta_th_percent: 20,
            gate_on_pending_request: true,
        }
    }
}

/// Client measurement scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientsMeasurementMode {
    /// No per-client measurements
    DisableAll,
    /// Measure every associated client
    #[default]
    EnableAll,
    /// Measure only clients selected for steering
    OnlyClientsSelectedForSteering,
}

/// Measurement enables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    /// Per-client measurement scope.
    pub clients_measurement_mode: ClientsMeasurementMode,

    /// Collect radio-level statistics.
    pub radio_stats_enable: bool,

    /// Allow unicast (probe-backed) client measurements.
    pub unicast_measurement_enable: bool,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            clients_measurement_mode: ClientsMeasurementMode::EnableAll,
            radio_stats_enable: true,
            unicast_measurement_enable: false,
        }
    }
}

impl MonitorConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: MonitorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check thresholds for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.polling.polling_rate_ms == 0 {
            return Err(MonitorError::InvalidConfig(
                "polling_rate_ms must be positive".to_string(),
            ));
        }
        if self.polling.window_poll_count == 0 {
            return Err(MonitorError::InvalidConfig(
                "window_poll_count must be positive".to_string(),
            ));
        }

        let load = &self.load;
        for (name, value) in [
            ("channel_load_lo_th_percent", load.channel_load_lo_th_percent),
            ("channel_load_hi_th_percent", load.channel_load_hi_th_percent),
            (
                "channel_load_delta_th_percent",
                load.channel_load_delta_th_percent,
            ),
            ("active_client_th_percent", load.active_client_th_percent),
            (
                "client_load_delta_th_percent",
                load.client_load_delta_th_percent,
            ),
        ] {
            if value > 100 {
                return Err(MonitorError::InvalidConfig(format!(
                    "{} must be a percentage, got {}",
                    name, value
                )));
            }
        }
        if load.channel_load_lo_th_percent > load.channel_load_hi_th_percent {
            return Err(MonitorError::InvalidConfig(format!(
                "channel load low threshold {} above high threshold {}",
                load.channel_load_lo_th_percent, load.channel_load_hi_th_percent
            )));
        }

        if self.activity.active_threshold_bytes < self.activity.idle_threshold_bytes {
            return Err(MonitorError::InvalidConfig(format!(
                "active threshold {} B below idle threshold {} B",
                self.activity.active_threshold_bytes, self.activity.idle_threshold_bytes
            )));
        }

        if self.arp.success_count == 0 {
            return Err(MonitorError::InvalidConfig(
                "arp success_count must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.polling.polling_rate_ms, 250);
        assert_eq!(config.polling.window_poll_count, 4);
        assert_eq!(config.polling.window_ms(), 1000);
        assert_eq!(config.arp.timeout_ms, 550);
        assert_eq!(config.load.channel_load_hi_th_percent, 90);
        assert_eq!(
            config.measurement.clients_measurement_mode,
            ClientsMeasurementMode::EnableAll
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_window_ms_saturates() {
        let mut config = MonitorConfig::default();
        config.polling.polling_rate_ms = u32::MAX;
        config.polling.window_poll_count = u8::MAX;
        assert!(config.validate().is_ok());
        assert_eq!(config.polling.window_ms(), u32::MAX);
    }

    #[test]
    fn test_config_serialization() {
        let config = MonitorConfig::default();
        let json = config.to_json().unwrap();
        let parsed = MonitorConfig::from_json(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "load": { "channel_load_hi_th_percent": 80 },
                        "measurement": { "clients_measurement_mode": "only_clients_selected_for_steering" } }"#;
        let config = MonitorConfig::from_json(json).unwrap();
        assert_eq!(config.load.channel_load_hi_th_percent, 80);
        assert_eq!(config.load.channel_load_lo_th_percent, 20);
        assert_eq!(config.polling.polling_rate_ms, 250);
        assert_eq!(
            config.measurement.clients_measurement_mode,
            ClientsMeasurementMode::OnlyClientsSelectedForSteering
        );
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = MonitorConfig::default();
        config.load.channel_load_lo_th_percent = 95;
        assert!(matches!(
            config.validate(),
            Err(MonitorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let mut config = MonitorConfig::default();
        config.polling.window_poll_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_percent_over_100() {
        let mut config = MonitorConfig::default();
        config.load.client_load_delta_th_percent = 120;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "activity": {{ "idle_stable_time_sec": 30 }} }}"#).unwrap();
        let config = MonitorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.activity.idle_stable_time_sec, 30);
    }

    #[test]
    fn test_from_file_missing() {
        let result = MonitorConfig::from_file("/nonexistent/radiomon.json");
        assert!(matches!(result, Err(MonitorError::Io(_))));
    }
}
