// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Radio record and its AP-metrics reporting policy.

use std::time::Instant;

use crate::hal::RadioHalStats;
use crate::wireless::{self, RCPI_MAX};

/// RCPI hysteresis margin used when the controller sets no override.
pub const DEFAULT_RCPI_HYSTERESIS_MARGIN: u8 = 2;

/// Running statistics of the radio.
///
/// Load totals are percentages. The client accumulators are wide so the
/// per-station sums can be observed before clamping; `channel_load_others`
/// is signed because measurement noise can push it below zero.
#[derive(Debug, Clone)]
pub struct RadioStats {
    pub delta_ms: u16,
    pub last_update_time: Instant,

    pub hal_stats: RadioHalStats,

    pub total_retrans_count: u32,

    pub channel_load_tot_prev: u8,
    pub channel_load_tot_curr: u8,
    pub channel_load_others: i16,
    pub channel_load_idle: u8,
    pub channel_load_tot_is_above_hi_th: bool,

    pub client_tx_load_tot_prev: u32,
    pub client_rx_load_tot_prev: u32,
    pub client_tx_load_tot_curr: u32,
    pub client_rx_load_tot_curr: u32,
    pub active_client_count_is_above_th: bool,
    pub active_client_count_prev: u32,
    pub active_client_count_curr: u32,
    pub sta_count: u32,

    /// At least one VAP reported both tx and rx bytes in the last update
    pub vap_stats_available: bool,
}

impl RadioStats {
    fn new(created: Instant) -> Self {
        Self {
            delta_ms: 0,
            last_update_time: created,
            hal_stats: RadioHalStats::default(),
            total_retrans_count: 0,
            channel_load_tot_prev: 0,
            channel_load_tot_curr: 0,
            channel_load_others: 0,
            channel_load_idle: 0,
            channel_load_tot_is_above_hi_th: false,
            client_tx_load_tot_prev: 0,
            client_rx_load_tot_prev: 0,
            client_tx_load_tot_curr: 0,
            client_rx_load_tot_curr: 0,
            active_client_count_is_above_th: false,
            active_client_count_prev: 0,
            active_client_count_curr: 0,
            sta_count: 0,
            vap_stats_available: false,
        }
    }
}

/// AP-metrics reporting configuration (from the controller's policy) and
/// the last reported values.
#[derive(Debug, Clone, Default)]
pub struct ApMetricsReportingInfo {
    /// 0 disables RCPI-triggered STA metrics; 1..=220 is the threshold
    pub sta_metrics_reporting_rcpi_threshold: u8,
    /// 0 selects [`DEFAULT_RCPI_HYSTERESIS_MARGIN`]
    pub sta_metrics_reporting_rcpi_hysteresis_margin_override: u8,
    /// 0 disables utilization-triggered AP metrics
    pub ap_channel_utilization_reporting_threshold: u8,

    pub include_associated_sta_link_metrics: bool,
    pub include_associated_sta_traffic_stats: bool,
    pub include_associated_wifi_6_sta_status_report: bool,

    pub sta_metrics_reporting_rcpi_value: u8,
    pub ap_metrics_channel_utilization_reporting_value: u8,

    pub ap_metrics_radio_noise: u8,
    pub ap_metrics_radio_transmit: u8,
    pub ap_metrics_radio_receive_self: u8,
    pub ap_metrics_radio_receive_other: u8,

    pub ap_metrics_channel_utilization_last_reporting_time: Option<Instant>,
}

impl ApMetricsReportingInfo {
    /// Effective RCPI hysteresis margin.
    pub fn rcpi_hysteresis_margin(&self) -> u8 {
        match self.sta_metrics_reporting_rcpi_hysteresis_margin_override {
            0 => DEFAULT_RCPI_HYSTERESIS_MARGIN,
            margin => margin,
        }
    }

    /// Decide whether `rcpi` crossed the RCPI threshold since the last
    /// report. A crossing must clear the threshold by the hysteresis
    /// margin; the value is recorded when a report is due.
    pub fn should_report_sta_rcpi(&mut self, rcpi: u8) -> bool {
        let threshold = self.sta_metrics_reporting_rcpi_threshold;
        if threshold == 0 || threshold > RCPI_MAX || rcpi > RCPI_MAX {
            return false;
        }

        let margin = self.rcpi_hysteresis_margin();
        let was_above = self.sta_metrics_reporting_rcpi_value >= threshold;
        let crossed_up = !was_above && rcpi >= threshold.saturating_add(margin);
        let crossed_down = was_above && rcpi < threshold.saturating_sub(margin);

        if crossed_up || crossed_down {
            self.sta_metrics_reporting_rcpi_value = rcpi;
            return true;
        }
        false
    }

    /// Set the utilization threshold; enabling it from 0 forces one
    /// report on the next check.
    pub fn set_channel_utilization_threshold(
        &mut self,
        threshold: u8,
        first_threshold_enabled: &mut bool,
    ) {
        if self.ap_channel_utilization_reporting_threshold == 0 && threshold != 0 {
            *first_threshold_enabled = true;
        }
        self.ap_channel_utilization_reporting_threshold = threshold;
    }
}

/// The radio the monitor is attached to.
#[derive(Debug, Clone)]
pub struct RadioRecord {
    iface: String,
    channel: u8,
    ap_metrics_reporting_info: ApMetricsReportingInfo,
    first_threshold_enabled: bool,

    pub stats: RadioStats,
}

impl RadioRecord {
    pub(crate) fn new(created: Instant) -> Self {
        Self {
            iface: String::new(),
            channel: 0,
            ap_metrics_reporting_info: ApMetricsReportingInfo::default(),
            first_threshold_enabled: false,
            stats: RadioStats::new(created),
        }
    }

    pub fn iface(&self) -> &str {
        &self.iface
    }

    pub fn set_iface(&mut self, iface: &str) {
        self.iface = iface.to_string();
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel;
    }

    pub fn ap_metrics_reporting_info(&self) -> &ApMetricsReportingInfo {
        &self.ap_metrics_reporting_info
    }

    pub fn ap_metrics_reporting_info_mut(&mut self) -> &mut ApMetricsReportingInfo {
        &mut self.ap_metrics_reporting_info
    }

    pub fn first_threshold_enabled(&self) -> bool {
        self.first_threshold_enabled
    }

    pub fn set_first_threshold_enabled(&mut self, enabled: bool) {
        self.first_threshold_enabled = enabled;
    }

    /// Apply a new utilization reporting threshold.
    pub fn set_channel_utilization_threshold(&mut self, threshold: u8) {
        self.ap_metrics_reporting_info
            .set_channel_utilization_threshold(threshold, &mut self.first_threshold_enabled);
    }

    /// Last reported channel utilization.
    pub fn channel_utilization(&self) -> u8 {
        self.ap_metrics_reporting_info
            .ap_metrics_channel_utilization_reporting_value
    }

    /// Decide whether channel utilization moved enough to report AP
    /// metrics. Reporting records the value and the time point.
    pub fn should_report_channel_utilization(&mut self, current: u8, now: Instant) -> bool {
        let info = &mut self.ap_metrics_reporting_info;
        let threshold = info.ap_channel_utilization_reporting_threshold;
        if threshold == 0 {
            return false;
        }

        let last = info.ap_metrics_channel_utilization_reporting_value;
        let moved = current.abs_diff(last) >= threshold;
        if !moved && !self.first_threshold_enabled {
            return false;
        }

        info.ap_metrics_channel_utilization_reporting_value = current;
        info.ap_metrics_channel_utilization_last_reporting_time = Some(now);
        self.first_threshold_enabled = false;
        true
    }

    pub fn tx_bit_rate(&self) -> f64 {
        wireless::bit_rate_mbps(self.stats.hal_stats.tx_bytes, self.stats.delta_ms)
    }

    pub fn rx_bit_rate(&self) -> f64 {
        wireless::bit_rate_mbps(self.stats.hal_stats.rx_bytes, self.stats.delta_ms)
    }

    /// Zero the statistics block, keeping identity and reporting policy.
    pub fn clear_stats(&mut self) {
        self.stats = RadioStats::new(self.stats.last_update_time);
    }
}
