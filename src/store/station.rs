// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Per-station record.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use crate::hal::{StaHalStats, StaQosCtrlParams};
use crate::liveness::ProbeState;
use crate::mac::MacAddr;
use crate::wireless::{self, RSSI_INVALID, SNR_INVALID};

/// Running statistics of one station.
#[derive(Debug, Clone)]
pub struct StaStats {
    /// Samples accumulated in the current window
    pub poll_cnt: u8,
    pub delta_ms: u16,
    pub last_update_time: Instant,

    pub rx_rssi_prev: i8,
    pub rx_rssi_curr: i8,
    pub rx_snr_curr: i8,

    pub tx_phy_rate_100kb_avg: u16,
    pub tx_phy_rate_100kb_min: u16,
    pub tx_phy_rate_100kb_acc: u32,
    pub rx_phy_rate_100kb_avg: u16,
    pub rx_phy_rate_100kb_min: u16,
    pub rx_phy_rate_100kb_acc: u32,

    pub hal_stats: StaHalStats,

    pub tx_load_percent_prev: u8,
    pub tx_load_percent_curr: u8,
    pub rx_load_percent_prev: u8,
    pub rx_load_percent_curr: u8,
}

impl StaStats {
    fn new(created: Instant) -> Self {
        Self {
            poll_cnt: 0,
            delta_ms: 0,
            last_update_time: created,
            rx_rssi_prev: RSSI_INVALID,
            rx_rssi_curr: RSSI_INVALID,
            rx_snr_curr: SNR_INVALID,
            tx_phy_rate_100kb_avg: 0,
            tx_phy_rate_100kb_min: 0,
            tx_phy_rate_100kb_acc: 0,
            rx_phy_rate_100kb_avg: 0,
            rx_phy_rate_100kb_min: 0,
            rx_phy_rate_100kb_acc: 0,
            hal_stats: StaHalStats::default(),
            tx_load_percent_prev: 0,
            tx_load_percent_curr: 0,
            rx_load_percent_prev: 0,
            rx_load_percent_curr: 0,
        }
    }

    /// Fold one PHY-rate sample into the window statistics. The average
    /// is published on the last poll of the window.
    pub(crate) fn add_phy_sample(&mut self, tx_phy: u16, rx_phy: u16, is_last_poll: bool) {
        if self.poll_cnt == 0 {
            self.tx_phy_rate_100kb_min = tx_phy;
            self.rx_phy_rate_100kb_min = rx_phy;
        } else {
            self.tx_phy_rate_100kb_min = self.tx_phy_rate_100kb_min.min(tx_phy);
            self.rx_phy_rate_100kb_min = self.rx_phy_rate_100kb_min.min(rx_phy);
        }
        self.tx_phy_rate_100kb_acc += u32::from(tx_phy);
        self.rx_phy_rate_100kb_acc += u32::from(rx_phy);
        self.poll_cnt = self.poll_cnt.saturating_add(1);

        if is_last_poll {
            let count = u32::from(self.poll_cnt);
            self.tx_phy_rate_100kb_avg = (self.tx_phy_rate_100kb_acc / count) as u16;
            self.rx_phy_rate_100kb_avg = (self.rx_phy_rate_100kb_acc / count) as u16;
            self.reset_poll_data();
        }
    }

    /// Drop the partially accumulated window.
    pub fn reset_poll_data(&mut self) {
        self.poll_cnt = 0;
        self.tx_phy_rate_100kb_acc = 0;
        self.rx_phy_rate_100kb_acc = 0;
    }
}

/// A station associated with one of the radio's VAPs.
#[derive(Debug, Clone)]
pub struct StationRecord {
    mac: MacAddr,
    vap_id: u8,
    ipv4: Option<Ipv4Addr>,
    /// Repeaters in 4-address mode answer probes from behind their bridge
    bridge_4addr_mac: Option<MacAddr>,
    measure_sta_enable: bool,
    last_change_time: Option<Instant>,

    /// Liveness probe state
    pub probe: ProbeState,
    /// Ids of RSSI measurement requests waiting on the probe
    pub pending_rssi_request_ids: Vec<u16>,
    pub stats: StaStats,
    pub qos_ctrl_params: StaQosCtrlParams,

    // Idle stations
    pub idle_detected: bool,
    pub enable_idle_monitor: bool,
    pub idle_detected_start_time: Option<Instant>,
}

impl StationRecord {
    pub(crate) fn new(mac: MacAddr, vap_id: u8, created: Instant) -> Self {
        Self {
            mac,
            vap_id,
            ipv4: None,
            bridge_4addr_mac: None,
            measure_sta_enable: false,
            last_change_time: None,
            probe: ProbeState::new(created),
            pending_rssi_request_ids: Vec::new(),
            stats: StaStats::new(created),
            qos_ctrl_params: StaQosCtrlParams::default(),
            idle_detected: false,
            enable_idle_monitor: false,
            idle_detected_start_time: None,
        }
    }

    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    /// Id of the owning VAP. The VAP may already be gone.
    pub fn vap_id(&self) -> u8 {
        self.vap_id
    }

    pub(crate) fn set_vap_id(&mut self, vap_id: u8) {
        self.vap_id = vap_id;
    }

    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        self.ipv4
    }

    pub fn set_ipv4(&mut self, ipv4: Option<Ipv4Addr>) {
        self.ipv4 = ipv4;
    }

    pub fn bridge_4addr_mac(&self) -> Option<MacAddr> {
        self.bridge_4addr_mac
    }

    pub fn set_bridge_4addr_mac(&mut self, mac: Option<MacAddr>) {
        self.bridge_4addr_mac = mac;
    }

    /// Address that answers liveness probes for this station.
    pub fn probe_target_mac(&self) -> MacAddr {
        self.bridge_4addr_mac.unwrap_or(self.mac)
    }

    pub fn measure_sta_enable(&self) -> bool {
        self.measure_sta_enable
    }

    pub fn set_measure_sta_enable(&mut self, enable: bool) {
        self.measure_sta_enable = enable;
    }

    pub fn last_change_time(&self) -> Option<Instant> {
        self.last_change_time
    }

    pub fn set_last_change_time(&mut self, now: Instant) {
        self.last_change_time = Some(now);
    }

    /// True when the station has not changed for `timeout`. A station that
    /// never recorded a change is considered expired.
    pub fn last_change_expired(&self, now: Instant, timeout: Duration) -> bool {
        match self.last_change_time {
            Some(changed) => now.saturating_duration_since(changed) >= timeout,
            None => true,
        }
    }

    pub fn load_tx_phy_rate(&self) -> f64 {
        wireless::phy_rate_mbps(self.stats.tx_phy_rate_100kb_avg)
    }

    pub fn load_rx_phy_rate(&self) -> f64 {
        wireless::phy_rate_mbps(self.stats.rx_phy_rate_100kb_avg)
    }

    pub fn load_tx_bit_rate(&self) -> f64 {
        wireless::bit_rate_mbps(self.stats.hal_stats.tx_bytes, self.stats.delta_ms)
    }

    pub fn load_rx_bit_rate(&self) -> f64 {
        wireless::bit_rate_mbps(self.stats.hal_stats.rx_bytes, self.stats.delta_ms)
    }

    /// Downlink airtime load (%), unclamped.
    pub fn load_tx_percentage(&self) -> f64 {
        wireless::load_percent(
            self.stats.hal_stats.tx_bytes,
            self.stats.delta_ms,
            self.stats.tx_phy_rate_100kb_avg,
        )
    }

    /// Uplink airtime load (%), unclamped.
    pub fn load_rx_percentage(&self) -> f64 {
        wireless::load_percent(
            self.stats.hal_stats.rx_bytes,
            self.stats.delta_ms,
            self.stats.rx_phy_rate_100kb_avg,
        )
    }

    pub fn tx_packets(&self) -> u32 {
        self.stats.hal_stats.tx_packets
    }

    pub fn rx_packets(&self) -> u32 {
        self.stats.hal_stats.rx_packets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn station() -> StationRecord {
        StationRecord::new(MacAddr::new([2, 0, 0, 0, 0, 1]), 0, Instant::now())
    }

    #[test]
    fn test_new_station_defaults() {
        let sta = station();
        assert_eq!(sta.stats.rx_rssi_curr, RSSI_INVALID);
        assert_eq!(sta.stats.rx_snr_curr, SNR_INVALID);
        assert!(sta.pending_rssi_request_ids.is_empty());
        assert_eq!(sta.probe_target_mac(), sta.mac());
    }

    #[test]
    fn test_phy_window_average() {
        let mut sta = station();
        sta.stats.add_phy_sample(1000, 500, false);
        sta.stats.add_phy_sample(800, 700, false);
        sta.stats.add_phy_sample(1200, 600, false);
        assert_eq!(sta.stats.tx_phy_rate_100kb_min, 800);
        assert_eq!(sta.stats.rx_phy_rate_100kb_min, 500);
        assert_eq!(sta.stats.tx_phy_rate_100kb_avg, 0);

        sta.stats.add_phy_sample(1000, 600, true);
        assert_eq!(sta.stats.tx_phy_rate_100kb_avg, 1000);
        assert_eq!(sta.stats.rx_phy_rate_100kb_avg, 600);
        assert_eq!(sta.stats.poll_cnt, 0);
        assert_eq!(sta.stats.tx_phy_rate_100kb_acc, 0);
    }

    #[test]
    fn test_load_percentages() {
        let mut sta = station();
        sta.stats.delta_ms = 1000;
        sta.stats.tx_phy_rate_100kb_avg = 1000;
        sta.stats.rx_phy_rate_100kb_avg = 1000;
        sta.stats.hal_stats.tx_bytes = 1_250_000;
        sta.stats.hal_stats.rx_bytes = 2_500_000;

        assert_relative_eq!(sta.load_tx_bit_rate(), 10.0);
        assert_relative_eq!(sta.load_tx_phy_rate(), 100.0);
        assert_relative_eq!(sta.load_tx_percentage(), 10.0);
        assert_relative_eq!(sta.load_rx_percentage(), 20.0);
    }

    #[test]
    fn test_bridge_mac_is_probe_target() {
        let mut sta = station();
        let bridge = MacAddr::new([2, 0, 0, 0, 0, 0xbb]);
        sta.set_bridge_4addr_mac(Some(bridge));
        assert_eq!(sta.probe_target_mac(), bridge);
    }

    #[test]
    fn test_last_change_expired() {
        let mut sta = station();
        let now = Instant::now();
        let timeout = Duration::from_millis(30_000);
        assert!(sta.last_change_expired(now, timeout));

        sta.set_last_change_time(now);
        assert!(!sta.last_change_expired(now + Duration::from_secs(10), timeout));
        assert!(sta.last_change_expired(now + Duration::from_secs(30), timeout));
    }
}
