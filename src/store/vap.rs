// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Per-VAP (BSS) record.

use std::net::Ipv4Addr;
use std::time::Instant;

use crate::hal::VapHalStats;
use crate::mac::MacAddr;
use crate::wireless;

/// Running statistics of one VAP.
#[derive(Debug, Clone)]
pub struct VapStats {
    pub delta_ms: u16,
    pub last_update_time: Instant,

    pub hal_stats: VapHalStats,

    pub client_tx_load_tot_prev: u32,
    pub client_rx_load_tot_prev: u32,
    pub client_tx_load_tot_curr: u32,
    pub client_rx_load_tot_curr: u32,
    pub active_client_count_is_above_th: bool,
    pub active_client_count_prev: u32,
    pub active_client_count_curr: u32,
}

impl VapStats {
    fn new(created: Instant) -> Self {
        Self {
            delta_ms: 0,
            last_update_time: created,
            hal_stats: VapHalStats::default(),
            client_tx_load_tot_prev: 0,
            client_rx_load_tot_prev: 0,
            client_tx_load_tot_curr: 0,
            client_rx_load_tot_curr: 0,
            active_client_count_is_above_th: false,
            active_client_count_prev: 0,
            active_client_count_curr: 0,
        }
    }
}

/// A BSS hosted on the radio.
#[derive(Debug, Clone)]
pub struct VapRecord {
    vap_id: u8,
    iface: String,
    bssid: MacAddr,
    bridge_iface: String,
    bridge_mac: MacAddr,
    bridge_ipv4: Option<Ipv4Addr>,
    sta_count: u32,

    pub stats: VapStats,
}

impl VapRecord {
    pub(crate) fn new(iface: &str, vap_id: u8, created: Instant) -> Self {
        Self {
            vap_id,
            iface: iface.to_string(),
            bssid: MacAddr::ZERO,
            bridge_iface: String::new(),
            bridge_mac: MacAddr::ZERO,
            bridge_ipv4: None,
            sta_count: 0,
            stats: VapStats::new(created),
        }
    }

    pub fn vap_id(&self) -> u8 {
        self.vap_id
    }

    pub fn iface(&self) -> &str {
        &self.iface
    }

    pub fn bssid(&self) -> MacAddr {
        self.bssid
    }

    pub fn set_bssid(&mut self, bssid: MacAddr) {
        self.bssid = bssid;
    }

    pub fn bridge_iface(&self) -> &str {
        &self.bridge_iface
    }

    pub fn set_bridge_iface(&mut self, iface: &str) {
        self.bridge_iface = iface.to_string();
    }

    pub fn bridge_mac(&self) -> MacAddr {
        self.bridge_mac
    }

    pub fn set_bridge_mac(&mut self, mac: MacAddr) {
        self.bridge_mac = mac;
    }

    pub fn bridge_ipv4(&self) -> Option<Ipv4Addr> {
        self.bridge_ipv4
    }

    pub fn set_bridge_ipv4(&mut self, ipv4: Option<Ipv4Addr>) {
        self.bridge_ipv4 = ipv4;
    }

    pub fn sta_count(&self) -> u32 {
        self.sta_count
    }

    pub(crate) fn sta_count_inc(&mut self) {
        self.sta_count += 1;
    }

    pub(crate) fn sta_count_dec(&mut self) {
        self.sta_count = self.sta_count.saturating_sub(1);
    }

    pub fn tx_bit_rate(&self) -> f64 {
        wireless::bit_rate_mbps(self.stats.hal_stats.tx_bytes, self.stats.delta_ms)
    }

    pub fn rx_bit_rate(&self) -> f64 {
        wireless::bit_rate_mbps(self.stats.hal_stats.rx_bytes, self.stats.delta_ms)
    }

    /// True when both directions carried traffic in the last sample.
    pub fn has_traffic(&self) -> bool {
        self.stats.hal_stats.tx_bytes > 0 && self.stats.hal_stats.rx_bytes > 0
    }

    /// Zero the statistics block, keeping identity and timing.
    pub fn clear_stats(&mut self) {
        self.stats = VapStats::new(self.stats.last_update_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sta_count_never_underflows() {
        let mut vap = VapRecord::new("wlan0", 0, Instant::now());
        vap.sta_count_dec();
        assert_eq!(vap.sta_count(), 0);
        vap.sta_count_inc();
        vap.sta_count_inc();
        vap.sta_count_dec();
        assert_eq!(vap.sta_count(), 1);
    }

    #[test]
    fn test_clear_stats() {
        let mut vap = VapRecord::new("wlan0.1", 1, Instant::now());
        vap.stats.hal_stats.tx_bytes = 500;
        vap.stats.hal_stats.rx_bytes = 400;
        vap.stats.active_client_count_curr = 3;
        assert!(vap.has_traffic());

        vap.clear_stats();
        assert!(!vap.has_traffic());
        assert_eq!(vap.stats.active_client_count_curr, 0);
        assert_eq!(vap.iface(), "wlan0.1");
    }
}
