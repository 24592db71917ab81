// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Statistics store
//!
//! [`StatsStore`] exclusively owns the radio record, the VAP records (keyed
//! by VAP id) and the station records (keyed by MAC). Callers get short
//! borrows or lookup keys, never long-lived references. A station refers to
//! its VAP by id only; when the VAP is removed first the station becomes an
//! orphan, which every lookup treats as a normal "not found".

mod radio;
mod station;
mod vap;

pub use radio::{ApMetricsReportingInfo, RadioRecord, RadioStats, DEFAULT_RCPI_HYSTERESIS_MARGIN};
pub use station::{StaStats, StationRecord};
pub use vap::{VapRecord, VapStats};

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;

use crate::clock::{ClockSource, MonotonicClock};
use crate::config::{ClientsMeasurementMode, MonitorConfig};
use crate::error::{MonitorError, Result};
use crate::hal::{RadioHalStats, StaHalStats, VapHalStats};
use crate::mac::MacAddr;
use crate::poll::PollScheduler;

/// Highest VAP id a radio can host.
pub const MAX_VAP_ID: u8 = 15;

/// Milliseconds between two time points, saturated to `u16`.
fn delta_ms(now: Instant, last: Instant) -> u16 {
    let ms = now.saturating_duration_since(last).as_millis();
    u16::try_from(ms).unwrap_or(u16::MAX)
}

/// Owner of all radio, VAP and station records.
pub struct StatsStore {
    clock: Arc<dyn ClockSource>,
    radio: RadioRecord,
    vaps: BTreeMap<u8, VapRecord>,
    stations: BTreeMap<MacAddr, StationRecord>,
    poll: PollScheduler,

    hostapd_enabled: bool,
    ap_tx_enabled: bool,
    arp_burst_pkt_num: u8,
    arp_burst_delay_ms: u16,
    clients_measurement_mode: ClientsMeasurementMode,
    radio_stats_enable: bool,
    clients_unicast_measurements: bool,
}

impl StatsStore {
    /// Create a store with default configuration on the monotonic clock.
    pub fn new() -> Self {
        Self::with_config(&MonitorConfig::default(), Arc::new(MonotonicClock))
    }

    /// Create a store configured from `config`, stamping new records with
    /// `clock`.
    pub fn with_config(config: &MonitorConfig, clock: Arc<dyn ClockSource>) -> Self {
        let created = clock.now();
        Self {
            radio: RadioRecord::new(created),
            vaps: BTreeMap::new(),
            stations: BTreeMap::new(),
            poll: PollScheduler::from_config(&config.polling),
            hostapd_enabled: false,
            ap_tx_enabled: false,
            arp_burst_pkt_num: config.arp.burst_pkt_num,
            arp_burst_delay_ms: config.arp.burst_delay_ms,
            clients_measurement_mode: config.measurement.clients_measurement_mode,
            radio_stats_enable: config.measurement.radio_stats_enable,
            clients_unicast_measurements: config.measurement.unicast_measurement_enable,
            clock,
        }
    }

    /// Current time on the store's clock.
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Drop every VAP and station and zero the radio statistics.
    pub fn clear(&mut self) {
        self.sta_erase_all();
        self.vap_erase_all();
        self.radio.clear_stats();
        self.poll.reset();
    }

    // Radio //

    pub fn radio(&self) -> &RadioRecord {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut RadioRecord {
        &mut self.radio
    }

    pub fn hostapd_enabled(&self) -> bool {
        self.hostapd_enabled
    }

    pub fn set_hostapd_enabled(&mut self, enabled: bool) {
        self.hostapd_enabled = enabled;
    }

    pub fn ap_tx_enabled(&self) -> bool {
        self.ap_tx_enabled
    }

    pub fn set_ap_tx_enabled(&mut self, enabled: bool) {
        self.ap_tx_enabled = enabled;
    }

    /// Store a fresh radio counter snapshot.
    pub fn update_radio_stats(&mut self, hal: RadioHalStats, now: Instant) {
        let sta_count = self.stations.len() as u32;
        let vap_stats_available = self.vaps.values().any(VapRecord::has_traffic);

        let stats = &mut self.radio.stats;
        stats.delta_ms = delta_ms(now, stats.last_update_time);
        stats.last_update_time = now;
        stats.hal_stats = hal;
        stats.total_retrans_count = hal.tx_retries;
        stats.sta_count = sta_count;
        stats.vap_stats_available = vap_stats_available;
    }

    /// Record the measured channel load (%). Clamping happens in the tick.
    pub fn set_channel_load(&mut self, percent: u8) {
        self.radio.stats.channel_load_tot_curr = percent;
    }

    // VAP //

    /// Add a VAP. Re-adding an existing id returns the existing record
    /// untouched.
    pub fn vap_add(&mut self, iface: &str, vap_id: u8) -> Result<&mut VapRecord> {
        if vap_id > MAX_VAP_ID {
            return Err(MonitorError::InvalidVapId(vap_id));
        }
        let created = self.clock.now();
        Ok(self
            .vaps
            .entry(vap_id)
            .or_insert_with(|| VapRecord::new(iface, vap_id, created)))
    }

    pub fn vap_get_by_id(&self, vap_id: u8) -> Option<&VapRecord> {
        self.vaps.get(&vap_id)
    }

    pub fn vap_get_by_id_mut(&mut self, vap_id: u8) -> Option<&mut VapRecord> {
        self.vaps.get_mut(&vap_id)
    }

    pub fn vap_get_by_bssid(&self, bssid: MacAddr) -> Option<&VapRecord> {
        self.vaps.values().find(|vap| vap.bssid() == bssid)
    }

    /// Id of the VAP serving `bssid`.
    pub fn get_vap_id(&self, bssid: MacAddr) -> Option<u8> {
        self.vap_get_by_bssid(bssid).map(VapRecord::vap_id)
    }

    /// Remove a VAP; its stations become orphans. Returns false when the
    /// id is unknown.
    pub fn vap_remove(&mut self, vap_id: u8) -> bool {
        self.vaps.remove(&vap_id).is_some()
    }

    pub fn vap_erase_all(&mut self) {
        self.vaps.clear();
    }

    pub fn vap_count(&self) -> usize {
        self.vaps.len()
    }

    pub fn vaps(&self) -> impl Iterator<Item = &VapRecord> {
        self.vaps.values()
    }

    /// BSSIDs of every VAP, ordered by VAP id.
    pub fn get_bssid_list(&self) -> Vec<MacAddr> {
        self.vaps.values().map(VapRecord::bssid).collect()
    }

    /// Store a fresh VAP counter snapshot.
    pub fn update_vap_stats(&mut self, vap_id: u8, hal: VapHalStats, now: Instant) -> Result<()> {
        let vap = self
            .vaps
            .get_mut(&vap_id)
            .ok_or(MonitorError::VapNotFound(vap_id))?;
        vap.stats.delta_ms = delta_ms(now, vap.stats.last_update_time);
        vap.stats.last_update_time = now;
        vap.stats.hal_stats = hal;
        Ok(())
    }

    // Stations //

    /// Add a station. Re-adding a known MAC keeps the record (and its
    /// probe state); only a changed VAP id is applied, moving the station
    /// between the VAP counters.
    pub fn sta_add(&mut self, mac: MacAddr, vap_id: u8) -> &mut StationRecord {
        let created = self.clock.now();
        match self.stations.entry(mac) {
            btree_map::Entry::Occupied(entry) => {
                let sta = entry.into_mut();
                let old_vap = sta.vap_id();
                if old_vap != vap_id {
                    log::debug!("station {} moved from vap {} to vap {}", mac, old_vap, vap_id);
                    if let Some(vap) = self.vaps.get_mut(&old_vap) {
                        vap.sta_count_dec();
                    }
                    if let Some(vap) = self.vaps.get_mut(&vap_id) {
                        vap.sta_count_inc();
                    }
                    sta.set_vap_id(vap_id);
                }
                sta
            }
            btree_map::Entry::Vacant(entry) => {
                match self.vaps.get_mut(&vap_id) {
                    Some(vap) => vap.sta_count_inc(),
                    None => log::warn!("station {} added to unknown vap {}", mac, vap_id),
                }
                entry.insert(StationRecord::new(mac, vap_id, created))
            }
        }
    }

    /// Remove a station; unknown MACs are ignored.
    pub fn sta_erase(&mut self, mac: MacAddr) -> Option<StationRecord> {
        let sta = self.stations.remove(&mac)?;
        if let Some(vap) = self.vaps.get_mut(&sta.vap_id()) {
            vap.sta_count_dec();
        }
        Some(sta)
    }

    pub fn sta_erase_all(&mut self) {
        let macs: Vec<MacAddr> = self.stations.keys().copied().collect();
        for mac in macs {
            self.sta_erase(mac);
        }
    }

    pub fn sta_find(&self, mac: MacAddr) -> Option<&StationRecord> {
        self.stations.get(&mac)
    }

    pub fn sta_find_mut(&mut self, mac: MacAddr) -> Option<&mut StationRecord> {
        self.stations.get_mut(&mac)
    }

    pub fn sta_find_by_ipv4(&self, ipv4: Ipv4Addr) -> Option<&StationRecord> {
        self.stations.values().find(|sta| sta.ipv4() == Some(ipv4))
    }

    pub fn sta_find_by_ipv4_mut(&mut self, ipv4: Ipv4Addr) -> Option<&mut StationRecord> {
        self.stations
            .values_mut()
            .find(|sta| sta.ipv4() == Some(ipv4))
    }

    pub fn sta_count(&self) -> usize {
        self.stations.len()
    }

    /// Stations ordered by MAC.
    pub fn stations(&self) -> impl Iterator<Item = &StationRecord> {
        self.stations.values()
    }

    /// VAP of a station, `None` for unknown stations and orphans.
    pub fn sta_vap(&self, mac: MacAddr) -> Option<&VapRecord> {
        let sta = self.stations.get(&mac)?;
        self.vaps.get(&sta.vap_id())
    }

    /// Station and its VAP borrowed together.
    pub fn station_with_vap_mut(
        &mut self,
        mac: MacAddr,
    ) -> Option<(&mut StationRecord, Option<&VapRecord>)> {
        let sta = self.stations.get_mut(&mac)?;
        let vap = self.vaps.get(&sta.vap_id());
        Some((sta, vap))
    }

    /// Radio, VAPs and stations borrowed together for window processing.
    pub fn split_mut(
        &mut self,
    ) -> (
        &mut RadioRecord,
        &mut BTreeMap<u8, VapRecord>,
        btree_map::ValuesMut<'_, MacAddr, StationRecord>,
    ) {
        (&mut self.radio, &mut self.vaps, self.stations.values_mut())
    }

    /// Store a fresh station counter snapshot.
    pub fn update_sta_stats(
        &mut self,
        mac: MacAddr,
        hal: StaHalStats,
        rssi: i8,
        snr: i8,
        now: Instant,
    ) -> Result<()> {
        let is_last_poll = self.poll.is_last_poll();
        let sta = self
            .stations
            .get_mut(&mac)
            .ok_or(MonitorError::StationNotFound(mac))?;

        let stats = &mut sta.stats;
        stats.delta_ms = delta_ms(now, stats.last_update_time);
        stats.last_update_time = now;
        stats.hal_stats = hal;
        stats.rx_rssi_prev = stats.rx_rssi_curr;
        stats.rx_rssi_curr = rssi;
        stats.rx_snr_curr = snr;
        stats.add_phy_sample(hal.tx_phy_rate_100kb, hal.rx_phy_rate_100kb, is_last_poll);
        Ok(())
    }

    // Monitor parameters //

    pub fn poll(&self) -> &PollScheduler {
        &self.poll
    }

    pub fn poll_mut(&mut self) -> &mut PollScheduler {
        &mut self.poll
    }

    pub fn arp_burst_pkt_num(&self) -> u8 {
        self.arp_burst_pkt_num
    }

    pub fn set_arp_burst_pkt_num(&mut self, count: u8) {
        self.arp_burst_pkt_num = count;
    }

    pub fn arp_burst_delay_ms(&self) -> u16 {
        self.arp_burst_delay_ms
    }

    pub fn set_arp_burst_delay_ms(&mut self, delay_ms: u16) {
        self.arp_burst_delay_ms = delay_ms;
    }

    pub fn clients_measurement_mode(&self) -> ClientsMeasurementMode {
        self.clients_measurement_mode
    }

    pub fn set_clients_measurement_mode(&mut self, mode: ClientsMeasurementMode) {
        self.clients_measurement_mode = mode;
    }

    pub fn radio_stats_enable(&self) -> bool {
        self.radio_stats_enable
    }

    pub fn set_radio_stats_enable(&mut self, enable: bool) {
        self.radio_stats_enable = enable;
    }

    pub fn clients_unicast_measurements(&self) -> bool {
        self.clients_unicast_measurements
    }

    pub fn set_clients_unicast_measurements(&mut self, enable: bool) {
        self.clients_unicast_measurements = enable;
    }

    /// Whether per-client measurements apply to `sta` under the current
    /// measurement mode.
    pub fn should_measure_station(&self, sta: &StationRecord) -> bool {
        match self.clients_measurement_mode {
            ClientsMeasurementMode::DisableAll => false,
            ClientsMeasurementMode::EnableAll => true,
            ClientsMeasurementMode::OnlyClientsSelectedForSteering => sta.measure_sta_enable(),
        }
    }
}

impl Default for StatsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsStore")
            .field("radio", &self.radio.iface())
            .field("vaps", &self.vaps.len())
            .field("stations", &self.stations.len())
            .field("poll", &self.poll)
            .finish()
    }
}
