// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Monitor tick driver
//!
//! [`StatsMonitor`] ties the store, the request queue and the per-window
//! engines together. An external driver refreshes the HAL counters, calls
//! [`StatsMonitor::process`] once per polling interval and advances the
//! poll counter afterwards.
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use radiomon::{MacAddr, MemoryTransport, MonitorConfig, StatsMonitor, StatsStore};
//!
//! let store = Arc::new(Mutex::new(StatsStore::new()));
//! let transport = Arc::new(MemoryTransport::new());
//!
//! let mut monitor = StatsMonitor::new(MonitorConfig::default());
//! assert!(monitor.attach(Some(store.clone()), Some(transport.clone())));
//!
//! store.lock().unwrap().sta_add(MacAddr::new([2, 0, 0, 0, 0, 1]), 0);
//! monitor.add_request(7, false, MacAddr::ZERO);
//! monitor.process(true);
//!
//! assert_eq!(transport.message_count(), 1);
//! ```

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::activity::{ActivityMode, ActivityModeTracker};
use crate::config::MonitorConfig;
use crate::error::{MonitorError, Result};
use crate::hal::EstimatedServiceParams;
use crate::liveness::{LivenessProbe, ProbeOutcome, ProbeSource};
use crate::load::LoadAggregator;
use crate::mac::MacAddr;
use crate::queue::{MeasurementRequest, RequestQueue};
use crate::report::{
    ActivityNotification, ApStats, BssidInfo, HostapStatsReport, LoadNotification,
    OutboundMessage, ReportBuilder, StaLinkMetricsReport, StaStatsEntry,
};
use crate::store::StatsStore;
use crate::transport::Transport;

/// Store handle shared between the monitor and the HAL collector.
pub type SharedStore = Arc<Mutex<StatsStore>>;

/// Transport handle shared with the session layer.
pub type SharedTransport = Arc<dyn Transport>;

/// Running totals of what the monitor did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorCounters {
    pub windows_processed: u64,
    pub hostap_fragments_sent: u64,
    pub link_metric_reports_sent: u64,
    pub activity_notifications_sent: u64,
    pub load_notifications_sent: u64,
    pub ap_metrics_reports_sent: u64,
    pub requests_abandoned: u64,
    pub send_failures: u64,
}

/// Measurement and notification engine for one radio.
pub struct StatsMonitor {
    config: MonitorConfig,
    store: Option<SharedStore>,
    transport: Option<SharedTransport>,
    queue: RequestQueue,
    load: LoadAggregator,
    activity: ActivityModeTracker,
    probe: LivenessProbe,
    counters: MonitorCounters,
    last_load_notification: Option<LoadNotification>,
}

fn lock_store(store: &SharedStore) -> MutexGuard<'_, StatsStore> {
    store.lock().unwrap_or_else(|e| e.into_inner())
}

impl StatsMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            queue: RequestQueue::new(),
            load: LoadAggregator::new(config.load.clone()),
            activity: ActivityModeTracker::new(config.activity.clone()),
            probe: LivenessProbe::new(config.arp.clone()),
            counters: MonitorCounters::default(),
            last_load_notification: None,
            store: None,
            transport: None,
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Attach the store and the transport.
    ///
    /// Returns false, changing nothing, when either is missing.
    pub fn attach(
        &mut self,
        store: Option<SharedStore>,
        transport: Option<SharedTransport>,
    ) -> bool {
        let (Some(store), Some(transport)) = (store, transport) else {
            log::error!("attach failed: store or transport missing");
            return false;
        };

        {
            let guard = lock_store(&store);
            self.probe
                .set_burst(guard.arp_burst_pkt_num(), guard.arp_burst_delay_ms());
        }
        self.store = Some(store);
        self.transport = Some(transport);
        self.queue.set_attached(true);
        log::info!("monitor attached");
        true
    }

    /// Detach from the store and the transport and drop queued requests.
    pub fn stop(&mut self) {
        self.store = None;
        self.transport = None;
        self.queue.set_attached(false);
        if !self.queue.is_empty() {
            log::debug!("dropping {} queued requests", self.queue.len());
        }
        self.queue.clear();
        log::info!("monitor stopped");
    }

    pub fn is_attached(&self) -> bool {
        self.store.is_some() && self.transport.is_some()
    }

    /// Queue a measurement request. `MacAddr::ZERO` asks for the whole
    /// radio.
    pub fn add_request(&self, message_id: u16, sync: bool, mac: MacAddr) -> bool {
        self.queue.add_request(message_id, sync, mac)
    }

    /// Handle for queueing requests from other threads.
    pub fn queue(&self) -> RequestQueue {
        self.queue.clone()
    }

    pub fn activity_mode(&self) -> ActivityMode {
        self.activity.mode()
    }

    pub fn counters(&self) -> MonitorCounters {
        self.counters
    }

    pub fn last_load_notification(&self) -> Option<LoadNotification> {
        self.last_load_notification
    }

    /// Run one tick.
    ///
    /// Does nothing unless this is the last poll of the window or
    /// `instant_handling` is set. Failures are logged and never leave the
    /// tick.
    pub fn process(&mut self, instant_handling: bool) {
        let (Some(store), Some(transport)) = (self.store.clone(), self.transport.clone()) else {
            log::trace!("process called while detached");
            return;
        };
        let mut store = lock_store(&store);

        if !store.poll().is_last_poll() && !instant_handling {
            return;
        }
        if self.config.load.gate_on_pending_request && !self.queue.is_pending() {
            return;
        }
        self.counters.windows_processed += 1;

        let now = store.now();
        let hal = store.radio().stats.hal_stats;
        if let Some(mode) = self
            .activity
            .update(hal.rx_bytes.saturating_add(hal.tx_bytes), now)
        {
            log::info!("radio activity mode changed to {}", mode);
            let message = OutboundMessage::ActivityNotification(ActivityNotification { mode });
            if self.send(transport.as_ref(), message) {
                self.counters.activity_notifications_sent += 1;
            }
        }

        if let Some(request) = self.queue.pop() {
            self.serve_request(&store, transport.as_ref(), request);
        }

        let outcome = self.load.run_window(&mut store);
        if let Some(notification) = outcome.notification {
            log::debug!(
                "load notification: channel {}%, {} active clients",
                notification.channel_load_percent,
                notification.active_client_count
            );
            self.last_load_notification = Some(notification);
            if self.send(
                transport.as_ref(),
                OutboundMessage::LoadNotification(notification),
            ) {
                self.counters.load_notifications_sent += 1;
            }
        }

        self.queue.settle();
    }

    fn send(&mut self, transport: &dyn Transport, message: OutboundMessage) -> bool {
        let kind = message.kind();
        if transport.send(message) {
            true
        } else {
            log::error!("failed to send {}", kind);
            self.counters.send_failures += 1;
            false
        }
    }

    fn serve_request(
        &mut self,
        store: &StatsStore,
        transport: &dyn Transport,
        request: MeasurementRequest,
    ) {
        if request.is_wildcard() {
            self.send_hostap_report(store, transport, request.message_id);
        } else {
            self.send_link_metrics(store, transport, request);
        }
    }

    /// Send the radio and station statistics, split over as many messages
    /// as the transport's payload budget requires.
    fn send_hostap_report(&mut self, store: &StatsStore, transport: &dyn Transport, message_id: u16) {
        let capacity = HostapStatsReport::stations_per_message(transport.max_payload());
        if capacity == 0 {
            log::error!(
                "payload of {} bytes cannot carry a station entry, abandoning request {}",
                transport.max_payload(),
                message_id
            );
            self.counters.requests_abandoned += 1;
            return;
        }

        let ap_stats = ApStats::from_radio(store.radio());
        let entries: Vec<StaStatsEntry> = store
            .stations()
            .map(StaStatsEntry::from_station)
            .collect();

        let fragments: Vec<&[StaStatsEntry]> = if entries.is_empty() {
            vec![&entries[..0]]
        } else {
            entries.chunks(capacity).collect()
        };
        let last = fragments.len() - 1;

        for (index, chunk) in fragments.into_iter().enumerate() {
            let report = HostapStatsReport {
                message_id,
                fragment: u16::try_from(index).unwrap_or(u16::MAX),
                more_fragments: index < last,
                ap_stats: ap_stats.clone(),
                sta_stats: chunk.to_vec(),
            };
            if !self.send(transport, OutboundMessage::HostapStats(report)) {
                log::warn!(
                    "abandoning request {} after {} of {} fragments",
                    message_id,
                    index,
                    last + 1
                );
                self.counters.requests_abandoned += 1;
                return;
            }
            self.counters.hostap_fragments_sent += 1;
        }
        log::debug!(
            "request {}: {} stations in {} messages",
            message_id,
            entries.len(),
            last + 1
        );
    }

    fn send_link_metrics(
        &mut self,
        store: &StatsStore,
        transport: &dyn Transport,
        request: MeasurementRequest,
    ) {
        let Some(sta) = store.sta_find(request.mac) else {
            log::error!(
                "request {}: station {} not found",
                request.message_id,
                request.mac
            );
            self.counters.requests_abandoned += 1;
            return;
        };
        let bssid = match store.sta_vap(request.mac) {
            Some(vap) => vap.bssid(),
            None => {
                log::debug!(
                    "request {}: station {} has no VAP, reporting without BSSID",
                    request.message_id,
                    request.mac
                );
                MacAddr::ZERO
            }
        };

        let report = StaLinkMetricsReport {
            message_id: request.message_id,
            sta_mac: sta.mac(),
            bssid_info: vec![BssidInfo::from_station(bssid, sta)],
        };
        if self.send(transport, OutboundMessage::StaLinkMetrics(report)) {
            self.counters.link_metric_reports_sent += 1;
        }
    }

    /// Build and send an AP metrics report covering every VAP.
    ///
    /// # Arguments
    ///
    /// * `message_id` - Id of the originating query
    /// * `radio_uid` - Identifier of the radio in the report
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The monitor is not attached
    /// - The report does not fit into one message
    pub fn send_ap_metrics_report(&mut self, message_id: u16, radio_uid: MacAddr) -> Result<()> {
        let (Some(store), Some(transport)) = (self.store.clone(), self.transport.clone()) else {
            return Err(MonitorError::NotAttached);
        };
        let store = lock_store(&store);
        let radio = store.radio();
        let policy = radio.ap_metrics_reporting_info();

        let mut builder = ReportBuilder::new(message_id, transport.max_payload());
        for vap in store.vaps() {
            builder.add_ap_metrics(vap, radio, EstimatedServiceParams::best_effort())?;
            builder.add_ap_extended_metrics(vap)?;

            let stations = store
                .stations()
                .filter(|sta| sta.vap_id() == vap.vap_id() && store.should_measure_station(sta));
            for sta in stations {
                if policy.include_associated_sta_traffic_stats {
                    builder.add_sta_traffic_stats(sta)?;
                }
                if policy.include_associated_sta_link_metrics {
                    builder.add_sta_link_metrics(vap.bssid(), sta)?;
                }
                if policy.include_associated_wifi_6_sta_status_report {
                    builder.add_wifi6_sta_status_report(sta)?;
                }
            }

            if vap.stats.hal_stats.mlo_stats.tx_packets_cnt > 0
                || vap.stats.hal_stats.mlo_stats.rx_packets_cnt > 0
            {
                builder.add_affiliated_ap_metrics(vap)?;
            }
        }
        if store.radio_stats_enable() {
            builder.add_radio_metrics(radio_uid, radio)?;
        }

        let report = builder.build();
        log::debug!(
            "ap metrics report {}: {} sections",
            message_id,
            report.sections.len()
        );
        if self.send(transport.as_ref(), OutboundMessage::ApMetrics(report)) {
            self.counters.ap_metrics_reports_sent += 1;
        }
        Ok(())
    }

    /// Start a liveness probe for `mac` and remember `message_id` so the
    /// outcome can answer it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The monitor is not attached
    /// - Unicast measurements are disabled
    /// - The station does not exist or has no IPv4 address
    pub fn request_station_rssi(&mut self, mac: MacAddr, message_id: u16) -> Result<()> {
        let store = self.store.clone().ok_or(MonitorError::NotAttached)?;
        let mut store = lock_store(&store);
        if !store.clients_unicast_measurements() {
            return Err(MonitorError::ProbeUnavailable {
                mac,
                reason: "unicast measurements disabled".to_string(),
            });
        }

        let now = store.now();
        let sta = store
            .sta_find_mut(mac)
            .ok_or(MonitorError::StationNotFound(mac))?;
        self.probe.start(sta, now)?;
        sta.pending_rssi_request_ids.push(message_id);
        Ok(())
    }

    /// Advance every running probe by one step.
    pub fn probe_tick(&mut self) -> Vec<ProbeOutcome> {
        let (Some(store), Some(transport)) = (self.store.clone(), self.transport.clone()) else {
            return Vec::new();
        };
        let mut store = lock_store(&store);
        let now = store.now();

        let active: Vec<MacAddr> = store
            .stations()
            .filter(|sta| sta.probe.is_active())
            .map(|sta| sta.mac())
            .collect();

        let mut outcomes = Vec::new();
        for mac in active {
            let Some((sta, vap)) = store.station_with_vap_mut(mac) else {
                continue;
            };
            let source = vap.map(ProbeSource::from_vap);
            if let Some(outcome) = self.probe.tick(sta, source, now, transport.as_ref()) {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Route a probe reply from `ipv4`. Returns false when no station has
    /// that address.
    pub fn on_probe_reply(&mut self, ipv4: Ipv4Addr) -> bool {
        let Some(store) = self.store.clone() else {
            return false;
        };
        let mut store = lock_store(&store);
        let now = store.now();
        match store.sta_find_by_ipv4_mut(ipv4) {
            Some(sta) => {
                self.probe.on_reply(sta, now);
                true
            }
            None => {
                log::trace!("probe reply from unknown address {}", ipv4);
                false
            }
        }
    }
}

impl Default for StatsMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl std::fmt::Debug for StatsMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsMonitor")
            .field("attached", &self.is_attached())
            .field("queued", &self.queue.len())
            .field("activity", &self.activity.mode())
            .field("counters", &self.counters)
            .finish()
    }
}
