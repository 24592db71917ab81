// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Outbound reports and the size-bounded report builder
//!
//! Messages are described by their logical content. Every section has a
//! fixed encoded size so a builder can decide, before anything is sent,
//! whether it still fits into the transport's payload budget.
//!
//! # Encoded sizes
//!
//! ```text
//! message header ............................  8
//! hostap AP stats ........................... 44
//! hostap station entry ...................... 40
//! section header (type + length) ............  3
//! ```

use serde::Serialize;

use crate::activity::ActivityMode;
use crate::error::{MonitorError, Result};
use crate::hal::{EstimatedServiceParams, QOS_TID_COUNT};
use crate::mac::MacAddr;
use crate::store::{RadioRecord, StationRecord, VapRecord};
use crate::wireless;

/// Payload budget used when the transport does not specify one.
pub const DEFAULT_MAX_PAYLOAD: usize = 1500;

/// Message header (id, fragment index, flags).
pub const MESSAGE_HEADER_SIZE: usize = 8;

/// Radio-level block of a hostap stats report.
pub const AP_STATS_SIZE: usize = 44;

/// One station entry of a hostap stats report.
pub const STA_STATS_ENTRY_SIZE: usize = 40;

/// Type and length prefix of a metrics section.
pub const SECTION_HEADER_SIZE: usize = 3;

/// One BSSID info entry of a link-metrics section.
pub const BSSID_INFO_SIZE: usize = 19;

// Section bodies
const AP_METRICS_BASE_SIZE: usize = 6 + 1 + 2 + 1;
const AP_EXTENDED_METRICS_SIZE: usize = 6 + 6 * 4;
const STA_TRAFFIC_STATS_SIZE: usize = 6 + 7 * 4;
const STA_LINK_METRICS_BASE_SIZE: usize = 6 + 1;
const WIFI6_STATUS_BASE_SIZE: usize = 6 + 1;
const TID_QUEUE_ENTRY_SIZE: usize = 2;
const RADIO_METRICS_SIZE: usize = 6 + 4;
const AFFILIATED_AP_METRICS_SIZE: usize = 6 + 3 * 4 + 6 * 4;

/// Radio-level counters of a hostap stats report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApStats {
    pub stats_delta_ms: u16,
    pub rx_packets: u32,
    pub tx_packets: u32,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub errors_sent: u32,
    pub errors_received: u32,
    pub retrans_count: u32,
    pub noise: i8,
    pub channel_load_percent: u8,
    pub client_count: u32,
    pub active_client_count: u32,
    pub client_tx_load_percent: u8,
    pub client_rx_load_percent: u8,
}

impl ApStats {
    /// Snapshot the radio record. Percentages are reported clamped.
    pub fn from_radio(radio: &RadioRecord) -> Self {
        let stats = &radio.stats;
        Self {
            stats_delta_ms: stats.delta_ms,
            rx_packets: stats.hal_stats.rx_packets,
            tx_packets: stats.hal_stats.tx_packets,
            rx_bytes: stats.hal_stats.rx_bytes,
            tx_bytes: stats.hal_stats.tx_bytes,
            errors_sent: stats.hal_stats.errors_sent,
            errors_received: stats.hal_stats.errors_received,
            retrans_count: stats.total_retrans_count,
            noise: stats.hal_stats.noise,
            channel_load_percent: stats.channel_load_tot_curr.min(100),
            client_count: stats.sta_count,
            active_client_count: stats.active_client_count_curr,
            client_tx_load_percent: stats.client_tx_load_tot_curr.min(100) as u8,
            client_rx_load_percent: stats.client_rx_load_tot_curr.min(100) as u8,
        }
    }
}

/// One station of a hostap stats report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StaStatsEntry {
    pub mac: MacAddr,
    pub rx_packets: u32,
    pub tx_packets: u32,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub retrans_count: u32,
    pub dl_bandwidth: u16,
    pub tx_phy_rate_100kb: u16,
    pub rx_phy_rate_100kb: u16,
    pub tx_load_percent: u8,
    pub rx_load_percent: u8,
    pub stats_delta_ms: u16,
    pub rx_rssi: i8,
}

impl StaStatsEntry {
    pub fn from_station(sta: &StationRecord) -> Self {
        let stats = &sta.stats;
        Self {
            mac: sta.mac(),
            rx_packets: stats.hal_stats.rx_packets,
            tx_packets: stats.hal_stats.tx_packets,
            tx_bytes: stats.hal_stats.tx_bytes,
            rx_bytes: stats.hal_stats.rx_bytes,
            retrans_count: stats.hal_stats.retrans_count,
            dl_bandwidth: stats.hal_stats.dl_bandwidth,
            tx_phy_rate_100kb: stats.tx_phy_rate_100kb_avg,
            rx_phy_rate_100kb: stats.rx_phy_rate_100kb_avg,
            tx_load_percent: stats.tx_load_percent_curr,
            rx_load_percent: stats.rx_load_percent_curr,
            stats_delta_ms: stats.delta_ms,
            rx_rssi: stats.rx_rssi_curr,
        }
    }
}

/// One fragment of a hostap stats measurement report.
///
/// Every fragment repeats the radio block and the originating message id;
/// station entries are spread across fragments without overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostapStatsReport {
    pub message_id: u16,
    pub fragment: u16,
    pub more_fragments: bool,
    pub ap_stats: ApStats,
    pub sta_stats: Vec<StaStatsEntry>,
}

impl HostapStatsReport {
    /// Payload size needed for a fragment carrying `stations` entries.
    pub fn payload_for_stations(stations: usize) -> usize {
        MESSAGE_HEADER_SIZE + AP_STATS_SIZE + stations * STA_STATS_ENTRY_SIZE
    }

    /// Station entries that fit into a payload of `max_payload` bytes.
    pub fn stations_per_message(max_payload: usize) -> usize {
        max_payload.saturating_sub(MESSAGE_HEADER_SIZE + AP_STATS_SIZE) / STA_STATS_ENTRY_SIZE
    }

    pub fn encoded_size(&self) -> usize {
        Self::payload_for_stations(self.sta_stats.len())
    }
}

/// Link metrics measured for one BSS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BssidInfo {
    pub bssid: MacAddr,
    pub earliest_measurement_delta_ms: u32,
    pub downlink_estimated_mac_data_rate_mbps: u32,
    pub uplink_estimated_mac_data_rate_mbps: u32,
    pub sta_measured_uplink_rcpi: u8,
}

impl BssidInfo {
    /// Link metrics of `sta` as seen on `bssid`.
    pub fn from_station(bssid: MacAddr, sta: &StationRecord) -> Self {
        let stats = &sta.stats;
        Self {
            bssid,
            earliest_measurement_delta_ms: u32::from(stats.delta_ms),
            downlink_estimated_mac_data_rate_mbps: wireless::estimated_mac_rate_mbps(
                stats.rx_phy_rate_100kb_avg,
            ),
            uplink_estimated_mac_data_rate_mbps: wireless::estimated_mac_rate_mbps(
                stats.tx_phy_rate_100kb_avg,
            ),
            sta_measured_uplink_rcpi: wireless::rcpi_from_rssi(stats.rx_rssi_curr),
        }
    }
}

/// Associated-station link metric report for a single station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaLinkMetricsReport {
    pub message_id: u16,
    pub sta_mac: MacAddr,
    pub bssid_info: Vec<BssidInfo>,
}

/// Radio activity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActivityNotification {
    pub mode: ActivityMode,
}

/// Radio load change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadNotification {
    pub stats_delta_ms: u16,
    pub active_client_count: u32,
    pub client_tx_load_percent: u8,
    pub client_rx_load_percent: u8,
    pub channel_load_percent: u8,
}

/// Sections of an AP metrics report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReportSection {
    ApMetrics {
        bssid: MacAddr,
        channel_utilization: u8,
        sta_count: u32,
        service_params: EstimatedServiceParams,
    },
    ApExtendedMetrics {
        bssid: MacAddr,
        unicast_bytes_sent: u64,
        unicast_bytes_received: u64,
        multicast_bytes_sent: u64,
        multicast_bytes_received: u64,
        broadcast_bytes_sent: u64,
        broadcast_bytes_received: u64,
    },
    StaTrafficStats {
        sta_mac: MacAddr,
        bytes_sent: u64,
        bytes_received: u64,
        packets_sent: u32,
        packets_received: u32,
        tx_packets_errors: u32,
        rx_packets_errors: u32,
        retransmission_count: u32,
    },
    StaLinkMetrics {
        sta_mac: MacAddr,
        bssid_info: Vec<BssidInfo>,
    },
    Wifi6StaStatus {
        sta_mac: MacAddr,
        tid_queue_sizes: Vec<(u8, u8)>,
    },
    RadioMetrics {
        radio_uid: MacAddr,
        noise: u8,
        transmit: u8,
        receive_self: u8,
        receive_other: u8,
    },
    AffiliatedApMetrics {
        bssid: MacAddr,
        packets_sent: u32,
        packets_received: u32,
        packets_sent_errors: u32,
        unicast_bytes_sent: u64,
        unicast_bytes_received: u64,
        multicast_bytes_sent: u64,
        multicast_bytes_received: u64,
        broadcast_bytes_sent: u64,
        broadcast_bytes_received: u64,
    },
}

impl ReportSection {
    /// Encoded size including the section header.
    pub fn encoded_size(&self) -> usize {
        let body = match self {
            Self::ApMetrics { service_params, .. } => {
                AP_METRICS_BASE_SIZE + service_params.info_field_size()
            }
            Self::ApExtendedMetrics { .. } => AP_EXTENDED_METRICS_SIZE,
            Self::StaTrafficStats { .. } => STA_TRAFFIC_STATS_SIZE,
            Self::StaLinkMetrics { bssid_info, .. } => {
                STA_LINK_METRICS_BASE_SIZE + bssid_info.len() * BSSID_INFO_SIZE
            }
            Self::Wifi6StaStatus {
                tid_queue_sizes, ..
            } => WIFI6_STATUS_BASE_SIZE + tid_queue_sizes.len() * TID_QUEUE_ENTRY_SIZE,
            Self::RadioMetrics { .. } => RADIO_METRICS_SIZE,
            Self::AffiliatedApMetrics { .. } => AFFILIATED_AP_METRICS_SIZE,
        };
        SECTION_HEADER_SIZE + body
    }
}

/// AP metrics report assembled by [`ReportBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApMetricsReport {
    pub message_id: u16,
    pub sections: Vec<ReportSection>,
}

/// Message handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundMessage {
    HostapStats(HostapStatsReport),
    StaLinkMetrics(StaLinkMetricsReport),
    ActivityNotification(ActivityNotification),
    LoadNotification(LoadNotification),
    ApMetrics(ApMetricsReport),
}

impl OutboundMessage {
    /// Short name for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HostapStats(_) => "hostap_stats",
            Self::StaLinkMetrics(_) => "sta_link_metrics",
            Self::ActivityNotification(_) => "activity_notification",
            Self::LoadNotification(_) => "load_notification",
            Self::ApMetrics(_) => "ap_metrics",
        }
    }
}

/// Builder appending metrics sections into a size-bounded message.
///
/// Each `add_*` helper either appends its whole section or fails with
/// [`MonitorError::CapacityExceeded`] and leaves the message unchanged.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    message_id: u16,
    max_size: usize,
    size: usize,
    sections: Vec<ReportSection>,
}

impl ReportBuilder {
    /// Create a builder for a message of at most `max_size` bytes.
    pub fn new(message_id: u16, max_size: usize) -> Self {
        Self {
            message_id,
            max_size,
            size: MESSAGE_HEADER_SIZE,
            sections: Vec::new(),
        }
    }

    /// Remaining space in bytes
    pub fn remaining(&self) -> usize {
        self.max_size.saturating_sub(self.size)
    }

    pub fn current_size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// How many elements of `element_size` bytes still fit.
    pub fn elements_in_message(&self, element_size: usize) -> usize {
        if element_size == 0 {
            return 0;
        }
        self.remaining() / element_size
    }

    /// Append a section if it fits.
    pub fn try_push(&mut self, section: ReportSection) -> Result<()> {
        let needed = section.encoded_size();
        let available = self.remaining();
        if needed > available {
            log::error!(
                "no room for section: need {} bytes, have {}",
                needed,
                available
            );
            return Err(MonitorError::CapacityExceeded { needed, available });
        }
        self.size += needed;
        self.sections.push(section);
        Ok(())
    }

    /// BSSID, channel utilization, station count and the estimated
    /// service parameters of the included access categories.
    pub fn add_ap_metrics(
        &mut self,
        vap: &VapRecord,
        radio: &RadioRecord,
        service_params: EstimatedServiceParams,
    ) -> Result<()> {
        self.try_push(ReportSection::ApMetrics {
            bssid: vap.bssid(),
            channel_utilization: radio.channel_utilization(),
            sta_count: vap.sta_count(),
            service_params,
        })
    }

    /// Unicast, multicast and broadcast byte counters of a VAP.
    pub fn add_ap_extended_metrics(&mut self, vap: &VapRecord) -> Result<()> {
        let stats = &vap.stats.hal_stats;
        self.try_push(ReportSection::ApExtendedMetrics {
            bssid: vap.bssid(),
            unicast_bytes_sent: stats.tx_ucast_bytes,
            unicast_bytes_received: stats.rx_ucast_bytes,
            multicast_bytes_sent: stats.tx_mcast_bytes,
            multicast_bytes_received: stats.rx_mcast_bytes,
            broadcast_bytes_sent: stats.tx_bcast_bytes,
            broadcast_bytes_received: stats.rx_bcast_bytes,
        })
    }

    pub fn add_sta_traffic_stats(&mut self, sta: &StationRecord) -> Result<()> {
        let stats = &sta.stats.hal_stats;
        self.try_push(ReportSection::StaTrafficStats {
            sta_mac: sta.mac(),
            bytes_sent: stats.tx_bytes_cnt,
            bytes_received: stats.rx_bytes_cnt,
            packets_sent: stats.tx_packets_cnt,
            packets_received: stats.rx_packets_cnt,
            tx_packets_errors: stats.tx_errors_cnt,
            rx_packets_errors: stats.rx_errors_cnt,
            retransmission_count: stats.retrans_count,
        })
    }

    /// A station is associated with exactly one BSS, so the section always
    /// carries a single BSSID info entry.
    pub fn add_sta_link_metrics(&mut self, bssid: MacAddr, sta: &StationRecord) -> Result<()> {
        self.try_push(ReportSection::StaLinkMetrics {
            sta_mac: sta.mac(),
            bssid_info: vec![BssidInfo::from_station(bssid, sta)],
        })
    }

    pub fn add_wifi6_sta_status_report(&mut self, sta: &StationRecord) -> Result<()> {
        let tid_queue_sizes = (0..QOS_TID_COUNT)
            .map(|tid| (tid as u8, sta.qos_ctrl_params.tid_queue_size[tid]))
            .collect();
        self.try_push(ReportSection::Wifi6StaStatus {
            sta_mac: sta.mac(),
            tid_queue_sizes,
        })
    }

    pub fn add_radio_metrics(&mut self, radio_uid: MacAddr, radio: &RadioRecord) -> Result<()> {
        log::debug!("adding radio metrics for {}", radio.iface());
        let stats = &radio.stats.hal_stats;
        self.try_push(ReportSection::RadioMetrics {
            radio_uid,
            noise: stats.anpi_noise,
            transmit: stats.transmit,
            receive_self: stats.receive_self,
            receive_other: stats.receive_other,
        })
    }

    /// Multi-link aggregate counters of an affiliated AP.
    pub fn add_affiliated_ap_metrics(&mut self, vap: &VapRecord) -> Result<()> {
        let mlo = &vap.stats.hal_stats.mlo_stats;
        self.try_push(ReportSection::AffiliatedApMetrics {
            bssid: vap.bssid(),
            packets_sent: mlo.tx_packets_cnt,
            packets_received: mlo.rx_packets_cnt,
            packets_sent_errors: mlo.tx_packets_err_cnt,
            unicast_bytes_sent: mlo.tx_ucast_bytes,
            unicast_bytes_received: mlo.rx_ucast_bytes,
            multicast_bytes_sent: mlo.tx_mcast_bytes,
            multicast_bytes_received: mlo.rx_mcast_bytes,
            broadcast_bytes_sent: mlo.tx_bcast_bytes,
            broadcast_bytes_received: mlo.rx_bcast_bytes,
        })
    }

    /// Finish the report.
    pub fn build(self) -> ApMetricsReport {
        ApMetricsReport {
            message_id: self.message_id,
            sections: self.sections,
        }
    }
}
