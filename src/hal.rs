// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Raw counter snapshots handed over by the driver layer.
//!
//! The HAL refreshes these between ticks through the `update_*` methods of
//! [`StatsStore`](crate::StatsStore). Radio and VAP byte counters are
//! cumulative; station counters cover the last sampling interval.

use serde::{Deserialize, Serialize};

/// Number of 802.11 QoS traffic identifiers reported per station.
pub const QOS_TID_COUNT: usize = 8;

/// Radio-level counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioHalStats {
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub tx_packets: u32,
    pub rx_packets: u32,
    pub errors_sent: u32,
    pub errors_received: u32,
    pub tx_retries: u32,
    /// Noise floor (dBm)
    pub noise: i8,
    /// ANPI encoded noise (radio metrics)
    pub anpi_noise: u8,
    /// Airtime spent transmitting, 255 = 100%
    pub transmit: u8,
    /// Airtime spent receiving from own BSSs, 255 = 100%
    pub receive_self: u8,
    /// Airtime spent receiving foreign PPDUs, 255 = 100%
    pub receive_other: u8,
}

/// Multi-link (affiliated AP) counters of a VAP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MloStats {
    pub tx_packets_cnt: u32,
    pub rx_packets_cnt: u32,
    pub tx_packets_err_cnt: u32,
    pub tx_ucast_bytes: u64,
    pub rx_ucast_bytes: u64,
    pub tx_mcast_bytes: u64,
    pub rx_mcast_bytes: u64,
    pub tx_bcast_bytes: u64,
    pub rx_bcast_bytes: u64,
}

/// VAP (BSS) counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VapHalStats {
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub tx_packets: u32,
    pub rx_packets: u32,
    pub errors_sent: u32,
    pub errors_received: u32,
    pub retrans_count: u32,
    pub tx_ucast_bytes: u64,
    pub rx_ucast_bytes: u64,
    pub tx_mcast_bytes: u64,
    pub rx_mcast_bytes: u64,
    pub tx_bcast_bytes: u64,
    pub rx_bcast_bytes: u64,
    pub mlo_stats: MloStats,
}

/// Station counters and instantaneous link samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaHalStats {
    /// Bytes sent to the station during the last interval
    pub tx_bytes: u64,
    /// Bytes received from the station during the last interval
    pub rx_bytes: u64,
    pub tx_packets: u32,
    pub rx_packets: u32,
    pub retrans_count: u32,
    /// Current downlink PHY rate sample (100 kb/s units)
    pub tx_phy_rate_100kb: u16,
    /// Current uplink PHY rate sample (100 kb/s units)
    pub rx_phy_rate_100kb: u16,
    /// Downlink channel bandwidth (MHz)
    pub dl_bandwidth: u16,

    // Cumulative traffic counters (traffic-stats reports)
    pub tx_bytes_cnt: u64,
    pub rx_bytes_cnt: u64,
    pub tx_packets_cnt: u32,
    pub rx_packets_cnt: u32,
    pub tx_errors_cnt: u32,
    pub rx_errors_cnt: u32,
}

/// Per-TID queue sizes of a WiFi 6 station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaQosCtrlParams {
    pub tid_queue_size: [u8; QOS_TID_COUNT],
}

/// Which access categories carry estimated service parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatedServiceParams {
    pub include_ac_be: bool,
    pub include_ac_bk: bool,
    pub include_ac_vo: bool,
    pub include_ac_vi: bool,
}

impl EstimatedServiceParams {
    /// Size of one access-category info field.
    pub const AC_INFO_SIZE: usize = 3;

    /// Best-effort only; the minimum an AP must report.
    pub fn best_effort() -> Self {
        Self {
            include_ac_be: true,
            ..Self::default()
        }
    }

    /// Number of included access categories.
    pub fn included_count(&self) -> usize {
        [
            self.include_ac_be,
            self.include_ac_bk,
            self.include_ac_vo,
            self.include_ac_vi,
        ]
        .iter()
        .filter(|included| **included)
        .count()
    }

    /// Bytes taken by the info fields.
    pub fn info_field_size(&self) -> usize {
        self.included_count() * Self::AC_INFO_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_service_params_size() {
        assert_eq!(EstimatedServiceParams::default().info_field_size(), 0);
        assert_eq!(EstimatedServiceParams::best_effort().info_field_size(), 3);

        let all = EstimatedServiceParams {
            include_ac_be: true,
            include_ac_bk: true,
            include_ac_vo: true,
            include_ac_vi: true,
        };
        assert_eq!(all.included_count(), 4);
        assert_eq!(all.info_field_size(), 12);
    }

    #[test]
    fn test_qos_params_default() {
        let params = StaQosCtrlParams::default();
        assert_eq!(params.tid_queue_size.len(), QOS_TID_COUNT);
        assert!(params.tid_queue_size.iter().all(|q| *q == 0));
    }
}
