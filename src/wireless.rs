// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Radio unit conversions.

/// Sentinel for "no RSSI measurement available"
pub const RSSI_INVALID: i8 = -127;

/// Sentinel for "no SNR measurement available"
pub const SNR_INVALID: i8 = 0;

/// RCPI value meaning "measurement not available"
pub const RCPI_INVALID: u8 = 255;

/// Highest valid RCPI encoding (221..=254 are reserved)
pub const RCPI_MAX: u8 = 220;

/// Convert RSSI (dBm) to RCPI.
///
/// RCPI = (dBm + 110) * 2, limited to 0..=220.
pub fn rcpi_from_rssi(rssi: i8) -> u8 {
    if rssi == RSSI_INVALID {
        return RCPI_INVALID;
    }
    let rcpi = (i16::from(rssi) + 110) * 2;
    rcpi.clamp(0, i16::from(RCPI_MAX)) as u8
}

/// Convert RCPI back to RSSI (dBm); reserved codes map to [`RSSI_INVALID`].
pub fn rssi_from_rcpi(rcpi: u8) -> i8 {
    if rcpi > RCPI_MAX {
        return RSSI_INVALID;
    }
    (i16::from(rcpi) / 2 - 110) as i8
}

/// PHY rate in 100 kb/s units to Mb/s.
///
/// Also used as the estimated MAC data rate: the agent has no separate
/// MAC-layer throughput estimate.
pub fn phy_rate_mbps(phy_rate_100kb: u16) -> f64 {
    f64::from(phy_rate_100kb) / 10.0
}

/// Integer Mb/s estimate carried by link-metric reports.
pub fn estimated_mac_rate_mbps(phy_rate_100kb: u16) -> u32 {
    u32::from(phy_rate_100kb / 10)
}

/// Bit rate in Mb/s for `bytes` transferred over `delta_ms`.
pub fn bit_rate_mbps(bytes: u64, delta_ms: u16) -> f64 {
    if delta_ms == 0 {
        return 0.0;
    }
    (bytes as f64 * 8.0) / (f64::from(delta_ms) * 1000.0)
}

/// Airtime load percentage of a link: bit rate over PHY rate.
///
/// Not clamped; callers clamp and warn.
pub fn load_percent(bytes: u64, delta_ms: u16, phy_rate_100kb: u16) -> f64 {
    let phy = phy_rate_mbps(phy_rate_100kb);
    if phy <= 0.0 {
        return 0.0;
    }
    100.0 * bit_rate_mbps(bytes, delta_ms) / phy
}
