// Radiomon Exporter - Simulated driver counters
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Simulated HAL producing deterministic counters from a seeded RNG.
//!
//! Each station follows a bounded random walk of its offered load, so the
//! radio drifts in and out of the alerting thresholds over time.

use radiomon::{MacAddr, RadioHalStats, StaHalStats, StatsStore, VapHalStats};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::Ipv4Addr;

/// Number of VAPs the simulated radio hosts.
pub const SIM_VAP_COUNT: u8 = 2;

#[derive(Debug, Clone)]
struct SimStation {
    mac: MacAddr,
    vap_id: u8,
    /// Offered load as a fraction of the PHY rate
    tx_share: f64,
    rx_share: f64,
    phy_rate_100kb: u16,
    rssi: i8,
}

/// Seeded counter generator for one radio.
#[derive(Debug)]
pub struct SimulatedHal {
    rng: StdRng,
    stations: Vec<SimStation>,
    radio: RadioHalStats,
    vaps: Vec<VapHalStats>,
    polling_rate_ms: u32,
}

impl SimulatedHal {
    pub fn new(seed: u64, station_count: u16, polling_rate_ms: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let stations = (0..station_count)
            .map(|i| {
                let [hi, lo] = i.to_be_bytes();
                SimStation {
                    mac: MacAddr::new([0x02, 0x5a, 0x00, 0x00, hi, lo]),
                    vap_id: (i % u16::from(SIM_VAP_COUNT)) as u8,
                    tx_share: rng.gen_range(0.0..0.05),
                    rx_share: rng.gen_range(0.0..0.05),
                    phy_rate_100kb: rng.gen_range(60..=24_000),
                    rssi: rng.gen_range(-85..=-35),
                }
            })
            .collect();

        Self {
            rng,
            stations,
            radio: RadioHalStats::default(),
            vaps: vec![VapHalStats::default(); usize::from(SIM_VAP_COUNT)],
            polling_rate_ms: polling_rate_ms.max(1),
        }
    }

    pub fn station_count(&self) -> usize {
        self.stations.len()
    }

    /// Provision the simulated VAPs and stations into `store`.
    pub fn populate(&self, store: &mut StatsStore) -> radiomon::Result<()> {
        store.radio_mut().set_iface("wlan0");
        store.radio_mut().set_channel(36);
        for vap_id in 0..SIM_VAP_COUNT {
            let vap = store.vap_add(&format!("wlan0.{}", vap_id), vap_id)?;
            vap.set_bssid(MacAddr::new([0x02, 0x5a, 0xff, 0x00, 0x00, vap_id]));
            vap.set_bridge_iface("br-lan");
            vap.set_bridge_mac(MacAddr::new([0x02, 0x5a, 0xfe, 0x00, 0x00, 0x01]));
            vap.set_bridge_ipv4(Some(Ipv4Addr::new(192, 168, 1, 1)));
        }
        for (i, sta) in self.stations.iter().enumerate() {
            let host = (i % 250) as u8 + 2;
            store
                .sta_add(sta.mac, sta.vap_id)
                .set_ipv4(Some(Ipv4Addr::new(192, 168, 1, host)));
        }
        store.set_hostapd_enabled(true);
        store.set_ap_tx_enabled(true);
        Ok(())
    }

    /// Produce one polling interval of counters and write them into the
    /// store.
    pub fn poll(&mut self, store: &mut StatsStore) {
        let now = store.now();
        let mut radio_airtime = 0.0;
        let mut samples = Vec::with_capacity(self.stations.len());

        for sta in &mut self.stations {
            sta.tx_share = walk(&mut self.rng, sta.tx_share);
            sta.rx_share = walk(&mut self.rng, sta.rx_share);
            sta.rssi = (sta.rssi + self.rng.gen_range(-2..=2)).clamp(-95, -20);

            // bytes = share * phy(Mb/s) * interval(ms) * 125
            let phy_mbps = f64::from(sta.phy_rate_100kb) / 10.0;
            let budget = phy_mbps * f64::from(self.polling_rate_ms) * 125.0;
            let tx_bytes = (sta.tx_share * budget) as u64;
            let rx_bytes = (sta.rx_share * budget) as u64;
            radio_airtime += sta.tx_share + sta.rx_share;

            let vap = &mut self.vaps[usize::from(sta.vap_id)];
            vap.tx_bytes += tx_bytes;
            vap.rx_bytes += rx_bytes;
            vap.tx_ucast_bytes += tx_bytes;
            vap.rx_ucast_bytes += rx_bytes;
            vap.tx_packets = vap.tx_packets.wrapping_add((tx_bytes / 1200) as u32);
            vap.rx_packets = vap.rx_packets.wrapping_add((rx_bytes / 1200) as u32);

            let hal = StaHalStats {
                tx_bytes,
                rx_bytes,
                tx_packets: (tx_bytes / 1200) as u32,
                rx_packets: (rx_bytes / 1200) as u32,
                retrans_count: self.rng.gen_range(0..10),
                tx_phy_rate_100kb: sta.phy_rate_100kb,
                rx_phy_rate_100kb: sta.phy_rate_100kb.saturating_sub(self.rng.gen_range(0..50)),
                dl_bandwidth: 80,
                ..Default::default()
            };
            samples.push((sta.mac, hal, sta.rssi));

            self.radio.tx_bytes += tx_bytes;
            self.radio.rx_bytes += rx_bytes;
        }

        self.radio.tx_retries = self.radio.tx_retries.wrapping_add(self.rng.gen_range(0..20));
        self.radio.noise = self.rng.gen_range(-95..=-88);
        store.update_radio_stats(self.radio, now);

        // foreign traffic on top of our own stations
        let foreign = self.rng.gen_range(0.0..0.3);
        let channel_load = ((radio_airtime + foreign) * 100.0).round().min(255.0) as u8;
        store.set_channel_load(channel_load);

        for (vap_id, hal) in self.vaps.iter().enumerate() {
            if let Err(e) = store.update_vap_stats(vap_id as u8, *hal, now) {
                tracing::warn!("Failed to update VAP {}: {}", vap_id, e);
            }
        }
        for (mac, hal, rssi) in samples {
            let snr = rssi.saturating_sub(self.radio.noise);
            if let Err(e) = store.update_sta_stats(mac, hal, rssi, snr, now) {
                tracing::warn!("Failed to update station {}: {}", mac, e);
            }
        }
    }
}

/// Bounded random walk of a load share.
fn walk(rng: &mut StdRng, share: f64) -> f64 {
    (share + rng.gen_range(-0.01..0.01)).clamp(0.0, 0.25)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_populate() {
        let hal = SimulatedHal::new(1, 10, 250);
        let mut store = StatsStore::new();
        hal.populate(&mut store).unwrap();

        assert_eq!(store.vap_count(), usize::from(SIM_VAP_COUNT));
        assert_eq!(store.sta_count(), 10);
        assert_eq!(store.vap_get_by_id(0).unwrap().sta_count(), 5);
        assert!(store.stations().all(|sta| sta.ipv4().is_some()));
    }

    #[test]
    fn test_same_seed_same_counters() {
        let mut a = SimulatedHal::new(7, 4, 250);
        let mut b = SimulatedHal::new(7, 4, 250);
        let mut store_a = StatsStore::new();
        let mut store_b = StatsStore::new();
        a.populate(&mut store_a).unwrap();
        b.populate(&mut store_b).unwrap();

        for _ in 0..3 {
            a.poll(&mut store_a);
            b.poll(&mut store_b);
        }
        assert_eq!(
            store_a.radio().stats.hal_stats,
            store_b.radio().stats.hal_stats
        );
        assert_eq!(
            store_a.radio().stats.channel_load_tot_curr,
            store_b.radio().stats.channel_load_tot_curr
        );
    }

    #[test]
    fn test_radio_counters_grow() {
        let mut hal = SimulatedHal::new(3, 8, 250);
        let mut store = StatsStore::new();
        hal.populate(&mut store).unwrap();

        hal.poll(&mut store);
        let first = store.radio().stats.hal_stats.tx_bytes;
        hal.poll(&mut store);
        assert!(store.radio().stats.hal_stats.tx_bytes >= first);
        assert_eq!(store.radio().stats.sta_count, 8);
    }
}
