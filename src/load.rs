// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Window load aggregation and load-notification hysteresis.
//!
//! At every window boundary the radio's channel load is rolled over, the
//! per-station tx/rx load percentages are recomputed and summed, and four
//! independent rules decide whether the controller hears about it:
//!
//! 1. channel load crossing the high threshold upward or the low
//!    threshold downward,
//! 2. channel load moving by the delta threshold while elevated,
//! 3. the active-station count crossing its minimum in either direction,
//! 4. while enough stations are active, a new active station or a client
//!    load move by the client delta threshold.
//!
//! Any rule firing yields one notification for the window.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::LoadConfig;
use crate::report::LoadNotification;
use crate::store::{RadioStats, StationRecord, StatsStore, VapRecord, VapStats};

/// Why a load notification fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadTrigger {
    ChannelLoadRising { load: u8 },
    ChannelLoadFalling { load: u8 },
    ChannelLoadDelta { delta: u8 },
    ActiveClientsRising { count: u32 },
    ActiveClientsFalling { count: u32 },
    ActiveClientAdded { count: u32 },
    ClientLoadDelta { delta: u32 },
}

/// Result of one window evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowOutcome {
    pub triggers: Vec<LoadTrigger>,
    pub notification: Option<LoadNotification>,
}

/// Clamp a computed load percentage to 0..=100.
fn clamp_load(value: f64, what: &str) -> u8 {
    if value > 100.0 {
        log::warn!("{} load {:.1}% above 100, clamping", what, value);
        100
    } else if value <= 0.0 {
        0
    } else {
        value.round() as u8
    }
}

/// Clamp a load accumulator to 100.
fn clamp_total(total: &mut u32, what: &str) {
    if *total > 100 {
        log::warn!("{} {}% above 100, clamping", what, total);
        *total = 100;
    }
}

/// Per-window load engine.
#[derive(Debug, Clone)]
pub struct LoadAggregator {
    config: LoadConfig,
}

impl LoadAggregator {
    pub fn new(config: LoadConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoadConfig {
        &self.config
    }

    /// Clamp the channel load, move current values to previous and zero
    /// the client accumulators. Returns the channel load of the previous
    /// window.
    pub fn rollover(radio: &mut RadioStats) -> u8 {
        let previous_window_load = radio.channel_load_tot_prev;
        if radio.channel_load_tot_curr > 100 {
            log::warn!(
                "channel load {}% above 100, clamping",
                radio.channel_load_tot_curr
            );
            radio.channel_load_tot_curr = 100;
        }
        radio.channel_load_tot_prev = radio.channel_load_tot_curr;

        radio.client_tx_load_tot_prev = radio.client_tx_load_tot_curr;
        radio.client_rx_load_tot_prev = radio.client_rx_load_tot_curr;
        radio.active_client_count_prev = radio.active_client_count_curr;
        radio.client_tx_load_tot_curr = 0;
        radio.client_rx_load_tot_curr = 0;
        radio.active_client_count_curr = 0;
        previous_window_load
    }

    fn rollover_vap(vap: &mut VapStats) {
        vap.client_tx_load_tot_prev = vap.client_tx_load_tot_curr;
        vap.client_rx_load_tot_prev = vap.client_rx_load_tot_curr;
        vap.active_client_count_prev = vap.active_client_count_curr;
        vap.client_tx_load_tot_curr = 0;
        vap.client_rx_load_tot_curr = 0;
        vap.active_client_count_curr = 0;
    }

    /// Recompute one station's load, add it to the radio totals and count
    /// the station as active when tx+rx reaches `active_threshold`.
    /// Returns the station's (tx, rx) load.
    pub fn calculate_client_load(
        sta: &mut StationRecord,
        radio: &mut RadioStats,
        active_threshold: u8,
    ) -> (u8, u8) {
        let tx = clamp_load(sta.load_tx_percentage(), "station tx");
        let rx = clamp_load(sta.load_rx_percentage(), "station rx");

        let stats = &mut sta.stats;
        stats.tx_load_percent_prev = stats.tx_load_percent_curr;
        stats.rx_load_percent_prev = stats.rx_load_percent_curr;
        stats.tx_load_percent_curr = tx;
        stats.rx_load_percent_curr = rx;

        radio.client_tx_load_tot_curr += u32::from(tx);
        radio.client_rx_load_tot_curr += u32::from(rx);
        if u16::from(tx) + u16::from(rx) >= u16::from(active_threshold) {
            radio.active_client_count_curr += 1;
        }
        (tx, rx)
    }

    /// Clamp the client totals and derive idle and foreign channel load.
    pub fn finalize(radio: &mut RadioStats) {
        clamp_total(&mut radio.client_tx_load_tot_curr, "client tx load");
        clamp_total(&mut radio.client_rx_load_tot_curr, "client rx load");

        radio.channel_load_idle = 100 - radio.channel_load_tot_curr.min(100);
        radio.channel_load_others = i16::from(radio.channel_load_tot_curr)
            - (radio.client_tx_load_tot_curr + radio.client_rx_load_tot_curr) as i16;
    }

    /// Apply the hysteresis rules, updating the radio's threshold flags.
    pub fn evaluate(&self, radio: &mut RadioStats, previous_window_load: u8) -> Vec<LoadTrigger> {
        let cfg = &self.config;
        let mut triggers = Vec::new();
        let load = radio.channel_load_tot_curr;

        if load >= cfg.channel_load_hi_th_percent && !radio.channel_load_tot_is_above_hi_th {
            radio.channel_load_tot_is_above_hi_th = true;
            triggers.push(LoadTrigger::ChannelLoadRising { load });
        } else if load < cfg.channel_load_lo_th_percent && radio.channel_load_tot_is_above_hi_th
        {
            radio.channel_load_tot_is_above_hi_th = false;
            triggers.push(LoadTrigger::ChannelLoadFalling { load });
        }

        if radio.channel_load_tot_is_above_hi_th {
            let delta = previous_window_load.abs_diff(load);
            if delta >= cfg.channel_load_delta_th_percent {
                triggers.push(LoadTrigger::ChannelLoadDelta { delta });
            }
        }

        let count = radio.active_client_count_curr;
        let above = count >= cfg.min_active_client_count;
        if !above && radio.active_client_count_is_above_th {
            radio.active_client_count_is_above_th = false;
            triggers.push(LoadTrigger::ActiveClientsFalling { count });
        } else if above && !radio.active_client_count_is_above_th {
            radio.active_client_count_is_above_th = true;
            triggers.push(LoadTrigger::ActiveClientsRising { count });
        }

        if radio.active_client_count_is_above_th {
            if count > radio.active_client_count_prev {
                triggers.push(LoadTrigger::ActiveClientAdded { count });
            }

            let prev_total = radio.client_tx_load_tot_prev + radio.client_rx_load_tot_prev;
            let curr_total = radio.client_tx_load_tot_curr + radio.client_rx_load_tot_curr;
            let delta = prev_total.abs_diff(curr_total);
            if delta >= u32::from(cfg.client_load_delta_th_percent) {
                triggers.push(LoadTrigger::ClientLoadDelta { delta });
            }
        }

        for trigger in &triggers {
            log::debug!("load notification trigger: {:?}", trigger);
        }
        triggers
    }

    /// Run the full window: rollover, per-station load, clamping, derived
    /// loads and hysteresis.
    pub fn run_window(&self, store: &mut StatsStore) -> WindowOutcome {
        let active_threshold = self.config.active_client_th_percent;
        let (radio, vaps, stations) = store.split_mut();
        let radio_stats = &mut radio.stats;

        let previous_window_load = Self::rollover(radio_stats);
        for vap in vaps.values_mut() {
            Self::rollover_vap(&mut vap.stats);
        }

        for sta in stations {
            let (tx, rx) = Self::calculate_client_load(sta, radio_stats, active_threshold);
            add_to_vap(vaps, sta.vap_id(), tx, rx, active_threshold);
        }

        Self::finalize(radio_stats);
        for vap in vaps.values_mut() {
            let stats = &mut vap.stats;
            stats.client_tx_load_tot_curr = stats.client_tx_load_tot_curr.min(100);
            stats.client_rx_load_tot_curr = stats.client_rx_load_tot_curr.min(100);
            stats.active_client_count_is_above_th =
                stats.active_client_count_curr >= self.config.min_active_client_count;
        }

        let triggers = self.evaluate(radio_stats, previous_window_load);
        let notification = if triggers.is_empty() {
            None
        } else {
            Some(LoadNotification {
                stats_delta_ms: radio_stats.delta_ms,
                active_client_count: radio_stats.active_client_count_curr,
                client_tx_load_percent: radio_stats.client_tx_load_tot_curr as u8,
                client_rx_load_percent: radio_stats.client_rx_load_tot_curr as u8,
                channel_load_percent: radio_stats.channel_load_tot_curr,
            })
        };

        WindowOutcome {
            triggers,
            notification,
        }
    }
}

impl Default for LoadAggregator {
    fn default() -> Self {
        Self::new(LoadConfig::default())
    }
}

/// Orphaned stations only count towards the radio.
fn add_to_vap(vaps: &mut BTreeMap<u8, VapRecord>, vap_id: u8, tx: u8, rx: u8, active_th: u8) {
    if let Some(vap) = vaps.get_mut(&vap_id) {
        let stats = &mut vap.stats;
        stats.client_tx_load_tot_curr += u32::from(tx);
        stats.client_rx_load_tot_curr += u32::from(rx);
        if u16::from(tx) + u16::from(rx) >= u16::from(active_th) {
            stats.active_client_count_curr += 1;
        }
    }
}
