// Radiomon Exporter - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for Radiomon.
//!
//! Gauges mirror the radio's window statistics after every processed
//! window; counters track what the engine emitted.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder,
};
use radiomon::store::RadioStats;
use radiomon::ActivityMode;

lazy_static! {
    // ============================================================
    // Radio window statistics
    // ============================================================

    pub static ref CHANNEL_LOAD_PERCENT: Gauge = register_gauge!(
        "radiomon_channel_load_percent",
        "Total channel load of the last window (0-100)"
    ).unwrap();

    pub static ref CHANNEL_LOAD_IDLE_PERCENT: Gauge = register_gauge!(
        "radiomon_channel_load_idle_percent",
        "Idle share of the channel (0-100)"
    ).unwrap();

    /// Signed: noise can make our own clients exceed the measured load.
    pub static ref CHANNEL_LOAD_OTHERS_PERCENT: Gauge = register_gauge!(
        "radiomon_channel_load_others_percent",
        "Channel load not caused by associated clients"
    ).unwrap();

    pub static ref CLIENT_TX_LOAD_PERCENT: Gauge = register_gauge!(
        "radiomon_client_tx_load_percent",
        "Summed downlink load of associated clients (0-100)"
    ).unwrap();

    pub static ref CLIENT_RX_LOAD_PERCENT: Gauge = register_gauge!(
        "radiomon_client_rx_load_percent",
        "Summed uplink load of associated clients (0-100)"
    ).unwrap();

    pub static ref ACTIVE_CLIENTS: Gauge = register_gauge!(
        "radiomon_active_clients",
        "Clients above the activity threshold in the last window"
    ).unwrap();

    pub static ref STATION_COUNT: Gauge = register_gauge!(
        "radiomon_station_count",
        "Associated stations"
    ).unwrap();

    /// Values: 0 = Active, 1 = Idle
    pub static ref ACTIVITY_MODE: Gauge = register_gauge!(
        "radiomon_activity_mode",
        "Radio activity mode (0=Active, 1=Idle)"
    ).unwrap();

    // ============================================================
    // Event Counters
    // ============================================================

    pub static ref MESSAGES_TOTAL: CounterVec = register_counter_vec!(
        "radiomon_messages_total",
        "Messages emitted by the engine",
        &["kind"]
    ).unwrap();

    pub static ref LOAD_NOTIFICATIONS_TOTAL: CounterVec = register_counter_vec!(
        "radiomon_load_notifications_total",
        "Load notifications by channel load band",
        &["band"]
    ).unwrap();

    // ============================================================
    // Exporter Metrics
    // ============================================================

    pub static ref POLLS_TOTAL: Gauge = register_gauge!(
        "radiomon_exporter_polls_total",
        "Polling intervals driven by the exporter"
    ).unwrap();

    pub static ref WINDOWS_TOTAL: Gauge = register_gauge!(
        "radiomon_exporter_windows_total",
        "Measurement windows processed by the engine"
    ).unwrap();
}

/// Update the window gauges from the radio statistics.
pub fn update_radio_metrics(stats: &RadioStats) {
    CHANNEL_LOAD_PERCENT.set(f64::from(stats.channel_load_tot_curr));
    CHANNEL_LOAD_IDLE_PERCENT.set(f64::from(stats.channel_load_idle));
    CHANNEL_LOAD_OTHERS_PERCENT.set(f64::from(stats.channel_load_others));
    CLIENT_TX_LOAD_PERCENT.set(f64::from(stats.client_tx_load_tot_curr));
    CLIENT_RX_LOAD_PERCENT.set(f64::from(stats.client_rx_load_tot_curr));
    ACTIVE_CLIENTS.set(f64::from(stats.active_client_count_curr));
    STATION_COUNT.set(f64::from(stats.sta_count));
}

pub fn update_activity_mode(mode: ActivityMode) {
    ACTIVITY_MODE.set(match mode {
        ActivityMode::Active => 0.0,
        ActivityMode::Idle => 1.0,
    });
}

/// Count one emitted message.
pub fn record_message(kind: &str) {
    MESSAGES_TOTAL.with_label_values(&[kind]).inc();
}

/// Count one load notification by the channel load it reported.
pub fn record_load_notification(channel_load_percent: u8) {
    let band = match channel_load_percent {
        0..=19 => "low",
        20..=89 => "mid",
        _ => "high",
    };
    LOAD_NOTIFICATIONS_TOTAL.with_label_values(&[band]).inc();
}

pub fn update_driver_metrics(polls: u64, windows: u64) {
    POLLS_TOTAL.set(polls as f64);
    WINDOWS_TOTAL.set(windows as f64);
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
