// Radiomon Exporter - Tick driver
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Tick driver feeding the simulated HAL through the engine.
//!
//! Every polling interval the driver refreshes the counters, runs the
//! engine tick and advances the poll counter. A whole-radio request is
//! queued at the start of every window so each window produces a report.

use crate::metrics::{
    record_load_notification, record_message, update_activity_mode, update_driver_metrics,
    update_radio_metrics,
};
use crate::sim::SimulatedHal;
use radiomon::{
    LoadNotification, MacAddr, MonitorConfig, OutboundMessage, StatsMonitor, StatsStore,
    Transport,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info};

/// Transport publishing every engine message as Prometheus counters.
#[derive(Debug, Default)]
pub struct MetricsTransport {
    sent: AtomicU64,
    last_load: Mutex<Option<LoadNotification>>,
}

impl MetricsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn last_load_notification(&self) -> Option<LoadNotification> {
        *self.last_load.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for MetricsTransport {
    fn send(&self, message: OutboundMessage) -> bool {
        record_message(message.kind());
        if let OutboundMessage::LoadNotification(notification) = &message {
            record_load_notification(notification.channel_load_percent);
            *self.last_load.lock().unwrap_or_else(|e| e.into_inner()) = Some(*notification);
        }
        if let Ok(json) = serde_json::to_string(&message) {
            debug!("emitted {}", json);
        }
        self.sent.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Snapshot published to the HTTP handlers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DriverStatus {
    pub activity_mode: String,
    pub station_count: usize,
    pub channel_load_percent: u8,
    pub last_load_notification: Option<LoadNotification>,
    pub messages_sent: u64,
}

/// State shared between the driver task and the HTTP handlers.
#[derive(Debug, Default)]
pub struct DriverState {
    pub polls: AtomicU64,
    pub windows: AtomicU64,
    pub running: AtomicBool,
    pub status: RwLock<DriverStatus>,
}

/// Drives the engine at the configured polling rate.
pub struct TickDriver {
    monitor: StatsMonitor,
    store: Arc<Mutex<StatsStore>>,
    transport: Arc<MetricsTransport>,
    hal: SimulatedHal,
    state: Arc<DriverState>,
    speed: f64,
    next_request_id: u16,
}

impl TickDriver {
    /// Build the store, provision the simulated radio and attach the
    /// engine.
    pub fn new(
        config: MonitorConfig,
        stations: u16,
        seed: u64,
        speed: f64,
    ) -> Result<Self, crate::error::ExporterError> {
        let mut store = StatsStore::with_config(&config, Arc::new(radiomon::MonotonicClock));
        let hal = SimulatedHal::new(seed, stations, config.polling.polling_rate_ms);
        hal.populate(&mut store)?;

        let store = Arc::new(Mutex::new(store));
        let transport = Arc::new(MetricsTransport::new());
        let mut monitor = StatsMonitor::new(config);
        if !monitor.attach(Some(store.clone()), Some(transport.clone())) {
            return Err(crate::error::ExporterError::Attach);
        }

        Ok(Self {
            monitor,
            store,
            transport,
            hal,
            state: Arc::new(DriverState::default()),
            speed: if speed > 0.0 { speed } else { 1.0 },
            next_request_id: 1,
        })
    }

    pub fn state(&self) -> Arc<DriverState> {
        Arc::clone(&self.state)
    }

    /// One polling interval. Returns true when a window was processed.
    pub fn step(&mut self) -> bool {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());

        if store.poll().poll_count() == 0 {
            let id = self.next_request_id;
            self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
            self.monitor.add_request(id, false, MacAddr::ZERO);
        }

        self.hal.poll(&mut store);
        let window_end = store.poll().is_last_poll();
        drop(store);

        let windows_before = self.monitor.counters().windows_processed;
        self.monitor.process(false);
        self.monitor.probe_tick();

        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.poll_mut().advance();
        self.state.polls.fetch_add(1, Ordering::SeqCst);

        let processed = self.monitor.counters().windows_processed > windows_before;
        if window_end && processed {
            self.state.windows.fetch_add(1, Ordering::SeqCst);
            update_radio_metrics(&store.radio().stats);
            update_activity_mode(self.monitor.activity_mode());
        }
        update_driver_metrics(
            self.state.polls.load(Ordering::SeqCst),
            self.state.windows.load(Ordering::SeqCst),
        );
        processed
    }

    fn snapshot(&self) -> DriverStatus {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        DriverStatus {
            activity_mode: self.monitor.activity_mode().to_string(),
            station_count: store.sta_count(),
            channel_load_percent: store.radio().stats.channel_load_tot_curr,
            last_load_notification: self.transport.last_load_notification(),
            messages_sent: self.transport.sent(),
        }
    }

    /// Run until `running` is cleared.
    pub async fn run(mut self) {
        self.state.running.store(true, Ordering::SeqCst);
        let interval_ms = {
            let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
            store.poll().polling_rate_ms()
        };
        let interval = Duration::from_millis((f64::from(interval_ms) / self.speed) as u64);
        info!(
            "Driving {} stations every {:?} (speed={})",
            self.hal.station_count(),
            interval,
            self.speed
        );

        while self.state.running.load(Ordering::SeqCst) {
            if self.step() {
                let status = self.snapshot();
                *self.state.status.write().await = status;
            }
            sleep(interval).await;
        }
        self.monitor.stop();
        info!("Driver stopped");
    }
}
