//! End-to-end behaviour of the monitor tick.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use radiomon::report::StaStatsEntry;
use radiomon::*;

struct Harness {
    monitor: StatsMonitor,
    store: SharedStore,
    transport: Arc<MemoryTransport>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new(config: MonitorConfig) -> Self {
        Self::with_transport(config, MemoryTransport::new())
    }

    fn with_transport(config: MonitorConfig, transport: MemoryTransport) -> Self {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(Mutex::new(StatsStore::with_config(&config, clock.clone())));
        let transport = Arc::new(transport);
        let mut monitor = StatsMonitor::new(config);
        assert!(monitor.attach(Some(store.clone()), Some(transport.clone())));
        Self {
            monitor,
            store,
            transport,
            clock,
        }
    }

    fn store(&self) -> std::sync::MutexGuard<'_, StatsStore> {
        self.store.lock().unwrap()
    }

    /// Station whose window load is exactly `tx`/`rx` percent.
    fn add_loaded_station(&self, last: u8, tx: u64, rx: u64) -> MacAddr {
        let mac = sta_mac(last);
        let mut store = self.store();
        let sta = store.sta_add(mac, 0);
        sta.stats.delta_ms = 1000;
        sta.stats.tx_phy_rate_100kb_avg = 1000;
        sta.stats.rx_phy_rate_100kb_avg = 1000;
        sta.stats.hal_stats.tx_bytes = tx * 125_000;
        sta.stats.hal_stats.rx_bytes = rx * 125_000;
        mac
    }

    fn hostap_reports(&self) -> Vec<HostapStatsReport> {
        self.transport
            .messages()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::HostapStats(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    fn load_notifications(&self) -> Vec<LoadNotification> {
        self.transport
            .messages()
            .into_iter()
            .filter_map(|m| match m {
                OutboundMessage::LoadNotification(n) => Some(n),
                _ => None,
            })
            .collect()
    }
}

fn sta_mac(n: u8) -> MacAddr {
    MacAddr::new([0x02, 0x11, 0x22, 0x33, 0x44, n])
}

fn ungated() -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.load.gate_on_pending_request = false;
    config
}

#[test]
fn test_wildcard_request_single_report() {
    let mut h = Harness::new(MonitorConfig::default());
    h.store().vap_add("wlan0", 0).unwrap();
    for i in 1..=3 {
        h.add_loaded_station(i, 1, 1);
    }

    assert!(h.monitor.add_request(7, false, MacAddr::ZERO));
    h.monitor.process(true);

    let reports = h.hostap_reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].message_id, 7);
    assert_eq!(reports[0].sta_stats.len(), 3);
    assert!(!reports[0].more_fragments);
    assert!(!h.monitor.queue().is_pending());
}

#[test]
fn test_wildcard_request_fragmented() {
    let transport = MemoryTransport::with_max_payload(HostapStatsReport::payload_for_stations(50));
    let mut h = Harness::with_transport(MonitorConfig::default(), transport);
    for i in 0..120 {
        h.store().sta_add(sta_mac(i), 0);
    }

    h.monitor.add_request(9, false, MacAddr::ZERO);
    h.monitor.process(true);

    let reports = h.hostap_reports();
    let sizes: Vec<usize> = reports.iter().map(|r| r.sta_stats.len()).collect();
    assert_eq!(sizes, vec![50, 50, 20]);
    assert!(reports.iter().all(|r| r.message_id == 9));
    assert_eq!(
        reports.iter().map(|r| r.more_fragments).collect::<Vec<_>>(),
        vec![true, true, false]
    );

    let mut macs: Vec<MacAddr> = reports
        .iter()
        .flat_map(|r| r.sta_stats.iter().map(|e: &StaStatsEntry| e.mac))
        .collect();
    macs.sort();
    macs.dedup();
    assert_eq!(macs.len(), 120);
    assert_eq!(h.monitor.counters().hostap_fragments_sent, 3);
}

#[test]
fn test_wildcard_request_ignores_measurement_mode() {
    for mode in [
        ClientsMeasurementMode::DisableAll,
        ClientsMeasurementMode::OnlyClientsSelectedForSteering,
    ] {
        let mut h = Harness::new(MonitorConfig::default());
        {
            let mut store = h.store();
            store.vap_add("wlan0", 0).unwrap();
            store.set_clients_measurement_mode(mode);
        }
        for i in 1..=3 {
            h.add_loaded_station(i, 1, 1);
        }

        h.monitor.add_request(7, false, MacAddr::ZERO);
        h.monitor.process(true);

        let reports = h.hostap_reports();
        assert_eq!(reports.len(), 1, "mode {:?}", mode);
        assert_eq!(reports[0].sta_stats.len(), 3, "mode {:?}", mode);
    }
}

#[test]
fn test_client_load_totals() {
    let mut h = Harness::new(MonitorConfig::default());
    h.add_loaded_station(1, 10, 20);
    h.add_loaded_station(2, 15, 25);
    h.add_loaded_station(3, 20, 25);

    h.monitor.add_request(1, false, MacAddr::ZERO);
    h.monitor.process(true);

    let store = h.store();
    let radio = &store.radio().stats;
    assert_eq!(radio.client_tx_load_tot_curr, 45);
    assert_eq!(radio.client_rx_load_tot_curr, 70);
    assert_eq!(radio.active_client_count_curr, 3);
}

#[test]
fn test_activity_goes_idle_after_stable_time() {
    let mut config = ungated();
    config.activity.idle_stable_time_sec = 5;
    let mut h = Harness::new(config);

    let mut changes = Vec::new();
    for _ in 0..6 {
        h.monitor.process(true);
        changes.push(h.monitor.activity_mode());
        h.clock.advance(Duration::from_secs(2));
    }

    assert_eq!(changes[0], ActivityMode::Active);
    assert_eq!(changes[3], ActivityMode::Active);
    assert_eq!(changes[4], ActivityMode::Idle);
    assert_eq!(h.monitor.counters().activity_notifications_sent, 1);
    assert!(h.transport.messages().iter().any(|m| matches!(
        m,
        OutboundMessage::ActivityNotification(ActivityNotification {
            mode: ActivityMode::Idle
        })
    )));
}

#[test]
fn test_process_outside_window_boundary_is_noop() {
    let mut h = Harness::new(MonitorConfig::default());
    h.add_loaded_station(1, 50, 50);
    h.store().set_channel_load(150);
    h.monitor.add_request(3, false, MacAddr::ZERO);

    assert!(!h.store().poll().is_last_poll());
    for _ in 0..5 {
        h.monitor.process(false);
    }

    assert_eq!(h.transport.message_count(), 0);
    assert!(h.monitor.queue().is_pending());
    assert_eq!(h.monitor.queue().len(), 1);
    let store = h.store();
    let radio = &store.radio().stats;
    assert_eq!(radio.channel_load_tot_curr, 150);
    assert_eq!(radio.channel_load_tot_prev, 0);
    assert_eq!(radio.client_tx_load_tot_curr, 0);
}

#[test]
fn test_window_boundary_from_poll_counter() {
    let mut h = Harness::new(MonitorConfig::default());
    let mac = sta_mac(1);
    h.store().sta_add(mac, 0);
    h.monitor.add_request(4, false, MacAddr::ZERO);

    for poll in 0..4u16 {
        h.clock.advance(Duration::from_millis(250));
        {
            let mut store = h.store();
            let now = store.now();
            let hal = StaHalStats {
                tx_phy_rate_100kb: 1000 + poll * 100,
                rx_phy_rate_100kb: 500,
                ..Default::default()
            };
            store.update_sta_stats(mac, hal, -60, 30, now).unwrap();
        }
        h.monitor.process(false);
        if poll < 3 {
            assert_eq!(h.transport.message_count(), 0);
        }
        h.store().poll_mut().advance();
    }

    assert_eq!(h.hostap_reports().len(), 1);
    let store = h.store();
    let stats = &store.sta_find(mac).unwrap().stats;
    assert_eq!(stats.tx_phy_rate_100kb_avg, 1150);
    assert_eq!(stats.tx_phy_rate_100kb_min, 1000);
    assert_eq!(stats.delta_ms, 250);
}

#[test]
fn test_load_invariants_hold_after_tick() {
    let mut h = Harness::new(MonitorConfig::default());
    for i in 0..4 {
        h.add_loaded_station(i, 80, 70);
    }
    h.store().set_channel_load(230);

    h.monitor.add_request(1, false, MacAddr::ZERO);
    h.monitor.process(true);

    let store = h.store();
    let radio = &store.radio().stats;
    assert!(radio.channel_load_tot_curr <= 100);
    assert!(radio.client_tx_load_tot_curr <= 100);
    assert!(radio.client_rx_load_tot_curr <= 100);
    assert_eq!(radio.channel_load_idle + radio.channel_load_tot_curr, 100);
}

#[test]
fn test_single_notification_per_crossing() {
    let mut h = Harness::new(ungated());
    for load in [40u8, 91, 92, 95, 93, 90, 94, 97, 92] {
        h.store().set_channel_load(load);
        h.monitor.process(true);
    }
    let notifications = h.load_notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].channel_load_percent, 91);
}

#[test]
fn test_readding_station_keeps_probe() {
    let mut config = MonitorConfig::default();
    config.measurement.unicast_measurement_enable = true;
    let mut h = Harness::new(config);
    let mac = sta_mac(1);
    {
        let mut store = h.store();
        store.vap_add("wlan0", 0).unwrap();
        store
            .sta_add(mac, 0)
            .set_ipv4(Some(Ipv4Addr::new(192, 168, 1, 20)));
    }
    h.monitor.request_station_rssi(mac, 42).unwrap();

    {
        let mut store = h.store();
        let sta = store.sta_add(mac, 0);
        assert_eq!(sta.probe.state, ArpState::SendArp);
        assert_eq!(sta.pending_rssi_request_ids, vec![42]);
        assert_eq!(store.sta_count(), 1);
        assert_eq!(store.vap_get_by_id(0).unwrap().sta_count(), 1);
    }
}

#[test]
fn test_missing_station_request_abandoned() {
    let mut h = Harness::new(MonitorConfig::default());
    h.monitor.add_request(5, false, sta_mac(77));
    h.monitor.add_request(6, false, MacAddr::ZERO);

    h.monitor.process(true);
    assert_eq!(h.transport.message_count(), 0);
    assert_eq!(h.monitor.counters().requests_abandoned, 1);
    assert!(h.monitor.queue().is_pending());

    h.monitor.process(true);
    assert_eq!(h.hostap_reports().len(), 1);
    assert_eq!(h.hostap_reports()[0].message_id, 6);
    assert!(!h.monitor.queue().is_pending());
}

#[test]
fn test_orphan_station_link_metrics() {
    let mut h = Harness::new(MonitorConfig::default());
    {
        let mut store = h.store();
        store
            .vap_add("wlan0", 0)
            .unwrap()
            .set_bssid(MacAddr::new([0x02, 0xaa, 0, 0, 0, 0]));
        store.sta_add(sta_mac(1), 0);
        assert!(store.vap_remove(0));
    }

    h.monitor.add_request(11, false, sta_mac(1));
    h.monitor.process(true);

    let reports: Vec<StaLinkMetricsReport> = h
        .transport
        .messages()
        .into_iter()
        .filter_map(|m| match m {
            OutboundMessage::StaLinkMetrics(r) => Some(r),
            _ => None,
        })
        .collect();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].message_id, 11);
    assert_eq!(reports[0].sta_mac, sta_mac(1));
    assert_eq!(reports[0].bssid_info[0].bssid, MacAddr::ZERO);
    assert_eq!(h.monitor.counters().link_metric_reports_sent, 1);
    assert_eq!(h.monitor.counters().requests_abandoned, 0);
}

#[test]
fn test_send_failure_contained() {
    let mut h = Harness::new(MonitorConfig::default());
    h.store().sta_add(sta_mac(1), 0);
    h.transport.set_fail_sends(true);

    h.monitor.add_request(5, false, MacAddr::ZERO);
    h.monitor.process(true);

    assert_eq!(h.monitor.counters().send_failures, 1);
    assert_eq!(h.monitor.counters().requests_abandoned, 1);
    assert!(!h.monitor.queue().is_pending());
}

#[test]
fn test_liveness_probe_round() {
    let mut config = MonitorConfig::default();
    config.measurement.unicast_measurement_enable = true;
    let mut h = Harness::new(config);
    let mac = sta_mac(1);
    let ip = Ipv4Addr::new(192, 168, 1, 20);
    {
        let mut store = h.store();
        let vap = store.vap_add("wlan0", 0).unwrap();
        vap.set_bridge_mac(MacAddr::new([0x02, 0xbb, 0, 0, 0, 1]));
        vap.set_bridge_ipv4(Some(Ipv4Addr::new(192, 168, 1, 1)));
        store.sta_add(mac, 0).set_ipv4(Some(ip));
    }

    h.monitor.request_station_rssi(mac, 8).unwrap();
    assert!(h.monitor.probe_tick().is_empty());

    let bursts = h.transport.arp_bursts();
    assert_eq!(bursts.len(), 1);
    assert_eq!(bursts[0].target_ipv4, ip);
    assert_eq!(bursts[0].count, 6);

    for _ in 0..4 {
        assert!(h.monitor.on_probe_reply(ip));
    }
    assert!(!h.monitor.on_probe_reply(Ipv4Addr::new(10, 9, 9, 9)));

    let outcomes = h.monitor.probe_tick();
    assert_eq!(
        outcomes,
        vec![ProbeOutcome::Reachable {
            mac,
            request_ids: vec![8]
        }]
    );
    let store = h.store();
    let sta = store.sta_find(mac).unwrap();
    assert!(sta.probe.rx_rssi_ready);
    assert_eq!(sta.probe.state, ArpState::Idle);
}

#[test]
fn test_liveness_probe_unreachable() {
    let mut config = MonitorConfig::default();
    config.measurement.unicast_measurement_enable = true;
    config.arp.max_retries = 3;
    let mut h = Harness::new(config);
    let mac = sta_mac(1);
    {
        let mut store = h.store();
        store.vap_add("wlan0", 0).unwrap();
        store
            .sta_add(mac, 0)
            .set_ipv4(Some(Ipv4Addr::new(10, 0, 0, 7)));
    }
    h.monitor.request_station_rssi(mac, 1).unwrap();

    let mut outcome = Vec::new();
    for _ in 0..10 {
        outcome = h.monitor.probe_tick();
        if !outcome.is_empty() {
            break;
        }
        h.clock.advance(Duration::from_millis(600));
    }

    assert!(matches!(
        outcome.as_slice(),
        [ProbeOutcome::Unreachable { retries: 3, .. }]
    ));
    let bursts = h.transport.arp_bursts();
    assert_eq!(bursts.len(), 3);
    assert_eq!(bursts[0].count, 6);
    assert_eq!(bursts[1].count, 1);
}

#[test]
fn test_config_from_file_drives_monitor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("radiomon.json");
    std::fs::write(
        &path,
        r#"{
            "load": { "channel_load_hi_th_percent": 70, "gate_on_pending_request": false }
        }"#,
    )
    .unwrap();

    let config = MonitorConfig::from_file(&path).unwrap();
    assert_eq!(config.load.channel_load_hi_th_percent, 70);
    assert_eq!(config.polling.window_poll_count, 4);

    let mut h = Harness::new(config);
    h.store().set_channel_load(75);
    h.monitor.process(true);
    assert_eq!(h.load_notifications().len(), 1);
}
