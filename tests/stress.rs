//! Stress tests for Radiomon
//!
//! Run with: cargo test --release stress -- --ignored

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use radiomon::*;

#[test]
#[ignore] // Run manually with --ignored
fn stress_test_random_windows() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let store = Arc::new(Mutex::new(StatsStore::new()));
    let transport = Arc::new(MemoryTransport::with_max_payload(
        HostapStatsReport::payload_for_stations(17),
    ));
    let mut monitor = StatsMonitor::default();
    assert!(monitor.attach(Some(store.clone()), Some(transport.clone())));

    let windows = 2_000;
    let start = Instant::now();

    for window in 0..windows {
        let station_count: u8 = rng.gen_range(0..=200);
        {
            let mut store = store.lock().unwrap();
            store.sta_erase_all();
            for i in 0..station_count {
                let sta = store.sta_add(MacAddr::new([0x02, 0, 0, 0, 1, i]), 0);
                sta.stats.delta_ms = rng.gen_range(0..2000);
                sta.stats.tx_phy_rate_100kb_avg = rng.gen_range(0..5000);
                sta.stats.rx_phy_rate_100kb_avg = rng.gen_range(0..5000);
                sta.stats.hal_stats.tx_bytes = rng.gen_range(0..50_000_000);
                sta.stats.hal_stats.rx_bytes = rng.gen_range(0..50_000_000);
            }
            store.set_channel_load(rng.gen());
        }

        monitor.add_request(window as u16, false, MacAddr::ZERO);
        monitor.process(true);

        let messages = transport.take_messages();
        let mut seen = HashSet::new();
        for message in &messages {
            if let OutboundMessage::HostapStats(report) = message {
                assert_eq!(report.message_id, window as u16);
                for entry in &report.sta_stats {
                    assert!(seen.insert(entry.mac), "duplicate station {}", entry.mac);
                    assert!(entry.tx_load_percent <= 100);
                    assert!(entry.rx_load_percent <= 100);
                }
            }
        }
        assert_eq!(seen.len(), usize::from(station_count));

        let store = store.lock().unwrap();
        let radio = &store.radio().stats;
        assert!(radio.channel_load_tot_curr <= 100);
        assert!(radio.client_tx_load_tot_curr <= 100);
        assert!(radio.client_rx_load_tot_curr <= 100);
        assert_eq!(radio.channel_load_idle + radio.channel_load_tot_curr, 100);
    }

    let elapsed = start.elapsed();
    println!("Processed {} windows in {:?}", windows, elapsed);
}

#[test]
#[ignore]
fn stress_test_concurrent_requests() {
    let store = Arc::new(Mutex::new(StatsStore::new()));
    let transport = Arc::new(MemoryTransport::new());
    let mut monitor = StatsMonitor::default();
    assert!(monitor.attach(Some(store.clone()), Some(transport.clone())));

    let producers: Vec<_> = (0..4u16)
        .map(|t| {
            let queue = monitor.queue();
            std::thread::spawn(move || {
                for i in 0..250u16 {
                    assert!(queue.add_request(t * 1000 + i, true, MacAddr::ZERO));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let mut served = 0;
    while monitor.queue().is_pending() {
        monitor.process(true);
        served += 1;
    }
    assert_eq!(served, 1000);
    assert_eq!(monitor.counters().hostap_fragments_sent, 1000);
}
