// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Station liveness probing
//!
//! Before RSSI/SNR of a station is trusted for a unicast measurement, the
//! station has to answer a burst of address-resolution probes. Stations
//! behind a 4-address repeater answer from the repeater's bridge MAC.
//!
//! ```text
//!  IDLE --start--> SEND_ARP --burst sent--> WAIT_FIRST_REPLY --reply--> WAIT_REPLY
//!                     ^                          |                        |
//!                     +------ timeout, retry <---+------------------------+
//!                                                              enough replies
//!                                                                    v
//!  IDLE <------------- ready flags set, requests answered ---- SEND_RESPONSE
//! ```
//!
//! Each station carries its own [`ProbeState`]; probes never interact.

use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::ArpConfig;
use crate::error::{MonitorError, Result};
use crate::mac::MacAddr;
use crate::store::{StationRecord, VapRecord};
use crate::transport::Transport;

/// Probe state of one station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ArpState {
    #[default]
    Idle,
    SendArp,
    WaitFirstReply,
    WaitReply,
    SendResponse,
}

/// Counters and flags of one station's probe.
#[derive(Debug, Clone)]
pub struct ProbeState {
    pub state: ArpState,
    /// Next send is a full burst rather than a single probe
    pub burst: bool,
    pub recv_count: u8,
    pub retry_count: u8,
    pub start_time: Instant,
    pub rx_rssi_ready: bool,
    pub rx_snr_ready: bool,
}

impl ProbeState {
    pub(crate) fn new(created: Instant) -> Self {
        Self {
            state: ArpState::Idle,
            burst: false,
            recv_count: 0,
            retry_count: 0,
            start_time: created,
            rx_rssi_ready: false,
            rx_snr_ready: false,
        }
    }

    /// True while a probe cycle is running.
    pub fn is_active(&self) -> bool {
        self.state != ArpState::Idle
    }
}

/// Sender side of a probe burst (the station's VAP bridge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSource {
    pub mac: MacAddr,
    pub ipv4: Ipv4Addr,
}

impl ProbeSource {
    /// Probe from the VAP's bridge; an unconfigured bridge address probes
    /// from 0.0.0.0.
    pub fn from_vap(vap: &VapRecord) -> Self {
        Self {
            mac: vap.bridge_mac(),
            ipv4: vap.bridge_ipv4().unwrap_or(Ipv4Addr::UNSPECIFIED),
        }
    }
}

/// One burst of address-resolution probes handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArpBurst {
    pub station: MacAddr,
    pub target_ipv4: Ipv4Addr,
    pub target_mac: MacAddr,
    pub source_mac: MacAddr,
    pub source_ipv4: Ipv4Addr,
    pub count: u8,
    pub interval_ms: u16,
}

/// Result of a finished probe cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProbeOutcome {
    /// The station answered; its RSSI/SNR may be trusted
    Reachable { mac: MacAddr, request_ids: Vec<u16> },
    /// No answer after every retry
    Unreachable {
        mac: MacAddr,
        retries: u8,
        request_ids: Vec<u16>,
    },
    /// The station's VAP is gone, nothing to probe from
    Abandoned { mac: MacAddr, request_ids: Vec<u16> },
}

impl ProbeOutcome {
    pub fn mac(&self) -> MacAddr {
        match self {
            Self::Reachable { mac, .. }
            | Self::Unreachable { mac, .. }
            | Self::Abandoned { mac, .. } => *mac,
        }
    }

    pub fn request_ids(&self) -> &[u16] {
        match self {
            Self::Reachable { request_ids, .. }
            | Self::Unreachable { request_ids, .. }
            | Self::Abandoned { request_ids, .. } => request_ids,
        }
    }
}

/// Drives the per-station probe state machines.
#[derive(Debug, Clone)]
pub struct LivenessProbe {
    config: ArpConfig,
    burst_pkt_num: u8,
    burst_delay_ms: u16,
}

impl LivenessProbe {
    pub fn new(config: ArpConfig) -> Self {
        Self {
            burst_pkt_num: config.burst_pkt_num,
            burst_delay_ms: config.burst_delay_ms,
            config,
        }
    }

    /// Override the burst shape (packets per burst, inter-packet delay).
    pub fn set_burst(&mut self, pkt_num: u8, delay_ms: u16) {
        self.burst_pkt_num = pkt_num.max(1);
        self.burst_delay_ms = delay_ms;
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.config.timeout_ms))
    }

    /// Begin a probe cycle. Already running probes are left alone.
    pub fn start(&self, sta: &mut StationRecord, now: Instant) -> Result<()> {
        if sta.ipv4().is_none() {
            return Err(MonitorError::ProbeUnavailable {
                mac: sta.mac(),
                reason: "no IPv4 address".to_string(),
            });
        }
        if sta.probe.is_active() {
            log::debug!("probe for {} already running", sta.mac());
            return Ok(());
        }

        let probe = &mut sta.probe;
        probe.recv_count = 0;
        probe.retry_count = 0;
        probe.burst = true;
        probe.rx_rssi_ready = false;
        probe.rx_snr_ready = false;
        probe.start_time = now;
        probe.state = ArpState::SendArp;
        Ok(())
    }

    /// Count one probe reply.
    pub fn on_reply(&self, sta: &mut StationRecord, now: Instant) {
        let mac = sta.mac();
        let probe = &mut sta.probe;
        match probe.state {
            ArpState::WaitFirstReply => {
                probe.recv_count = 1;
                probe.state = ArpState::WaitReply;
            }
            ArpState::WaitReply => {
                probe.recv_count = probe.recv_count.saturating_add(1);
            }
            _ => {
                log::trace!("unexpected probe reply from {}", mac);
                return;
            }
        }
        if probe.recv_count >= self.config.success_count {
            log::debug!(
                "station {} answered {} probes in {:?}",
                mac,
                probe.recv_count,
                now.saturating_duration_since(probe.start_time)
            );
            probe.state = ArpState::SendResponse;
        }
    }

    /// Advance one station's probe. Returns the outcome when the cycle
    /// finishes on this tick.
    pub fn tick(
        &self,
        sta: &mut StationRecord,
        source: Option<ProbeSource>,
        now: Instant,
        transport: &dyn Transport,
    ) -> Option<ProbeOutcome> {
        match sta.probe.state {
            ArpState::Idle => None,
            ArpState::SendArp => {
                let Some(source) = source else {
                    log::warn!("station {} has no VAP, abandoning probe", sta.mac());
                    sta.probe.state = ArpState::Idle;
                    return Some(ProbeOutcome::Abandoned {
                        mac: sta.mac(),
                        request_ids: std::mem::take(&mut sta.pending_rssi_request_ids),
                    });
                };
                self.send_burst(sta, source, now, transport)
            }
            ArpState::WaitFirstReply | ArpState::WaitReply => {
                if now.saturating_duration_since(sta.probe.start_time) >= self.timeout() {
                    self.retry(sta)
                } else {
                    None
                }
            }
            ArpState::SendResponse => {
                let probe = &mut sta.probe;
                probe.rx_rssi_ready = true;
                probe.rx_snr_ready = true;
                probe.state = ArpState::Idle;
                Some(ProbeOutcome::Reachable {
                    mac: sta.mac(),
                    request_ids: std::mem::take(&mut sta.pending_rssi_request_ids),
                })
            }
        }
    }

    fn send_burst(
        &self,
        sta: &mut StationRecord,
        source: ProbeSource,
        now: Instant,
        transport: &dyn Transport,
    ) -> Option<ProbeOutcome> {
        let Some(target_ipv4) = sta.ipv4() else {
            log::warn!("station {} lost its IPv4 address, abandoning probe", sta.mac());
            sta.probe.state = ArpState::Idle;
            return Some(ProbeOutcome::Abandoned {
                mac: sta.mac(),
                request_ids: std::mem::take(&mut sta.pending_rssi_request_ids),
            });
        };

        let burst = ArpBurst {
            station: sta.mac(),
            target_ipv4,
            target_mac: sta.probe_target_mac(),
            source_mac: source.mac,
            source_ipv4: source.ipv4,
            count: if sta.probe.burst { self.burst_pkt_num } else { 1 },
            interval_ms: self.burst_delay_ms,
        };

        sta.probe.start_time = now;
        if !transport.send_arp(&burst) {
            log::warn!("failed to send probe burst to {}", sta.mac());
            return self.retry(sta);
        }
        sta.probe.state = ArpState::WaitFirstReply;
        None
    }

    fn retry(&self, sta: &mut StationRecord) -> Option<ProbeOutcome> {
        let mac = sta.mac();
        let probe = &mut sta.probe;
        probe.retry_count = probe.retry_count.saturating_add(1);
        if probe.retry_count < self.config.max_retries {
            probe.burst = false;
            probe.state = ArpState::SendArp;
            return None;
        }

        log::info!(
            "station {} unreachable after {} probe attempts",
            mac,
            probe.retry_count
        );
        probe.state = ArpState::Idle;
        let retries = probe.retry_count;
        Some(ProbeOutcome::Unreachable {
            mac,
            retries,
            request_ids: std::mem::take(&mut sta.pending_rssi_request_ids),
        })
    }
}

impl Default for LivenessProbe {
    fn default() -> Self {
        Self::new(ArpConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn station(now: Instant) -> StationRecord {
        let mut sta = StationRecord::new(MacAddr::new([2, 0, 0, 0, 0, 7]), 0, now);
        sta.set_ipv4(Some(Ipv4Addr::new(10, 0, 0, 7)));
        sta
    }

    fn source() -> Option<ProbeSource> {
        Some(ProbeSource {
            mac: MacAddr::new([2, 0, 0, 0, 0, 0xb0]),
            ipv4: Ipv4Addr::new(10, 0, 0, 1),
        })
    }

    #[test]
    fn test_start_requires_ipv4() {
        let now = Instant::now();
        let probe = LivenessProbe::default();
        let mut sta = StationRecord::new(MacAddr::new([2, 0, 0, 0, 0, 8]), 0, now);
        assert!(matches!(
            probe.start(&mut sta, now),
            Err(MonitorError::ProbeUnavailable { .. })
        ));
        assert_eq!(sta.probe.state, ArpState::Idle);
    }

    #[test]
    fn test_reachable_cycle() {
        let now = Instant::now();
        let probe = LivenessProbe::default();
        let transport = MemoryTransport::new();
        let mut sta = station(now);
        sta.pending_rssi_request_ids.extend([3, 4]);

        probe.start(&mut sta, now).unwrap();
        assert!(probe.tick(&mut sta, source(), now, &transport).is_none());
        assert_eq!(sta.probe.state, ArpState::WaitFirstReply);

        let bursts = transport.arp_bursts();
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].count, 6);
        assert_eq!(bursts[0].target_ipv4, Ipv4Addr::new(10, 0, 0, 7));

        for _ in 0..4 {
            probe.on_reply(&mut sta, now);
        }
        assert_eq!(sta.probe.state, ArpState::SendResponse);

        let outcome = probe.tick(&mut sta, source(), now, &transport);
        assert_eq!(
            outcome,
            Some(ProbeOutcome::Reachable {
                mac: sta.mac(),
                request_ids: vec![3, 4],
            })
        );
        assert!(sta.probe.rx_rssi_ready);
        assert!(sta.probe.rx_snr_ready);
        assert!(sta.pending_rssi_request_ids.is_empty());
        assert!(!sta.probe.is_active());
    }

    #[test]
    fn test_timeout_retries_with_single_probe() {
        let now = Instant::now();
        let probe = LivenessProbe::default();
        let transport = MemoryTransport::new();
        let mut sta = station(now);

        probe.start(&mut sta, now).unwrap();
        probe.tick(&mut sta, source(), now, &transport);

        // not yet timed out
        let t = now + Duration::from_millis(549);
        assert!(probe.tick(&mut sta, source(), t, &transport).is_none());
        assert_eq!(sta.probe.state, ArpState::WaitFirstReply);

        let t = now + Duration::from_millis(550);
        assert!(probe.tick(&mut sta, source(), t, &transport).is_none());
        assert_eq!(sta.probe.state, ArpState::SendArp);
        assert_eq!(sta.probe.retry_count, 1);

        probe.tick(&mut sta, source(), t, &transport);
        let bursts = transport.arp_bursts();
        assert_eq!(bursts.len(), 2);
        assert_eq!(bursts[1].count, 1);
    }

    #[test]
    fn test_unreachable_after_max_retries() {
        let mut now = Instant::now();
        let probe = LivenessProbe::default();
        let transport = MemoryTransport::new();
        let mut sta = station(now);
        sta.pending_rssi_request_ids.push(11);

        probe.start(&mut sta, now).unwrap();
        let mut outcome = None;
        for _ in 0..100 {
            outcome = probe.tick(&mut sta, source(), now, &transport);
            if outcome.is_some() {
                break;
            }
            now += Duration::from_millis(600);
        }

        assert_eq!(
            outcome,
            Some(ProbeOutcome::Unreachable {
                mac: sta.mac(),
                retries: 10,
                request_ids: vec![11],
            })
        );
        assert_eq!(transport.arp_bursts().len(), 10);
        assert!(!sta.probe.is_active());
    }

    #[test]
    fn test_orphan_station_abandoned() {
        let now = Instant::now();
        let probe = LivenessProbe::default();
        let transport = MemoryTransport::new();
        let mut sta = station(now);
        sta.pending_rssi_request_ids.push(1);

        probe.start(&mut sta, now).unwrap();
        let outcome = probe.tick(&mut sta, None, now, &transport).unwrap();
        assert!(matches!(outcome, ProbeOutcome::Abandoned { .. }));
        assert_eq!(outcome.request_ids(), &[1]);
        assert!(transport.arp_bursts().is_empty());
    }

    #[test]
    fn test_bridge_mac_targeted() {
        let now = Instant::now();
        let probe = LivenessProbe::default();
        let transport = MemoryTransport::new();
        let mut sta = station(now);
        let bridge = MacAddr::new([2, 0, 0, 0, 0, 0xee]);
        sta.set_bridge_4addr_mac(Some(bridge));

        probe.start(&mut sta, now).unwrap();
        probe.tick(&mut sta, source(), now, &transport);
        assert_eq!(transport.arp_bursts()[0].target_mac, bridge);
    }

    #[test]
    fn test_replies_ignored_when_idle() {
        let now = Instant::now();
        let probe = LivenessProbe::default();
        let mut sta = station(now);
        probe.on_reply(&mut sta, now);
        assert_eq!(sta.probe.state, ArpState::Idle);
        assert_eq!(sta.probe.recv_count, 0);
    }

    #[test]
    fn test_send_failure_counts_as_retry() {
        let now = Instant::now();
        let probe = LivenessProbe::default();
        let transport = MemoryTransport::new();
        transport.set_fail_sends(true);
        let mut sta = station(now);

        probe.start(&mut sta, now).unwrap();
        probe.tick(&mut sta, source(), now, &transport);
        assert_eq!(sta.probe.state, ArpState::SendArp);
        assert_eq!(sta.probe.retry_count, 1);
    }
}
