// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Message transport boundary.
//!
//! The engine hands finished messages to a [`Transport`] and never waits
//! for an acknowledgement. Wire encoding and session handling live behind
//! the trait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::liveness::ArpBurst;
use crate::report::{OutboundMessage, DEFAULT_MAX_PAYLOAD};

/// Collaborator that delivers outbound messages and probe bursts.
pub trait Transport: Send + Sync {
    /// Queue a message for delivery; false when it could not be accepted.
    fn send(&self, message: OutboundMessage) -> bool;

    /// Emit a burst of address-resolution probes.
    fn send_arp(&self, burst: &ArpBurst) -> bool {
        log::warn!("transport cannot send probes to {}", burst.station);
        false
    }

    /// Largest payload one message may carry.
    fn max_payload(&self) -> usize {
        DEFAULT_MAX_PAYLOAD
    }
}

/// Transport that records everything it is given.
#[derive(Debug)]
pub struct MemoryTransport {
    messages: Mutex<Vec<OutboundMessage>>,
    arp_bursts: Mutex<Vec<ArpBurst>>,
    max_payload: usize,
    fail_sends: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Transport with a custom payload budget.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            arp_bursts: Mutex::new(Vec::new()),
            max_payload,
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Make every subsequent send fail.
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Copy of every message sent so far.
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drain the recorded messages.
    pub fn take_messages(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.messages.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Copy of every probe burst sent so far.
    pub fn arp_bursts(&self) -> Vec<ArpBurst> {
        self.arp_bursts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MemoryTransport {
    fn send(&self, message: OutboundMessage) -> bool {
        if self.fail_sends.load(Ordering::SeqCst) {
            return false;
        }
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
        true
    }

    fn send_arp(&self, burst: &ArpBurst) -> bool {
        if self.fail_sends.load(Ordering::SeqCst) {
            return false;
        }
        self.arp_bursts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(burst.clone());
        true
    }

    fn max_payload(&self) -> usize {
        self.max_payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::LoadNotification;

    #[test]
    fn test_memory_transport_records() {
        let transport = MemoryTransport::new();
        assert!(transport.send(OutboundMessage::LoadNotification(
            LoadNotification::default()
        )));
        assert_eq!(transport.message_count(), 1);
        assert_eq!(transport.take_messages().len(), 1);
        assert_eq!(transport.message_count(), 0);
    }

    #[test]
    fn test_memory_transport_failure() {
        let transport = MemoryTransport::with_max_payload(200);
        transport.set_fail_sends(true);
        assert!(!transport.send(OutboundMessage::LoadNotification(
            LoadNotification::default()
        )));
        assert_eq!(transport.message_count(), 0);
        assert_eq!(transport.max_payload(), 200);
    }

    struct SendOnly;

    impl Transport for SendOnly {
        fn send(&self, _message: OutboundMessage) -> bool {
            true
        }
    }

    #[test]
    fn test_default_transport_cannot_probe() {
        let burst = ArpBurst {
            station: Default::default(),
            target_ipv4: std::net::Ipv4Addr::LOCALHOST,
            target_mac: Default::default(),
            source_mac: Default::default(),
            source_ipv4: std::net::Ipv4Addr::UNSPECIFIED,
            count: 1,
            interval_ms: 0,
        };
        assert!(!SendOnly.send_arp(&burst));
        assert_eq!(SendOnly.max_payload(), DEFAULT_MAX_PAYLOAD);
    }
}
