// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Pending measurement requests
//!
//! Requests arrive from the control side on any thread and are served one
//! per tick by the monitor, in arrival order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::mac::MacAddr;

/// One measurement request. The all-zero MAC asks for every station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeasurementRequest {
    pub message_id: u16,
    pub mac: MacAddr,
}

impl MeasurementRequest {
    pub fn new(message_id: u16, mac: MacAddr) -> Self {
        Self { message_id, mac }
    }

    /// True for a whole-radio request.
    pub fn is_wildcard(&self) -> bool {
        self.mac.is_zero()
    }
}

#[derive(Debug, Default)]
struct QueueInner {
    requests: Mutex<VecDeque<MeasurementRequest>>,
    pending: AtomicBool,
    attached: AtomicBool,
}

/// FIFO of measurement requests, cloneable across threads.
///
/// The `pending` flag is raised by every accepted request and re-derived
/// from the queue contents after the monitor serves one.
#[derive(Debug, Clone, Default)]
pub struct RequestQueue {
    inner: Arc<QueueInner>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a request for `mac`. A synchronous request made while no
    /// controller session is attached is dropped.
    pub fn add_request(&self, message_id: u16, sync: bool, mac: MacAddr) -> bool {
        if sync && !self.is_attached() {
            log::warn!(
                "dropping request {} for {}: no controller session",
                message_id,
                mac
            );
            return false;
        }

        self.lock().push_back(MeasurementRequest::new(message_id, mac));
        self.inner.pending.store(true, Ordering::SeqCst);
        log::debug!("queued request {} for {}", message_id, mac);
        true
    }

    /// Enqueue a whole-radio request.
    pub fn add_radio_request(&self, message_id: u16, sync: bool) -> bool {
        self.add_request(message_id, sync, MacAddr::ZERO)
    }

    /// Take the oldest request.
    pub fn pop(&self) -> Option<MeasurementRequest> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Recompute the pending flag after a request was served.
    pub fn settle(&self) {
        let pending = !self.is_empty();
        self.inner.pending.store(pending, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::SeqCst)
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.inner.attached.store(attached, Ordering::SeqCst);
    }

    /// Drop every queued request.
    pub fn clear(&self) {
        self.lock().clear();
        self.inner.pending.store(false, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<MeasurementRequest>> {
        self.inner
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([0x02, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_fifo_order() {
        let queue = RequestQueue::new();
        queue.add_request(1, false, mac(1));
        queue.add_request(2, false, mac(2));
        queue.add_radio_request(3, false);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().unwrap().message_id, 1);
        assert_eq!(queue.pop().unwrap().message_id, 2);
        let last = queue.pop().unwrap();
        assert!(last.is_wildcard());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_sync_request_requires_session() {
        let queue = RequestQueue::new();
        assert!(!queue.add_request(7, true, mac(1)));
        assert!(queue.is_empty());
        assert!(!queue.is_pending());

        queue.set_attached(true);
        assert!(queue.add_request(7, true, mac(1)));
        assert!(queue.is_pending());
    }

    #[test]
    fn test_settle_tracks_contents() {
        let queue = RequestQueue::new();
        queue.add_request(1, false, mac(1));
        queue.add_request(2, false, mac(2));

        queue.pop();
        queue.settle();
        assert!(queue.is_pending());

        queue.pop();
        queue.settle();
        assert!(!queue.is_pending());
    }

    #[test]
    fn test_shared_between_threads() {
        let queue = RequestQueue::new();
        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let queue = queue.clone();
                std::thread::spawn(move || {
                    for i in 0..25u16 {
                        queue.add_request(u16::from(t) * 100 + i, false, mac(t));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 100);
        queue.clear();
        assert!(queue.is_empty());
        assert!(!queue.is_pending());
    }
}
