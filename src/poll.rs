// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Poll cadence and measurement-window bookkeeping.
//!
//! A measurement window is `window_poll_count` consecutive polls. The poll
//! counter lives in `[0, window_poll_count)`; the last poll of a window is
//! the gate that lets a tick roll statistics over.

use std::time::{Duration, Instant};

use crate::config::PollingConfig;

/// Tracks poll timing and the position inside the measurement window.
#[derive(Debug, Clone)]
pub struct PollScheduler {
    poll_cnt: u8,
    polling_rate_ms: u32,
    window_poll_count: u8,
    poll_next_time: Option<Instant>,
    last_stats_update_time: Option<Instant>,
}

impl PollScheduler {
    /// Create a scheduler; a zero window length is treated as one poll.
    pub fn new(polling_rate_ms: u32, window_poll_count: u8) -> Self {
        Self {
            poll_cnt: 0,
            polling_rate_ms,
            window_poll_count: window_poll_count.max(1),
            poll_next_time: None,
            last_stats_update_time: None,
        }
    }

    /// Create a scheduler from the polling configuration.
    pub fn from_config(config: &PollingConfig) -> Self {
        Self::new(config.polling_rate_ms, config.window_poll_count)
    }

    /// Count one completed poll, wrapping at the end of the window.
    pub fn advance(&mut self) {
        self.poll_cnt = (self.poll_cnt + 1) % self.window_poll_count;
    }

    /// Current poll index inside the window.
    pub fn poll_count(&self) -> u8 {
        self.poll_cnt
    }

    /// True on the final poll of the current window.
    pub fn is_last_poll(&self) -> bool {
        self.poll_cnt == self.window_poll_count - 1
    }

    /// Restart the window at poll 0.
    pub fn reset(&mut self) {
        self.poll_cnt = 0;
    }

    pub fn polling_rate_ms(&self) -> u32 {
        self.polling_rate_ms
    }

    pub fn set_polling_rate_ms(&mut self, polling_rate_ms: u32) {
        self.polling_rate_ms = polling_rate_ms;
    }

    pub fn window_poll_count(&self) -> u8 {
        self.window_poll_count
    }

    /// Change the window length; restarts the window when the counter no
    /// longer fits.
    pub fn set_window_poll_count(&mut self, window_poll_count: u8) {
        self.window_poll_count = window_poll_count.max(1);
        if self.poll_cnt >= self.window_poll_count {
            self.poll_cnt = 0;
        }
    }

    /// Window length in milliseconds, saturating at `u32::MAX`.
    pub fn measurement_window_ms(&self) -> u32 {
        self.polling_rate_ms
            .saturating_mul(u32::from(self.window_poll_count))
    }

    /// Polling interval as a duration.
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.polling_rate_ms))
    }

    pub fn poll_next_time(&self) -> Option<Instant> {
        self.poll_next_time
    }

    pub fn set_poll_next_time(&mut self, point: Instant, reset_poll: bool) {
        self.poll_next_time = Some(point);
        if reset_poll {
            self.reset();
        }
    }

    /// True once `now` reached the scheduled poll time (or none was set).
    pub fn is_poll_due(&self, now: Instant) -> bool {
        self.poll_next_time.map_or(true, |next| now >= next)
    }

    pub fn last_stats_update_time(&self) -> Option<Instant> {
        self.last_stats_update_time
    }

    pub fn set_last_stats_update_time(&mut self, point: Instant, reset_poll: bool) {
        self.last_stats_update_time = Some(point);
        if reset_poll {
            self.reset();
        }
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::from_config(&PollingConfig::default())
    }
}
