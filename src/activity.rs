// Radiomon - Wireless statistics monitoring engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Radio activity classification
//!
//! The radio is ACTIVE or IDLE. It becomes IDLE only after its byte total
//! stays under twice the idle threshold for longer than the stable time,
//! and wakes up as soon as the total exceeds twice the active threshold.
//! The gap between the two thresholds and the stable time keep the mode
//! from flapping.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::ActivityConfig;

/// Activity mode of the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityMode {
    #[default]
    Active,
    Idle,
}

impl std::fmt::Display for ActivityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Idle => write!(f, "IDLE"),
        }
    }
}

/// ACTIVE/IDLE state machine over the radio byte counters.
#[derive(Debug, Clone)]
pub struct ActivityModeTracker {
    config: ActivityConfig,
    mode: ActivityMode,
    /// Accumulated idle time (seconds)
    idle_timer: u32,
    idle_prev_timestamp: Option<Instant>,
}

impl ActivityModeTracker {
    pub fn new(config: ActivityConfig) -> Self {
        Self {
            config,
            mode: ActivityMode::Active,
            idle_timer: 0,
            idle_prev_timestamp: None,
        }
    }

    pub fn mode(&self) -> ActivityMode {
        self.mode
    }

    pub fn idle_timer_sec(&self) -> u32 {
        self.idle_timer
    }

    /// Feed the radio's rx+tx byte total. Returns the new mode when it
    /// changed on this call.
    pub fn update(&mut self, total_bytes: u64, now: Instant) -> Option<ActivityMode> {
        match self.mode {
            ActivityMode::Active => {
                if total_bytes >= 2 * u64::from(self.config.idle_threshold_bytes) {
                    return None;
                }

                let mut changed = None;
                if self.idle_timer > u32::from(self.config.idle_stable_time_sec) {
                    self.mode = ActivityMode::Idle;
                    changed = Some(ActivityMode::Idle);
                    log::debug!("radio idle after {} s", self.idle_timer);
                } else if self.idle_timer == 0 {
                    self.idle_timer = 1;
                } else {
                    let elapsed = self
                        .idle_prev_timestamp
                        .map_or(0, |prev| now.saturating_duration_since(prev).as_secs());
                    self.idle_timer = self
                        .idle_timer
                        .saturating_add(u32::try_from(elapsed).unwrap_or(u32::MAX));
                }
                self.idle_prev_timestamp = Some(now);
                changed
            }
            ActivityMode::Idle => {
                if total_bytes <= 2 * u64::from(self.config.active_threshold_bytes) {
                    return None;
                }
                log::debug!("radio active, idle timer was {} s", self.idle_timer);
                self.mode = ActivityMode::Active;
                self.idle_timer = 0;
                Some(ActivityMode::Active)
            }
        }
    }
}

impl Default for ActivityModeTracker {
    fn default() -> Self {
        Self::new(ActivityConfig::default())
    }
}
