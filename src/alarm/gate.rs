// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Debounce state machine: at most one alarm per cooldown

use std::time::Duration;
use chrono::{DateTime, Utc};

use crate::buffer::to_delta;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Cooldown { last_alarm: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Raise an alarm for this detection
    Fire,
    /// Qualifying detection discarded during cooldown
    Suppressed,
    /// Below threshold, or no detection at all
    Ignored,
}

pub struct AlarmGate {
    threshold: f32,
    cooldown: chrono::Duration,
    state: GateState,
}

impl AlarmGate {
    pub fn new(threshold: f32, cooldown: Duration) -> Self {
        Self {
            threshold,
            cooldown: to_delta(cooldown),
            state: GateState::Idle,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Feeds one detection verdict observed at `now`.
    ///
    /// Cooldown expiry is checked lazily here; there is no timer.
    pub fn observe(&mut self, now: DateTime<Utc>, confidence: Option<f32>) -> GateDecision {
        if let GateState::Cooldown { last_alarm } = self.state {
            if now - last_alarm >= self.cooldown {
                self.state = GateState::Idle;
            }
        }

        let qualifies = confidence.map(|c| c >= self.threshold).unwrap_or(false);
        match (self.state, qualifies) {
            (_, false) => GateDecision::Ignored,
            (GateState::Cooldown { .. }, true) => GateDecision::Suppressed,
            (GateState::Idle, true) => {
                self.state = GateState::Cooldown { last_alarm: now };
                GateDecision::Fire
            }
        }
    }
}
