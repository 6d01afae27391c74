// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Capture pacing

use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::debug;

/// Holds the capture loop to the target frame rate.
///
/// Disabled for sources that already block at their own rate, in which case
/// `tick` returns immediately.
pub struct FramePacer {
    period: Duration,
    ticker: Option<Interval>,
    enabled: bool,
}

impl FramePacer {
    pub fn new(period: Duration, enabled: bool) -> Self {
        debug!("Frame pacer: period {:?}, enabled {}", period, enabled);
        Self {
            period,
            ticker: None,
            enabled,
        }
    }

    /// Waits for the next capture slot. A late capture does not cause a burst.
    pub async fn tick(&mut self) {
        if !self.enabled {
            return;
        }
        let period = self.period;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_paces_to_period() {
        let mut pacer = FramePacer::new(Duration::from_millis(100), true);
        let start = Instant::now();

        for _ in 0..5 {
            pacer.tick().await;
        }
        // first tick is immediate
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_pacer_never_waits() {
        let mut pacer = FramePacer::new(Duration::from_secs(1), false);
        let start = Instant::now();

        for _ in 0..10 {
            pacer.tick().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
