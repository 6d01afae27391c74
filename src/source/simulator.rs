// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Synthetic camera for demo/testing

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::prelude::*;
use rand_distr::StandardNormal;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

use super::{FrameSource, SourceFrame};
use crate::buffer::to_delta;
use crate::error::SourceError;

/// Renders a noisy static scene with an optional bright block that
/// periodically walks across it
pub struct SyntheticSource {
    id: String,
    width: u32,
    height: u32,
    channels: u8,
    frame_rate: f64,
    rng: StdRng,
    noise_sigma: f64,
    sequence: u64,
    limit: Option<u64>,
    started_at: DateTime<Utc>,
    realtime: bool,
    ticker: Option<Interval>,

    // (period, visible) in frames
    intruder: Option<(u64, u64)>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, channels: u8, frame_rate: f64) -> Self {
        Self {
            id: format!("synthetic-{}x{}", width, height),
            width,
            height,
            channels,
            frame_rate,
            rng: StdRng::from_entropy(),
            noise_sigma: 2.0,
            sequence: 0,
            limit: None,
            started_at: Utc::now(),
            realtime: false,
            ticker: None,
            intruder: Some((frames_for(frame_rate, 30.0).max(1), frames_for(frame_rate, 2.0))),
        }
    }

    /// Deliver frames at `frame_rate` instead of as fast as possible
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// End the stream after `frames` frames
    pub fn limit_frames(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Timestamp of frame zero
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.started_at = start;
        self
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Block appears every `period_secs` for `visible_secs`, first at half a period
    pub fn with_intruder(mut self, period_secs: f64, visible_secs: f64) -> Self {
        self.intruder = Some((
            frames_for(self.frame_rate, period_secs).max(1),
            frames_for(self.frame_rate, visible_secs),
        ));
        self
    }

    pub fn without_intruder(mut self) -> Self {
        self.intruder = None;
        self
    }

    fn timestamp_of(&self, index: u64) -> DateTime<Utc> {
        self.started_at + to_delta(Duration::from_secs_f64(index as f64 / self.frame_rate))
    }

    /// Offset of the block inside its visible span, if it is on screen
    fn intruder_phase(&self, index: u64) -> Option<f64> {
        let (period, visible) = self.intruder?;
        let offset = (index + period / 2) % period;
        (offset < visible).then(|| offset as f64 / visible.max(1) as f64)
    }

    fn render(&mut self, index: u64) -> Vec<u8> {
        let (w, h, c) = (self.width as usize, self.height as usize, self.channels as usize);
        let mut pixels = vec![0u8; w * h * c];
        let block = self.intruder_phase(index).map(|phase| {
            let size = (w.min(h) / 4).max(1);
            let x = ((w - size) as f64 * phase) as usize;
            let y = (h - size) / 2;
            (x, y, size)
        });

        for y in 0..h {
            for x in 0..w {
                let base = 60.0 + 80.0 * (y as f64 / h.max(1) as f64);
                let lit = block
                    .map(|(bx, by, size)| x >= bx && x < bx + size && y >= by && y < by + size)
                    .unwrap_or(false);
                let value = if lit { 240.0 } else { base + self.rng.sample::<f64, _>(StandardNormal) * self.noise_sigma };
                let value = value.clamp(0.0, 255.0) as u8;
                for ch in 0..c {
                    pixels[(y * w + x) * c + ch] = value;
                }
            }
        }
        pixels
    }
}

fn frames_for(frame_rate: f64, secs: f64) -> u64 {
    (frame_rate * secs).round().max(0.0) as u64
}

#[async_trait]
impl FrameSource for SyntheticSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn self_paced(&self) -> bool {
        self.realtime
    }

    async fn next(&mut self) -> Result<Option<SourceFrame>, SourceError> {
        if self.limit.map(|limit| self.sequence >= limit).unwrap_or(false) {
            return Ok(None);
        }

        if self.realtime {
            let period = Duration::from_secs_f64(1.0 / self.frame_rate);
            let ticker = self.ticker.get_or_insert_with(|| {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                ticker
            });
            ticker.tick().await;
        }

        let index = self.sequence;
        self.sequence += 1;
        let pixels = self.render(index);

        Ok(Some(SourceFrame {
            width: self.width,
            height: self.height,
            channels: self.channels,
            pixels,
            timestamp: Some(self.timestamp_of(index)),
        }))
    }
}
