// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Rolling frame buffer - time-ordered, bounded-age frame store

mod evictor;

pub use evictor::Evictor;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::debug;

/// One captured image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    /// Interleaved 8-bit pixels, row major
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn meta(&self) -> FrameMeta {
        FrameMeta {
            seq: self.seq,
            timestamp: self.timestamp,
        }
    }
}

/// Position and capture time of a stored frame, without its pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMeta {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
}

/// Converts a configured duration into calendar arithmetic
pub fn to_delta(duration: Duration) -> chrono::Duration {
    chrono::Duration::microseconds(duration.as_micros().min(i64::MAX as u128) as i64)
}

struct Inner {
    frames: VecDeque<Frame>,
    next_seq: u64,
}

/// Time-ordered frame store shared by the capture loop, the evictor and clip assembly.
///
/// Every operation takes one short exclusive lock; nothing is awaited or called out
/// while it is held. Consumers that outlive a frame's retention copy it out.
pub struct FrameStore {
    inner: Mutex<Inner>,
    appended: Notify,
    closed: AtomicBool,
}

impl FrameStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::new(),
                next_seq: 0,
            }),
            appended: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Appends a frame, assigning its sequence number.
    ///
    /// A timestamp older than the newest stored frame is clamped to it so the
    /// store stays non-decreasing even if the wall clock steps backwards.
    pub fn append(
        &self,
        timestamp: DateTime<Utc>,
        width: u32,
        height: u32,
        channels: u8,
        pixels: Vec<u8>,
    ) -> FrameMeta {
        let meta = {
            let mut inner = self.inner.lock();
            let timestamp = match inner.frames.back() {
                Some(last) if timestamp < last.timestamp => {
                    debug!(
                        "Clamping out-of-order frame timestamp {} to {}",
                        timestamp, last.timestamp
                    );
                    last.timestamp
                }
                _ => timestamp,
            };
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.frames.push_back(Frame {
                seq,
                timestamp,
                width,
                height,
                channels,
                pixels,
            });
            FrameMeta { seq, timestamp }
        };
        self.appended.notify_waiters();
        meta
    }

    /// Peeks at the oldest frame
    pub fn oldest(&self) -> Option<FrameMeta> {
        self.inner.lock().frames.front().map(Frame::meta)
    }

    /// Peeks at the newest frame
    pub fn newest(&self) -> Option<FrameMeta> {
        self.inner.lock().frames.back().map(Frame::meta)
    }

    /// Removes and returns the oldest frame; `None` when empty
    pub fn remove_oldest(&self) -> Option<Frame> {
        self.inner.lock().frames.pop_front()
    }

    /// Removes the oldest frame only if `pred` accepts it, under one lock
    pub fn remove_oldest_if<F>(&self, pred: F) -> Option<Frame>
    where
        F: FnOnce(&FrameMeta) -> bool,
    {
        let mut inner = self.inner.lock();
        let accept = inner.frames.front().map(|f| pred(&f.meta())).unwrap_or(false);
        if accept {
            inner.frames.pop_front()
        } else {
            None
        }
    }

    /// Copies one frame out of the store
    pub fn copy_frame(&self, seq: u64) -> Option<Frame> {
        let inner = self.inner.lock();
        Self::index_of(&inner, seq).map(|i| inner.frames[i].clone())
    }

    /// Copies frames walking backwards from `seq` (inclusive) while `accept` holds.
    ///
    /// An evicted `seq` yields nothing. The result is in capture order.
    pub fn copy_backward_while<F>(&self, seq: u64, mut accept: F) -> Vec<Frame>
    where
        F: FnMut(&FrameMeta) -> bool,
    {
        let inner = self.inner.lock();
        let start = match inner.frames.front() {
            Some(front) if seq >= front.seq => ((seq - front.seq) as usize).min(inner.frames.len() - 1),
            _ => return Vec::new(),
        };

        let mut out: Vec<Frame> = inner
            .frames
            .range(..=start)
            .rev()
            .take_while(|f| accept(&f.meta()))
            .cloned()
            .collect();
        out.reverse();
        out
    }

    /// Copies frames newer than `after_seq` while `accept` holds.
    ///
    /// Returns the copies and whether the walk was stopped by `accept`
    /// (`true`) rather than by running out of frames (`false`).
    pub fn copy_forward_while<F>(&self, after_seq: u64, mut accept: F) -> (Vec<Frame>, bool)
    where
        F: FnMut(&FrameMeta) -> bool,
    {
        let inner = self.inner.lock();
        let start = match inner.frames.front() {
            Some(front) if after_seq >= front.seq => (after_seq - front.seq + 1) as usize,
            Some(_) => 0,
            None => return (Vec::new(), false),
        };

        let mut out = Vec::new();
        for frame in inner.frames.range(start.min(inner.frames.len())..) {
            if !accept(&frame.meta()) {
                return (out, true);
            }
            out.push(frame.clone());
        }
        (out, false)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().frames.is_empty()
    }

    /// Metadata of every stored frame, oldest first
    pub fn metas(&self) -> Vec<FrameMeta> {
        self.inner.lock().frames.iter().map(Frame::meta).collect()
    }

    /// Marks the end of the stream and wakes every waiter
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.appended.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Waits until a frame newer than `after_seq` exists, the store closes, or the
    /// deadline passes. Returns `true` when a newer frame is available.
    pub async fn wait_for_append(&self, after_seq: u64, deadline: tokio::time::Instant) -> bool {
        loop {
            let notified = self.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.has_after(after_seq) {
                return true;
            }
            if self.is_closed() {
                return false;
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.has_after(after_seq);
            }
        }
    }

    fn has_after(&self, after_seq: u64) -> bool {
        self.inner
            .lock()
            .frames
            .back()
            .map(|f| f.seq > after_seq)
            .unwrap_or(false)
    }

    fn index_of(inner: &Inner, seq: u64) -> Option<usize> {
        let front = inner.frames.front()?;
        if seq < front.seq {
            return None;
        }
        let idx = (seq - front.seq) as usize;
        (idx < inner.frames.len()).then_some(idx)
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}
