// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Headerless raw video (e.g. `ffmpeg -f rawvideo -pix_fmt rgb24`)

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{FrameSource, SourceFrame};
use crate::error::SourceError;

/// Reads back-to-back frames of fixed geometry from any async reader
pub struct RawVideoSource<R> {
    id: String,
    reader: R,
    width: u32,
    height: u32,
    channels: u8,
}

impl<R: AsyncRead + Unpin + Send> RawVideoSource<R> {
    pub fn new(id: &str, reader: R, width: u32, height: u32, channels: u8) -> Self {
        Self {
            id: id.to_string(),
            reader,
            width,
            height,
            channels,
        }
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FrameSource for RawVideoSource<R> {
    fn id(&self) -> &str {
        &self.id
    }

    fn self_paced(&self) -> bool {
        false
    }

    async fn next(&mut self) -> Result<Option<SourceFrame>, SourceError> {
        let expected = self.frame_len();
        let mut pixels = vec![0u8; expected];
        let mut filled = 0;

        while filled < expected {
            let n = self.reader.read(&mut pixels[filled..]).await?;
            if n == 0 {
                return if filled == 0 {
                    Ok(None)
                } else {
                    Err(SourceError::Truncated { expected, got: filled })
                };
            }
            filled += n;
        }

        Ok(Some(SourceFrame {
            width: self.width,
            height: self.height,
            channels: self.channels,
            pixels,
            timestamp: None,
        }))
    }
}
