// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Detector input preprocessing

use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::buffer::Frame;

/// Scale, mean subtraction and channel order applied before inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessing {
    pub scale_factor: f64,
    pub mean: [f64; 3],
    pub swap_channels: bool,
}

impl Preprocessing {
    /// Caffe SSD models take raw BGR with a per-channel mean; TensorFlow
    /// exports expect RGB scaled to [-1, 1].
    pub fn for_model(model: &Path) -> Self {
        let caffe = model
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("caffemodel"))
            .unwrap_or(false);

        if caffe {
            Self {
                scale_factor: 1.0,
                mean: [104.0, 177.0, 123.0],
                swap_channels: false,
            }
        } else {
            Self {
                scale_factor: 1.0 / 127.5,
                mean: [127.5, 127.5, 127.5],
                swap_channels: true,
            }
        }
    }
}

/// Planar float tensor (C x H x W) fed to a network
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<f32>,
}

impl Blob {
    /// Nearest-neighbour resize to `size`, then `(pixel - mean) * scale` per channel
    pub fn from_frame(frame: &Frame, pre: &Preprocessing, size: (u32, u32)) -> Self {
        let (width, height) = size;
        let channels = frame.channels.max(1);
        let plane = (width * height) as usize;
        let mut data = vec![0.0f32; plane * channels as usize];

        if frame.width == 0 || frame.height == 0 || frame.pixels.is_empty() {
            return Self { width, height, channels, data };
        }

        let stride = frame.width as usize * channels as usize;
        for c in 0..channels as usize {
            let src_c = if pre.swap_channels && channels == 3 { 2 - c } else { c };
            let mean = pre.mean[c.min(2)];
            let out = &mut data[c * plane..(c + 1) * plane];

            for y in 0..height as usize {
                let sy = y * frame.height as usize / height as usize;
                for x in 0..width as usize {
                    let sx = x * frame.width as usize / width as usize;
                    let idx = sy * stride + sx * channels as usize + src_c;
                    let px = frame.pixels.get(idx).copied().unwrap_or(0) as f64;
                    out[y * width as usize + x] = ((px - mean) * pre.scale_factor) as f32;
                }
            }
        }

        Self { width, height, channels, data }
    }

    pub fn plane(&self, channel: usize) -> &[f32] {
        let plane = (self.width * self.height) as usize;
        &self.data[channel * plane..(channel + 1) * plane]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::tests::at_ms;

    fn rgb_frame(r: u8, g: u8, b: u8) -> Frame {
        let pixels = [r, g, b].repeat(16);
        Frame {
            seq: 0,
            timestamp: at_ms(0),
            width: 4,
            height: 4,
            channels: 3,
            pixels,
        }
    }

    #[test]
    fn test_model_family_selection() {
        let caffe = Preprocessing::for_model(Path::new("models/res10.caffemodel"));
        assert_eq!(caffe.scale_factor, 1.0);
        assert_eq!(caffe.mean, [104.0, 177.0, 123.0]);
        assert!(!caffe.swap_channels);

        let tf = Preprocessing::for_model(Path::new("models/ssd_mobilenet.pb"));
        assert!((tf.scale_factor - 1.0 / 127.5).abs() < 1e-12);
        assert!(tf.swap_channels);
    }

    #[test]
    fn test_blob_swaps_and_normalizes() {
        let frame = rgb_frame(255, 0, 127);
        let pre = Preprocessing {
            scale_factor: 1.0,
            mean: [0.0, 0.0, 0.0],
            swap_channels: true,
        };
        let blob = Blob::from_frame(&frame, &pre, (2, 2));

        assert_eq!(blob.data.len(), 12);
        assert!(blob.plane(0).iter().all(|v| *v == 127.0));
        assert!(blob.plane(1).iter().all(|v| *v == 0.0));
        assert!(blob.plane(2).iter().all(|v| *v == 255.0));
    }

    #[test]
    fn test_blob_mean_and_scale() {
        let frame = rgb_frame(255, 255, 255);
        let pre = Preprocessing::for_model(Path::new("net.pb"));
        let blob = Blob::from_frame(&frame, &pre, (300, 300));

        assert_eq!(blob.width, 300);
        assert!(blob.data.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }
}
