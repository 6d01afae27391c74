// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Built-in detector backends

use crate::buffer::Frame;
use crate::error::DetectorError;
use super::{Blob, BoundingBox, Detection, Detector, Preprocessing};

/// Change detector over consecutive downscaled blobs.
///
/// Confidence grows with the fraction of blob cells that moved by more than
/// `pixel_delta` since the previous sample, saturating at `saturation`.
pub struct FrameDiffDetector {
    input_size: (u32, u32),
    pixel_delta: f32,
    min_fraction: f32,
    saturation: f32,
    previous: Option<Blob>,
}

impl FrameDiffDetector {
    pub fn new(input_size: (u32, u32)) -> Self {
        Self {
            input_size,
            pixel_delta: 25.0,
            min_fraction: 0.002,
            saturation: 0.05,
            previous: None,
        }
    }

    fn compare(&self, prev: &Blob, cur: &Blob, scale: f32) -> Option<Detection> {
        if prev.data.len() != cur.data.len() {
            return None;
        }

        let threshold = self.pixel_delta * scale.abs();
        let (w, h) = (cur.width as usize, cur.height as usize);
        let plane = w * h;
        let mut changed = 0usize;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (w, h, 0usize, 0usize);

        for i in 0..plane {
            let moved = (0..cur.channels as usize)
                .any(|c| (cur.data[c * plane + i] - prev.data[c * plane + i]).abs() > threshold);
            if moved {
                changed += 1;
                let (x, y) = (i % w, i / w);
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        let fraction = changed as f32 / plane.max(1) as f32;
        if changed == 0 || fraction < self.min_fraction {
            return None;
        }

        Some(Detection {
            confidence: (fraction / self.saturation).min(1.0),
            class_id: 0,
            bbox: BoundingBox {
                left: min_x as f32 / w as f32,
                top: min_y as f32 / h as f32,
                right: (max_x + 1) as f32 / w as f32,
                bottom: (max_y + 1) as f32 / h as f32,
            },
        })
    }
}

impl Detector for FrameDiffDetector {
    fn name(&self) -> &str {
        "framediff"
    }

    fn infer(&mut self, frame: &Frame, pre: &Preprocessing) -> Result<Vec<Detection>, DetectorError> {
        let blob = Blob::from_frame(frame, pre, self.input_size);
        let detection = self
            .previous
            .as_ref()
            .and_then(|prev| self.compare(prev, &blob, pre.scale_factor as f32));
        self.previous = Some(blob);
        Ok(detection.into_iter().collect())
    }
}

/// Never reports anything; keeps the pipeline running without a model
pub struct NullDetector;

impl Detector for NullDetector {
    fn name(&self) -> &str {
        "none"
    }

    fn infer(&mut self, _frame: &Frame, _pre: &Preprocessing) -> Result<Vec<Detection>, DetectorError> {
        Ok(Vec::new())
    }
}

type Script = Box<dyn FnMut(&Frame) -> Result<Option<f32>, DetectorError> + Send>;

/// Reports whatever confidence a closure assigns to each frame
pub struct ScriptedDetector {
    script: Script,
}

impl ScriptedDetector {
    pub fn new<F>(script: F) -> Self
    where
        F: FnMut(&Frame) -> Result<Option<f32>, DetectorError> + Send + 'static,
    {
        Self {
            script: Box::new(script),
        }
    }
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &str {
        "scripted"
    }

    fn infer(&mut self, frame: &Frame, _pre: &Preprocessing) -> Result<Vec<Detection>, DetectorError> {
        Ok((self.script)(frame)?
            .map(|confidence| Detection {
                confidence,
                class_id: 0,
                bbox: BoundingBox::full(),
            })
            .into_iter()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::tests::at_ms;
    use std::path::Path;

    fn gray(fill: u8, block: Option<(usize, usize)>) -> Frame {
        let (w, h) = (64usize, 48usize);
        let mut pixels = vec![fill; w * h];
        if let Some((bx, by)) = block {
            for y in by..by + 12 {
                for x in bx..bx + 12 {
                    pixels[y * w + x] = 255;
                }
            }
        }
        Frame {
            seq: 0,
            timestamp: at_ms(0),
            width: w as u32,
            height: h as u32,
            channels: 1,
            pixels,
        }
    }

    #[test]
    fn test_first_frame_never_detects() {
        let mut detector = FrameDiffDetector::new((32, 24));
        let pre = Preprocessing::for_model(Path::new("m.caffemodel"));
        assert!(detector.infer(&gray(40, None), &pre).unwrap().is_empty());
        assert!(detector.infer(&gray(40, None), &pre).unwrap().is_empty());
    }

    #[test]
    fn test_moving_block_detected() {
        let mut detector = FrameDiffDetector::new((32, 24));
        let pre = Preprocessing::for_model(Path::new("m.pb"));
        detector.infer(&gray(40, None), &pre).unwrap();

        let found = detector.infer(&gray(40, Some((20, 10))), &pre).unwrap();
        assert_eq!(found.len(), 1);
        let detection = &found[0];
        assert!(detection.confidence >= 0.5);
        assert!(detection.bbox.left >= 0.25 && detection.bbox.right <= 0.55);
    }

    #[test]
    fn test_scripted_detector() {
        let mut detector = ScriptedDetector::new(|frame| {
            Ok((frame.pixels[0] > 100).then_some(0.9))
        });
        let pre = Preprocessing::for_model(Path::new("m.pb"));

        assert!(detector.infer(&gray(10, None), &pre).unwrap().is_empty());
        assert_eq!(detector.infer(&gray(200, None), &pre).unwrap()[0].confidence, 0.9);
    }
}
