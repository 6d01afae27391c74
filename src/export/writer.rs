// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/alarmcam

//! Uncompressed artifact writer: PPM/PGM stills and YUV4MPEG2 clips

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use tracing::{info, warn};

use super::MediaExporter;
use crate::buffer::Frame;
use crate::error::ExportError;

/// Writes artifacts into one directory
pub struct FileExporter {
    path: PathBuf,
}

impl FileExporter {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, ExportError> {
        let path = path.into();
        std::fs::create_dir_all(&path).map_err(|e| ExportError::io(&path, e))?;
        Ok(Self { path })
    }

    fn create(&self, name: &str) -> Result<(PathBuf, BufWriter<File>), ExportError> {
        let path = self.path.join(name);
        let file = File::create(&path).map_err(|e| ExportError::io(&path, e))?;
        Ok((path, BufWriter::new(file)))
    }
}

/// Full-range BT.601
fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    let clamp = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    (clamp(y), clamp(cb), clamp(cr))
}

fn write_y4m_frame<W: Write>(writer: &mut W, frame: &Frame) -> std::io::Result<()> {
    writer.write_all(b"FRAME\n")?;
    if frame.channels == 1 {
        return writer.write_all(&frame.pixels);
    }

    let pixels = frame.pixels.len() / 3;
    let mut planes = vec![0u8; pixels * 3];
    for (i, rgb) in frame.pixels.chunks_exact(3).enumerate() {
        let (y, cb, cr) = rgb_to_ycbcr(rgb[0], rgb[1], rgb[2]);
        planes[i] = y;
        planes[pixels + i] = cb;
        planes[2 * pixels + i] = cr;
    }
    writer.write_all(&planes)
}

impl MediaExporter for FileExporter {
    fn write_image(&self, frame: &Frame, stem: &str) -> Result<PathBuf, ExportError> {
        let (magic, ext) = if frame.channels == 1 { ("P5", "pgm") } else { ("P6", "ppm") };
        let (path, mut writer) = self.create(&format!("{}.{}", stem, ext))?;

        write!(writer, "{}\n{} {}\n255\n", magic, frame.width, frame.height)
            .and_then(|_| writer.write_all(&frame.pixels))
            .and_then(|_| writer.flush())
            .map_err(|e| ExportError::io(&path, e))?;

        info!("Wrote still {:?}", path);
        Ok(path)
    }

    fn write_clip(&self, frames: &[Frame], frame_rate: f64, stem: &str) -> Result<PathBuf, ExportError> {
        let first = frames.first().ok_or(ExportError::EmptyClip)?;
        let (path, mut writer) = self.create(&format!("{}.y4m", stem))?;
        let colorspace = if first.channels == 1 { "Cmono" } else { "C444" };
        let rate_num = (frame_rate * 1000.0).round().max(1.0) as u64;

        let mut written = 0usize;
        let result = (|| -> std::io::Result<()> {
            writeln!(
                writer,
                "YUV4MPEG2 W{} H{} F{}:1000 Ip A1:1 {}",
                first.width, first.height, rate_num, colorspace
            )?;
            for frame in frames {
                if (frame.width, frame.height, frame.channels) != (first.width, first.height, first.channels) {
                    warn!("Skipping frame {} with mismatched geometry", frame.seq);
                    continue;
                }
                write_y4m_frame(&mut writer, frame)?;
                written += 1;
            }
            writer.flush()
        })();
        result.map_err(|e| ExportError::io(&path, e))?;

        info!("Wrote clip {:?} ({} frames @ {} fps)", path, written, frame_rate);
        Ok(path)
    }
}
