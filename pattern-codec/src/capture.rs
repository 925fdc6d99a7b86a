//! Captured line samples (encoder input)
//!
//! A capture is three planes of little-endian `u16` samples (Y, R-Y, B-Y),
//! [`CAPTURE_LINE_SAMPLES`] per line, holding one or two whole frames of the
//! target standard.

use xxhash_rust::xxh3::Xxh3;

use crate::CAPTURE_LINE_SAMPLES;
use crate::error::{CodecError, Result};
use crate::standard::Standard;

/// One captured scanline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSamples {
    pub y: Vec<u16>,
    pub ry: Vec<u16>,
    pub by: Vec<u16>,
    hash: u64,
}

impl LineSamples {
    pub fn new(y: Vec<u16>, ry: Vec<u16>, by: Vec<u16>) -> Self {
        let mut line = Self { y, ry, by, hash: 0 };
        line.rehash();
        line
    }

    /// Content hash over all three components
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Recompute the content hash after editing samples
    pub fn rehash(&mut self) {
        let mut hasher = Xxh3::new();
        for plane in [&self.y, &self.ry, &self.by] {
            hasher.update(&(plane.len() as u32).to_le_bytes());
            for sample in plane.iter() {
                hasher.update(&sample.to_le_bytes());
            }
        }
        self.hash = hasher.digest();
    }

    /// Halve chroma resolution by averaging adjacent pairs (4:2:2)
    pub fn decimate_422(&mut self) {
        for plane in [&mut self.ry, &mut self.by] {
            *plane = plane
                .chunks(2)
                .map(|pair| {
                    let n = pair.len() as u32;
                    let sum: u32 = pair.iter().map(|&s| s as u32).sum();
                    ((sum + n / 2) / n) as u16
                })
                .collect();
        }
        self.rehash();
    }

    /// Halve chroma resolution by keeping co-sited (even) samples
    pub fn subsample_chroma(&mut self) {
        for plane in [&mut self.ry, &mut self.by] {
            *plane = plane.iter().step_by(2).copied().collect();
        }
        self.rehash();
    }

    /// Hash match confirmed sample for sample
    pub fn same_content(&self, other: &LineSamples) -> bool {
        self.hash == other.hash && self.y == other.y && self.ry == other.ry && self.by == other.by
    }
}

/// Whole capture, split into frames of the standard's line count
#[derive(Debug, Clone)]
pub struct Capture {
    pub standard: Standard,
    pub frames: Vec<Vec<LineSamples>>,
}

impl Capture {
    /// Build a capture from flat sample planes
    pub fn from_samples(standard: Standard, y: &[u16], ry: &[u16], by: &[u16]) -> Result<Self> {
        let frame_lines = standard.geometry().capture_lines();
        let shape_error = |samples: usize| CodecError::InputShape {
            standard,
            samples,
            line_len: CAPTURE_LINE_SAMPLES,
            expected: format!("{} or {}", frame_lines, frame_lines * 2),
        };

        for plane in [y, ry, by] {
            let whole_lines = plane.len() % CAPTURE_LINE_SAMPLES == 0;
            let lines = plane.len() / CAPTURE_LINE_SAMPLES;
            if !whole_lines || (lines != frame_lines && lines != frame_lines * 2) {
                return Err(shape_error(plane.len()));
            }
        }
        if ry.len() != y.len() || by.len() != y.len() {
            return Err(shape_error(ry.len().max(by.len())));
        }

        let line = |plane: &[u16], n: usize| {
            plane[n * CAPTURE_LINE_SAMPLES..(n + 1) * CAPTURE_LINE_SAMPLES].to_vec()
        };
        let lines: Vec<LineSamples> = (0..y.len() / CAPTURE_LINE_SAMPLES)
            .map(|n| LineSamples::new(line(y, n), line(ry, n), line(by, n)))
            .collect();

        let frames: Vec<Vec<LineSamples>> =
            lines.chunks(frame_lines).map(<[LineSamples]>::to_vec).collect();
        tracing::debug!("{} capture: {} frame(s) of {} lines", standard, frames.len(), frame_lines);

        Ok(Self { standard, frames })
    }

    /// Build a capture from little-endian `u16` byte planes
    pub fn from_le_bytes(standard: Standard, y: &[u8], ry: &[u8], by: &[u8]) -> Result<Self> {
        let words = |bytes: &[u8]| -> Result<Vec<u16>> {
            if bytes.len() % 2 != 0 {
                return Err(CodecError::InputShape {
                    standard,
                    samples: bytes.len() / 2,
                    line_len: CAPTURE_LINE_SAMPLES,
                    expected: "whole 16-bit samples".into(),
                });
            }
            Ok(bytes
                .chunks_exact(2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .collect())
        };
        Self::from_samples(standard, &words(y)?, &words(ry)?, &words(by)?)
    }
}
