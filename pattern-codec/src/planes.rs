//! Sample plane reconstruction
//!
//! Luminance is 10 bits wide but every chip is 8 bits wide, so the hardware
//! spreads one luma sample over two chips: the top 8 bits live in one of four
//! MSB chips (selected by `address % 4`), and the bottom 2 bits live in the
//! shared LSB selector chip, which serves all four MSB chips at once.
//!
//! # Selector byte wiring
//!
//! ```text
//!   bit:    7    6    5    4    3    2    1    0
//!         [p3h][p2h][p1h][p0h][p3l][p2l][p1l][p0l]
//!
//!   plane p sample = (msb_p << 2) | (bit(p + 4) << 1) | bit(p)
//! ```
//!
//! Chrominance is a plain 2-way byte interleave of two chips per component.

use crate::error::{CodecError, Result};
use crate::raster::Component;
use crate::store::RomSet;

/// Selector bit positions `(bit 0 source, bit 1 source)` per luma plane
pub const LSB_SELECTOR_BITS: [(u8, u8); 4] = [(0, 4), (1, 5), (2, 6), (3, 7)];

/// Rebuild one 10-bit luma sample from its MSB byte and the shared selector
#[inline]
pub fn reconstruct_luma(msb: u8, selector: u8, plane: usize) -> u16 {
    let (lo, hi) = LSB_SELECTOR_BITS[plane];
    let bit0 = (selector >> lo) & 1;
    let bit1 = (selector >> hi) & 1;
    ((msb as u16) << 2) | ((bit1 as u16) << 1) | bit0 as u16
}

/// Split four consecutive 10-bit luma samples into MSB bytes + selector byte
#[inline]
pub fn split_luma(samples: [u16; 4]) -> ([u8; 4], u8) {
    let mut msb = [0u8; 4];
    let mut selector = 0u8;
    for (plane, &sample) in samples.iter().enumerate() {
        let (lo, hi) = LSB_SELECTOR_BITS[plane];
        msb[plane] = ((sample >> 2) & 0xFF) as u8;
        selector |= ((sample & 1) as u8) << lo;
        selector |= (((sample >> 1) & 1) as u8) << hi;
    }
    (msb, selector)
}

/// Full-resolution sample planes for one ROM set
///
/// Built once per load. `luma` holds 4× and each chroma plane 2× the chip
/// address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePlanes {
    pub luma: Vec<u16>,
    pub chroma_ry: Vec<u8>,
    pub chroma_by: Vec<u8>,
}

impl SamplePlanes {
    /// Interleave chip images into sample planes
    ///
    /// All chips must share one length.
    pub fn reconstruct(
        luma: [&[u8]; 4],
        lsb: &[u8],
        ry: [&[u8]; 2],
        by: [&[u8]; 2],
    ) -> Result<Self> {
        let len = lsb.len();
        let named = luma
            .iter()
            .enumerate()
            .map(|(i, p)| (format!("luminance{}", i), p.len()))
            .chain(ry.iter().enumerate().map(|(i, p)| (format!("chroma-ry{}", i), p.len())))
            .chain(by.iter().enumerate().map(|(i, p)| (format!("chroma-by{}", i), p.len())));
        for (part, actual) in named {
            if actual != len {
                return Err(CodecError::PlaneLengthMismatch {
                    part,
                    expected: len,
                    actual,
                });
            }
        }

        let mut luma_plane = Vec::with_capacity(len * 4);
        for i in 0..len {
            let selector = lsb[i];
            for (plane, chip) in luma.iter().enumerate() {
                luma_plane.push(reconstruct_luma(chip[i], selector, plane));
            }
        }

        Ok(Self {
            luma: luma_plane,
            chroma_ry: interleave(ry),
            chroma_by: interleave(by),
        })
    }

    /// Reconstruct from a loaded ROM set
    pub fn from_rom_set(roms: &RomSet) -> Result<Self> {
        Self::reconstruct(
            [&roms.luma[0], &roms.luma[1], &roms.luma[2], &roms.luma[3]],
            &roms.luma_lsb,
            [&roms.chroma_ry[0], &roms.chroma_ry[1]],
            [&roms.chroma_by[0], &roms.chroma_by[1]],
        )
    }

    /// Write the planes back into chip images (mirror of [`reconstruct`])
    ///
    /// [`reconstruct`]: SamplePlanes::reconstruct
    pub fn split_into(&self, roms: &mut RomSet) -> Result<()> {
        let len = roms.luma_lsb.len();
        if self.luma.len() != len * 4 {
            return Err(CodecError::PlaneLengthMismatch {
                part: "luminance".into(),
                expected: len * 4,
                actual: self.luma.len(),
            });
        }

        for (i, group) in self.luma.chunks_exact(4).enumerate() {
            let (msb, selector) = split_luma([group[0], group[1], group[2], group[3]]);
            for (plane, byte) in msb.into_iter().enumerate() {
                roms.luma[plane][i] = byte;
            }
            roms.luma_lsb[i] = selector;
        }

        deinterleave(&self.chroma_ry, &mut roms.chroma_ry, "chroma-ry")?;
        deinterleave(&self.chroma_by, &mut roms.chroma_by, "chroma-by")?;
        Ok(())
    }

    /// Plane length in samples for a component
    pub fn plane_len(&self, component: Component) -> usize {
        match component {
            Component::Luma | Component::LumaLsb => self.luma.len(),
            Component::RY => self.chroma_ry.len(),
            Component::BY => self.chroma_by.len(),
        }
    }

    /// Copy `length` samples starting at plane address `address`
    pub fn window(&self, component: Component, address: usize, length: usize) -> Result<Vec<u16>> {
        let plane_len = self.plane_len(component);
        let end = address
            .checked_add(length)
            .filter(|&end| end <= plane_len)
            .ok_or(CodecError::AddressOutOfBounds {
                component,
                address,
                length,
                plane_len,
            })?;

        Ok(match component {
            Component::Luma | Component::LumaLsb => self.luma[address..end].to_vec(),
            Component::RY => self.chroma_ry[address..end].iter().map(|&v| v as u16).collect(),
            Component::BY => self.chroma_by[address..end].iter().map(|&v| v as u16).collect(),
        })
    }
}

fn interleave(chips: [&[u8]; 2]) -> Vec<u8> {
    chips[0]
        .iter()
        .zip(chips[1])
        .flat_map(|(&even, &odd)| [even, odd])
        .collect()
}

fn deinterleave(plane: &[u8], chips: &mut [Vec<u8>; 2], name: &str) -> Result<()> {
    let expected = chips[0].len() * 2;
    if plane.len() != expected || chips[1].len() != chips[0].len() {
        return Err(CodecError::PlaneLengthMismatch {
            part: name.into(),
            expected,
            actual: plane.len(),
        });
    }
    for (i, pair) in plane.chunks_exact(2).enumerate() {
        chips[0][i] = pair[0];
        chips[1][i] = pair[1];
    }
    Ok(())
}
