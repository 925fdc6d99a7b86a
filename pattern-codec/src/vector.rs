//! Vector table codec
//!
//! The CPU ROM holds one packed descriptor per scanline. Two shapes exist.
//!
//! # 4:3 descriptor (3 bytes)
//! ```text
//! 0x00: sequence   bits 0-1 select a low-byte pattern, bits 2-7 residual
//! 0x01: msbA       high byte shared by back porch and front porch
//! 0x02: msbB       high byte of the centre segment
//!
//! back   = (msbA << 8) | pattern.back
//! centre = (msbB << 8) | pattern.centre
//! front  = (msbA << 8) | pattern.front
//! ```
//!
//! # 16:9 descriptor (2 bytes)
//! ```text
//! 0x00: addressHigh   centre bits 8-15
//! 0x01: control       0x20 → bit 16, 0x04 → bit 17, 0x08 → bit 18, rest residual
//!
//! back = centre - 256   (no front porch)
//! ```
//!
//! Decoded addresses are raw chip addresses ([`RomVector`]); scale by
//! roms-per-component to get plane addresses ([`VectorEntry`]).

use crate::error::{CodecError, Result};
use crate::standard::VectorFormat;
use crate::PAGE_SIZE;

/// Low-byte patterns `[back, centre, front]` indexed by `sequence & 0x03`
pub const LOW_BYTE_PATTERNS: [[u8; 3]; 4] = [
    [0x80, 0x80, 0xC0],
    [0x80, 0x00, 0xC0],
    [0x00, 0x00, 0x40],
    [0x00, 0x80, 0x40],
];

/// Control bit → centre address bit, 16:9 format
pub const WIDE_ADDRESS_BITS: [(u8, u32); 3] = [(0x20, 16), (0x04, 17), (0x08, 18)];

/// Distance from a 16:9 back porch to its centre, raw units
pub const WIDE_BACK_PORCH_OFFSET: u32 = PAGE_SIZE;

const SEQUENCE_MASK: u8 = 0x03;
const WIDE_CONTROL_MASK: u8 = 0x20 | 0x04 | 0x08;

/// Descriptor in raw chip addresses
///
/// `residual` keeps the descriptor bits that are not part of any address so
/// a decoded table re-encodes byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RomVector {
    pub back_porch: u32,
    pub centre: u32,
    pub front_porch: Option<u32>,
    pub residual: u8,
}

impl RomVector {
    /// Scale to plane addresses for one component
    pub fn scale(&self, roms_per_component: u32) -> VectorEntry {
        let rpc = roms_per_component as usize;
        VectorEntry {
            back_porch: self.back_porch as usize * rpc,
            centre: self.centre as usize * rpc,
            front_porch: self.front_porch.map(|f| f as usize * rpc),
        }
    }

    /// Highest raw address touched when each segment spans `lengths`
    pub fn end(&self, lengths: (u32, u32, u32)) -> u32 {
        let back = self.back_porch + lengths.0;
        let centre = self.centre + lengths.1;
        let front = self.front_porch.map_or(0, |f| f + lengths.2);
        back.max(centre).max(front)
    }
}

impl std::fmt::Display for RomVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "back={:#07x} centre={:#07x}", self.back_porch, self.centre)?;
        if let Some(front) = self.front_porch {
            write!(f, " front={:#07x}", front)?;
        }
        Ok(())
    }
}

/// Descriptor in plane addresses for one component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorEntry {
    pub back_porch: usize,
    pub centre: usize,
    pub front_porch: Option<usize>,
}

impl VectorEntry {
    /// Convert back to raw chip addresses
    ///
    /// Every address must be a multiple of `roms_per_component`.
    pub fn to_rom(&self, roms_per_component: u32) -> Result<RomVector> {
        let rpc = roms_per_component as usize;
        let unscale = |address: usize| -> Result<u32> {
            if address % rpc != 0 {
                return Err(CodecError::Unrepresentable {
                    vector: format!("{:?}", self),
                    reason: format!("{} is not a multiple of {}", address, rpc),
                });
            }
            u32::try_from(address / rpc).map_err(|_| CodecError::Unrepresentable {
                vector: format!("{:?}", self),
                reason: format!("{} exceeds the address space", address),
            })
        };

        Ok(RomVector {
            back_porch: unscale(self.back_porch)?,
            centre: unscale(self.centre)?,
            front_porch: self.front_porch.map(unscale).transpose()?,
            residual: 0,
        })
    }
}

// =============================================================================
// 4:3 descriptors
// =============================================================================

/// Decode a 3-byte descriptor to raw addresses
pub fn decode_rom_43(bytes: [u8; 3]) -> RomVector {
    let [sequence, msb_a, msb_b] = bytes;
    let [back, centre, front] = LOW_BYTE_PATTERNS[(sequence & SEQUENCE_MASK) as usize];

    RomVector {
        back_porch: ((msb_a as u32) << 8) | back as u32,
        centre: ((msb_b as u32) << 8) | centre as u32,
        front_porch: Some(((msb_a as u32) << 8) | front as u32),
        residual: sequence & !SEQUENCE_MASK,
    }
}

/// Encode raw addresses as a 3-byte descriptor
pub fn encode_rom_43(vector: &RomVector) -> Result<[u8; 3]> {
    let fail = |reason: String| CodecError::Unrepresentable {
        vector: vector.to_string(),
        reason,
    };

    let front = vector
        .front_porch
        .ok_or_else(|| fail("4:3 descriptors need a front porch".into()))?;
    let limit = VectorFormat::Standard43.address_space();
    if vector.back_porch >= limit || vector.centre >= limit || front >= limit {
        return Err(fail(format!("address beyond {:#x}", limit)));
    }
    if vector.back_porch >> 8 != front >> 8 {
        return Err(fail("back and front porch must share a high byte".into()));
    }

    let lows = [
        (vector.back_porch & 0xFF) as u8,
        (vector.centre & 0xFF) as u8,
        (front & 0xFF) as u8,
    ];
    let index = LOW_BYTE_PATTERNS
        .iter()
        .position(|pattern| *pattern == lows)
        .ok_or_else(|| fail(format!("no sequence pattern yields low bytes {:02x?}", lows)))?;

    Ok([
        (vector.residual & !SEQUENCE_MASK) | index as u8,
        (vector.back_porch >> 8) as u8,
        (vector.centre >> 8) as u8,
    ])
}

/// Decode a 3-byte descriptor to plane addresses
pub fn decode_vector_43(bytes: [u8; 3], roms_per_component: u32) -> VectorEntry {
    decode_rom_43(bytes).scale(roms_per_component)
}

/// Encode plane addresses as a 3-byte descriptor
pub fn encode_vector_43(entry: &VectorEntry, roms_per_component: u32) -> Result<[u8; 3]> {
    encode_rom_43(&entry.to_rom(roms_per_component)?)
}

// =============================================================================
// 16:9 descriptors
// =============================================================================

/// Decode a 2-byte descriptor to raw addresses
pub fn decode_rom_169(bytes: [u8; 2]) -> Result<RomVector> {
    let [address_high, control] = bytes;

    let mut centre = (address_high as u32) << 8;
    for (mask, bit) in WIDE_ADDRESS_BITS {
        if control & mask != 0 {
            centre |= 1 << bit;
        }
    }

    let back_porch =
        centre
            .checked_sub(WIDE_BACK_PORCH_OFFSET)
            .ok_or_else(|| CodecError::Unrepresentable {
                vector: format!("{:02x?}", bytes),
                reason: "centre lies below the back porch offset".into(),
            })?;

    Ok(RomVector {
        back_porch,
        centre,
        front_porch: None,
        residual: control & !WIDE_CONTROL_MASK,
    })
}

/// Encode raw addresses as a 2-byte descriptor
pub fn encode_rom_169(vector: &RomVector) -> Result<[u8; 2]> {
    let fail = |reason: &str| CodecError::Unrepresentable {
        vector: vector.to_string(),
        reason: reason.into(),
    };

    if vector.front_porch.is_some() {
        return Err(fail("16:9 descriptors have no front porch"));
    }
    if vector.centre & 0xFF != 0 {
        return Err(fail("centre must be page aligned"));
    }
    if vector.centre >= VectorFormat::Wide169.address_space() {
        return Err(fail("centre beyond 19-bit address space"));
    }
    if vector.centre.checked_sub(WIDE_BACK_PORCH_OFFSET) != Some(vector.back_porch) {
        return Err(fail("back porch must sit one page below the centre"));
    }

    let mut control = vector.residual & !WIDE_CONTROL_MASK;
    for (mask, bit) in WIDE_ADDRESS_BITS {
        if vector.centre & (1 << bit) != 0 {
            control |= mask;
        }
    }

    Ok([((vector.centre >> 8) & 0xFF) as u8, control])
}

/// Decode a 2-byte descriptor to plane addresses
pub fn decode_vector_169(bytes: [u8; 2], roms_per_component: u32) -> Result<VectorEntry> {
    Ok(decode_rom_169(bytes)?.scale(roms_per_component))
}

/// Encode plane addresses as a 2-byte descriptor
pub fn encode_vector_169(entry: &VectorEntry, roms_per_component: u32) -> Result<[u8; 2]> {
    encode_rom_169(&entry.to_rom(roms_per_component)?)
}

// =============================================================================
// Tables
// =============================================================================

/// Decode a whole field's vector table
pub fn decode_table(bytes: &[u8], format: VectorFormat) -> Result<Vec<RomVector>> {
    let stride = format.bytes_per_entry();
    if bytes.len() % stride != 0 {
        return Err(CodecError::config(format!(
            "vector table of {} bytes is not a whole number of {}-byte entries",
            bytes.len(),
            stride
        )));
    }

    bytes
        .chunks_exact(stride)
        .map(|chunk| match format {
            VectorFormat::Standard43 => Ok(decode_rom_43([chunk[0], chunk[1], chunk[2]])),
            VectorFormat::Wide169 => decode_rom_169([chunk[0], chunk[1]]),
        })
        .collect()
}

/// Encode a whole field's vector table
pub fn encode_table(vectors: &[RomVector], format: VectorFormat) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(vectors.len() * format.bytes_per_entry());
    for vector in vectors {
        match format {
            VectorFormat::Standard43 => bytes.extend_from_slice(&encode_rom_43(vector)?),
            VectorFormat::Wide169 => bytes.extend_from_slice(&encode_rom_169(vector)?),
        }
    }
    Ok(bytes)
}
