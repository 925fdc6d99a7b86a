//! Pattern-Codec: ROM pattern codec for analogue TV pattern generators
//!
//! The generator stores its test patterns as a set of parallel EPROMs:
//! four luminance MSB chips, one shared luminance LSB selector chip, two
//! chips each for the R-Y and B-Y chrominance components, and a CPU ROM
//! holding a per-scanline **vector table** that tells the hardware where
//! each displayed line's samples begin.
//!
//! This crate converts in both directions:
//!
//! - **Decode**: chip images + vector table → full-resolution rasters
//!   ([`planes`] → [`vector`] → [`assemble`] → [`raster`]).
//! - **Encode**: captured line samples → new ROM content + vector table
//!   ([`capture`] → [`levels`] → [`patch`] → [`encode`] → [`image`]).
//!
//! It is a pure codec. Reading and writing chip files is delegated to a
//! [`RomStore`] implementation supplied by the caller.
//!
//! # Units
//!
//! ```text
//! raw address    byte index inside one physical chip
//! plane address  raw × roms-per-component (luma 4, chroma 2)
//! ```
//!
//! [`RomVector`] carries raw addresses, [`VectorEntry`] carries plane
//! addresses for one component.
//!
//! # Usage
//!
//! ```
//! use pattern_codec::{decode_vector_43, ROMS_PER_LUMA};
//!
//! let entry = decode_vector_43([0x02, 0x10, 0x20], ROMS_PER_LUMA);
//! assert_eq!(entry.back_porch, 16384);
//! assert_eq!(entry.centre, 32768);
//! assert_eq!(entry.front_porch, Some(16640));
//! ```

pub mod assemble;
pub mod capture;
pub mod encode;
pub mod error;
pub mod image;
pub mod levels;
pub mod patch;
pub mod planes;
pub mod raster;
pub mod standard;
pub mod store;
pub mod vector;

pub use assemble::{
    ComponentRaster, DecodeSession, DrawHook, FragmentCache, PatternFragment, Stripe,
    StripeMarker,
};
pub use capture::{Capture, LineSamples};
pub use encode::{ConvertedField, Donor, EncodeOptions, EncodeSession};
pub use error::{CodecError, Result};
pub use image::write_back;
pub use levels::{LevelProfile, map_chroma, map_luma};
pub use patch::{Patch, PatchLibrary, PatchSet, PatchStage, ProfileRequirement};
pub use planes::{SamplePlanes, reconstruct_luma, split_luma};
pub use raster::{Component, FrameRaster};
pub use standard::{Geometry, OutputLine, Standard, VectorFormat};
pub use store::{MemoryStore, RomManifest, RomPartRef, RomSet, RomStore, VectorRegion};
pub use vector::{
    RomVector, VectorEntry, decode_vector_43, decode_vector_169, encode_vector_43,
    encode_vector_169,
};

// =============================================================================
// Constants
// =============================================================================

/// Physical chips per luminance component (MSB planes)
pub const ROMS_PER_LUMA: u32 = 4;

/// Physical chips per chrominance component
pub const ROMS_PER_CHROMA: u32 = 2;

/// Samples per captured line, per component, before 4:2:2 decimation
pub const CAPTURE_LINE_SAMPLES: usize = 1024;

/// Raw address granularity of a line slot (one 256-byte page)
pub const PAGE_SIZE: u32 = 256;

/// Marker for "no sample here" in synthesized fields
pub const SAMPLE_ABSENT: i32 = -1;

/// Luma value written for absent samples (ROM white level)
pub const LUMA_BLANK: u16 = 164;

/// Chroma value written for absent samples (zero colour difference)
pub const CHROMA_BLANK: u8 = 128;

/// Largest 10-bit luma sample
pub const LUMA_MAX: i32 = 1023;

/// Largest 8-bit chroma sample
pub const CHROMA_MAX: i32 = 255;
