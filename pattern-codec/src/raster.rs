//! Raster components and frame composition
//!
//! Assembled rasters keep native samples (10-bit luma, 8-bit chroma at half
//! width). [`FrameRaster`] turns them into three equal-sized 8-bit planes for
//! an external previewer.

use serde::{Deserialize, Serialize};

use crate::assemble::ComponentRaster;
use crate::error::{CodecError, Result};
use crate::{CHROMA_BLANK, ROMS_PER_CHROMA, ROMS_PER_LUMA};

/// Video component drawn from the sample planes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Component {
    /// 10-bit luminance
    Luma,
    /// Luminance low bits only (selector chip view)
    LumaLsb,
    /// R-Y colour difference
    #[serde(rename = "ry")]
    RY,
    /// B-Y colour difference
    #[serde(rename = "by")]
    BY,
}

/// Native sample → display byte, indexed by [`Component::index`]
const PIXEL_FNS: [fn(u16) -> u8; 4] = [luma_pixel, luma_lsb_pixel, chroma_pixel, chroma_pixel];

fn luma_pixel(sample: u16) -> u8 {
    (sample >> 2).min(255) as u8
}

fn luma_lsb_pixel(sample: u16) -> u8 {
    ((sample & 0b11) * 85) as u8
}

fn chroma_pixel(sample: u16) -> u8 {
    sample.min(255) as u8
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Luma,
        Component::LumaLsb,
        Component::RY,
        Component::BY,
    ];

    const fn index(self) -> usize {
        match self {
            Component::Luma => 0,
            Component::LumaLsb => 1,
            Component::RY => 2,
            Component::BY => 3,
        }
    }

    /// Physical chips interleaved into this component's plane
    pub const fn roms_per_component(self) -> u32 {
        match self {
            Component::Luma | Component::LumaLsb => ROMS_PER_LUMA,
            Component::RY | Component::BY => ROMS_PER_CHROMA,
        }
    }

    pub const fn is_chroma(self) -> bool {
        matches!(self, Component::RY | Component::BY)
    }

    /// Map a native sample to its display byte
    #[inline]
    pub fn pixel(self, sample: u16) -> u8 {
        PIXEL_FNS[self.index()](sample)
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Component::Luma => "luma",
            Component::LumaLsb => "luma-lsb",
            Component::RY => "R-Y",
            Component::BY => "B-Y",
        };
        f.write_str(name)
    }
}

/// Three equal-sized 8-bit planes, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRaster {
    pub width: usize,
    pub height: usize,
    pub luma: Vec<u8>,
    pub chroma_ry: Vec<u8>,
    pub chroma_by: Vec<u8>,
}

impl FrameRaster {
    /// Compose display planes; chroma is repeated to luma width
    pub fn compose(
        luma: &ComponentRaster,
        ry: &ComponentRaster,
        by: &ComponentRaster,
    ) -> Result<Self> {
        for chroma in [ry, by] {
            if chroma.height != luma.height || chroma.width * 2 != luma.width {
                return Err(CodecError::config(format!(
                    "{} raster {}x{} does not pair with luma raster {}x{}",
                    chroma.component, chroma.width, chroma.height, luma.width, luma.height
                )));
            }
        }

        let widen = |raster: &ComponentRaster| -> Vec<u8> {
            raster
                .samples
                .iter()
                .flat_map(|&s| {
                    let p = raster.component.pixel(s);
                    [p, p]
                })
                .collect()
        };

        Ok(Self {
            width: luma.width,
            height: luma.height,
            luma: luma.samples.iter().map(|&s| luma.component.pixel(s)).collect(),
            chroma_ry: widen(ry),
            chroma_by: widen(by),
        })
    }

    /// Row `line` of a plane
    pub fn row<'a>(&self, plane: &'a [u8], line: usize) -> &'a [u8] {
        &plane[line * self.width..(line + 1) * self.width]
    }

    /// Scale chroma around the neutral axis for preview
    ///
    /// Overshoot saturates at 0 and 255; this never fails.
    pub fn with_chroma_gain(&self, gain: f32) -> Self {
        let scale = |plane: &[u8]| -> Vec<u8> {
            plane
                .iter()
                .map(|&v| {
                    let centred = v as f32 - CHROMA_BLANK as f32;
                    (centred * gain + CHROMA_BLANK as f32).round().clamp(0.0, 255.0) as u8
                })
                .collect()
        };

        Self {
            width: self.width,
            height: self.height,
            luma: self.luma.clone(),
            chroma_ry: scale(&self.chroma_ry),
            chroma_by: scale(&self.chroma_by),
        }
    }
}
