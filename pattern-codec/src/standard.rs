//! Video standard geometry table
//!
//! Pure lookup: segment lengths, field sizes, vector format and the
//! interlace stitch order for each supported standard. Segment lengths are
//! in raw ROM address units; multiply by roms-per-component for plane units.

use serde::{Deserialize, Serialize};

use crate::PAGE_SIZE;

/// Supported video standards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Standard {
    /// PAL 4:3, 625 lines
    Pal,
    /// PAL 16:9 (wide vector format)
    PalWide,
    /// NTSC, 525 lines
    Ntsc,
    /// PAL-M, 525 lines with PAL colour
    PalM,
}

impl Standard {
    pub const ALL: [Standard; 4] = [
        Standard::Pal,
        Standard::PalWide,
        Standard::Ntsc,
        Standard::PalM,
    ];

    /// Geometry record for this standard
    pub fn geometry(self) -> &'static Geometry {
        match self {
            Standard::Pal => &PAL,
            Standard::PalWide => &PAL_WIDE,
            Standard::Ntsc => &NTSC,
            Standard::PalM => &PAL_M,
        }
    }

    /// Standards that alternate chroma phase line by line
    pub fn is_pal_family(self) -> bool {
        !matches!(self, Standard::Ntsc)
    }
}

impl std::fmt::Display for Standard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Standard::Pal => "PAL",
            Standard::PalWide => "PAL 16:9",
            Standard::Ntsc => "NTSC",
            Standard::PalM => "PAL-M",
        };
        f.write_str(name)
    }
}

/// On-disk vector table shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    /// 3 bytes per line: sequence, msbA, msbB
    Standard43,
    /// 2 bytes per line: addressHigh, control
    Wide169,
}

impl VectorFormat {
    pub const fn bytes_per_entry(self) -> usize {
        match self {
            VectorFormat::Standard43 => 3,
            VectorFormat::Wide169 => 2,
        }
    }

    /// Raw address space reachable by a descriptor
    pub const fn address_space(self) -> u32 {
        match self {
            VectorFormat::Standard43 => 1 << 16,
            VectorFormat::Wide169 => 1 << 19,
        }
    }
}

/// How the two fields' vector entries are stitched into output lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stitch {
    /// Castellation entry opens each field; the first output pair is swapped
    CastellatedTop,
    /// Castellation entry closes each field; the last output pair is swapped
    CastellatedBottom,
    /// Field B starts one entry after field A's last line; the entry in
    /// between has no display line and a synthesized blank line opens the
    /// raster instead
    BlankTop,
    /// Entries are already in frame order
    Sequential,
}

/// One line of an assembled raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLine {
    /// Copy the segments addressed by this vector table entry
    Vector(usize),
    /// Synthesized blank line (white luma, neutral chroma)
    Blank,
}

/// Per-standard constant record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub standard: Standard,
    pub back_porch: u32,
    pub centre: u32,
    pub front_porch: u32,
    pub lines_per_field: usize,
    pub format: VectorFormat,
    pub stitch: Stitch,
}

const PAL: Geometry = Geometry {
    standard: Standard::Pal,
    back_porch: 64,
    centre: 128,
    front_porch: 64,
    lines_per_field: 288,
    format: VectorFormat::Standard43,
    stitch: Stitch::CastellatedTop,
};

const PAL_WIDE: Geometry = Geometry {
    standard: Standard::PalWide,
    back_porch: 64,
    centre: 192,
    front_porch: 0,
    lines_per_field: 288,
    format: VectorFormat::Wide169,
    stitch: Stitch::Sequential,
};

const NTSC: Geometry = Geometry {
    standard: Standard::Ntsc,
    back_porch: 56,
    centre: 128,
    front_porch: 56,
    lines_per_field: 243,
    format: VectorFormat::Standard43,
    stitch: Stitch::BlankTop,
};

const PAL_M: Geometry = Geometry {
    standard: Standard::PalM,
    back_porch: 60,
    centre: 128,
    front_porch: 52,
    lines_per_field: 240,
    format: VectorFormat::Standard43,
    stitch: Stitch::CastellatedBottom,
};

impl Geometry {
    /// Active line width in raw units (back + centre + front)
    pub const fn line_width(&self) -> u32 {
        self.back_porch + self.centre + self.front_porch
    }

    /// `(back, centre, front)` in plane units for a component
    pub const fn segments(&self, roms_per_component: u32) -> (usize, usize, usize) {
        (
            (self.back_porch * roms_per_component) as usize,
            (self.centre * roms_per_component) as usize,
            (self.front_porch * roms_per_component) as usize,
        )
    }

    /// Raw address span of one synthesized line slot
    pub const fn line_stride(&self) -> u32 {
        match self.format {
            VectorFormat::Standard43 => PAGE_SIZE,
            VectorFormat::Wide169 => 2 * PAGE_SIZE,
        }
    }

    /// Lines in one captured frame
    pub const fn capture_lines(&self) -> usize {
        2 * self.lines_per_field
    }

    /// Vector table entries per field slot
    pub const fn vector_entries(&self) -> usize {
        match self.stitch {
            Stitch::CastellatedTop | Stitch::CastellatedBottom => 2 * (self.lines_per_field + 1),
            Stitch::BlankTop => 2 * self.lines_per_field + 1,
            Stitch::Sequential => 2 * self.lines_per_field,
        }
    }

    /// Bytes of one field's vector table
    pub const fn vector_table_len(&self) -> usize {
        self.vector_entries() * self.format.bytes_per_entry()
    }

    /// Lines of an assembled raster
    pub const fn output_lines(&self) -> usize {
        match self.stitch {
            Stitch::CastellatedTop | Stitch::CastellatedBottom => 2 * (self.lines_per_field + 1),
            Stitch::BlankTop => 2 * self.lines_per_field + 1,
            Stitch::Sequential => 2 * self.lines_per_field,
        }
    }

    /// Vector entry (or blank) for every output raster line, top to bottom
    pub fn output_order(&self) -> Vec<OutputLine> {
        let lpf = self.lines_per_field;
        let mut order = Vec::with_capacity(self.output_lines());

        match self.stitch {
            Stitch::CastellatedTop | Stitch::CastellatedBottom => {
                let per_field = lpf + 1;
                for k in 0..per_field {
                    order.push(OutputLine::Vector(k));
                    order.push(OutputLine::Vector(per_field + k));
                }
                if self.stitch == Stitch::CastellatedTop {
                    order.swap(0, 1);
                } else {
                    let n = order.len();
                    order.swap(n - 2, n - 1);
                }
            }
            Stitch::BlankTop => {
                order.push(OutputLine::Blank);
                for k in 0..lpf {
                    order.push(OutputLine::Vector(k));
                    order.push(OutputLine::Vector(lpf + 1 + k));
                }
            }
            Stitch::Sequential => {
                order.extend((0..2 * lpf).map(OutputLine::Vector));
            }
        }

        order
    }

    /// Vector table indices that record the slot of a captured frame line
    ///
    /// Castellated standards also record the border line of each field,
    /// which the capture does not contain, by duplicating its neighbour.
    /// NTSC fills its undisplayed entry between the fields the same way.
    pub fn vector_indices(&self, capture_line: usize) -> Vec<usize> {
        let lpf = self.lines_per_field;
        let field = capture_line % 2;
        let line = capture_line / 2;

        match self.stitch {
            Stitch::CastellatedTop => {
                let base = field * (lpf + 1);
                if line == 0 {
                    vec![base + 1, base]
                } else {
                    vec![base + 1 + line]
                }
            }
            Stitch::CastellatedBottom => {
                let base = field * (lpf + 1);
                if line == lpf - 1 {
                    vec![base + line, base + lpf]
                } else {
                    vec![base + line]
                }
            }
            Stitch::BlankTop => match (field, line) {
                (0, l) if l == lpf - 1 => vec![l, lpf],
                (0, l) => vec![l],
                (_, l) => vec![lpf + 1 + l],
            },
            Stitch::Sequential => vec![capture_line],
        }
    }
}
