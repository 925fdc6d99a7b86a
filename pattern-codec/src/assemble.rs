//! Raster assembly (decode path)
//!
//! A [`DecodeSession`] owns one field's decoded vector table and walks the
//! standard's output order, copying each line's segments out of the sample
//! planes:
//!
//! ```text
//! | back porch | centre | front porch |    (4:3)
//! | back porch |      centre         |    (16:9)
//! ```
//!
//! Every distinct raw window is extracted once into the session's
//! [`FragmentCache`]; repeated border segments are served from the cache.

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use serde::Serialize;

use crate::encode::Donor;
use crate::error::{CodecError, Result};
use crate::planes::SamplePlanes;
use crate::raster::{Component, FrameRaster};
use crate::standard::{Geometry, OutputLine, Standard};
use crate::store::{RomManifest, RomSet};
use crate::vector::{RomVector, decode_table};
use crate::{CHROMA_BLANK, LUMA_BLANK, PAGE_SIZE};

/// Raw window `(address, length)` inside one chip's address space
///
/// Equality is structural: two segments reading the same bytes share one
/// cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PatternFragment {
    pub address: u32,
    pub length: u32,
}

/// Extracted fragments per component
#[derive(Debug, Clone, Default)]
pub struct FragmentCache {
    fragments: HashMap<(Component, PatternFragment), Vec<u16>>,
    hits: usize,
}

impl FragmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples of `fragment`, extracting them on first use
    pub fn get_or_extract(
        &mut self,
        planes: &SamplePlanes,
        component: Component,
        fragment: PatternFragment,
    ) -> Result<&[u16]> {
        match self.fragments.entry((component, fragment)) {
            Entry::Occupied(entry) => {
                self.hits += 1;
                Ok(entry.into_mut().as_slice())
            }
            Entry::Vacant(entry) => {
                let rpc = component.roms_per_component() as usize;
                let samples = planes.window(
                    component,
                    fragment.address as usize * rpc,
                    fragment.length as usize * rpc,
                )?;
                Ok(entry.insert(samples).as_slice())
            }
        }
    }

    pub fn get(&self, component: Component, fragment: &PatternFragment) -> Option<&[u16]> {
        self.fragments.get(&(component, *fragment)).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Lookups served without extraction
    pub fn hits(&self) -> usize {
        self.hits
    }
}

/// One assembled component, native samples, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRaster {
    pub component: Component,
    pub width: usize,
    pub height: usize,
    pub samples: Vec<u16>,
}

impl ComponentRaster {
    pub fn row(&self, line: usize) -> &[u16] {
        &self.samples[line * self.width..(line + 1) * self.width]
    }
}

// =============================================================================
// Draw hooks
// =============================================================================

/// Observer of every segment copied into a raster
pub trait DrawHook {
    /// `x` and `width` are in output samples of the component being drawn
    fn segment(&mut self, line: usize, x: usize, width: usize, fragment: &PatternFragment);
}

/// Segment found under a marked column or on a marked row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stripe {
    pub line: usize,
    pub start: usize,
    pub end: usize,
    pub fragment: PatternFragment,
}

/// Collects stripe boundaries while a raster is drawn
#[derive(Debug, Clone, Default, Serialize)]
pub struct StripeMarker {
    pub columns: Vec<usize>,
    pub rows: Vec<usize>,
    pub stripes: Vec<Stripe>,
}

impl StripeMarker {
    pub fn new(columns: Vec<usize>, rows: Vec<usize>) -> Self {
        Self {
            columns,
            rows,
            stripes: Vec::new(),
        }
    }
}

impl DrawHook for StripeMarker {
    fn segment(&mut self, line: usize, x: usize, width: usize, fragment: &PatternFragment) {
        let span = x..x + width;
        let marked = self.rows.contains(&line) || self.columns.iter().any(|c| span.contains(c));
        if marked {
            self.stripes.push(Stripe {
                line,
                start: span.start,
                end: span.end,
                fragment: *fragment,
            });
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Decoder state for one field of one ROM set
pub struct DecodeSession<'a> {
    planes: &'a SamplePlanes,
    geometry: &'static Geometry,
    /// Field slot the table came from, for error reports
    field: usize,
    vectors: Vec<RomVector>,
    cache: FragmentCache,
}

impl<'a> DecodeSession<'a> {
    /// Decode a field's vector table
    ///
    /// `table` may be longer than the standard needs; only the leading
    /// entries are used.
    pub fn new(planes: &'a SamplePlanes, standard: Standard, table: &[u8]) -> Result<Self> {
        let geometry = standard.geometry();
        let needed = geometry.vector_table_len();
        if table.len() < needed {
            return Err(CodecError::MissingVector {
                field: 0,
                index: table.len() / geometry.format.bytes_per_entry(),
            });
        }

        let vectors = decode_table(&table[..needed], geometry.format)?;
        tracing::debug!("{}: decoded {} vectors", standard, vectors.len());

        Ok(Self {
            planes,
            geometry,
            field: 0,
            vectors,
            cache: FragmentCache::new(),
        })
    }

    /// Decode field `field` of a loaded ROM set
    pub fn open(
        planes: &'a SamplePlanes,
        roms: &RomSet,
        manifest: &RomManifest,
        field: usize,
    ) -> Result<Self> {
        let table = roms.vector_table(manifest, field)?;
        let session = Self::new(planes, manifest.standard, table).map_err(|e| match e {
            CodecError::MissingVector { index, .. } => CodecError::MissingVector { field, index },
            other => other,
        })?;
        Ok(Self { field, ..session })
    }

    pub fn geometry(&self) -> &'static Geometry {
        self.geometry
    }

    pub fn vectors(&self) -> &[RomVector] {
        &self.vectors
    }

    pub fn cache(&self) -> &FragmentCache {
        &self.cache
    }

    fn raw_segments(&self, vector: &RomVector) -> Vec<PatternFragment> {
        let g = self.geometry;
        let mut segments = vec![
            PatternFragment {
                address: vector.back_porch,
                length: g.back_porch,
            },
            PatternFragment {
                address: vector.centre,
                length: g.centre,
            },
        ];
        match vector.front_porch {
            Some(front) if g.front_porch > 0 => segments.push(PatternFragment {
                address: front,
                length: g.front_porch,
            }),
            _ => {}
        }
        segments
    }

    /// First page-aligned raw address past every decoded segment
    pub fn first_free_offset(&self) -> u32 {
        let g = self.geometry;
        let end = self
            .vectors
            .iter()
            .map(|v| v.end((g.back_porch, g.centre, g.front_porch)))
            .max()
            .unwrap_or(0);
        end.div_ceil(PAGE_SIZE) * PAGE_SIZE
    }

    /// Assemble one component into a full raster
    pub fn assemble(
        &mut self,
        component: Component,
        mut hook: Option<&mut dyn DrawHook>,
    ) -> Result<ComponentRaster> {
        let rpc = component.roms_per_component();
        let width = (self.geometry.line_width() * rpc) as usize;
        let order = self.geometry.output_order();
        let blank = if component.is_chroma() {
            CHROMA_BLANK as u16
        } else {
            LUMA_BLANK
        };

        let mut samples = Vec::with_capacity(width * order.len());
        for (line, output) in order.iter().enumerate() {
            let index = match *output {
                OutputLine::Blank => {
                    samples.resize(samples.len() + width, blank);
                    continue;
                }
                OutputLine::Vector(index) => index,
            };

            let mut x = 0;
            for fragment in self.raw_segments(&self.vectors[index]) {
                let window = self.cache.get_or_extract(self.planes, component, fragment)?;
                if let Some(hook) = hook.as_deref_mut() {
                    hook.segment(line, x, window.len(), &fragment);
                }
                samples.extend_from_slice(window);
                x += window.len();
            }
        }

        tracing::debug!(
            "Assembled {} raster {}x{} ({} fragments, {} cache hits)",
            component,
            width,
            order.len(),
            self.cache.len(),
            self.cache.hits()
        );

        Ok(ComponentRaster {
            component,
            width,
            height: order.len(),
            samples,
        })
    }

    /// Assemble luma and both chroma components into display planes
    pub fn frame_raster(&mut self) -> Result<FrameRaster> {
        let luma = self.assemble(Component::Luma, None)?;
        let ry = self.assemble(Component::RY, None)?;
        let by = self.assemble(Component::BY, None)?;
        FrameRaster::compose(&luma, &ry, &by)
    }

    /// Back porch samples of one decoded line, for reuse by the encoder
    pub fn back_porch_donor(&mut self, vector_index: usize) -> Result<Donor> {
        let vector = *self
            .vectors
            .get(vector_index)
            .ok_or(CodecError::MissingVector {
                field: self.field,
                index: vector_index,
            })?;
        let fragment = PatternFragment {
            address: vector.back_porch,
            length: self.geometry.back_porch,
        };

        let mut take = |component: Component| -> Result<Vec<i32>> {
            let window = self.cache.get_or_extract(self.planes, component, fragment)?;
            Ok(window.iter().map(|&s| s as i32).collect())
        };

        Ok(Donor {
            y: take(Component::Luma)?,
            ry: take(Component::RY)?,
            by: take(Component::BY)?,
        })
    }
}
