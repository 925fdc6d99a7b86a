//! Pattern encoder (encode path)
//!
//! Turns captured frames into synthesized line slots plus vector table
//! entries, appended after whatever the ROM already holds.
//!
//! Per frame variant:
//!
//! ```text
//! decimate chroma → pre-synthesis patches → level map      (per line, parallel)
//! layout slot → dedup → vector entries → post-synthesis    (sequential)
//! ```
//!
//! Slot layout, raw offsets from the page-aligned slot start:
//!
//! ```text
//! 4:3   0x00 centre | 0x80 back porch | 0xC0 front porch
//! 16:9  0x000 back porch | 0x100 centre
//! ```
//!
//! Anything in a slot not covered by a segment stays [`SAMPLE_ABSENT`].

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::capture::Capture;
use crate::error::{CodecError, Result};
use crate::levels::{LevelProfile, MappedLine, map_line};
use crate::patch::PatchSet;
use crate::raster::Component;
use crate::standard::{Geometry, Standard, VectorFormat};
use crate::store::RomManifest;
use crate::vector::{RomVector, WIDE_BACK_PORCH_OFFSET};
use crate::{PAGE_SIZE, SAMPLE_ABSENT};

/// 4:3 back porch offset inside a slot
const SLOT_BACK_PORCH_43: u32 = 0x80;
/// 4:3 front porch offset inside a slot
const SLOT_FRONT_PORCH_43: u32 = 0xC0;

/// Per-pattern encoder switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    pub profile: LevelProfile,
    /// Average chroma pairs instead of keeping co-sited samples
    pub decimate_422: bool,
    /// Emit a second field with alternated chroma phase
    pub anti_pal: bool,
}

/// Back porch samples reused in front of every synthesized line
///
/// ROM sample values, plane units: luma `back × 4`, chroma `back × 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Donor {
    pub y: Vec<i32>,
    pub ry: Vec<i32>,
    pub by: Vec<i32>,
}

impl Donor {
    fn get(&self, component: Component) -> &[i32] {
        match component {
            Component::RY => &self.ry,
            Component::BY => &self.by,
            _ => &self.y,
        }
    }

    fn check(&self, geometry: &Geometry) -> Result<()> {
        for component in [Component::Luma, Component::RY, Component::BY] {
            let (back, _, _) = geometry.segments(component.roms_per_component());
            if self.get(component).len() != back {
                return Err(CodecError::config(format!(
                    "{} donor has {} {} samples, back porch needs {}",
                    geometry.standard,
                    self.get(component).len(),
                    component,
                    back
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Converted field
// =============================================================================

/// One synthesized field: new samples plus its vector table
///
/// Sample arrays cover raw addresses `start_offset..next_offset`, scaled per
/// component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedField {
    pub field_index: usize,
    pub standard: Standard,
    pub start_offset: u32,
    pub next_offset: u32,
    pub samples_y: Vec<i32>,
    pub samples_ry: Vec<i32>,
    pub samples_by: Vec<i32>,
    /// Vector table entries by line index
    pub vectors: BTreeMap<usize, RomVector>,
    /// Slot of each captured frame line
    pub line_vectors: Vec<RomVector>,
}

impl ConvertedField {
    fn new(field_index: usize, standard: Standard, start_offset: u32) -> Self {
        Self {
            field_index,
            standard,
            start_offset,
            next_offset: start_offset,
            samples_y: Vec::new(),
            samples_ry: Vec::new(),
            samples_by: Vec::new(),
            vectors: BTreeMap::new(),
            line_vectors: Vec::new(),
        }
    }

    pub fn samples(&self, component: Component) -> &[i32] {
        match component {
            Component::RY => &self.samples_ry,
            Component::BY => &self.samples_by,
            Component::Luma | Component::LumaLsb => &self.samples_y,
        }
    }

    pub fn samples_mut(&mut self, component: Component) -> &mut [i32] {
        match component {
            Component::RY => &mut self.samples_ry,
            Component::BY => &mut self.samples_by,
            Component::Luma | Component::LumaLsb => &mut self.samples_y,
        }
    }

    /// Extend every sample array up to raw address `end`
    fn grow_to(&mut self, end: u32) {
        let raw = (end - self.start_offset) as usize;
        for (plane, rpc) in [
            (&mut self.samples_y, Component::Luma.roms_per_component()),
            (&mut self.samples_ry, Component::RY.roms_per_component()),
            (&mut self.samples_by, Component::BY.roms_per_component()),
        ] {
            plane.resize(raw * rpc as usize, SAMPLE_ABSENT);
        }
        self.next_offset = self.next_offset.max(end);
    }

    fn write(&mut self, component: Component, raw_address: u32, values: &[i32]) {
        let rpc = component.roms_per_component() as usize;
        let at = (raw_address - self.start_offset) as usize * rpc;
        self.samples_mut(component)[at..at + values.len()].copy_from_slice(values);
    }

    /// Index into [`samples`](Self::samples) of a displayed sample
    ///
    /// `sample` counts from the left edge of the line (back porch first).
    pub fn sample_index(&self, component: Component, line: usize, sample: usize) -> Result<usize> {
        let vector = self.line_vectors.get(line).ok_or_else(|| {
            CodecError::config(format!(
                "line {} outside field {} ({} lines)",
                line,
                self.field_index,
                self.line_vectors.len()
            ))
        })?;

        let rpc = component.roms_per_component();
        let (back, centre, front) = self.standard.geometry().segments(rpc);
        let entry = vector.scale(rpc);
        let address = match (sample, entry.front_porch) {
            (s, _) if s < back => entry.back_porch + s,
            (s, _) if s < back + centre => entry.centre + (s - back),
            (s, Some(front_porch)) if s < back + centre + front => {
                front_porch + (s - back - centre)
            }
            _ => {
                return Err(CodecError::config(format!(
                    "sample {} outside the {}-sample {} line",
                    sample,
                    back + centre + front,
                    component
                )));
            }
        };

        let base = self.start_offset as usize * rpc as usize;
        let plane_len = self.samples(component).len();
        address
            .checked_sub(base)
            .filter(|&index| index < plane_len)
            .ok_or(CodecError::AddressOutOfBounds {
                component,
                address,
                length: 1,
                plane_len: base + plane_len,
            })
    }

    /// Every vector table entry in index order
    pub fn vector_table(&self) -> Result<Vec<RomVector>> {
        (0..self.standard.geometry().vector_entries())
            .map(|index| {
                self.vectors
                    .get(&index)
                    .copied()
                    .ok_or(CodecError::MissingVector {
                        field: self.field_index,
                        index,
                    })
            })
            .collect()
    }

    /// Slots written by this field
    pub fn slot_count(&self) -> usize {
        let stride = self.standard.geometry().line_stride();
        ((self.next_offset - self.start_offset) / stride) as usize
    }
}

// =============================================================================
// Session
// =============================================================================

/// Encoder cursor state shared by consecutive encode calls
#[derive(Debug, Clone)]
pub struct EncodeSession {
    geometry: &'static Geometry,
    next_offset: u32,
    next_field: usize,
    capacity: u32,
    /// Non-address descriptor bits per vector index
    residuals: Vec<u8>,
}

impl EncodeSession {
    /// Start writing at `start_offset` (rounded up to a page) into field
    /// slot `first_field`
    ///
    /// `capacity` is the raw chip length; the vector format's address space
    /// caps it further.
    pub fn new(standard: Standard, first_field: usize, start_offset: u32, capacity: u32) -> Self {
        let geometry = standard.geometry();
        Self {
            geometry,
            next_offset: start_offset.div_ceil(PAGE_SIZE) * PAGE_SIZE,
            next_field: first_field,
            capacity: capacity.min(geometry.format.address_space()),
            residuals: Vec::new(),
        }
    }

    /// Keep the residual bits of an existing table (normally field 0 of the
    /// board) on every entry this session writes
    ///
    /// Indices past the end of `template` get no residual bits.
    pub fn with_residuals(mut self, template: &[RomVector]) -> Self {
        self.residuals = template.iter().map(|v| v.residual).collect();
        self
    }

    /// Append after the content a manifest's board already holds
    pub fn after(manifest: &RomManifest, first_free_offset: u32, first_field: usize) -> Result<Self> {
        let capacity = u32::try_from(manifest.plane_length()?).unwrap_or(u32::MAX);
        Ok(Self::new(
            manifest.standard,
            first_field,
            first_free_offset,
            capacity,
        ))
    }

    pub fn next_offset(&self) -> u32 {
        self.next_offset
    }

    pub fn next_field(&self) -> usize {
        self.next_field
    }

    /// Frame index and R-Y negation for every field to emit
    fn variants(&self, capture: &Capture, options: &EncodeOptions) -> Result<Vec<(usize, bool)>> {
        let standard = self.geometry.standard;
        if options.anti_pal && !standard.is_pal_family() {
            return Err(CodecError::config(format!(
                "anti-PAL is not available for {}",
                standard
            )));
        }

        match capture.frames.len() {
            2 => Ok(vec![(0, false), (1, false)]),
            1 if !options.anti_pal => Ok(vec![(0, false)]),
            1 if options.profile.use_digital_factors => Ok(vec![(0, false), (0, true)]),
            1 => Err(CodecError::config(
                "analogue anti-PAL needs a two-frame capture",
            )),
            n => Err(CodecError::config(format!("capture holds {} frames", n))),
        }
    }

    /// Encode one capture into one or two fields
    ///
    /// On error the session cursor is left untouched.
    pub fn encode(
        &mut self,
        capture: &Capture,
        options: &EncodeOptions,
        patches: &PatchSet,
        donor: Option<&Donor>,
    ) -> Result<Vec<ConvertedField>> {
        use rayon::prelude::*;

        let g = self.geometry;
        if capture.standard != g.standard {
            return Err(CodecError::config(format!(
                "{} capture given to a {} encoder",
                capture.standard, g.standard
            )));
        }
        patches.check_profile(&options.profile)?;
        if let Some(donor) = donor {
            donor.check(g)?;
        }
        let variants = self.variants(capture, options)?;

        tracing::info!(
            "Encoding {} capture into {} field(s) from {:#07x}",
            g.standard,
            variants.len(),
            self.next_offset
        );

        let mut prepared = Vec::with_capacity(capture.frames.len());
        for frame in &capture.frames {
            let mut lines = frame.clone();
            lines.par_iter_mut().for_each(|line| {
                if options.decimate_422 {
                    line.decimate_422();
                } else {
                    line.subsample_chroma();
                }
            });
            patches.apply_pre_synthesis(&mut lines)?;
            prepared.push(lines);
        }

        let patched = patches.post_synthesis_lines();
        let mut seen: HashMap<(u64, bool), Vec<(usize, usize, RomVector)>> = HashMap::new();
        let mut cursor = self.next_offset;
        let mut fields = Vec::with_capacity(variants.len());

        for (n, &(frame, negate_ry)) in variants.iter().enumerate() {
            let lines = &prepared[frame];

            // ordered collect, then the first failing line wins
            let mapped: Vec<Result<MappedLine>> = lines
                .par_iter()
                .enumerate()
                .map(|(i, line)| map_line(line, i, g.standard, &options.profile, negate_ry))
                .collect();
            let mapped = mapped.into_iter().collect::<Result<Vec<_>>>()?;

            let mut field = ConvertedField::new(self.next_field + n, g.standard, cursor);
            let mut reused = 0usize;

            for (i, (line, mapped_line)) in lines.iter().zip(&mapped).enumerate() {
                let key = (line.hash(), negate_ry);
                let shared = if patched.contains(&i) {
                    None
                } else {
                    seen.get(&key).and_then(|candidates| {
                        candidates
                            .iter()
                            .find(|(f, l, _)| prepared[*f][*l].same_content(line))
                            .map(|&(_, _, vector)| vector)
                    })
                };

                let vector = match shared {
                    Some(vector) => {
                        reused += 1;
                        vector
                    }
                    None => {
                        let vector = self.layout_line(&mut field, &mut cursor, mapped_line, donor)?;
                        if !patched.contains(&i) {
                            seen.entry(key).or_default().push((frame, i, vector));
                        }
                        vector
                    }
                };

                field.line_vectors.push(vector);
                for index in g.vector_indices(i) {
                    let residual = self.residuals.get(index).copied().unwrap_or(0);
                    field.vectors.insert(index, RomVector { residual, ..vector });
                }
            }

            patches.apply_post_synthesis(&mut field)?;
            field.vector_table()?;

            tracing::debug!(
                "Field {}: {} slots, {} shared lines, {:#07x}..{:#07x}",
                field.field_index,
                field.slot_count(),
                reused,
                field.start_offset,
                field.next_offset
            );
            fields.push(field);
        }

        self.next_offset = cursor;
        self.next_field += fields.len();
        tracing::info!(
            "Encoded {} field(s); next offset {:#07x}, next field {}",
            fields.len(),
            self.next_offset,
            self.next_field
        );
        Ok(fields)
    }

    /// Write one line into a fresh slot at `cursor`
    fn layout_line(
        &self,
        field: &mut ConvertedField,
        cursor: &mut u32,
        line: &MappedLine,
        donor: Option<&Donor>,
    ) -> Result<RomVector> {
        let g = self.geometry;
        let slot = *cursor;
        let end = slot + g.line_stride();
        if end > self.capacity {
            return Err(CodecError::CapacityExceeded {
                what: format!("{} line slot in field {}", g.standard, field.field_index),
                needed: end as usize,
                available: self.capacity as usize,
            });
        }

        let vector = match g.format {
            VectorFormat::Standard43 => RomVector {
                back_porch: slot + SLOT_BACK_PORCH_43,
                centre: slot,
                front_porch: Some(slot + SLOT_FRONT_PORCH_43),
                residual: 0,
            },
            VectorFormat::Wide169 => RomVector {
                back_porch: slot,
                centre: slot + WIDE_BACK_PORCH_OFFSET,
                front_porch: None,
                residual: 0,
            },
        };

        field.grow_to(end);
        for (component, samples) in [
            (Component::Luma, &line.y),
            (Component::RY, &line.ry),
            (Component::BY, &line.by),
        ] {
            let (back, centre, front) = g.segments(component.roms_per_component());
            if samples.len() < back + centre + front {
                return Err(CodecError::config(format!(
                    "{} line has {} {} samples, {} needed",
                    g.standard,
                    samples.len(),
                    component,
                    back + centre + front
                )));
            }

            let back_porch = match donor {
                Some(donor) => donor.get(component),
                None => &samples[..back],
            };
            field.write(component, vector.back_porch, back_porch);
            field.write(component, vector.centre, &samples[back..back + centre]);
            if let Some(front_porch) = vector.front_porch {
                field.write(
                    component,
                    front_porch,
                    &samples[back + centre..back + centre + front],
                );
            }
        }

        *cursor = end;
        Ok(vector)
    }
}

/// Lines of a single-colour frame, for tests across the crate
#[cfg(test)]
pub(crate) fn flat_frame(
    standard: Standard,
    y: u16,
    ry: u16,
    by: u16,
) -> Vec<crate::capture::LineSamples> {
    use crate::CAPTURE_LINE_SAMPLES;
    use crate::capture::LineSamples;
    (0..standard.geometry().capture_lines())
        .map(|_| {
            LineSamples::new(
                vec![y; CAPTURE_LINE_SAMPLES],
                vec![ry; CAPTURE_LINE_SAMPLES],
                vec![by; CAPTURE_LINE_SAMPLES],
            )
        })
        .collect()
}
