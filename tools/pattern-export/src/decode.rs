//! Decoded field dumps
//!
//! ```text
//! <output>/luma.raw      width × height, 8-bit
//! <output>/ry.raw        width × height, 8-bit (chroma widened)
//! <output>/by.raw        width × height, 8-bit
//! <output>/raster.json   geometry and decoded vectors
//! <output>/stripes.json  segments under marked columns/rows (if any)
//! ```

use anyhow::{Context, Result};
use pattern_codec::{
    Component, DecodeSession, FrameRaster, RomManifest, RomSet, SamplePlanes, Standard,
    StripeMarker,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::manifest::load_hardware;
use crate::store::DirStore;

/// What to decode and where to put it
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub hardware: PathBuf,
    pub roms: PathBuf,
    pub field: usize,
    pub output: PathBuf,
    /// Luma sample columns to trace stripes under
    pub mark_columns: Vec<usize>,
    /// Output rows to trace stripes along
    pub mark_rows: Vec<usize>,
    pub chroma_gain: Option<f32>,
}

#[derive(Debug, Serialize)]
struct VectorInfo {
    index: usize,
    back_porch: u32,
    centre: u32,
    front_porch: Option<u32>,
}

#[derive(Debug, Serialize)]
struct RasterInfo<'a> {
    standard: Standard,
    revision: &'a str,
    field: usize,
    width: usize,
    height: usize,
    fragments: usize,
    vectors: Vec<VectorInfo>,
}

fn open_board(hardware: &Path, roms: &Path) -> Result<(RomManifest, RomSet)> {
    let manifest = load_hardware(hardware)?;
    let store = DirStore::new(roms);
    let set = RomSet::load(&store, &manifest)
        .with_context(|| format!("Failed to load ROM set from {:?}", roms))?;
    Ok((manifest, set))
}

fn vector_info(session: &DecodeSession) -> Vec<VectorInfo> {
    session
        .vectors()
        .iter()
        .enumerate()
        .map(|(index, v)| VectorInfo {
            index,
            back_porch: v.back_porch,
            centre: v.centre,
            front_porch: v.front_porch,
        })
        .collect()
}

fn write_plane(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {:?}", path))
}

fn write_json(dir: &Path, name: &str, value: &impl Serialize) -> Result<()> {
    let path = dir.join(name);
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(&path, text).with_context(|| format!("Failed to write {:?}", path))
}

/// Decode one field into raw planes plus JSON metadata
pub fn decode_field(request: &DecodeRequest) -> Result<FrameRaster> {
    let (manifest, roms) = open_board(&request.hardware, &request.roms)?;
    let planes = SamplePlanes::from_rom_set(&roms)?;
    let mut session = DecodeSession::open(&planes, &roms, &manifest, request.field)
        .with_context(|| format!("Failed to decode field {}", request.field))?;

    let mut marker = StripeMarker::new(request.mark_columns.clone(), request.mark_rows.clone());
    let luma = session.assemble(Component::Luma, Some(&mut marker))?;
    let ry = session.assemble(Component::RY, None)?;
    let by = session.assemble(Component::BY, None)?;
    let mut frame = FrameRaster::compose(&luma, &ry, &by)?;
    if let Some(gain) = request.chroma_gain {
        frame = frame.with_chroma_gain(gain);
    }

    std::fs::create_dir_all(&request.output)
        .with_context(|| format!("Failed to create output directory: {:?}", request.output))?;
    write_plane(&request.output, "luma.raw", &frame.luma)?;
    write_plane(&request.output, "ry.raw", &frame.chroma_ry)?;
    write_plane(&request.output, "by.raw", &frame.chroma_by)?;

    let info = RasterInfo {
        standard: manifest.standard,
        revision: &manifest.revision,
        field: request.field,
        width: frame.width,
        height: frame.height,
        fragments: session.cache().len(),
        vectors: vector_info(&session),
    };
    write_json(&request.output, "raster.json", &info)?;

    if !marker.columns.is_empty() || !marker.rows.is_empty() {
        tracing::info!("Marked {} stripe segment(s)", marker.stripes.len());
        write_json(&request.output, "stripes.json", &marker)?;
    }

    Ok(frame)
}

/// Log the decoded vectors of one field
pub fn list_vectors(hardware: &Path, roms: &Path, field: usize) -> Result<()> {
    let (manifest, set) = open_board(hardware, roms)?;
    let planes = SamplePlanes::from_rom_set(&set)?;
    let session = DecodeSession::open(&planes, &set, &manifest, field)
        .with_context(|| format!("Failed to decode field {}", field))?;

    tracing::info!(
        "{} field {}: {} vectors",
        manifest.standard,
        field,
        session.vectors().len()
    );
    for v in vector_info(&session) {
        match v.front_porch {
            Some(front) => tracing::info!(
                "  [{}] back {:#07x} centre {:#07x} front {:#07x}",
                v.index,
                v.back_porch,
                v.centre,
                front
            ),
            None => tracing::info!(
                "  [{}] back {:#07x} centre {:#07x}",
                v.index,
                v.back_porch,
                v.centre
            ),
        }
    }
    Ok(())
}
