//! Write-back of converted fields into a ROM image set
//!
//! Fields are merged into sample planes rebuilt from the input set, the
//! planes are split back into chip images, and each field's vector table is
//! written to its slot in the CPU ROM. The input set is never modified; the
//! caller saves the returned set once everything succeeded.

use crate::encode::ConvertedField;
use crate::error::{CodecError, Result};
use crate::planes::SamplePlanes;
use crate::raster::Component;
use crate::store::{RomManifest, RomSet};
use crate::vector::encode_table;
use crate::{CHROMA_BLANK, LUMA_BLANK};

/// Merge `fields` into a copy of `roms`
pub fn write_back(
    roms: &RomSet,
    manifest: &RomManifest,
    fields: &[ConvertedField],
) -> Result<RomSet> {
    let mut planes = SamplePlanes::from_rom_set(roms)?;
    let format = manifest.geometry().format;
    let slots = manifest.field_capacity()?;

    for field in fields {
        if field.standard != manifest.standard {
            return Err(CodecError::config(format!(
                "{} field {} cannot be written to a {} board",
                field.standard, field.field_index, manifest.standard
            )));
        }
        if field.field_index >= slots {
            return Err(CodecError::CapacityExceeded {
                what: format!("vector table slot for field {}", field.field_index),
                needed: field.field_index + 1,
                available: slots,
            });
        }
        merge_field(&mut planes, field)?;
    }

    let mut out = roms.clone();
    planes.split_into(&mut out)?;

    for field in fields {
        let table = encode_table(&field.vector_table()?, format)?;
        out.write_vector_table(manifest, field.field_index, &table)?;
    }

    tracing::info!(
        "Wrote {} field(s) into {} ({} revision)",
        fields.len(),
        manifest.standard,
        if manifest.revision.is_empty() {
            "unnamed"
        } else {
            manifest.revision.as_str()
        }
    );
    Ok(out)
}

fn merge_field(planes: &mut SamplePlanes, field: &ConvertedField) -> Result<()> {
    for component in [Component::Luma, Component::RY, Component::BY] {
        let rpc = component.roms_per_component() as usize;
        let start = field.start_offset as usize * rpc;
        let samples = field.samples(component);
        let plane_len = planes.plane_len(component);
        if start + samples.len() > plane_len {
            return Err(CodecError::AddressOutOfBounds {
                component,
                address: start,
                length: samples.len(),
                plane_len,
            });
        }

        match component {
            Component::RY | Component::BY => {
                let plane = if component == Component::RY {
                    &mut planes.chroma_ry
                } else {
                    &mut planes.chroma_by
                };
                for (dst, &s) in plane[start..].iter_mut().zip(samples) {
                    *dst = if s < 0 { CHROMA_BLANK } else { s as u8 };
                }
            }
            _ => {
                for (dst, &s) in planes.luma[start..].iter_mut().zip(samples) {
                    *dst = if s < 0 { LUMA_BLANK } else { s as u16 };
                }
            }
        }
    }

    tracing::debug!(
        "Merged field {} ({:#07x}..{:#07x})",
        field.field_index,
        field.start_offset,
        field.next_offset
    );
    Ok(())
}
