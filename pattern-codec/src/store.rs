//! RomPart store contract and hardware manifests
//!
//! The codec never touches files. A [`RomStore`] hands out chip images by
//! name; a [`RomManifest`] says which name plays which role on a given
//! hardware revision and where the vector table lives in the CPU ROM.
//!
//! # Manifest
//!
//! ```toml
//! standard = "pal"
//! revision = "4:3 board, 64 KiB planes"
//!
//! [[part]]
//! role = "luminance0"
//! file = "y0.bin"
//! length = 65536
//!
//! [vector_table]
//! start = 0x4000
//! length = 1734
//! ```

use hashbrown::HashMap;
use serde::Deserialize;

use crate::error::{CodecError, Result};
use crate::standard::{Geometry, Standard};

/// Role of one physical chip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RomPartRef {
    Luminance0,
    Luminance1,
    Luminance2,
    Luminance3,
    LuminanceLsb,
    ChromaRy0,
    ChromaRy1,
    ChromaBy0,
    ChromaBy1,
    Cpu,
}

impl RomPartRef {
    pub const ALL: [RomPartRef; 10] = [
        RomPartRef::Luminance0,
        RomPartRef::Luminance1,
        RomPartRef::Luminance2,
        RomPartRef::Luminance3,
        RomPartRef::LuminanceLsb,
        RomPartRef::ChromaRy0,
        RomPartRef::ChromaRy1,
        RomPartRef::ChromaBy0,
        RomPartRef::ChromaBy1,
        RomPartRef::Cpu,
    ];

    /// Sample plane chips (everything but the CPU ROM)
    pub fn is_plane(self) -> bool {
        self != RomPartRef::Cpu
    }
}

impl std::fmt::Display for RomPartRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RomPartRef::Luminance0 => "luminance0",
            RomPartRef::Luminance1 => "luminance1",
            RomPartRef::Luminance2 => "luminance2",
            RomPartRef::Luminance3 => "luminance3",
            RomPartRef::LuminanceLsb => "luminance-lsb",
            RomPartRef::ChromaRy0 => "chroma-ry0",
            RomPartRef::ChromaRy1 => "chroma-ry1",
            RomPartRef::ChromaBy0 => "chroma-by0",
            RomPartRef::ChromaBy1 => "chroma-by1",
            RomPartRef::Cpu => "cpu",
        };
        f.write_str(name)
    }
}

/// One chip in the manifest
#[derive(Debug, Clone, Deserialize)]
pub struct PartEntry {
    pub role: RomPartRef,
    pub file: String,
    pub length: usize,
}

/// Vector table location inside the CPU ROM
///
/// Field `n` lives at `start + length × n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VectorRegion {
    pub start: usize,
    pub length: usize,
}

impl VectorRegion {
    /// Byte range of one field's slot
    pub fn field_range(&self, field: usize) -> std::ops::Range<usize> {
        let start = self.start + self.length * field;
        start..start + self.length
    }
}

/// Hardware revision description
#[derive(Debug, Clone, Deserialize)]
pub struct RomManifest {
    pub standard: Standard,
    #[serde(default)]
    pub revision: String,
    #[serde(rename = "part")]
    pub parts: Vec<PartEntry>,
    pub vector_table: VectorRegion,
}

impl RomManifest {
    /// Parse and validate a TOML manifest
    pub fn from_toml(text: &str) -> Result<Self> {
        let manifest: RomManifest = toml::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn geometry(&self) -> &'static Geometry {
        self.standard.geometry()
    }

    /// Entry for a role
    pub fn part(&self, role: RomPartRef) -> Result<&PartEntry> {
        self.parts
            .iter()
            .find(|p| p.role == role)
            .ok_or_else(|| CodecError::config(format!("manifest has no {} part", role)))
    }

    /// Chip length shared by every sample plane chip
    pub fn plane_length(&self) -> Result<usize> {
        Ok(self.part(RomPartRef::LuminanceLsb)?.length)
    }

    /// Number of whole field slots the CPU ROM can hold
    pub fn field_capacity(&self) -> Result<usize> {
        let cpu = self.part(RomPartRef::Cpu)?.length;
        Ok(cpu.saturating_sub(self.vector_table.start) / self.vector_table.length)
    }

    /// Check roles, lengths and the vector region
    pub fn validate(&self) -> Result<()> {
        for role in RomPartRef::ALL {
            let count = self.parts.iter().filter(|p| p.role == role).count();
            if count != 1 {
                return Err(CodecError::config(format!(
                    "manifest lists {} {} parts, expected exactly one",
                    count, role
                )));
            }
        }

        let plane_length = self.plane_length()?;
        for part in self.parts.iter().filter(|p| p.role.is_plane()) {
            if part.length != plane_length {
                return Err(CodecError::PlaneLengthMismatch {
                    part: part.role.to_string(),
                    expected: plane_length,
                    actual: part.length,
                });
            }
        }

        let geometry = self.geometry();
        let needed = geometry.vector_table_len();
        if self.vector_table.length < needed {
            return Err(CodecError::config(format!(
                "{} vector slot of {} bytes cannot hold {} bytes",
                self.standard, self.vector_table.length, needed
            )));
        }
        if self.field_capacity()? == 0 {
            return Err(CodecError::config(format!(
                "vector slot {:#x}+{} lies outside the CPU ROM",
                self.vector_table.start, self.vector_table.length
            )));
        }

        Ok(())
    }
}

/// Read/write access to named chip images
pub trait RomStore {
    /// Read `length` bytes at `offset` of the named part
    fn load(&self, name: &str, offset: usize, length: usize) -> Result<Vec<u8>>;

    /// Replace the named part
    fn save(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Replace several parts as one unit
    ///
    /// Stores that can fail half way override this so that either every
    /// part is replaced or none is.
    fn save_all(&mut self, parts: &[(&str, &[u8])]) -> Result<()> {
        for (name, bytes) in parts {
            self.save(name, bytes)?;
        }
        Ok(())
    }
}

/// In-memory store, keyed by part name
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    parts: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.parts.insert(name.into(), bytes);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }
}

impl RomStore for MemoryStore {
    fn load(&self, name: &str, offset: usize, length: usize) -> Result<Vec<u8>> {
        let bytes = self.parts.get(name).ok_or_else(|| CodecError::Store {
            part: name.into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such part"),
        })?;
        bytes
            .get(offset..offset + length)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| CodecError::Store {
                part: name.into(),
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("{} bytes at {} past end {}", length, offset, bytes.len()),
                ),
            })
    }

    fn save(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.parts.insert(name.into(), bytes.to_vec());
        Ok(())
    }
}

/// Every chip image of one board, fully loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomSet {
    pub luma: [Vec<u8>; 4],
    pub luma_lsb: Vec<u8>,
    pub chroma_ry: [Vec<u8>; 2],
    pub chroma_by: [Vec<u8>; 2],
    pub cpu: Vec<u8>,
}

impl RomSet {
    /// Zero-filled set sized by the manifest
    pub fn blank(manifest: &RomManifest) -> Result<Self> {
        let plane = manifest.plane_length()?;
        let cpu = manifest.part(RomPartRef::Cpu)?.length;
        Ok(Self {
            luma: std::array::from_fn(|_| vec![0; plane]),
            luma_lsb: vec![0; plane],
            chroma_ry: std::array::from_fn(|_| vec![0; plane]),
            chroma_by: std::array::from_fn(|_| vec![0; plane]),
            cpu: vec![0; cpu],
        })
    }

    /// Load every part named in the manifest
    pub fn load(store: &dyn RomStore, manifest: &RomManifest) -> Result<Self> {
        let mut set = Self::blank(manifest)?;
        for entry in &manifest.parts {
            let bytes = store.load(&entry.file, 0, entry.length)?;
            *set.part_mut(entry.role) = bytes;
        }
        tracing::debug!(
            "Loaded {} parts for {} ({})",
            manifest.parts.len(),
            manifest.standard,
            manifest.revision
        );
        Ok(set)
    }

    /// Save every part named in the manifest
    pub fn save(&self, store: &mut dyn RomStore, manifest: &RomManifest) -> Result<()> {
        let parts: Vec<(&str, &[u8])> = manifest
            .parts
            .iter()
            .map(|entry| (entry.file.as_str(), self.part(entry.role)))
            .collect();
        store.save_all(&parts)
    }

    pub fn part(&self, role: RomPartRef) -> &[u8] {
        match role {
            RomPartRef::Luminance0 => &self.luma[0],
            RomPartRef::Luminance1 => &self.luma[1],
            RomPartRef::Luminance2 => &self.luma[2],
            RomPartRef::Luminance3 => &self.luma[3],
            RomPartRef::LuminanceLsb => &self.luma_lsb,
            RomPartRef::ChromaRy0 => &self.chroma_ry[0],
            RomPartRef::ChromaRy1 => &self.chroma_ry[1],
            RomPartRef::ChromaBy0 => &self.chroma_by[0],
            RomPartRef::ChromaBy1 => &self.chroma_by[1],
            RomPartRef::Cpu => &self.cpu,
        }
    }

    fn part_mut(&mut self, role: RomPartRef) -> &mut Vec<u8> {
        match role {
            RomPartRef::Luminance0 => &mut self.luma[0],
            RomPartRef::Luminance1 => &mut self.luma[1],
            RomPartRef::Luminance2 => &mut self.luma[2],
            RomPartRef::Luminance3 => &mut self.luma[3],
            RomPartRef::LuminanceLsb => &mut self.luma_lsb,
            RomPartRef::ChromaRy0 => &mut self.chroma_ry[0],
            RomPartRef::ChromaRy1 => &mut self.chroma_ry[1],
            RomPartRef::ChromaBy0 => &mut self.chroma_by[0],
            RomPartRef::ChromaBy1 => &mut self.chroma_by[1],
            RomPartRef::Cpu => &mut self.cpu,
        }
    }

    /// Vector table bytes of one field (only the entries the standard uses)
    pub fn vector_table(&self, manifest: &RomManifest, field: usize) -> Result<&[u8]> {
        let range = manifest.vector_table.field_range(field);
        let used = range.start..range.start + manifest.geometry().vector_table_len();
        self.cpu.get(used).ok_or_else(|| CodecError::CapacityExceeded {
            what: format!("vector table for field {}", field),
            needed: range.end,
            available: self.cpu.len(),
        })
    }

    /// Overwrite one field's vector table
    pub fn write_vector_table(
        &mut self,
        manifest: &RomManifest,
        field: usize,
        bytes: &[u8],
    ) -> Result<()> {
        let range = manifest.vector_table.field_range(field);
        if bytes.len() > range.len() || range.end > self.cpu.len() {
            return Err(CodecError::CapacityExceeded {
                what: format!("vector table for field {}", field),
                needed: range.start + bytes.len(),
                available: self.cpu.len().min(range.end),
            });
        }
        self.cpu[range.start..range.start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
