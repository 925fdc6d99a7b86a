//! Job manifest parsing and build orchestration
//!
//! A job names one hardware manifest, the ROM set to start from and an
//! ordered list of captured patterns to append:
//!
//! ```text
//! hardware = "hardware/pal.toml"
//! roms = "roms/"
//! patches = "patches/example.toml"
//! first_field = 1
//! donor_line = 1
//!
//! [output]
//! dir = "out/"
//!
//! [[pattern]]
//! name = "bars"
//! y = "captures/bars.y"
//! ry = "captures/bars.ry"
//! by = "captures/bars.by"
//! use_digital_factors = true
//! decimate_422 = true
//! patches = ["clock-cutout"]
//! ```
//!
//! Relative paths resolve against the job file's directory.

use anyhow::{Context, Result};
use pattern_codec::{
    Capture, DecodeSession, EncodeOptions, EncodeSession, LevelProfile, PatchLibrary, PatchSet,
    RomManifest, RomSet, SamplePlanes, write_back,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::store::DirStore;

/// Root job structure
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobManifest {
    pub hardware: PathBuf,
    pub roms: PathBuf,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub patches: Option<PathBuf>,
    /// Field slot the first encoded pattern lands in
    #[serde(default = "default_first_field")]
    pub first_field: usize,
    /// Field 0 vector whose back porch is reused by every pattern
    #[serde(default)]
    pub donor_line: Option<usize>,
    #[serde(default, rename = "pattern")]
    pub patterns: Vec<PatternEntry>,
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out/")
}

fn default_first_field() -> usize {
    1
}

/// One captured pattern
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternEntry {
    pub name: String,
    pub y: PathBuf,
    pub ry: PathBuf,
    pub by: PathBuf,
    #[serde(default)]
    pub use_digital_factors: bool,
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub decimate_422: bool,
    #[serde(default)]
    pub anti_pal: bool,
    #[serde(default)]
    pub patches: Vec<String>,
}

impl PatternEntry {
    pub fn options(&self) -> EncodeOptions {
        EncodeOptions {
            profile: LevelProfile {
                use_digital_factors: self.use_digital_factors,
                invert: self.invert,
            },
            decimate_422: self.decimate_422,
            anti_pal: self.anti_pal,
        }
    }

    fn captures(&self) -> [&Path; 3] {
        [&self.y, &self.ry, &self.by]
    }
}

impl JobManifest {
    /// Resolve a manifest-relative path
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Load and parse a job file
pub fn load_manifest(path: &Path) -> Result<JobManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job manifest: {:?}", path))?;
    let mut manifest: JobManifest =
        toml::from_str(&content).with_context(|| format!("Failed to parse job manifest: {:?}", path))?;
    manifest.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(manifest)
}

/// Load a hardware manifest
pub fn load_hardware(path: &Path) -> Result<RomManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read hardware manifest: {:?}", path))?;
    RomManifest::from_toml(&content)
        .with_context(|| format!("Invalid hardware manifest: {:?}", path))
}

fn load_patches(job: &JobManifest) -> Result<Option<PatchLibrary>> {
    let Some(path) = &job.patches else {
        return Ok(None);
    };
    let path = job.resolve(path);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read patch library: {:?}", path))?;
    let library = PatchLibrary::from_toml(&content)
        .with_context(|| format!("Invalid patch library: {:?}", path))?;
    Ok(Some(library))
}

fn select_patches(library: Option<&PatchLibrary>, entry: &PatternEntry) -> Result<PatchSet> {
    if entry.patches.is_empty() {
        return Ok(PatchSet::default());
    }
    let Some(library) = library else {
        anyhow::bail!(
            "Pattern '{}' names patches but the job has no patch library",
            entry.name
        );
    };
    let set = library
        .select(&entry.patches)
        .with_context(|| format!("Pattern '{}'", entry.name))?;
    set.check_profile(&entry.options().profile)
        .with_context(|| format!("Pattern '{}'", entry.name))?;
    Ok(set)
}

/// Validate the job without building
pub fn validate(job: &JobManifest) -> Result<()> {
    let hardware = load_hardware(&job.resolve(&job.hardware))?;

    let roms = job.resolve(&job.roms);
    if !roms.is_dir() {
        anyhow::bail!("ROM directory not found: {:?}", roms);
    }
    for part in &hardware.parts {
        let path = roms.join(&part.file);
        if !path.exists() {
            anyhow::bail!("ROM part not found: {:?}", path);
        }
    }

    let slots = hardware.field_capacity()?;
    if job.first_field >= slots {
        anyhow::bail!(
            "first_field {} is outside the {} vector table slots",
            job.first_field,
            slots
        );
    }
    if job.first_field == 0 && job.donor_line.is_some() {
        anyhow::bail!("donor_line reads field 0, which first_field = 0 would overwrite");
    }

    let library = load_patches(job)?;
    for entry in &job.patterns {
        for path in entry.captures() {
            let path = job.resolve(path);
            if !path.exists() {
                anyhow::bail!("Capture for pattern '{}' not found: {:?}", entry.name, path);
            }
        }
        select_patches(library.as_ref(), entry)?;
    }

    Ok(())
}

fn load_capture(job: &JobManifest, hardware: &RomManifest, entry: &PatternEntry) -> Result<Capture> {
    let [y, ry, by] = entry.captures().map(|p| job.resolve(p));
    let read = |path: &Path| {
        std::fs::read(path).with_context(|| format!("Failed to read capture: {:?}", path))
    };
    Capture::from_le_bytes(hardware.standard, &read(&y)?, &read(&ry)?, &read(&by)?)
        .with_context(|| format!("Invalid capture for pattern '{}'", entry.name))
}

/// Build every pattern in the job and save the ROM set
pub fn build_all(job: &JobManifest, output_override: Option<&Path>) -> Result<()> {
    validate(job)?;

    let hardware = load_hardware(&job.resolve(&job.hardware))?;
    let library = load_patches(job)?;
    let output_dir = output_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| job.resolve(&job.output.dir));
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;

    let input = DirStore::new(job.resolve(&job.roms));
    let roms = RomSet::load(&input, &hardware)
        .with_context(|| format!("Failed to load ROM set from {:?}", input.root()))?;

    let planes = SamplePlanes::from_rom_set(&roms)?;
    let mut start = 0;
    let mut template = Vec::new();
    for field in 0..job.first_field {
        let session = DecodeSession::open(&planes, &roms, &hardware, field)
            .with_context(|| format!("Failed to decode existing field {}", field))?;
        start = start.max(session.first_free_offset());
        if field == 0 {
            template = session.vectors().to_vec();
        }
    }
    let donor = match job.donor_line {
        Some(index) => {
            let mut session = DecodeSession::open(&planes, &roms, &hardware, 0)?;
            Some(
                session
                    .back_porch_donor(index)
                    .with_context(|| format!("Failed to take donor back porch from vector {}", index))?,
            )
        }
        None => None,
    };

    let mut session =
        EncodeSession::after(&hardware, start, job.first_field)?.with_residuals(&template);
    let mut fields = Vec::new();
    for entry in &job.patterns {
        let capture = load_capture(job, &hardware, entry)?;
        let patches = select_patches(library.as_ref(), entry)?;
        tracing::info!(
            "Encoding {}: {} frame(s) -> field {}",
            entry.name,
            capture.frames.len(),
            session.next_field()
        );
        let converted = session
            .encode(&capture, &entry.options(), &patches, donor.as_ref())
            .with_context(|| format!("Failed to encode pattern '{}'", entry.name))?;
        fields.extend(converted);
    }

    let out = write_back(&roms, &hardware, &fields)?;
    let mut store = DirStore::new(&output_dir);
    out.save(&mut store, &hardware)
        .with_context(|| format!("Failed to save ROM set to {:?}", output_dir))?;

    tracing::info!(
        "Wrote {} field(s), next free offset {:#07x}, to {:?}",
        fields.len(),
        session.next_offset(),
        output_dir
    );
    Ok(())
}
