//! Patch library: named fixed-coordinate sample overrides
//!
//! Patches are data. Each one names a window of lines and samples in one
//! component and the literal values to write there, either as explicit rows
//! or as a single fill value.
//!
//! ```toml
//! [[patch]]
//! name = "clock-cutout"
//! stage = "post-synthesis"
//! component = "luma"
//! profile = "digital"
//! lines = [40, 42]
//! samples = [600, 604]
//! rows = [[164, 164, 164, 164], [164, 164, 164, 164]]
//! ```
//!
//! Pre-synthesis patches overwrite captured samples (after chroma
//! decimation, before level mapping). Post-synthesis patches overwrite ROM
//! samples of a [`ConvertedField`], addressed by captured line and displayed
//! sample position.

use std::ops::Range;

use hashbrown::{HashMap, HashSet};
use serde::Deserialize;

use crate::capture::LineSamples;
use crate::encode::ConvertedField;
use crate::error::{CodecError, Result};
use crate::levels::LevelProfile;
use crate::raster::Component;
use crate::{CHROMA_MAX, LUMA_MAX};

/// When a patch is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchStage {
    PreSynthesis,
    PostSynthesis,
}

/// Level profile a patch is valid under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileRequirement {
    #[default]
    Any,
    Digital,
    Analogue,
}

impl ProfileRequirement {
    fn name(self) -> &'static str {
        match self {
            ProfileRequirement::Any => "any",
            ProfileRequirement::Digital => "digital",
            ProfileRequirement::Analogue => "analogue",
        }
    }

    fn allows(self, profile: &LevelProfile) -> bool {
        match self {
            ProfileRequirement::Any => true,
            ProfileRequirement::Digital => profile.use_digital_factors,
            ProfileRequirement::Analogue => !profile.use_digital_factors,
        }
    }
}

/// One named override window
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Patch {
    pub name: String,
    pub stage: PatchStage,
    pub component: Component,
    #[serde(default)]
    pub profile: ProfileRequirement,
    /// Half-open captured line range
    pub lines: [usize; 2],
    /// Half-open sample range within the line
    pub samples: [usize; 2],
    #[serde(default)]
    pub rows: Option<Vec<Vec<i32>>>,
    #[serde(default)]
    pub fill: Option<i32>,
}

impl Patch {
    pub fn line_range(&self) -> Range<usize> {
        self.lines[0]..self.lines[1]
    }

    pub fn sample_range(&self) -> Range<usize> {
        self.samples[0]..self.samples[1]
    }

    /// Value written at `(line, sample)` relative to the window origin
    pub fn value_at(&self, line: usize, sample: usize) -> i32 {
        match (&self.rows, self.fill) {
            (Some(rows), _) => rows[line][sample],
            (None, Some(fill)) => fill,
            (None, None) => 0,
        }
    }

    /// Largest value the patch may write
    fn value_limit(&self) -> i32 {
        match (self.stage, self.component) {
            (PatchStage::PreSynthesis, _) => u16::MAX as i32,
            (PatchStage::PostSynthesis, Component::RY | Component::BY) => CHROMA_MAX,
            (PatchStage::PostSynthesis, _) => LUMA_MAX,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(CodecError::config(format!("patch '{}': {}", self.name, msg)));

        if self.component == Component::LumaLsb {
            return fail("component must be luma, ry or by".into());
        }
        if self.lines[0] >= self.lines[1] || self.samples[0] >= self.samples[1] {
            return fail(format!(
                "empty window lines {:?} samples {:?}",
                self.lines, self.samples
            ));
        }

        let values: Vec<i32> = match (&self.rows, self.fill) {
            (Some(_), Some(_)) | (None, None) => {
                return fail("exactly one of `rows` or `fill` is required".into());
            }
            (None, Some(fill)) => vec![fill],
            (Some(rows), None) => {
                if rows.len() != self.line_range().len() {
                    return fail(format!(
                        "{} rows for {} lines",
                        rows.len(),
                        self.line_range().len()
                    ));
                }
                if let Some(row) = rows.iter().find(|r| r.len() != self.sample_range().len()) {
                    return fail(format!(
                        "row of {} values for {} samples",
                        row.len(),
                        self.sample_range().len()
                    ));
                }
                rows.iter().flatten().copied().collect()
            }
        };

        let limit = self.value_limit();
        if let Some(bad) = values.iter().find(|&&v| v < 0 || v > limit) {
            return fail(format!("value {} outside 0..={}", bad, limit));
        }
        Ok(())
    }

    /// Reject use under the wrong level profile
    pub fn check_profile(&self, profile: &LevelProfile) -> Result<()> {
        if self.profile.allows(profile) {
            Ok(())
        } else {
            Err(CodecError::ProfileMismatch {
                patch: self.name.clone(),
                required: self.profile.name(),
            })
        }
    }

    /// Overwrite captured samples of one frame
    pub fn apply_to_lines(&self, lines: &mut [LineSamples]) -> Result<()> {
        if self.lines[1] > lines.len() {
            return Err(CodecError::config(format!(
                "patch '{}' reaches line {} of a {}-line frame",
                self.name,
                self.lines[1],
                lines.len()
            )));
        }

        for (row, line) in lines[self.line_range()].iter_mut().enumerate() {
            let plane = match self.component {
                Component::RY => &mut line.ry,
                Component::BY => &mut line.by,
                _ => &mut line.y,
            };
            if self.samples[1] > plane.len() {
                return Err(CodecError::config(format!(
                    "patch '{}' reaches sample {} of a {}-sample {} line",
                    self.name,
                    self.samples[1],
                    plane.len(),
                    self.component
                )));
            }
            for (col, sample) in plane[self.sample_range()].iter_mut().enumerate() {
                *sample = self.value_at(row, col) as u16;
            }
            line.rehash();
        }
        Ok(())
    }

    /// Overwrite synthesized samples of a converted field
    pub fn apply_to_field(&self, field: &mut ConvertedField) -> Result<()> {
        for (row, line) in self.line_range().enumerate() {
            for (col, sample) in self.sample_range().enumerate() {
                let index = field.sample_index(self.component, line, sample)?;
                field.samples_mut(self.component)[index] = self.value_at(row, col);
            }
        }
        Ok(())
    }
}

/// Patch file root
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatchFile {
    #[serde(rename = "patch", default)]
    patches: Vec<Patch>,
}

/// All patches known to a job, keyed by name
#[derive(Debug, Clone, Default)]
pub struct PatchLibrary {
    patches: HashMap<String, Patch>,
}

impl PatchLibrary {
    /// Parse and validate a patch library
    pub fn from_toml(text: &str) -> Result<Self> {
        let file: PatchFile = toml::from_str(text)?;
        let mut patches = HashMap::with_capacity(file.patches.len());
        for patch in file.patches {
            patch.validate()?;
            if patches.contains_key(&patch.name) {
                return Err(CodecError::config(format!("duplicate patch '{}'", patch.name)));
            }
            patches.insert(patch.name.clone(), patch);
        }
        tracing::debug!("Patch library: {} patches", patches.len());
        Ok(Self { patches })
    }

    pub fn get(&self, name: &str) -> Option<&Patch> {
        self.patches.get(name)
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Patch names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.patches.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve the patches one pattern uses, in the given order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<PatchSet> {
        let patches = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.get(name)
                    .cloned()
                    .ok_or_else(|| CodecError::UnknownPatch(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PatchSet { patches })
    }
}

/// Ordered patches selected for one encode call
#[derive(Debug, Clone, Default)]
pub struct PatchSet {
    patches: Vec<Patch>,
}

impl PatchSet {
    pub fn new(patches: Vec<Patch>) -> Result<Self> {
        for patch in &patches {
            patch.validate()?;
        }
        Ok(Self { patches })
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn check_profile(&self, profile: &LevelProfile) -> Result<()> {
        self.patches.iter().try_for_each(|p| p.check_profile(profile))
    }

    fn stage(&self, stage: PatchStage) -> impl Iterator<Item = &Patch> {
        self.patches.iter().filter(move |p| p.stage == stage)
    }

    pub fn apply_pre_synthesis(&self, lines: &mut [LineSamples]) -> Result<()> {
        self.stage(PatchStage::PreSynthesis)
            .try_for_each(|p| p.apply_to_lines(lines))
    }

    pub fn apply_post_synthesis(&self, field: &mut ConvertedField) -> Result<()> {
        self.stage(PatchStage::PostSynthesis)
            .try_for_each(|p| p.apply_to_field(field))
    }

    /// Captured lines a post-synthesis patch writes to
    pub fn post_synthesis_lines(&self) -> HashSet<usize> {
        self.stage(PatchStage::PostSynthesis)
            .flat_map(Patch::line_range)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"
[[patch]]
name = "clock-cutout"
stage = "post-synthesis"
component = "luma"
profile = "digital"
lines = [2, 4]
samples = [10, 13]
rows = [[164, 200, 164], [300, 301, 302]]

[[patch]]
name = "id-box"
stage = "pre-synthesis"
component = "ry"
lines = [0, 2]
samples = [4, 8]
fill = 512

[[patch]]
name = "stripe-fix"
stage = "post-synthesis"
component = "by"
profile = "analogue"
lines = [5, 6]
samples = [0, 2]
fill = 128
"#;

    fn digital() -> LevelProfile {
        LevelProfile {
            use_digital_factors: true,
            invert: false,
        }
    }

    #[test]
    fn test_library_parses() {
        let library = PatchLibrary::from_toml(LIBRARY).unwrap();
        assert_eq!(library.len(), 3);
        assert_eq!(library.names(), vec!["clock-cutout", "id-box", "stripe-fix"]);

        let patch = library.get("clock-cutout").unwrap();
        assert_eq!(patch.stage, PatchStage::PostSynthesis);
        assert_eq!(patch.component, Component::Luma);
        assert_eq!(patch.value_at(1, 2), 302);
        assert_eq!(library.get("id-box").unwrap().profile, ProfileRequirement::Any);
        assert_eq!(library.get("id-box").unwrap().value_at(1, 3), 512);
    }

    #[test]
    fn test_unknown_patch() {
        let library = PatchLibrary::from_toml(LIBRARY).unwrap();
        let err = library.select(&["id-box", "missing"]).unwrap_err();
        assert!(matches!(err, CodecError::UnknownPatch(name) if name == "missing"));
    }

    #[test]
    fn test_profile_gate() {
        let library = PatchLibrary::from_toml(LIBRARY).unwrap();
        let set = library.select(&["clock-cutout", "stripe-fix"]).unwrap();
        let err = set.check_profile(&digital()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::ProfileMismatch { ref patch, required: "analogue" } if patch == "stripe-fix"
        ));

        let set = library.select(&["clock-cutout", "id-box"]).unwrap();
        assert!(set.check_profile(&digital()).is_ok());
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let base = |body: &str| {
            format!(
                "[[patch]]\nname = \"p\"\nstage = \"post-synthesis\"\ncomponent = \"ry\"\n{}",
                body
            )
        };

        // rows and fill together
        assert!(PatchLibrary::from_toml(&base("lines = [0, 1]\nsamples = [0, 1]\nrows = [[1]]\nfill = 1")).is_err());
        // neither
        assert!(PatchLibrary::from_toml(&base("lines = [0, 1]\nsamples = [0, 1]")).is_err());
        // row count
        assert!(PatchLibrary::from_toml(&base("lines = [0, 2]\nsamples = [0, 1]\nrows = [[1]]")).is_err());
        // row width
        assert!(PatchLibrary::from_toml(&base("lines = [0, 1]\nsamples = [0, 2]\nrows = [[1]]")).is_err());
        // empty window
        assert!(PatchLibrary::from_toml(&base("lines = [3, 3]\nsamples = [0, 1]\nfill = 1")).is_err());
        // chroma range
        assert!(PatchLibrary::from_toml(&base("lines = [0, 1]\nsamples = [0, 1]\nfill = 256")).is_err());
        // unknown key
        assert!(PatchLibrary::from_toml(&base("lines = [0, 1]\nsamples = [0, 1]\nfill = 1\ncolour = 2")).is_err());

        assert!(PatchLibrary::from_toml(&base("lines = [0, 1]\nsamples = [0, 1]\nfill = 255")).is_ok());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let text = format!("{}\n{}", LIBRARY, LIBRARY);
        assert!(matches!(
            PatchLibrary::from_toml(&text),
            Err(CodecError::Config(_))
        ));
    }

    #[test]
    fn test_pre_synthesis_overwrites_and_rehashes() {
        let library = PatchLibrary::from_toml(LIBRARY).unwrap();
        let set = library.select(&["id-box"]).unwrap();

        let mut lines: Vec<LineSamples> = (0..3)
            .map(|_| LineSamples::new(vec![0; 16], vec![7; 8], vec![7; 8]))
            .collect();
        let before = lines[0].hash();
        set.apply_pre_synthesis(&mut lines).unwrap();

        assert_eq!(lines[0].ry, vec![7, 7, 7, 7, 512, 512, 512, 512]);
        assert_eq!(lines[1].ry[4..], [512; 4]);
        assert_eq!(lines[2].ry, vec![7; 8]);
        assert_eq!(lines[0].by, vec![7; 8]);
        assert_ne!(lines[0].hash(), before);
        assert!(lines[0].same_content(&lines[1]));
    }

    #[test]
    fn test_pre_synthesis_window_outside_frame() {
        let library = PatchLibrary::from_toml(LIBRARY).unwrap();
        let set = library.select(&["id-box"]).unwrap();

        let mut lines = vec![LineSamples::new(vec![0; 16], vec![0; 8], vec![0; 8])];
        assert!(set.apply_pre_synthesis(&mut lines).is_err());

        let mut narrow: Vec<LineSamples> = (0..2)
            .map(|_| LineSamples::new(vec![0; 16], vec![0; 6], vec![0; 6]))
            .collect();
        assert!(set.apply_pre_synthesis(&mut narrow).is_err());
    }

    #[test]
    fn test_post_synthesis_lines() {
        let library = PatchLibrary::from_toml(LIBRARY).unwrap();
        let set = library.select(&["clock-cutout", "id-box", "stripe-fix"]).unwrap();
        let mut lines: Vec<usize> = set.post_synthesis_lines().into_iter().collect();
        lines.sort_unstable();
        assert_eq!(lines, vec![2, 3, 5]);
    }

    #[test]
    fn test_shipped_patch_library() {
        let library = PatchLibrary::from_toml(include_str!("../../patches/example.toml")).unwrap();
        assert_eq!(
            library.names(),
            vec!["clock-cutout", "ident-neutral-by", "ident-neutral-ry", "pulse-bar"]
        );
        let pulse = library.get("pulse-bar").unwrap();
        assert_eq!(pulse.stage, PatchStage::PreSynthesis);
        assert_eq!(pulse.profile, ProfileRequirement::Analogue);
    }
}
