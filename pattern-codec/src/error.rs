//! Codec error type
//!
//! Every fatal condition aborts the current conversion run. Nothing in this
//! crate retries: the pipeline is deterministic, so re-running the same input
//! yields the same error.

use crate::raster::Component;
use crate::standard::Standard;

/// Errors raised by decoding, encoding and write-back
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------
    /// Unsupported standard/format combination or inconsistent manifest
    #[error("configuration error: {0}")]
    Config(String),

    /// Patch applied under the wrong level profile
    #[error("patch '{patch}' requires {required} level factors")]
    ProfileMismatch {
        patch: String,
        required: &'static str,
    },

    /// Patch name not present in the library
    #[error("unknown patch '{0}'")]
    UnknownPatch(String),

    /// Manifest or patch library could not be parsed
    #[error("failed to parse manifest: {0}")]
    Manifest(#[from] toml::de::Error),

    // -------------------------------------------------------------------------
    // Input shape
    // -------------------------------------------------------------------------
    /// Capture does not match any expected line count for the standard
    #[error("{standard} capture has {samples} samples; expected {expected} lines of {line_len}")]
    InputShape {
        standard: Standard,
        samples: usize,
        line_len: usize,
        expected: String,
    },

    /// Chip images of one component set differ in length
    #[error("part {part} is {actual} bytes, expected {expected}")]
    PlaneLengthMismatch {
        part: String,
        expected: usize,
        actual: usize,
    },

    // -------------------------------------------------------------------------
    // Numeric range
    // -------------------------------------------------------------------------
    /// Level mapping produced a sample below zero
    #[error("{component} sample {sample} on line {line} mapped to {value} (below zero)")]
    NegativeSample {
        component: Component,
        line: usize,
        sample: usize,
        value: i64,
    },

    // -------------------------------------------------------------------------
    // Addressing
    // -------------------------------------------------------------------------
    /// Descriptor cannot express (or resolve) the address
    #[error("vector {vector} is not representable: {reason}")]
    Unrepresentable { vector: String, reason: String },

    /// Segment reaches outside its sample plane
    #[error("{component} segment at {address}+{length} exceeds plane of {plane_len} samples")]
    AddressOutOfBounds {
        component: Component,
        address: usize,
        length: usize,
        plane_len: usize,
    },

    /// Synthesized content no longer fits the output image
    #[error("{what} needs {needed} bytes but only {available} are available")]
    CapacityExceeded {
        what: String,
        needed: usize,
        available: usize,
    },

    /// Field has no descriptor for a vector table slot
    #[error("field {field} has no vector for line index {index}")]
    MissingVector { field: usize, index: usize },

    // -------------------------------------------------------------------------
    // Store
    // -------------------------------------------------------------------------
    /// RomPart store failed
    #[error("rom part '{part}': {source}")]
    Store {
        part: String,
        #[source]
        source: std::io::Error,
    },
}

/// Codec result alias
pub type Result<T> = std::result::Result<T, CodecError>;

impl CodecError {
    /// Shorthand for configuration errors
    pub fn config(msg: impl Into<String>) -> Self {
        CodecError::Config(msg.into())
    }
}
