//! Typed views of the flat-field policy entries.
//!
//! Policies are resolved once, up front, so a missing or mistyped key fails
//! before either exposure is inspected.

use strum_macros::Display;

use crate::policy::{Policy, PolicyError};

/// Name of the flat-field sub-section inside the ISR policy.
pub const FLAT_POLICY_SECTION: &str = "flatPolicy";

const CHUNK_TYPE: &str = "flatPolicy.chunkType";
const FLAT_FIELD_SCALE: &str = "flatPolicy.flatFieldScale";
const STRETCH_FACTOR: &str = "flatPolicy.stretchFactor";
const SIG_CLIP: &str = "flatPolicy.sigClip";
const SIG_CLIP_VAL: &str = "flatPolicy.sigClipVal";
const NORMALIZE_KEY: &str = "normalizeKey";

/// Which detector region an exposure covers.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ChunkType {
    /// Single amplifier, matched on `AMPID`
    #[strum(serialize = "amp")]
    Amp,
    /// Whole CCD, matched on `CCDID`
    #[strum(serialize = "ccd")]
    Ccd,
    /// Any other granularity (e.g. raft). Not matched.
    #[strum(to_string = "{0}")]
    Other(String),
}

impl ChunkType {
    pub fn parse(value: &str) -> Self {
        match value {
            "amp" => ChunkType::Amp,
            "ccd" => ChunkType::Ccd,
            other => ChunkType::Other(other.to_string()),
        }
    }

    /// Metadata key identifying the region, if this chunk type is matched.
    pub fn region_key(&self) -> Option<&'static str> {
        match self {
            ChunkType::Amp => Some("AMPID"),
            ChunkType::Ccd => Some("CCDID"),
            ChunkType::Other(_) => None,
        }
    }
}

/// Parameters from the `flatPolicy` section of the ISR policy.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatPolicy {
    pub chunk_type: ChunkType,
    /// Extra multiplier for the master flat. `0.0` means unset.
    pub flat_field_scale: f64,
    /// Dynamic-range stretch applied to the master flat.
    pub stretch_factor: f64,
    /// Outlier clipping request. Parsed but not applied to pixels yet.
    pub sig_clip: bool,
    /// Clipping threshold in sigma. Parsed but not applied to pixels yet;
    /// only checked when `sig_clip` is set.
    pub sig_clip_val: f64,
}

impl Default for FlatPolicy {
    fn default() -> Self {
        Self {
            chunk_type: ChunkType::Amp,
            flat_field_scale: 0.0,
            stretch_factor: 1.0,
            sig_clip: false,
            sig_clip_val: 3.0,
        }
    }
}

impl FlatPolicy {
    /// Resolve from the ISR policy. `flatFieldScale` may be absent (unset);
    /// every other key is required.
    pub fn from_policy(isr_policy: &Policy) -> Result<Self, PolicyError> {
        let config = Self {
            chunk_type: ChunkType::parse(isr_policy.get_string(CHUNK_TYPE)?),
            flat_field_scale: isr_policy
                .get_optional_double(FLAT_FIELD_SCALE)?
                .unwrap_or(0.0),
            stretch_factor: isr_policy.get_double(STRETCH_FACTOR)?,
            sig_clip: isr_policy.get_bool(SIG_CLIP)?,
            sig_clip_val: isr_policy.get_double(SIG_CLIP_VAL)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if !self.stretch_factor.is_finite() || self.stretch_factor == 0.0 {
            return Err(invalid(
                STRETCH_FACTOR,
                format!("must be finite and non-zero, got {}", self.stretch_factor),
            ));
        }
        if !self.flat_field_scale.is_finite() {
            return Err(invalid(
                FLAT_FIELD_SCALE,
                format!("must be finite, got {}", self.flat_field_scale),
            ));
        }
        if self.sig_clip && (!self.sig_clip_val.is_finite() || self.sig_clip_val <= 0.0) {
            return Err(invalid(
                SIG_CLIP_VAL,
                format!("must be positive, got {}", self.sig_clip_val),
            ));
        }
        Ok(())
    }

    /// Combined factor applied to the master flat: stretch, times the flat
    /// field scale when it is set.
    pub fn scale_factor(&self) -> f64 {
        if self.flat_field_scale != 0.0 {
            self.stretch_factor * self.flat_field_scale
        } else {
            self.stretch_factor
        }
    }
}

/// Dataset-specific settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetPolicy {
    /// Metadata key whose presence on a master flat means it is already
    /// normalized (e.g. CFHT's `IMRED_NF`).
    pub normalize_key: String,
}

impl DatasetPolicy {
    pub fn new(normalize_key: impl Into<String>) -> Self {
        Self {
            normalize_key: normalize_key.into(),
        }
    }

    pub fn from_policy(dataset_policy: &Policy) -> Result<Self, PolicyError> {
        let normalize_key = dataset_policy.get_string(NORMALIZE_KEY)?;
        if normalize_key.is_empty() {
            return Err(invalid(NORMALIZE_KEY, "must not be empty".to_string()));
        }
        Ok(Self::new(normalize_key))
    }
}

fn invalid(key: &str, reason: String) -> PolicyError {
    PolicyError::InvalidValue {
        key: key.to_string(),
        reason,
    }
}
