//! Flat-field correction.
//!
//! Divides a science exposure by a master flat to remove pixel-to-pixel
//! sensitivity variation and illumination structure such as vignetting.
//!
//! Steps, in order:
//! 1. refuse a science exposure that already carries `ISR_FLATCOR`
//! 2. resolve the `flatPolicy` section and `normalizeKey` into typed configs
//! 3. check dimensions, region id (`AMPID`/`CCDID`) and `FILTER`
//! 4. normalize the master flat to unit mean unless it carries the marker
//! 5. divide science by the flat times `stretchFactor` (and `flatFieldScale`
//!    when set), then mark `ISR_FLATCOR = "Complete"`
//!
//! Any failure in steps 1-4 leaves the science exposure untouched.

mod config;
mod correct;
mod error;
mod normalize;
mod provenance;
mod validate;

#[cfg(test)]
mod tests;

use crate::exposure::{Exposure, MaskPlane};
use crate::policy::Policy;

pub use config::{ChunkType, DatasetPolicy, FlatPolicy, FLAT_POLICY_SECTION};
pub use error::{Error, ExposureRole};
pub use normalize::{normalize_flat, FlatStatistics};
pub use provenance::{is_flat_corrected, COMPLETE, FLAT_CORRECTION_KEY};

/// Diagnostics from a successful correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatFieldReport {
    /// Master flat statistics before normalization; `None` if it was
    /// already normalized.
    pub flat_statistics: Option<FlatStatistics>,
    /// Factor the normalized flat was multiplied by for the division
    pub applied_scale: f64,
    /// Pixels where the flat was zero or not finite
    pub degenerate_pixels: usize,
}

/// Flat-field correct `science` in place.
///
/// `master_flat` is normalized in place unless it already carries the
/// normalization marker, and gets the marker afterwards. Scaling is applied
/// during the division only, so the same flat can be reused across
/// exposures.
///
/// # Errors
/// See [`Error`]. On error neither exposure is modified.
pub fn flat_field_correct(
    science: &mut Exposure,
    master_flat: &mut Exposure,
    isr_policy: &Policy,
    dataset_policy: &Policy,
) -> Result<FlatFieldReport, Error> {
    validate::check_not_processed(science)?;

    let config = FlatPolicy::from_policy(isr_policy)?;
    let dataset = DatasetPolicy::from_policy(dataset_policy)?;

    FlatFieldCorrector::new(config, dataset).correct(science, master_flat)
}

/// Flat-field corrector with resolved configuration.
///
/// Useful when the same policy is applied to many exposure pairs.
#[derive(Debug, Clone)]
pub struct FlatFieldCorrector {
    config: FlatPolicy,
    dataset: DatasetPolicy,
}

impl FlatFieldCorrector {
    pub fn new(config: FlatPolicy, dataset: DatasetPolicy) -> Self {
        Self { config, dataset }
    }

    pub fn from_policies(isr_policy: &Policy, dataset_policy: &Policy) -> Result<Self, Error> {
        Ok(Self::new(
            FlatPolicy::from_policy(isr_policy)?,
            DatasetPolicy::from_policy(dataset_policy)?,
        ))
    }

    pub fn config(&self) -> &FlatPolicy {
        &self.config
    }

    pub fn correct(
        &self,
        science: &mut Exposure,
        master_flat: &mut Exposure,
    ) -> Result<FlatFieldReport, Error> {
        validate::check_not_processed(science)?;
        validate::check_compatible(science, master_flat, &self.config)?;

        let flat_statistics = normalize::normalize_if_needed(master_flat, &self.dataset)?;
        let applied_scale = correct::effective_scale(&self.config);
        let degenerate_pixels = correct::divide_by_flat(science, master_flat, applied_scale);
        provenance::record_flat_correction(science);

        if degenerate_pixels > 0 {
            tracing::warn!(
                "Flat-field correction flagged {} degenerate pixels as {}",
                degenerate_pixels,
                MaskPlane::FlatDegenerate
            );
        }
        tracing::trace!(
            dimensions = %science.dimensions(),
            applied_scale,
            "Flat-field correction complete"
        );

        Ok(FlatFieldReport {
            flat_statistics,
            applied_scale,
            degenerate_pixels,
        })
    }
}
