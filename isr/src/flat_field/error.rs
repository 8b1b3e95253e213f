//! Error types for flat-field correction.

use strum_macros::Display;
use thiserror::Error;

use crate::exposure::{ExposureDimensions, MetadataError};
use crate::policy::PolicyError;

/// Which input exposure an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ExposureRole {
    #[strum(serialize = "science exposure")]
    Science,
    #[strum(serialize = "master flat")]
    MasterFlat,
}

/// Errors that can occur during flat-field correction.
///
/// Every variant is raised before the science exposure is modified.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Science exposure already flat-field corrected ('{key}' is set)")]
    AlreadyProcessed { key: String },

    #[error("Dimension mismatch: science exposure is {science}, master flat is {master_flat}")]
    DimensionMismatch {
        science: ExposureDimensions,
        master_flat: ExposureDimensions,
    },

    #[error("Plane size mismatch: {plane} plane of {exposure} is {plane_size}, image is {image}")]
    PlaneSizeMismatch {
        exposure: ExposureRole,
        plane: &'static str,
        image: ExposureDimensions,
        plane_size: ExposureDimensions,
    },

    #[error("Region mismatch on '{key}': science exposure has {science}, master flat has {master_flat}")]
    RegionMismatch {
        key: &'static str,
        science: i64,
        master_flat: i64,
    },

    #[error("Filter mismatch: science exposure has {science}, master flat has {master_flat}")]
    FilterMismatch { science: i64, master_flat: i64 },

    #[error("Metadata '{key}' unusable on {exposure}: {source}")]
    MetadataNotFound {
        exposure: ExposureRole,
        key: &'static str,
        #[source]
        source: MetadataError,
    },

    #[error("Flat-field configuration invalid: {source}")]
    ConfigNotFound {
        #[from]
        source: PolicyError,
    },

    #[error("Master flat cannot be normalized: mean is {mean}")]
    DegenerateFlat { mean: f64 },
}
