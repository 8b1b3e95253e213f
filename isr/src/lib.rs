//! ISR - Instrument signature removal for astronomical detector exposures.
//!
//! Currently provides the flat-field correction stage:
//! - Master flat normalization to unit mean
//! - Region and filter matching between science exposure and master flat
//! - Per-pixel division with mask and variance propagation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use isr::{flat_field_correct, Exposure, Policy};
//!
//! let isr_policy = Policy::from_file("policies/isr_policy.yaml")?;
//! let dataset_policy = Policy::from_file("policies/dataset_policy.yaml")?;
//!
//! let report = flat_field_correct(&mut science, &mut master_flat, &isr_policy, &dataset_policy)?;
//! println!("{} degenerate pixels", report.degenerate_pixels);
//! ```

pub(crate) mod common;
pub mod exposure;
pub mod flat_field;
pub(crate) mod math;
pub mod policy;

// ============================================================================
// Exposure
// ============================================================================

pub use crate::common::Buffer2;
pub use exposure::{
    Exposure, ExposureDimensions, MaskPixel, MaskPlane, Metadata, MetadataError, MetadataValue,
};

// ============================================================================
// Policy
// ============================================================================

pub use policy::{Policy, PolicyError, PolicyValue};

// ============================================================================
// Flat-field correction
// ============================================================================

pub use flat_field::{
    flat_field_correct, normalize_flat, ChunkType, DatasetPolicy, Error as FlatFieldError,
    FlatFieldCorrector, FlatFieldReport, FlatPolicy, FlatStatistics,
};
