//! Pre-condition checks run before any pixel is modified.

use crate::exposure::{Exposure, ExposureDimensions};

use super::config::{ChunkType, FlatPolicy};
use super::error::{Error, ExposureRole};
use super::provenance::{is_flat_corrected, FLAT_CORRECTION_KEY};

const FILTER_KEY: &str = "FILTER";

pub(crate) fn check_not_processed(science: &Exposure) -> Result<(), Error> {
    if is_flat_corrected(science) {
        return Err(Error::AlreadyProcessed {
            key: FLAT_CORRECTION_KEY.to_string(),
        });
    }
    Ok(())
}

/// Dimensions, then region, then filter. The first failure wins.
pub(crate) fn check_compatible(
    science: &Exposure,
    master_flat: &Exposure,
    config: &FlatPolicy,
) -> Result<(), Error> {
    check_dimensions(science, master_flat)?;
    check_region(science, master_flat, &config.chunk_type)?;
    check_filter(science, master_flat)
}

fn check_dimensions(science: &Exposure, master_flat: &Exposure) -> Result<(), Error> {
    let (science_dims, flat_dims) = (science.dimensions(), master_flat.dimensions());
    if science_dims != flat_dims {
        return Err(Error::DimensionMismatch {
            science: science_dims,
            master_flat: flat_dims,
        });
    }
    check_planes(science, ExposureRole::Science)?;
    check_planes(master_flat, ExposureRole::MasterFlat)
}

/// Mask and variance are public fields, so their sizes are not guaranteed.
fn check_planes(exposure: &Exposure, role: ExposureRole) -> Result<(), Error> {
    let mismatch = |plane, width, height| Error::PlaneSizeMismatch {
        exposure: role,
        plane,
        image: exposure.dimensions(),
        plane_size: ExposureDimensions::new(width, height),
    };

    if !exposure.mask.same_size(&exposure.image) {
        return Err(mismatch("mask", exposure.mask.width(), exposure.mask.height()));
    }
    if let Some(variance) = &exposure.variance {
        if !variance.same_size(&exposure.image) {
            return Err(mismatch("variance", variance.width(), variance.height()));
        }
    }
    Ok(())
}

fn check_region(
    science: &Exposure,
    master_flat: &Exposure,
    chunk_type: &ChunkType,
) -> Result<(), Error> {
    let Some(key) = chunk_type.region_key() else {
        tracing::debug!(
            chunk_type = %chunk_type,
            "No region matching for this chunk type, skipping region check"
        );
        return Ok(());
    };

    let science_id = metadata_int(science, ExposureRole::Science, key)?;
    let flat_id = metadata_int(master_flat, ExposureRole::MasterFlat, key)?;
    if science_id != flat_id {
        return Err(Error::RegionMismatch {
            key,
            science: science_id,
            master_flat: flat_id,
        });
    }
    Ok(())
}

fn check_filter(science: &Exposure, master_flat: &Exposure) -> Result<(), Error> {
    let science_filter = metadata_int(science, ExposureRole::Science, FILTER_KEY)?;
    let flat_filter = metadata_int(master_flat, ExposureRole::MasterFlat, FILTER_KEY)?;

    tracing::debug!(
        "Science filter: {}, master flat filter: {}",
        filter_label(science_filter),
        filter_label(flat_filter)
    );

    if science_filter != flat_filter {
        return Err(Error::FilterMismatch {
            science: science_filter,
            master_flat: flat_filter,
        });
    }
    Ok(())
}

fn metadata_int(exposure: &Exposure, role: ExposureRole, key: &'static str) -> Result<i64, Error> {
    exposure
        .metadata
        .get_int(key)
        .map_err(|source| Error::MetadataNotFound {
            exposure: role,
            key,
            source,
        })
}

/// Band codes are often ASCII letters (`'r'` stored as 114).
fn filter_label(code: i64) -> String {
    match u8::try_from(code) {
        Ok(byte) if byte.is_ascii_alphabetic() => format!("'{}' ({code})", byte as char),
        _ => code.to_string(),
    }
}
