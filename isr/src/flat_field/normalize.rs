//! Master flat normalization to unit mean.

use crate::exposure::Exposure;
use crate::math;

use super::config::DatasetPolicy;
use super::error::Error;
use super::provenance::COMPLETE;

/// Statistics of the master flat before normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatStatistics {
    /// Number of samples
    pub count: usize,
    pub mean: f64,
    /// Population standard deviation
    pub sigma: f64,
}

impl FlatStatistics {
    /// Two passes: mean, then spread around it. Mask bits are ignored.
    pub fn compute(flat: &Exposure) -> Self {
        let (sum, count) = math::sum_and_count(&flat.image);
        let mean = sum / count as f64;
        let sigma = (math::sum_squared_deviations(&flat.image, mean) / count as f64).sqrt();
        Self { count, mean, sigma }
    }
}

/// Divide the flat by its mean so the mean becomes 1.0.
///
/// Fails with [`Error::DegenerateFlat`] when the mean is zero or not finite
/// (this includes an empty flat); the flat is untouched in that case.
pub fn normalize_flat(master_flat: &mut Exposure) -> Result<FlatStatistics, Error> {
    let stats = FlatStatistics::compute(master_flat);
    if stats.mean == 0.0 || !stats.mean.is_finite() {
        return Err(Error::DegenerateFlat { mean: stats.mean });
    }
    master_flat.divide_by(stats.mean);
    Ok(stats)
}

/// Normalize unless the flat carries the dataset's normalization marker.
/// Returns `None` when skipped. A freshly normalized flat gets the marker.
pub(crate) fn normalize_if_needed(
    master_flat: &mut Exposure,
    dataset: &DatasetPolicy,
) -> Result<Option<FlatStatistics>, Error> {
    if master_flat.metadata.contains(&dataset.normalize_key) {
        tracing::debug!(
            marker = %dataset.normalize_key,
            "Master flat already normalized, skipping"
        );
        return Ok(None);
    }

    let stats = normalize_flat(master_flat)?;
    master_flat
        .metadata
        .add(dataset.normalize_key.as_str(), COMPLETE);

    tracing::debug!(
        count = stats.count,
        mean = stats.mean,
        sigma = stats.sigma,
        "Normalized master flat"
    );
    Ok(Some(stats))
}
