//! Processing-history markers written into exposure metadata.

use crate::exposure::Exposure;

/// Set on a science exposure once it has been flat-field corrected.
pub const FLAT_CORRECTION_KEY: &str = "ISR_FLATCOR";

/// Value written for completed processing steps.
pub const COMPLETE: &str = "Complete";

/// Presence alone counts; the stored value is not inspected.
pub fn is_flat_corrected(exposure: &Exposure) -> bool {
    exposure.metadata.contains(FLAT_CORRECTION_KEY)
}

pub(crate) fn record_flat_correction(science: &mut Exposure) {
    science.metadata.add(FLAT_CORRECTION_KEY, COMPLETE);
}
