//! Flat scaling and the science / flat division.

use crate::exposure::{Exposure, MaskPlane};

use super::config::FlatPolicy;

/// Factor the master flat is multiplied by during division.
pub(crate) fn effective_scale(config: &FlatPolicy) -> f64 {
    if config.sig_clip {
        tracing::debug!(
            sig_clip_val = config.sig_clip_val,
            "Sigma clipping requested for the master flat, not applied"
        );
    }
    config.scale_factor()
}

/// Divide `science` by `master_flat × scale` pixel by pixel, in place.
///
/// The flat itself is only read, so a flat reused across exposures is
/// scaled exactly once per division.
///
/// Flat mask bits are carried into the science mask. A zero or non-finite
/// scaled flat sample leaves the science sample as it was and sets
/// [`MaskPlane::FlatDegenerate`]. Variance, if the science exposure has it,
/// follows first-order propagation including the flat's own variance.
///
/// Plane sizes must already be validated against the image.
/// Returns the number of degenerate pixels.
pub(crate) fn divide_by_flat(science: &mut Exposure, master_flat: &Exposure, scale: f64) -> usize {
    debug_assert_eq!(science.dimensions(), master_flat.dimensions());

    let Exposure {
        image,
        mask,
        variance,
        ..
    } = science;
    let flat_variance = master_flat.variance.as_ref();
    let degenerate_bit = MaskPlane::FlatDegenerate.bit();
    let scale_sq = scale * scale;
    let mut degenerate = 0;

    for i in 0..image.len() {
        mask[i] |= master_flat.mask[i];

        let f = master_flat.image[i] as f64 * scale;
        if f == 0.0 || !f.is_finite() {
            mask[i] |= degenerate_bit;
            degenerate += 1;
            continue;
        }

        let s = image[i] as f64;
        image[i] = (s / f) as f32;

        if let Some(variance) = variance.as_mut() {
            let f_sq = f * f;
            let mut v = variance[i] as f64 / f_sq;
            if let Some(flat_variance) = flat_variance {
                v += s * s * flat_variance[i] as f64 * scale_sq / (f_sq * f_sq);
            }
            variance[i] = v as f32;
        }
    }

    degenerate
}
