use common::float_ext::FloatExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::common::Buffer2;
use crate::exposure::MetadataError;
use crate::policy::PolicyError;

use super::*;

// ====================================================================
// Helpers
// ====================================================================

fn isr_policy(chunk_type: &str, stretch_factor: f64, flat_field_scale: f64) -> Policy {
    Policy::new().with(
        FLAT_POLICY_SECTION,
        Policy::new()
            .with("chunkType", chunk_type)
            .with("flatFieldScale", flat_field_scale)
            .with("stretchFactor", stretch_factor)
            .with("sigClip", false)
            .with("sigClipVal", 3.0),
    )
}

fn amp_policy() -> Policy {
    isr_policy("amp", 1.0, 0.0)
}

fn dataset_policy() -> Policy {
    Policy::new().with("normalizeKey", "IMRED_NF")
}

fn exposure(cols: usize, rows: usize, value: f32, ampid: i64, filter: i64) -> Exposure {
    Exposure::new_filled(cols, rows, value)
        .with_metadata("AMPID", ampid)
        .with_metadata("FILTER", filter)
}

/// Radial falloff to 70% at the corners, like an uncorrected optical system.
fn vignetted_flat(cols: usize, rows: usize, level: f32) -> Exposure {
    let (cx, cy) = ((cols - 1) as f32 / 2.0, (rows - 1) as f32 / 2.0);
    let r_max = (cx * cx + cy * cy).sqrt();
    let mut pixels = Vec::with_capacity(cols * rows);
    for y in 0..rows {
        for x in 0..cols {
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            let r = (dx * dx + dy * dy).sqrt() / r_max;
            pixels.push(level * (1.0 - 0.3 * r * r));
        }
    }
    Exposure::from_pixels(cols, rows, pixels)
}

// ====================================================================
// End-to-end
// ====================================================================

#[test]
fn test_uniform_flat_end_to_end() {
    let mut science = exposure(4, 4, 1000.0, 1, 2);
    let mut flat = exposure(4, 4, 2.0, 1, 2);

    let report =
        flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap();

    assert!(flat.image.iter().all(|&v| v.approximately_eq(1.0)));
    assert!(science.image.iter().all(|&v| v.relative_eq(1000.0, 1e-6)));
    assert_eq!(science.metadata.get_str(FLAT_CORRECTION_KEY), Ok(COMPLETE));
    assert!(is_flat_corrected(&science));

    let stats = report.flat_statistics.unwrap();
    assert_eq!(stats.count, 16);
    assert!((stats.mean - 2.0).abs() < 1e-12);
    assert_eq!(stats.sigma, 0.0);
    assert_eq!(report.applied_scale, 1.0);
    assert_eq!(report.degenerate_pixels, 0);
}

#[test]
fn test_constant_science_over_unit_flat_is_unchanged() {
    let mut science = exposure(8, 6, 321.5, 3, 114);
    let mut flat = exposure(8, 6, 1.0, 3, 114).with_metadata("IMRED_NF", "Complete");

    let report =
        flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap();

    assert!(report.flat_statistics.is_none());
    assert!(science.image.iter().all(|&v| v == 321.5));
}

#[test]
fn test_vignetting_is_removed() {
    let (cols, rows) = (32, 24);
    let mut flat = vignetted_flat(cols, rows, 20000.0)
        .with_metadata("AMPID", 0)
        .with_metadata("FILTER", 2);
    // Science sky of 500 seen through the same optics
    let normalized_response = {
        let mut copy = flat.clone();
        normalize_flat(&mut copy).unwrap();
        copy.image
    };
    let pixels = normalized_response.iter().map(|&r| 500.0 * r).collect();
    let mut science = Exposure::from_pixels(cols, rows, pixels)
        .with_metadata("AMPID", 0)
        .with_metadata("FILTER", 2);

    flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap();

    for &v in science.image.iter() {
        assert!((v - 500.0).abs() < 1e-2, "residual vignetting: {v}");
    }
}

#[test]
fn test_noisy_flat_preserves_mean_level() {
    let (cols, rows) = (64, 64);
    let mut rng = StdRng::seed_from_u64(1234);
    let flat_pixels: Vec<f32> = (0..cols * rows)
        .map(|_| 1.0 + rng.random_range(-0.05f32..0.05))
        .collect();
    let science_pixels: Vec<f32> = flat_pixels.iter().map(|&f| 800.0 * f).collect();

    let mut flat = Exposure::from_pixels(cols, rows, flat_pixels)
        .with_metadata("AMPID", 1)
        .with_metadata("FILTER", 2);
    let mut science = Exposure::from_pixels(cols, rows, science_pixels)
        .with_metadata("AMPID", 1)
        .with_metadata("FILTER", 2);

    let report =
        flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap();

    let stats = report.flat_statistics.unwrap();
    assert!(stats.sigma > 0.01 && stats.sigma < 0.05);
    let corrected = FlatStatistics::compute(&science);
    // Flat-fielding flattens the frame; the level moves by 1/mean only
    assert!((corrected.mean - 800.0 * stats.mean).abs() < 0.1);
    assert!(corrected.sigma < 0.1);
}

#[test]
fn test_stretch_and_scale_divide_science() {
    let mut science = exposure(2, 2, 600.0, 1, 2);
    let mut flat = exposure(2, 2, 5.0, 1, 2);

    let report = flat_field_correct(
        &mut science,
        &mut flat,
        &isr_policy("amp", 2.0, 1.5),
        &dataset_policy(),
    )
    .unwrap();

    assert_eq!(report.applied_scale, 3.0);
    // Scaling happens in the divisor; the stored flat is only normalized
    assert!(flat.image.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    assert!(science.image.iter().all(|&v| (v - 200.0).abs() < 1e-3));
}

#[test]
fn test_normalization_marker_recorded_on_flat() {
    let mut science = exposure(2, 2, 10.0, 1, 2);
    let mut flat = exposure(2, 2, 4.0, 1, 2);

    flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap();

    assert_eq!(flat.metadata.get_str("IMRED_NF"), Ok(COMPLETE));
}

#[test]
fn test_corrector_reuses_normalized_flat() {
    let policy = isr_policy("amp", 2.0, 1.5);
    let corrector = FlatFieldCorrector::from_policies(&policy, &dataset_policy()).unwrap();
    assert_eq!(corrector.config().chunk_type, ChunkType::Amp);

    let mut flat = exposure(3, 3, 4.0, 1, 2);
    let mut first = exposure(3, 3, 90.0, 1, 2);
    let mut second = exposure(3, 3, 90.0, 1, 2);

    let first_report = corrector.correct(&mut first, &mut flat).unwrap();
    assert!(first_report.flat_statistics.is_some());
    let second_report = corrector.correct(&mut second, &mut flat).unwrap();
    assert!(second_report.flat_statistics.is_none());

    // Scale is applied once per division, never compounded on the flat
    assert_eq!(first_report.applied_scale, 3.0);
    assert_eq!(second_report.applied_scale, 3.0);
    assert!(flat.image.iter().all(|&v| v.approximately_eq(1.0)));
    assert!(first.image.iter().all(|&v| v.relative_eq(30.0, 1e-6)));
    assert_eq!(first.image, second.image);
}

#[test]
fn test_reused_flat_with_stretch_gives_identical_results() {
    let policy = isr_policy("amp", 2.0, 0.0);
    let mut flat = exposure(4, 4, 4.0, 1, 2);
    let mut first = exposure(4, 4, 100.0, 1, 2);
    let mut second = exposure(4, 4, 100.0, 1, 2);

    flat_field_correct(&mut first, &mut flat, &policy, &dataset_policy()).unwrap();
    flat_field_correct(&mut second, &mut flat, &policy, &dataset_policy()).unwrap();

    assert!(first.image.iter().all(|&v| v.relative_eq(50.0, 1e-6)));
    assert_eq!(first.image, second.image);
}

#[test]
fn test_degenerate_pixels_are_flagged() {
    let mut science = exposure(4, 1, 100.0, 1, 2);
    let mut flat = Exposure::from_pixels(4, 1, vec![1.0, 0.0, 1.0, 2.0])
        .with_metadata("AMPID", 1)
        .with_metadata("FILTER", 2)
        .with_metadata("IMRED_NF", "Complete");

    let report =
        flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap();

    assert_eq!(report.degenerate_pixels, 1);
    assert_eq!(science.image.pixels(), &[100.0, 100.0, 100.0, 50.0]);
    assert_eq!(science.count_masked(MaskPlane::FlatDegenerate), 1);
    assert!(MaskPlane::FlatDegenerate.is_set(science.mask[1]));
}

#[test]
fn test_variance_is_propagated() {
    let mut science =
        exposure(2, 2, 400.0, 1, 2).with_variance(Buffer2::new_filled(2, 2, 400.0));
    let mut flat = exposure(2, 2, 2.0, 1, 2).with_metadata("IMRED_NF", "Complete");

    flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap();

    let variance = science.variance.as_ref().unwrap();
    assert!(variance.iter().all(|&v| (v - 100.0).abs() < 1e-3));
}

// ====================================================================
// Failures leave inputs untouched
// ====================================================================

#[test]
fn test_already_processed_is_rejected_unchanged() {
    let mut science = exposure(4, 4, 1000.0, 1, 2)
        .with_variance(Buffer2::new_filled(4, 4, 10.0))
        .with_metadata(FLAT_CORRECTION_KEY, COMPLETE);
    let mut flat = exposure(4, 4, 2.0, 1, 2);
    let (science_before, flat_before) = (science.clone(), flat.clone());

    let err =
        flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap_err();

    assert!(matches!(err, Error::AlreadyProcessed { .. }));
    assert_eq!(science, science_before);
    assert_eq!(flat, flat_before);
}

#[test]
fn test_already_processed_wins_over_bad_policy() {
    let mut science = exposure(4, 4, 1.0, 1, 2).with_metadata(FLAT_CORRECTION_KEY, COMPLETE);
    let mut flat = exposure(4, 4, 1.0, 1, 2);

    let err =
        flat_field_correct(&mut science, &mut flat, &Policy::new(), &Policy::new()).unwrap_err();

    assert!(matches!(err, Error::AlreadyProcessed { .. }));
}

#[test]
fn test_second_run_is_rejected() {
    let mut science = exposure(4, 4, 1000.0, 1, 2);
    let mut flat = exposure(4, 4, 2.0, 1, 2);
    flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap();
    let after_first = science.clone();

    let err =
        flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap_err();

    assert!(matches!(err, Error::AlreadyProcessed { .. }));
    assert_eq!(science, after_first);
}

#[test]
fn test_dimension_mismatch() {
    let mut science = exposure(4, 4, 1.0, 1, 2);
    let mut flat = exposure(4, 5, 2.0, 1, 2);
    let flat_before = flat.clone();

    let err =
        flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap_err();

    assert!(matches!(err, Error::DimensionMismatch { .. }));
    assert_eq!(flat, flat_before);
    assert!(!is_flat_corrected(&science));
}

#[test]
fn test_mismatched_variance_plane_is_rejected_unchanged() {
    let mut science = exposure(4, 4, 1000.0, 1, 2);
    science.variance = Some(Buffer2::new_filled(2, 2, 10.0));
    let mut flat = exposure(4, 4, 2.0, 1, 2);
    let (science_before, flat_before) = (science.clone(), flat.clone());

    let err =
        flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap_err();

    assert!(matches!(
        err,
        Error::PlaneSizeMismatch {
            exposure: ExposureRole::Science,
            plane: "variance",
            ..
        }
    ));
    assert_eq!(science, science_before);
    assert_eq!(flat, flat_before);
}

#[test]
fn test_mismatched_flat_mask_is_rejected_unchanged() {
    let mut science = exposure(4, 4, 1000.0, 1, 2);
    let mut flat = exposure(4, 4, 2.0, 1, 2);
    flat.mask = Buffer2::new_default(8, 2);
    let flat_before = flat.clone();

    let err =
        flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap_err();

    assert!(matches!(
        err,
        Error::PlaneSizeMismatch {
            exposure: ExposureRole::MasterFlat,
            plane: "mask",
            ..
        }
    ));
    assert_eq!(flat, flat_before);
    assert!(!is_flat_corrected(&science));
}

#[test]
fn test_region_mismatch_and_match() {
    let mut science = exposure(4, 4, 10.0, 1, 2);
    let mut flat = exposure(4, 4, 1.0, 2, 2);

    let err =
        flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap_err();
    assert!(matches!(
        err,
        Error::RegionMismatch {
            key: "AMPID",
            science: 1,
            master_flat: 2
        }
    ));

    let mut flat = exposure(4, 4, 1.0, 1, 2);
    assert!(flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).is_ok());
}

#[test]
fn test_filter_mismatch() {
    let mut science = exposure(4, 4, 10.0, 1, 2);
    let mut flat = exposure(4, 4, 1.0, 1, 3);
    let science_before = science.clone();

    let err =
        flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap_err();

    assert!(matches!(
        err,
        Error::FilterMismatch {
            science: 2,
            master_flat: 3
        }
    ));
    assert_eq!(science, science_before);
}

#[test]
fn test_missing_region_metadata() {
    let mut science = Exposure::new_filled(4, 4, 10.0).with_metadata("FILTER", 2);
    let mut flat = exposure(4, 4, 1.0, 1, 2);

    let err =
        flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap_err();

    assert!(matches!(
        err,
        Error::MetadataNotFound {
            exposure: ExposureRole::Science,
            key: "AMPID",
            source: MetadataError::NotFound { .. }
        }
    ));
}

#[test]
fn test_all_zero_flat_is_degenerate() {
    let mut science = exposure(4, 4, 1000.0, 1, 2);
    let mut flat = exposure(4, 4, 0.0, 1, 2);
    let science_before = science.clone();

    let err =
        flat_field_correct(&mut science, &mut flat, &amp_policy(), &dataset_policy()).unwrap_err();

    assert!(matches!(err, Error::DegenerateFlat { mean } if mean == 0.0));
    assert_eq!(science, science_before);
    assert!(science.image.iter().all(|v| v.is_finite()));
    assert!(flat.image.iter().all(|v| v.is_finite()));
    assert!(!flat.metadata.contains("IMRED_NF"));
}

#[test]
fn test_missing_config_key() {
    let mut science = exposure(4, 4, 1.0, 1, 2);
    let mut flat = exposure(4, 4, 1.0, 1, 2);
    let policy = Policy::new().with(
        FLAT_POLICY_SECTION,
        Policy::new()
            .with("chunkType", "amp")
            .with("sigClip", false)
            .with("sigClipVal", 3.0),
    );

    let err = flat_field_correct(&mut science, &mut flat, &policy, &dataset_policy()).unwrap_err();

    match err {
        Error::ConfigNotFound { source } => assert_eq!(
            source,
            PolicyError::Missing {
                key: "flatPolicy.stretchFactor".to_string()
            }
        ),
        other => panic!("expected ConfigNotFound, got {other:?}"),
    }
}

#[test]
fn test_missing_normalize_key() {
    let mut science = exposure(4, 4, 1.0, 1, 2);
    let mut flat = exposure(4, 4, 1.0, 1, 2);

    let err = flat_field_correct(&mut science, &mut flat, &amp_policy(), &Policy::new()).unwrap_err();

    assert!(matches!(err, Error::ConfigNotFound { .. }));
    assert!(err.to_string().contains("normalizeKey"));
}

#[test]
fn test_policy_checked_before_exposures() {
    // Dimensions differ too, but the bad policy is reported
    let mut science = exposure(4, 4, 1.0, 1, 2);
    let mut flat = exposure(2, 2, 1.0, 1, 2);

    let err =
        flat_field_correct(&mut science, &mut flat, &Policy::new(), &dataset_policy()).unwrap_err();

    assert!(matches!(err, Error::ConfigNotFound { .. }));
}
