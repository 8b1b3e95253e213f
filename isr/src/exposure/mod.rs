//! Detector exposure: image, mask and variance planes plus metadata.

mod mask;
mod metadata;


use std::fmt;

use crate::common::Buffer2;

pub use mask::{MaskPixel, MaskPlane};
pub use metadata::{Metadata, MetadataError, MetadataValue};

/// Exposure size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ExposureDimensions {
    /// Number of columns (image width)
    pub cols: usize,
    /// Number of rows (image height)
    pub rows: usize,
}

impl ExposureDimensions {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }

    pub fn pixel_count(&self) -> usize {
        self.cols * self.rows
    }
}

impl fmt::Display for ExposureDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// A single detector-region exposure (one amplifier or CCD "chunk").
///
/// All planes share the same dimensions. The mask starts empty and the
/// variance plane is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct Exposure {
    /// Sample values, row-major
    pub image: Buffer2<f32>,
    /// Quality flags, one [`MaskPixel`] per sample
    pub mask: Buffer2<MaskPixel>,
    /// Per-sample variance, if tracked
    pub variance: Option<Buffer2<f32>>,
    /// Header-style metadata
    pub metadata: Metadata,
}

impl Exposure {
    pub fn new(image: Buffer2<f32>) -> Self {
        let mask = Buffer2::new_default(image.width(), image.height());
        Self {
            image,
            mask,
            variance: None,
            metadata: Metadata::new(),
        }
    }

    pub fn from_pixels(cols: usize, rows: usize, pixels: Vec<f32>) -> Self {
        Self::new(Buffer2::new(cols, rows, pixels))
    }

    pub fn new_filled(cols: usize, rows: usize, value: f32) -> Self {
        Self::new(Buffer2::new_filled(cols, rows, value))
    }

    /// Attach a variance plane.
    ///
    /// # Panics
    /// Panics if the variance plane size differs from the image.
    pub fn with_variance(mut self, variance: Buffer2<f32>) -> Self {
        assert!(
            variance.same_size(&self.image),
            "Variance plane {}x{} doesn't match image {}",
            variance.width(),
            variance.height(),
            self.dimensions()
        );
        self.variance = Some(variance);
        self
    }

    /// Builder-style metadata entry.
    pub fn with_metadata(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.metadata.add(key, value);
        self
    }

    pub fn dimensions(&self) -> ExposureDimensions {
        ExposureDimensions::new(self.image.width(), self.image.height())
    }

    /// Divide samples by `divisor`; variance scales by `1/divisor²`.
    pub fn divide_by(&mut self, divisor: f64) {
        for v in self.image.iter_mut() {
            *v = (*v as f64 / divisor) as f32;
        }
        if let Some(variance) = self.variance.as_mut() {
            let divisor_sq = divisor * divisor;
            for v in variance.iter_mut() {
                *v = (*v as f64 / divisor_sq) as f32;
            }
        }
    }

    /// Number of pixels with `plane` set.
    pub fn count_masked(&self, plane: MaskPlane) -> usize {
        self.mask.iter().filter(|&&m| plane.is_set(m)).count()
    }
}
