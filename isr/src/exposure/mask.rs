//! Per-pixel quality flags.

use strum_macros::{Display, EnumIter};

/// One mask pixel: a bit set of [`MaskPlane`]s.
pub type MaskPixel = u16;

/// Named mask planes. The discriminant is the bit index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum MaskPlane {
    /// Known bad detector pixel
    Bad = 0,
    /// Saturated
    Sat = 1,
    /// Value was interpolated from neighbours
    Intrp = 2,
    /// Cosmic ray hit
    Cr = 3,
    /// Too close to the detector edge
    Edge = 4,
    /// No usable data
    NoData = 5,
    /// Flat-field divisor was zero or not finite
    FlatDegenerate = 6,
}

impl MaskPlane {
    #[inline]
    pub const fn bit(self) -> MaskPixel {
        1 << self as u16
    }

    #[inline]
    pub const fn is_set(self, pixel: MaskPixel) -> bool {
        pixel & self.bit() != 0
    }
}
