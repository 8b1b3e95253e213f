pub trait FloatExt {
    fn approximately_eq(self, other: Self) -> bool;

    /// Compare with a tolerance relative to the larger magnitude.
    fn relative_eq(self, other: Self, tolerance: Self) -> bool;
}

impl FloatExt for f32 {
    fn approximately_eq(self, other: Self) -> bool {
        (self - other).abs() < crate::EPSILON as f32
    }

    fn relative_eq(self, other: Self, tolerance: Self) -> bool {
        let scale = self.abs().max(other.abs()).max(1.0);
        (self - other).abs() <= tolerance * scale
    }
}

impl FloatExt for f64 {
    fn approximately_eq(self, other: Self) -> bool {
        (self - other).abs() < crate::EPSILON
    }

    fn relative_eq(self, other: Self, tolerance: Self) -> bool {
        let scale = self.abs().max(other.abs()).max(1.0);
        (self - other).abs() <= tolerance * scale
    }
}
