pub mod buffer2;
pub mod file_format;
pub mod float_ext;
pub mod log_setup;
pub mod serde;
pub mod test_utils;

/// Default absolute tolerance for float comparisons.
pub const EPSILON: f64 = 1e-6;
