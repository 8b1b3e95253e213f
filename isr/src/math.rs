//! Unweighted pixel statistics accumulated in double precision.
//!
//! Both passes scan rows top to bottom so memory access stays linear.

use crate::common::Buffer2;

/// Sum of every sample and the sample count.
pub(crate) fn sum_and_count(buffer: &Buffer2<f32>) -> (f64, usize) {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for row in buffer.rows() {
        for &v in row {
            sum += v as f64;
        }
        count += row.len();
    }
    (sum, count)
}

/// Σ(x − mean)² over every sample.
pub(crate) fn sum_squared_deviations(buffer: &Buffer2<f32>, mean: f64) -> f64 {
    let mut sum_sq = 0.0f64;
    for row in buffer.rows() {
        for &v in row {
            let d = v as f64 - mean;
            sum_sq += d * d;
        }
    }
    sum_sq
}
