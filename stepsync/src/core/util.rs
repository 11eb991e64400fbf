use ahash::RandomState;
use std::collections::HashMap as StdHashMap;

pub type HashMap<K, V> = StdHashMap<K, V, RandomState>;

/// Utilities to contain a value within a range
pub mod constrain {
    /// Clamp a value between min and max. Unlike [`f64::clamp`] this does not
    /// panic when `min > max`; the bounds are swapped instead.
    pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        value.max(lo).min(hi)
    }

    /// Round to the nearest integer (half away from zero) and clamp into
    /// `[min, max]`. `NaN` collapses to `min`.
    pub fn round_clamp(value: f64, min: i32, max: i32) -> i32 {
        if value.is_nan() {
            return min.min(max);
        }
        clamp(value.round(), min as f64, max as f64) as i32
    }
}
