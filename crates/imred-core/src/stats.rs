//! Order statistics over pixel samples.

/// Median of a non-empty slice, reordering it in place.
///
/// Uses `select_nth_unstable` for O(n) median without full sort.
pub fn median_in_place(values: &mut [f32]) -> f32 {
    let n = values.len();
    debug_assert!(n > 0);
    if n == 1 {
        values[0]
    } else if n % 2 == 1 {
        let mid = n / 2;
        *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
    } else {
        let mid = n / 2;
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        values[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        (values[mid - 1] + values[mid]) / 2.0
    }
}

/// Median ignoring NaN samples. `None` when nothing finite remains.
pub fn nan_median(values: impl IntoIterator<Item = f32>) -> Option<f32> {
    let mut finite: Vec<f32> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        None
    } else {
        Some(median_in_place(&mut finite))
    }
}

/// Percentile `q` in [0, 100] with linear interpolation between order
/// statistics, ignoring NaN samples.
pub fn nan_percentile(values: impl IntoIterator<Item = f32>, q: f32) -> Option<f32> {
    let mut sorted: Vec<f32> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));

    let pos = (q.clamp(0.0, 100.0) as f64 / 100.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = (pos - lo as f64) as f32;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
