//! Small numeric helpers shared by the engines.
//!
//! Everything here is total: empty inputs produce `0.0` rather than NaN so the
//! results can cross the presentation boundary unchanged.

/// Arithmetic mean, `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divisor `n`), `0.0` for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mu = mean(values);
    let var = values.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Returns a sorted copy of `values` using the IEEE total order.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut copy = values.to_vec();
    copy.sort_by(|a, b| a.total_cmp(b));
    copy
}

/// Linear-interpolated percentile of an already sorted slice, `pct` in `[0, 100]`.
pub fn percentile_sorted(sorted_values: &[f64], pct: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    let quantile = (pct / 100.0).clamp(0.0, 1.0);
    let position = quantile * (sorted_values.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted_values[lower]
    } else {
        let weight = position - lower as f64;
        sorted_values[lower] * (1.0 - weight) + sorted_values[upper] * weight
    }
}

/// Linear-interpolated percentile of an unsorted slice.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    percentile_sorted(&sorted(values), pct)
}

/// Replaces NaN and infinities by `0.0`.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Applies [`finite_or_zero`] to every element in place.
pub fn sanitize(values: &mut [f64]) {
    for value in values.iter_mut() {
        *value = finite_or_zero(*value);
    }
}

/// Guarded division returning `0.0` when the denominator is not strictly positive.
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        finite_or_zero(numerator / denominator)
    } else {
        0.0
    }
}

/// `points` evenly spaced values covering `[start, end]` inclusive.
pub fn linspace(start: f64, end: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (points - 1) as f64;
            (0..points).map(|idx| start + idx as f64 * step).collect()
        }
    }
}

/// Index of the element closest to `target`, first wins on ties.
pub fn argmin_abs(values: &[f64], target: f64) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (idx, value)| {
            let distance = (value - target).abs();
            match best {
                Some((_, best_distance)) if best_distance <= distance => best,
                _ => Some((idx, distance)),
            }
        })
        .map(|(idx, _)| idx)
}

/// Dot product over the shorter of the two slices.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
