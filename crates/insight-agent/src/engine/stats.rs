/// Guard added to denominators so constant inputs never divide by zero.
pub const EPSILON: f64 = 1e-9;

/// Median of the finite values, averaging the two middle values for even
/// counts. `None` when no finite value is present.
pub(crate) fn median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut sorted: Vec<f64> = values.into_iter().filter(|value| value.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }

    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(sorted[mid - 1] / 2.0 + sorted[mid] / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Min-max scaling into `[0, 1]` with an epsilon-padded denominator.
///
/// Identical inputs all map to 0.
pub(crate) fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), value| {
            (lo.min(*value), hi.max(*value))
        });

    if !min.is_finite() || !max.is_finite() {
        return vec![0.0; values.len()];
    }

    values
        .iter()
        .map(|value| ((value - min) / (max - min + EPSILON)).clamp(0.0, 1.0))
        .collect()
}
