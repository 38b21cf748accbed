use crate::bundle::{Bundle, BundleStats, DeltaStats};

/// Returns a copy of `bundle` with statistics recomputed from its operations.
pub fn add_stats(bundle: &Bundle) -> Bundle {
    Bundle {
        stats: Some(make_stats(bundle)),
        ..bundle.clone()
    }
}

/// Interval statistics of a bundle's operations. Never reads previous stats.
pub fn make_stats(bundle: &Bundle) -> BundleStats {
    let mut dates: Vec<_> = bundle.ops.iter().map(|op| op.date).collect();
    dates.sort();

    // Days between each operation and the one before it.
    let deltas: Vec<f64> = dates
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_days() as f64)
        .collect();

    let m = mean(&deltas);
    let med = median(&deltas);
    let sq_mean = mean(&deltas.iter().map(|d| d * d).collect::<Vec<_>>());
    // Rounding can push an all-equal series a hair below zero.
    let variance = sq_mean - m * m;
    let sigma = if variance < 0.0 { 0.0 } else { variance.sqrt() };
    let mad = median(&deltas.iter().map(|d| (d - med).abs()).collect::<Vec<_>>());

    BundleStats {
        deltas: DeltaStats {
            mean: m,
            median: med,
            sigma,
            mad,
        },
    }
}

/// Arithmetic mean, NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median over a numeric sort, NaN for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
