//! Small latency statistics shared by the suite, stress and report layers.
//!
//! All helpers treat an empty sample set as zero rather than erroring, which
//! is what the result model stores for failed or skipped attempts.

/// Arithmetic mean, `0.0` for an empty slice.
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Median, `0.0` for an empty slice. Even-length inputs average the two
/// middle samples.
pub fn median(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Rank-based percentile on an already sorted slice: the sample at index
/// `floor(len * pct / 100)`, clamped to the last element.
pub fn percentile_sorted(sorted: &[f64], pct: u32) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (sorted.len() as f64 * f64::from(pct) / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}
