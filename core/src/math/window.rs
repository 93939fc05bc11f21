use crate::math::stats::StatsHelper;
use std::ops::Range;

/// Index range of a window of `window` samples centered on `center`,
/// truncated at both edges of a `len`-sample sequence.
pub fn centered_bounds(center: usize, window: usize, len: usize) -> Range<usize> {
    if window >= len {
        return 0..len;
    }
    let window = window.max(1);
    let half = window / 2;
    let start = center.saturating_sub(half);
    let end = (center + window - half).min(len);
    start..end
}

/// Rolling median and population standard deviation over centered windows.
pub fn rolling_median_std(samples: &[f64], window: usize) -> (Vec<f64>, Vec<f64>) {
    let len = samples.len();
    let mut medians = Vec::with_capacity(len);
    let mut stds = Vec::with_capacity(len);

    for idx in 0..len {
        let slice = &samples[centered_bounds(idx, window, len)];
        medians.push(StatsHelper::median(slice).unwrap_or(samples[idx]));
        stds.push(StatsHelper::std(slice).unwrap_or(0.0));
    }

    (medians, stds)
}
