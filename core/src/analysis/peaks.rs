use crate::analysis::frequency_step;
use crate::model::PeakParams;
use serde::{Deserialize, Serialize};

/// A detected local maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub index: usize,
    pub frequency_mhz: f64,
    pub power_dbm: f64,
    /// Height above the higher of the two bounding minima, in dB.
    pub prominence: f64,
    /// Full width at half prominence, in MHz.
    pub width: f64,
}

struct Bases {
    left: usize,
    right: usize,
    prominence: f64,
}

/// Finds peaks above `threshold_dbm`, at least `min_distance_mhz` apart and
/// with at least `prominence` dB of prominence. Ordered by frequency.
pub fn detect_peaks(frequencies: &[f64], powers: &[f64], params: &PeakParams) -> Vec<Peak> {
    let len = powers.len().min(frequencies.len());
    if len < 3 {
        return Vec::new();
    }
    let powers = &powers[..len];
    let step = frequency_step(frequencies);

    let mut candidates = local_maxima(powers);
    candidates.retain(|&idx| powers[idx] > params.threshold_dbm);

    let min_distance = distance_in_samples(params.min_distance_mhz, step);
    let candidates = select_by_distance(&candidates, powers, min_distance);

    let mut peaks: Vec<Peak> = candidates
        .into_iter()
        .filter_map(|idx| {
            let bases = prominence_bases(powers, idx);
            if bases.prominence < params.prominence {
                return None;
            }
            Some(Peak {
                index: idx,
                frequency_mhz: frequencies[idx],
                power_dbm: powers[idx],
                prominence: bases.prominence,
                width: half_prominence_width(powers, idx, &bases) * step,
            })
        })
        .collect();

    peaks.sort_by(|a, b| a.frequency_mhz.total_cmp(&b.frequency_mhz));
    peaks
}

fn distance_in_samples(min_distance_mhz: f64, step: f64) -> usize {
    if !min_distance_mhz.is_finite() || min_distance_mhz <= 0.0 {
        return 1;
    }
    ((min_distance_mhz / step).floor() as usize).max(1)
}

/// Strict local maxima; a plateau counts once, at its midpoint. The first and
/// last samples are never peaks.
fn local_maxima(powers: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    let last = powers.len() - 1;
    let mut idx = 1;

    while idx < last {
        if powers[idx - 1] < powers[idx] {
            let mut ahead = idx + 1;
            while ahead < last && powers[ahead] == powers[idx] {
                ahead += 1;
            }
            if powers[ahead] < powers[idx] {
                peaks.push((idx + ahead - 1) / 2);
                idx = ahead;
            }
        }
        idx += 1;
    }

    peaks
}

/// Keeps the strongest peak of every cluster closer than `distance` samples.
fn select_by_distance(candidates: &[usize], powers: &[f64], distance: usize) -> Vec<usize> {
    if distance <= 1 || candidates.len() < 2 {
        return candidates.to_vec();
    }

    let mut keep = vec![true; candidates.len()];
    let mut by_power: Vec<usize> = (0..candidates.len()).collect();
    by_power.sort_by(|&a, &b| powers[candidates[b]].total_cmp(&powers[candidates[a]]));

    for pos in by_power {
        if !keep[pos] {
            continue;
        }
        let peak = candidates[pos];
        for (other, kept) in keep.iter_mut().enumerate().take(pos).rev() {
            if peak - candidates[other] >= distance {
                break;
            }
            *kept = false;
        }
        for (other, kept) in keep.iter_mut().enumerate().skip(pos + 1) {
            if candidates[other] - peak >= distance {
                break;
            }
            *kept = false;
        }
    }

    candidates
        .iter()
        .zip(keep)
        .filter_map(|(&idx, kept)| kept.then_some(idx))
        .collect()
}

/// Walks outward from the peak until a strictly higher sample (or the edge)
/// and records the lowest sample seen on each side.
fn prominence_bases(powers: &[f64], peak: usize) -> Bases {
    let height = powers[peak];

    let mut left = peak;
    let mut left_min = height;
    let mut idx = peak;
    loop {
        if powers[idx] > height {
            break;
        }
        if powers[idx] < left_min {
            left_min = powers[idx];
            left = idx;
        }
        if idx == 0 {
            break;
        }
        idx -= 1;
    }

    let mut right = peak;
    let mut right_min = height;
    for (idx, &value) in powers.iter().enumerate().skip(peak) {
        if value > height {
            break;
        }
        if value < right_min {
            right_min = value;
            right = idx;
        }
    }

    Bases {
        left,
        right,
        prominence: height - left_min.max(right_min),
    }
}

/// Interpolated width, in samples, at half the prominence below the peak.
fn half_prominence_width(powers: &[f64], peak: usize, bases: &Bases) -> f64 {
    let height = powers[peak] - bases.prominence * 0.5;

    let mut idx = peak;
    while bases.left < idx && height < powers[idx] {
        idx -= 1;
    }
    let mut left_ip = idx as f64;
    if powers[idx] < height {
        left_ip += (height - powers[idx]) / (powers[idx + 1] - powers[idx]);
    }

    let mut idx = peak;
    while idx < bases.right && height < powers[idx] {
        idx += 1;
    }
    let mut right_ip = idx as f64;
    if powers[idx] < height {
        right_ip -= (height - powers[idx]) / (powers[idx - 1] - powers[idx]);
    }

    right_ip - left_ip
}
