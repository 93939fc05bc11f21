use crate::math::{rolling_median_std, StatsHelper};
use crate::model::InterferenceParams;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterferenceSource {
    pub start_frequency_mhz: f64,
    pub end_frequency_mhz: f64,
    pub center_frequency_mhz: f64,
    pub bandwidth_mhz: f64,
    pub max_power_dbm: f64,
    pub mean_power_dbm: f64,
}

/// Flags samples that rise more than `threshold_factor` local standard
/// deviations above a rolling median baseline and groups contiguous flags.
pub fn detect_interference(
    frequencies: &[f64],
    powers: &[f64],
    params: &InterferenceParams,
) -> Vec<InterferenceSource> {
    let len = powers.len().min(frequencies.len());
    if len == 0 {
        return Vec::new();
    }
    let (frequencies, powers) = (&frequencies[..len], &powers[..len]);

    let (baseline, spread) = rolling_median_std(powers, params.baseline_window);
    let flagged: Vec<bool> = powers
        .iter()
        .zip(baseline.iter().zip(&spread))
        .map(|(&power, (&base, &std))| power > base + params.threshold_factor * std)
        .collect();

    let mut sources = Vec::new();
    let mut run_start: Option<usize> = None;
    for idx in 0..=len {
        let hit = idx < len && flagged[idx];
        match (hit, run_start) {
            (true, None) => run_start = Some(idx),
            (false, Some(start)) => {
                sources.push(summarize(&frequencies[start..idx], &powers[start..idx]));
                run_start = None;
            }
            _ => {}
        }
    }

    sources
}

fn summarize(frequencies: &[f64], powers: &[f64]) -> InterferenceSource {
    let start = frequencies[0];
    let end = frequencies[frequencies.len() - 1];
    InterferenceSource {
        start_frequency_mhz: start,
        end_frequency_mhz: end,
        center_frequency_mhz: StatsHelper::mean(frequencies).unwrap_or(start),
        bandwidth_mhz: end - start,
        max_power_dbm: StatsHelper::max(powers).unwrap_or(f64::NEG_INFINITY),
        mean_power_dbm: StatsHelper::mean(powers).unwrap_or(f64::NEG_INFINITY),
    }
}
