use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupiedBand {
    pub start_freq: f64,
    pub end_freq: f64,
    pub center_freq: f64,
    pub bandwidth: f64,
    pub max_power_dbm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyReport {
    pub occupied_bandwidth: f64,
    pub total_bandwidth: f64,
    pub occupancy_percentage: f64,
    pub bands: Vec<OccupiedBand>,
}

/// Merges runs of samples at or above `threshold_dbm` into occupied bands.
/// Each sample accounts for `span_mhz / n` of the sweep.
pub fn measure_occupancy(
    frequencies: &[f64],
    powers: &[f64],
    span_mhz: f64,
    threshold_dbm: f64,
) -> OccupancyReport {
    let len = powers.len().min(frequencies.len());
    let total_bandwidth = span_mhz.max(0.0);
    if len == 0 {
        return OccupancyReport {
            occupied_bandwidth: 0.0,
            total_bandwidth,
            occupancy_percentage: 0.0,
            bands: Vec::new(),
        };
    }

    let bandwidth_of = |samples: usize| total_bandwidth * samples as f64 / len as f64;
    let mut bands = Vec::new();
    let mut occupied_samples = 0;
    let mut run_start: Option<usize> = None;

    for idx in 0..=len {
        let occupied = idx < len && powers[idx] >= threshold_dbm;
        match (occupied, run_start) {
            (true, None) => run_start = Some(idx),
            (false, Some(start)) => {
                let end = idx - 1;
                let count = idx - start;
                occupied_samples += count;
                let max_power_dbm = powers[start..idx]
                    .iter()
                    .copied()
                    .fold(f64::NEG_INFINITY, f64::max);
                bands.push(OccupiedBand {
                    start_freq: frequencies[start],
                    end_freq: frequencies[end],
                    center_freq: (frequencies[start] + frequencies[end]) / 2.0,
                    bandwidth: bandwidth_of(count),
                    max_power_dbm,
                });
                run_start = None;
            }
            _ => {}
        }
    }

    OccupancyReport {
        occupied_bandwidth: bandwidth_of(occupied_samples),
        total_bandwidth,
        occupancy_percentage: occupied_samples as f64 / len as f64 * 100.0,
        bands,
    }
}
