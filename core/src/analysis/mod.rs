//! Stateless spectrum analysis over one scan's frequency and power vectors.
//!
//! Every routine borrows its inputs, performs no I/O and treats degenerate
//! spectra (empty, too short, flat) as a valid "nothing found" outcome.

pub mod interference;
pub mod occupancy;
pub mod peaks;
pub mod signal;

pub use interference::{detect_interference, InterferenceSource};
pub use occupancy::{measure_occupancy, OccupancyReport, OccupiedBand};
pub use peaks::{detect_peaks, Peak};
pub use signal::{analyze_signal, BandReport, FrequencyRange, PowerStatistics, SignalReport};

use crate::model::{PresetConfig, ScanRecord};
use serde::{Deserialize, Serialize};

/// Evenly spaced frequency axis from `cf - span/2` to `cf + span/2`, both ends
/// included.
pub fn frequency_axis(cf: f64, span: f64, points: usize) -> Vec<f64> {
    let start = cf - span / 2.0;
    match points {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let intervals = (points - 1) as f64;
            (0..points)
                .map(|i| start + span * i as f64 / intervals)
                .collect()
        }
    }
}

/// Spacing between adjacent frequency bins, falling back to 1 MHz when the
/// axis is too short or degenerate.
pub(crate) fn frequency_step(frequencies: &[f64]) -> f64 {
    match frequencies {
        [first, second, ..] => {
            let step = (second - first).abs();
            if step.is_finite() && step > 0.0 {
                step
            } else {
                1.0
            }
        }
        _ => 1.0,
    }
}

/// Output of one preset run, tagged like the preset that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "results", rename_all = "snake_case")]
pub enum AnalysisResult {
    PeakDetection(Vec<Peak>),
    SignalAnalysis(SignalReport),
    Interference(Vec<InterferenceSource>),
    Occupancy(OccupancyReport),
}

/// Single dispatch point from preset configuration to analysis routine.
pub fn apply(
    config: &PresetConfig,
    frequencies: &[f64],
    powers: &[f64],
    span_mhz: f64,
) -> AnalysisResult {
    match config {
        PresetConfig::PeakDetection(params) => {
            AnalysisResult::PeakDetection(detect_peaks(frequencies, powers, params))
        }
        PresetConfig::SignalAnalysis(params) => AnalysisResult::SignalAnalysis(analyze_signal(
            frequencies,
            powers,
            &params.frequency_bands,
        )),
        PresetConfig::Interference(params) => {
            AnalysisResult::Interference(detect_interference(frequencies, powers, params))
        }
        PresetConfig::Occupancy(params) => AnalysisResult::Occupancy(measure_occupancy(
            frequencies,
            powers,
            span_mhz,
            params.threshold_dbm,
        )),
    }
}

/// Runs a preset over a stored scan, deriving its frequency axis.
pub fn analyze_scan(config: &PresetConfig, scan: &ScanRecord) -> AnalysisResult {
    apply(config, &scan.frequencies(), &scan.powers, scan.config.span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OccupancyParams, PeakParams, ScanConfig};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn frequency_axis_spans_the_sweep() {
        assert!(frequency_axis(2400.0, 100.0, 0).is_empty());
        assert_eq!(frequency_axis(2400.0, 100.0, 1), vec![2350.0]);
        let axis = frequency_axis(2437.0, 20.0, 100);
        assert_eq!(axis[0], 2427.0);
        assert_eq!(axis[99], 2447.0);
    }

    #[test]
    fn apply_dispatches_on_preset_kind() {
        let scan = ScanRecord::new(
            Utc::now(),
            Uuid::new_v4(),
            ScanConfig::new("ISM", 2400.0, 100.0, 5),
        )
        .with_powers(vec![-90.0, -90.0, -40.0, -90.0, -90.0]);

        let peaks = analyze_scan(&PresetConfig::PeakDetection(PeakParams::default()), &scan);
        match peaks {
            AnalysisResult::PeakDetection(found) => assert_eq!(found.len(), 1),
            other => panic!("unexpected result {other:?}"),
        }

        let occupancy = analyze_scan(
            &PresetConfig::Occupancy(OccupancyParams { threshold_dbm: -50.0 }),
            &scan,
        );
        match occupancy {
            AnalysisResult::Occupancy(report) => assert_eq!(report.occupancy_percentage, 20.0),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn results_serialize_with_type_tag() {
        let encoded = serde_json::to_value(AnalysisResult::PeakDetection(Vec::new())).unwrap();
        assert_eq!(encoded["type"], "peak_detection");
        assert!(encoded["results"].as_array().unwrap().is_empty());
    }
}
