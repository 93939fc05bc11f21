use crate::math::StatsHelper;
use crate::model::FrequencyBand;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerStatistics {
    pub max: f64,
    pub min: f64,
    pub mean: f64,
    pub std: f64,
    pub median: f64,
    pub power_range: f64,
}

impl PowerStatistics {
    pub fn from_samples(powers: &[f64]) -> Option<Self> {
        let max = StatsHelper::max(powers)?;
        let min = StatsHelper::min(powers)?;
        Some(Self {
            max,
            min,
            mean: StatsHelper::mean(powers)?,
            std: StatsHelper::std(powers)?,
            median: StatsHelper::median(powers)?,
            power_range: max - min,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub start_mhz: f64,
    pub end_mhz: f64,
    pub span_mhz: f64,
    pub center_mhz: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandReport {
    pub name: String,
    pub start: f64,
    pub end: f64,
    pub sample_count: usize,
    /// `None` when no sample falls inside the band.
    pub stats: Option<PowerStatistics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReport {
    pub overall: Option<PowerStatistics>,
    pub frequency_range: Option<FrequencyRange>,
    pub bands: Vec<BandReport>,
}

pub fn analyze_signal(frequencies: &[f64], powers: &[f64], bands: &[FrequencyBand]) -> SignalReport {
    let len = powers.len().min(frequencies.len());
    let (frequencies, powers) = (&frequencies[..len], &powers[..len]);

    let frequency_range = match (frequencies.first(), frequencies.last()) {
        (Some(&start), Some(&end)) => Some(FrequencyRange {
            start_mhz: start,
            end_mhz: end,
            span_mhz: end - start,
            center_mhz: (start + end) / 2.0,
        }),
        _ => None,
    };

    let bands = bands
        .iter()
        .map(|band| {
            let in_band: Vec<f64> = frequencies
                .iter()
                .zip(powers)
                .filter(|(&freq, _)| band.contains(freq))
                .map(|(_, &power)| power)
                .collect();
            BandReport {
                name: band.name.clone(),
                start: band.start,
                end: band.end,
                sample_count: in_band.len(),
                stats: PowerStatistics::from_samples(&in_band),
            }
        })
        .collect();

    SignalReport {
        overall: PowerStatistics::from_samples(powers),
        frequency_range,
        bands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::frequency_axis;

    #[test]
    fn overall_and_band_statistics() {
        let powers = [-90.0, -80.0, -40.0, -80.0, -90.0];
        let freqs = frequency_axis(2400.0, 100.0, powers.len());
        let bands = [FrequencyBand::new("center", 2390.0, 2410.0)];

        let report = analyze_signal(&freqs, &powers, &bands);
        let overall = report.overall.unwrap();
        assert_eq!(overall.max, -40.0);
        assert_eq!(overall.min, -90.0);
        assert_eq!(overall.mean, -76.0);
        assert_eq!(overall.median, -80.0);
        assert_eq!(overall.power_range, 50.0);

        let range = report.frequency_range.unwrap();
        assert_eq!(range.span_mhz, 100.0);
        assert_eq!(range.center_mhz, 2400.0);

        assert_eq!(report.bands[0].sample_count, 1);
        assert_eq!(report.bands[0].stats.as_ref().unwrap().std, 0.0);
    }

    #[test]
    fn band_without_samples_reports_no_stats() {
        let powers = [-90.0, -80.0, -40.0];
        let freqs = frequency_axis(2400.0, 100.0, powers.len());
        let bands = [FrequencyBand::new("5 GHz", 5150.0, 5350.0)];

        let report = analyze_signal(&freqs, &powers, &bands);
        assert_eq!(report.bands[0].sample_count, 0);
        assert!(report.bands[0].stats.is_none());

        let encoded = serde_json::to_value(&report.bands[0]).unwrap();
        assert!(encoded["stats"].is_null());
    }

    #[test]
    fn empty_trace_yields_empty_report() {
        let report = analyze_signal(&[], &[], &[]);
        assert!(report.overall.is_none());
        assert!(report.frequency_range.is_none());
    }
}
