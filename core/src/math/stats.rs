use ndarray::ArrayView1;

/// Summary statistics over power samples. Every helper returns `None` for an
/// empty slice instead of a NaN.
pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> Option<f64> {
        ArrayView1::from(samples).mean()
    }

    /// Population standard deviation.
    pub fn std(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(ArrayView1::from(samples).std(0.0))
    }

    pub fn median(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }

    pub fn min(samples: &[f64]) -> Option<f64> {
        samples.iter().copied().reduce(f64::min)
    }

    pub fn max(samples: &[f64]) -> Option<f64> {
        samples.iter().copied().reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sequence_yields_none() {
        assert_eq!(StatsHelper::mean(&[]), None);
        assert_eq!(StatsHelper::std(&[]), None);
        assert_eq!(StatsHelper::median(&[]), None);
        assert_eq!(StatsHelper::max(&[]), None);
    }

    #[test]
    fn population_std_matches_hand_computation() {
        let std = StatsHelper::std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - 2.0).abs() < 1e-12);
    }

    #[test]
    fn median_handles_even_and_odd_lengths() {
        assert_eq!(StatsHelper::median(&[-90.0, -40.0, -70.0]), Some(-70.0));
        assert_eq!(StatsHelper::median(&[-90.0, -40.0, -70.0, -50.0]), Some(-60.0));
    }
}
