use crate::generator::template::{ScanTemplate, SignalFamily, INSTANCE_NAMES, TEMPLATES, WIFI_CHANNELS_MHZ};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use spectrumcore::analysis::frequency_axis;
use spectrumcore::model::ScanRecord;

/// Configuration for generating synthetic sweeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub scans: usize,
    pub seed: u64,
    /// Scan times are spread uniformly over this many hours before the batch end.
    pub window_hours: i64,
    pub noise_floor_dbm: f64,
    /// Peak-to-peak jitter added to the noise floor, dB.
    pub noise_db: f64,
    /// Analyzer names to draw from; empty uses the built-in list.
    pub instances: Vec<String>,
    /// Template names to draw from; empty uses every template.
    pub templates: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            scans: 200,
            seed: 0,
            window_hours: 7 * 24,
            noise_floor_dbm: -85.0,
            noise_db: 6.0,
            instances: Vec::new(),
            templates: Vec::new(),
        }
    }
}

/// Flags attached to a sweep from its power profile.
pub fn derive_flags(powers: &[f64]) -> Vec<&'static str> {
    let mut flags = Vec::new();
    let max_power = powers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max_power > -30.0 {
        flags.push("high_signal");
    }
    if max_power > -40.0 {
        flags.push("signal_detected");
    }
    let strong = powers.iter().filter(|&&p| p > -50.0).count();
    if strong as f64 > powers.len() as f64 * 0.1 {
        flags.push("interference_possible");
    }
    flags
}

pub struct SpectrumGenerator {
    config: GeneratorConfig,
    templates: Vec<&'static ScanTemplate>,
    rng: StdRng,
}

impl SpectrumGenerator {
    pub fn new(config: GeneratorConfig) -> anyhow::Result<Self> {
        let templates: Vec<&'static ScanTemplate> = TEMPLATES
            .iter()
            .filter(|t| config.templates.is_empty() || config.templates.iter().any(|n| n == t.name))
            .collect();
        if templates.is_empty() {
            anyhow::bail!("no scan template matches {:?}", config.templates);
        }
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            templates,
            rng,
        })
    }

    /// Noise floor plus the signal shapes typical for the template's band.
    pub fn spectrum(&mut self, template: &ScanTemplate, cf: f64) -> Vec<f64> {
        let n = template.sample_amount;
        let freqs = frequency_axis(cf, template.span, n);
        let jitter = self.config.noise_db / 2.0;
        let mut powers: Vec<f64> = (0..n)
            .map(|_| self.config.noise_floor_dbm + self.rng.gen_range(-jitter..=jitter))
            .collect();
        if n < 2 {
            return powers;
        }

        let step = template.span / (n - 1) as f64;
        let start = freqs[0];
        let low = cf - template.span / 2.0;
        let high = cf + template.span / 2.0;

        match template.family() {
            SignalFamily::Wifi => {
                for &channel in WIFI_CHANNELS_MHZ.iter().filter(|&&f| (low..=high).contains(&f)) {
                    let peak = self.rng.gen_range(-70.0..-40.0);
                    add_signal(&mut powers, start, step, channel, 20.0, peak, 0.5);
                }
            }
            SignalFamily::Bluetooth => {
                for _ in 0..self.rng.gen_range(3..=8) {
                    let hop = self.rng.gen_range(cf - template.span / 3.0..cf + template.span / 3.0);
                    let peak = self.rng.gen_range(-60.0..-30.0);
                    add_signal(&mut powers, start, step, hop, 1.0, peak, 2.0);
                }
            }
            SignalFamily::Cellular => {
                for _ in 0..self.rng.gen_range(1..=3) {
                    let carrier = self.rng.gen_range(cf - template.span / 3.0..cf + template.span / 3.0);
                    let peak = self.rng.gen_range(-50.0..-20.0);
                    let bandwidth = *[5.0, 10.0, 15.0, 20.0].choose(&mut self.rng).unwrap_or(&10.0);
                    add_signal(&mut powers, start, step, carrier, bandwidth, peak, 0.3);
                }
            }
            SignalFamily::FmBroadcast => {
                let mut station = low.ceil();
                while station < high {
                    if self.rng.gen_bool(0.3) {
                        let peak = self.rng.gen_range(-60.0..-30.0);
                        add_signal(&mut powers, start, step, station, 0.2, peak, 1.0);
                    }
                    station += 2.0;
                }
            }
            SignalFamily::Generic => {
                for _ in 0..self.rng.gen_range(1..=5) {
                    let center = self.rng.gen_range(cf - template.span / 3.0..cf + template.span / 3.0);
                    let peak = self.rng.gen_range(-70.0..-20.0);
                    let bandwidth = self.rng.gen_range(5..=50) as f64 * step;
                    add_signal(&mut powers, start, step, center, bandwidth, peak, 0.5);
                }
            }
        }
        powers
    }

    fn instance(&mut self) -> Option<String> {
        if self.config.instances.is_empty() {
            INSTANCE_NAMES.choose(&mut self.rng).map(|name| name.to_string())
        } else {
            self.config.instances.choose(&mut self.rng).cloned()
        }
    }

    /// One sweep at a random time in the window ending at `end_time`.
    pub fn generate_scan(&mut self, end_time: DateTime<Utc>) -> anyhow::Result<ScanRecord> {
        let template = *self
            .templates
            .choose(&mut self.rng)
            .context("generator has no templates")?;
        let window_secs = Duration::hours(self.config.window_hours.max(1)).num_seconds();
        let scan_time = end_time - Duration::seconds(self.rng.gen_range(0..window_secs));
        let cf = template.cf + self.rng.gen_range(-0.1..=0.1) * template.span;

        let powers = self.spectrum(template, cf);
        let flags = derive_flags(&powers);
        let scan_id = uuid::Builder::from_random_bytes(self.rng.gen()).into_uuid();

        let mut scan = ScanRecord::new(scan_time, scan_id, template.config(cf))
            .with_flags(flags)
            .with_powers(powers);
        scan.instance_name = self.instance();
        Ok(scan)
    }

    /// A batch of `config.scans` sweeps, oldest first.
    pub fn generate_batch(&mut self, end_time: DateTime<Utc>) -> anyhow::Result<Vec<ScanRecord>> {
        let mut scans = (0..self.config.scans)
            .map(|index| {
                self.generate_scan(end_time)
                    .with_context(|| format!("generating scan {index}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        scans.sort_by_key(|scan| scan.key());
        Ok(scans)
    }
}

/// Raises `powers` around `center_mhz` to a triangular profile peaking at
/// `peak_dbm` and falling `rolloff_db` per sample.
fn add_signal(
    powers: &mut [f64],
    start_mhz: f64,
    step_mhz: f64,
    center_mhz: f64,
    bandwidth_mhz: f64,
    peak_dbm: f64,
    rolloff_db: f64,
) {
    let offset = (center_mhz - start_mhz) / step_mhz;
    if offset < 0.0 || offset >= powers.len() as f64 {
        return;
    }
    let center = offset as usize;
    let half = ((bandwidth_mhz / step_mhz) as usize / 2).max(1);
    let lo = center.saturating_sub(half);
    let hi = (center + half).min(powers.len() - 1);
    for (i, power) in powers.iter_mut().enumerate().take(hi + 1).skip(lo) {
        let level = peak_dbm - center.abs_diff(i) as f64 * rolloff_db;
        *power = power.max(level);
    }
}
