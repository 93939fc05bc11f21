use crate::analysis::frequency_axis;
use crate::prelude::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Composite identity of a scan. Ordering is time first, id second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScanKey {
    pub scan_time: DateTime<Utc>,
    pub scan_id: Uuid,
}

impl ScanKey {
    pub fn new(scan_time: DateTime<Utc>, scan_id: Uuid) -> Self {
        Self { scan_time, scan_id }
    }
}

impl fmt::Display for ScanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scan_time.to_rfc3339(), self.scan_id)
    }
}

/// Analyzer settings the sweep was captured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Center frequency in MHz.
    pub cf: f64,
    /// Swept span in MHz.
    pub span: f64,
    pub sample_amount: usize,
    #[serde(default)]
    pub rbw: Option<f64>,
    #[serde(default)]
    pub vbw: Option<f64>,
    #[serde(default)]
    pub ref_level: Option<f64>,
}

impl ScanConfig {
    pub fn new(name: impl Into<String>, cf: f64, span: f64, sample_amount: usize) -> Self {
        Self {
            name: Some(name.into()),
            cf,
            span,
            sample_amount,
            rbw: None,
            vbw: None,
            ref_level: None,
        }
    }

    pub fn start_mhz(&self) -> f64 {
        self.cf - self.span / 2.0
    }

    pub fn end_mhz(&self) -> f64 {
        self.cf + self.span / 2.0
    }
}

/// One immutable frequency sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_time: DateTime<Utc>,
    pub scan_id: Uuid,
    #[serde(default)]
    pub instance_name: Option<String>,
    #[serde(default)]
    pub flags: BTreeSet<String>,
    /// Power samples in dBm; empty when the sweep carried no trace.
    #[serde(default)]
    pub powers: Vec<f64>,
    pub config: ScanConfig,
}

impl ScanRecord {
    pub fn new(scan_time: DateTime<Utc>, scan_id: Uuid, config: ScanConfig) -> Self {
        Self {
            scan_time,
            scan_id,
            instance_name: None,
            flags: BTreeSet::new(),
            powers: Vec::new(),
            config,
        }
    }

    pub fn with_instance(mut self, instance_name: impl Into<String>) -> Self {
        self.instance_name = Some(instance_name.into());
        self
    }

    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_powers(mut self, powers: Vec<f64>) -> Self {
        self.powers = powers;
        self
    }

    pub fn key(&self) -> ScanKey {
        ScanKey::new(self.scan_time, self.scan_id)
    }

    /// Checks the record-level invariants enforced at ingestion.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.config.cf.is_finite() || !self.config.span.is_finite() || self.config.span < 0.0
        {
            return Err(CoreError::InvalidRecord(format!(
                "scan {} has an invalid sweep (cf {}, span {})",
                self.key(),
                self.config.cf,
                self.config.span
            )));
        }
        if !self.powers.is_empty() && self.powers.len() != self.config.sample_amount {
            return Err(CoreError::InvalidRecord(format!(
                "scan {} carries {} powers but sample_amount is {}",
                self.key(),
                self.powers.len(),
                self.config.sample_amount
            )));
        }
        if self.powers.iter().any(|p| !p.is_finite()) {
            return Err(CoreError::InvalidRecord(format!(
                "scan {} carries non-finite power samples",
                self.key()
            )));
        }
        Ok(())
    }

    /// Derived frequency axis in MHz, one entry per power sample.
    pub fn frequencies(&self) -> Vec<f64> {
        frequency_axis(self.config.cf, self.config.span, self.powers.len())
    }

    /// The flag set as the text the `flags_contains` filter matches against.
    pub fn flags_text(&self) -> String {
        self.flags.iter().map(String::as_str).collect::<Vec<_>>().join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(powers: Vec<f64>, sample_amount: usize) -> ScanRecord {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        ScanRecord::new(time, Uuid::nil(), ScanConfig::new("WiFi", 2400.0, 100.0, sample_amount))
            .with_powers(powers)
    }

    #[test]
    fn mismatched_power_count_is_rejected() {
        let err = record(vec![-90.0; 4], 5).validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord(_)));
    }

    #[test]
    fn missing_trace_is_allowed() {
        assert!(record(Vec::new(), 5).validate().is_ok());
    }

    #[test]
    fn frequencies_cover_the_sweep() {
        let freqs = record(vec![-90.0; 5], 5).frequencies();
        assert_eq!(freqs, vec![2350.0, 2375.0, 2400.0, 2425.0, 2450.0]);
    }

    #[test]
    fn flags_render_sorted() {
        let scan = record(Vec::new(), 0).with_flags(["signal_detected", "high_signal"]);
        assert_eq!(scan.flags_text(), "high_signal,signal_detected");
    }
}
