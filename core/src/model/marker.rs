use crate::analysis::Peak;
use crate::model::scan::ScanKey;
use crate::prelude::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerType {
    Manual,
    Peak,
    Valley,
    Reference,
}

impl FromStr for MarkerType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "manual" => Ok(MarkerType::Manual),
            "peak" => Ok(MarkerType::Peak),
            "valley" => Ok(MarkerType::Valley),
            "reference" => Ok(MarkerType::Reference),
            other => Err(format!("unknown marker type `{other}`")),
        }
    }
}

/// Marker fields supplied by the creator; id and timestamp come from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMarker {
    pub scan_time: DateTime<Utc>,
    pub scan_id: Uuid,
    pub marker_name: String,
    pub frequency_mhz: f64,
    pub power_dbm: f64,
    pub marker_type: MarkerType,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewMarker {
    pub fn new(
        scan: ScanKey,
        marker_name: impl Into<String>,
        frequency_mhz: f64,
        power_dbm: f64,
        marker_type: MarkerType,
    ) -> Self {
        Self {
            scan_time: scan.scan_time,
            scan_id: scan.scan_id,
            marker_name: marker_name.into(),
            frequency_mhz,
            power_dbm,
            marker_type,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn scan_key(&self) -> ScanKey {
        ScanKey::new(self.scan_time, self.scan_id)
    }

    /// Rejects markers whose position cannot be stored as a JSON number.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.frequency_mhz.is_finite() || !self.power_dbm.is_finite() {
            return Err(CoreError::InvalidRecord(format!(
                "marker `{}` on scan {} has a non-finite position ({} MHz, {} dBm)",
                self.marker_name,
                self.scan_key(),
                self.frequency_mhz,
                self.power_dbm
            )));
        }
        Ok(())
    }

    /// Auto-markers for the strongest detected peaks (at most `limit`).
    pub fn from_peaks(scan: ScanKey, peaks: &[Peak], limit: usize) -> Vec<NewMarker> {
        let mut strongest: Vec<&Peak> = peaks.iter().collect();
        strongest.sort_by(|a, b| b.power_dbm.total_cmp(&a.power_dbm));

        strongest
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(idx, peak)| {
                let rank = idx + 1;
                let name = if peak.power_dbm > -40.0 {
                    format!("Strong_Signal_{rank}")
                } else if peak.power_dbm > -60.0 {
                    format!("Medium_Signal_{rank}")
                } else {
                    format!("Peak_{rank}")
                };
                NewMarker::new(scan, name, peak.frequency_mhz, peak.power_dbm, MarkerType::Peak)
                    .with_notes(format!(
                        "Auto-detected peak with {:.1} dB prominence",
                        peak.prominence
                    ))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: u64,
    pub scan_time: DateTime<Utc>,
    pub scan_id: Uuid,
    pub marker_name: String,
    pub frequency_mhz: f64,
    pub power_dbm: f64,
    pub marker_type: MarkerType,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Marker {
    pub fn from_new(id: u64, marker: NewMarker, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            scan_time: marker.scan_time,
            scan_id: marker.scan_id,
            marker_name: marker.marker_name,
            frequency_mhz: marker.frequency_mhz,
            power_dbm: marker.power_dbm,
            marker_type: marker.marker_type,
            notes: marker.notes,
            created_at,
        }
    }

    pub fn scan_key(&self) -> ScanKey {
        ScanKey::new(self.scan_time, self.scan_id)
    }
}
