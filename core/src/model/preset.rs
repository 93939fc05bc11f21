use serde::{Deserialize, Serialize};

/// Named frequency range used by signal analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub start: f64,
    pub end: f64,
    pub name: String,
}

impl FrequencyBand {
    pub fn new(name: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            name: name.into(),
        }
    }

    pub fn contains(&self, frequency_mhz: f64) -> bool {
        frequency_mhz >= self.start && frequency_mhz <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakParams {
    pub threshold_dbm: f64,
    pub min_distance_mhz: f64,
    pub prominence: f64,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            threshold_dbm: -60.0,
            min_distance_mhz: 1.0,
            prominence: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalParams {
    pub frequency_bands: Vec<FrequencyBand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterferenceParams {
    pub baseline_window: usize,
    pub threshold_factor: f64,
}

impl Default for InterferenceParams {
    fn default() -> Self {
        Self {
            baseline_window: 100,
            threshold_factor: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupancyParams {
    pub threshold_dbm: f64,
}

impl Default for OccupancyParams {
    fn default() -> Self {
        Self {
            threshold_dbm: -60.0,
        }
    }
}

/// Analysis configuration, one case per analysis kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresetConfig {
    PeakDetection(PeakParams),
    SignalAnalysis(SignalParams),
    Interference(InterferenceParams),
    Occupancy(OccupancyParams),
}

impl PresetConfig {
    pub fn kind_name(&self) -> &'static str {
        match self {
            PresetConfig::PeakDetection(_) => "peak_detection",
            PresetConfig::SignalAnalysis(_) => "signal_analysis",
            PresetConfig::Interference(_) => "interference",
            PresetConfig::Occupancy(_) => "occupancy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPreset {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub preset_config: PresetConfig,
}

/// Preset as submitted by configuration management, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPreset {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub preset_config: PresetConfig,
}

impl NewPreset {
    pub fn new(name: impl Into<String>, preset_config: PresetConfig) -> Self {
        Self {
            name: name.into(),
            description: None,
            preset_config,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// One preset per analysis kind, seeded into fresh stores.
pub fn default_presets() -> Vec<NewPreset> {
    vec![
        NewPreset::new(
            "Peak Detection",
            PresetConfig::PeakDetection(PeakParams::default()),
        )
        .with_description("Local maxima above -60 dBm with 10 dB prominence"),
        NewPreset::new(
            "ISM Band Statistics",
            PresetConfig::SignalAnalysis(SignalParams {
                frequency_bands: vec![
                    FrequencyBand::new("WiFi Ch1", 2401.0, 2423.0),
                    FrequencyBand::new("WiFi Ch6", 2426.0, 2448.0),
                    FrequencyBand::new("WiFi Ch11", 2451.0, 2473.0),
                ],
            }),
        )
        .with_description("Power statistics over the 2.4 GHz WiFi channels"),
        NewPreset::new(
            "Interference Scan",
            PresetConfig::Interference(InterferenceParams::default()),
        )
        .with_description("Samples 3 sigma above the rolling median baseline"),
        NewPreset::new(
            "Occupancy",
            PresetConfig::Occupancy(OccupancyParams::default()),
        )
        .with_description("Share of the sweep above -60 dBm"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_config_is_tagged_by_type() {
        let parsed: PresetConfig =
            serde_json::from_str(r#"{"type":"peak_detection","threshold_dbm":-70}"#).unwrap();
        assert_eq!(
            parsed,
            PresetConfig::PeakDetection(PeakParams {
                threshold_dbm: -70.0,
                ..PeakParams::default()
            })
        );

        let encoded = serde_json::to_value(PresetConfig::Interference(Default::default())).unwrap();
        assert_eq!(encoded["type"], "interference");
        assert_eq!(encoded["baseline_window"], 100);
    }

    #[test]
    fn default_presets_cover_every_kind() {
        let kinds: Vec<_> = default_presets()
            .iter()
            .map(|preset| preset.preset_config.kind_name())
            .collect();
        assert_eq!(
            kinds,
            vec!["peak_detection", "signal_analysis", "interference", "occupancy"]
        );
    }
}
