pub mod marker;
pub mod preset;
pub mod scan;

pub use marker::{Marker, MarkerType, NewMarker};
pub use preset::{
    default_presets, AnalysisPreset, FrequencyBand, InterferenceParams, NewPreset,
    OccupancyParams, PeakParams, PresetConfig, SignalParams,
};
pub use scan::{ScanConfig, ScanKey, ScanRecord};
