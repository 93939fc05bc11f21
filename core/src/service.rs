//! Request-level facade over the store, the query engine, navigation and the
//! analysis engine. Outer layers (CLI driver, HTTP bridge) only talk to this.

use crate::analysis::{analyze_scan, AnalysisResult};
use crate::model::{
    default_presets, AnalysisPreset, Marker, NewMarker, PresetConfig, ScanKey, ScanRecord,
};
use crate::prelude::{CoreError, CoreResult};
use crate::query::{self, Direction, QueryEngine, QueryLimits, ScanFilter, ScanOrdering, ScanPage, ScanQuery, Step};
use crate::storage::{ChangeEvent, Database, StoreOptions, StoreStatistics};
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Auto-markers placed per scan by [`SpectrumService::auto_mark_peaks`].
const AUTO_MARKER_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub store: StoreOptions,
    pub limits: QueryLimits,
    /// Insert the built-in presets that are missing by name.
    pub seed_presets: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store: StoreOptions::default(),
            limits: QueryLimits::default(),
            seed_presets: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub scan: ScanKey,
    pub preset_id: u64,
    pub preset_name: String,
    pub result: AnalysisResult,
}

pub struct SpectrumService {
    db: Arc<Database>,
    engine: QueryEngine,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl SpectrumService {
    pub fn open(config: &ServiceConfig) -> CoreResult<Self> {
        let db = Arc::new(Database::open(&config.store)?);
        let service = Self::with_database(db, config.limits);
        if config.seed_presets {
            service.seed_presets()?;
        }
        Ok(service)
    }

    pub fn in_memory() -> CoreResult<Self> {
        Self::open(&ServiceConfig::default())
    }

    pub fn with_database(db: Arc<Database>, limits: QueryLimits) -> Self {
        Self {
            db,
            engine: QueryEngine::new(limits),
            metrics: MetricsRecorder::new(),
            logger: LogManager::for_component("service"),
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn limits(&self) -> &QueryLimits {
        self.engine.limits()
    }

    fn seed_presets(&self) -> CoreResult<()> {
        let presets = self.db.presets();
        let mut seeded = 0;
        for preset in default_presets() {
            match presets.get_by_name(&preset.name) {
                Ok(_) => {}
                Err(CoreError::NotFound(_)) => {
                    presets.insert(preset)?;
                    seeded += 1;
                }
                Err(err) => return Err(err),
            }
        }
        if seeded > 0 {
            self.logger.record(&format!("seeded {seeded} default presets"));
        }
        Ok(())
    }

    fn observe<T>(&self, result: CoreResult<T>) -> CoreResult<T> {
        if let Err(err) = &result {
            self.metrics.record_error(err);
            if err.is_retryable() {
                self.logger.warn(&err.to_string());
            } else {
                self.logger.debug(&err.to_string());
            }
        }
        result
    }

    pub fn ingest(&self, scan: ScanRecord) -> CoreResult<ScanKey> {
        let key = self.observe(self.db.scans().insert(scan))?;
        self.metrics.record_ingested();
        Ok(key)
    }

    pub fn query(&self, query: &ScanQuery) -> CoreResult<ScanPage> {
        let page = self.observe(self.engine.execute(&self.db, query))?;
        self.metrics.record_query();
        Ok(page)
    }

    pub fn scan(&self, scan_id: Uuid) -> CoreResult<ScanRecord> {
        self.observe(self.db.scans().find_by_id(scan_id))
    }

    pub fn latest(&self, filter: &ScanFilter) -> CoreResult<Option<ScanRecord>> {
        self.observe(filter.validate().and_then(|_| self.db.scans().latest(filter)))
    }

    pub fn inserted_since(
        &self,
        reference: &ScanKey,
        filter: &ScanFilter,
    ) -> CoreResult<Vec<ScanKey>> {
        self.observe(
            filter
                .validate()
                .and_then(|_| self.db.scans().inserted_since(reference.scan_time, filter)),
        )
    }

    pub fn step(
        &self,
        reference: &ScanKey,
        direction: Direction,
        ordering: ScanOrdering,
        filter: &ScanFilter,
    ) -> CoreResult<Step> {
        let step = self.observe(query::step(&self.db, reference, direction, ordering, filter))?;
        self.metrics.record_navigation();
        Ok(step)
    }

    /// Runs the preset over one scan. A scan without powers yields the empty
    /// form of the result rather than an error.
    pub fn apply(&self, scan_id: Uuid, preset_id: u64) -> CoreResult<AnalysisOutcome> {
        let outcome = self.observe(self.run_preset(scan_id, preset_id))?;
        self.metrics.record_analysis();
        Ok(outcome)
    }

    fn run_preset(&self, scan_id: Uuid, preset_id: u64) -> CoreResult<AnalysisOutcome> {
        let scan = self.db.scans().find_by_id(scan_id)?;
        let preset = self.db.presets().get(preset_id)?;
        let result = analyze_scan(&preset.preset_config, &scan);
        self.logger.debug(&format!(
            "applied {} preset `{}` to scan {}",
            preset.preset_config.kind_name(),
            preset.name,
            scan.key()
        ));
        Ok(AnalysisOutcome {
            scan: scan.key(),
            preset_id: preset.id,
            preset_name: preset.name,
            result,
        })
    }

    /// Detects peaks with a peak-detection preset and stores markers for the
    /// strongest ones.
    pub fn auto_mark_peaks(&self, scan_id: Uuid, preset_id: u64) -> CoreResult<Vec<Marker>> {
        let result = self.observe(self.mark_peaks(scan_id, preset_id))?;
        self.metrics.record_analysis();
        self.metrics.record_markers_created(result.len());
        Ok(result)
    }

    fn mark_peaks(&self, scan_id: Uuid, preset_id: u64) -> CoreResult<Vec<Marker>> {
        let preset = self.db.presets().get(preset_id)?;
        if !matches!(preset.preset_config, PresetConfig::PeakDetection(_)) {
            return Err(CoreError::InvalidFilter(format!(
                "preset `{}` is {}, not peak detection",
                preset.name,
                preset.preset_config.kind_name()
            )));
        }
        let scan = self.db.scans().find_by_id(scan_id)?;
        let peaks = match analyze_scan(&preset.preset_config, &scan) {
            AnalysisResult::PeakDetection(peaks) => peaks,
            _ => Vec::new(),
        };
        NewMarker::from_peaks(scan.key(), &peaks, AUTO_MARKER_LIMIT)
            .into_iter()
            .map(|marker| self.db.markers().create(marker))
            .collect()
    }

    pub fn create_marker(&self, marker: NewMarker) -> CoreResult<Marker> {
        let marker = self.observe(self.db.markers().create(marker))?;
        self.metrics.record_markers_created(1);
        Ok(marker)
    }

    pub fn list_markers(&self, scan_id: Uuid) -> CoreResult<Vec<Marker>> {
        self.observe(
            self.db
                .scans()
                .find_by_id(scan_id)
                .and_then(|scan| self.db.markers().list_for_scan(&scan.key())),
        )
    }

    pub fn delete_marker(&self, id: u64) -> CoreResult<Marker> {
        let marker = self.observe(self.db.markers().delete(id))?;
        self.metrics.record_markers_deleted(1);
        Ok(marker)
    }

    pub fn delete_markers(&self, scan_id: Uuid, ids: &[u64]) -> CoreResult<usize> {
        let removed = self.observe(
            self.db
                .scans()
                .find_by_id(scan_id)
                .and_then(|scan| self.db.markers().delete_many(&scan.key(), ids)),
        )?;
        self.metrics.record_markers_deleted(removed);
        Ok(removed)
    }

    pub fn clear_markers(&self, scan_id: Uuid) -> CoreResult<usize> {
        let removed = self.observe(
            self.db
                .scans()
                .find_by_id(scan_id)
                .and_then(|scan| self.db.markers().delete_for_scan(&scan.key())),
        )?;
        self.metrics.record_markers_deleted(removed);
        Ok(removed)
    }

    pub fn presets(&self) -> CoreResult<Vec<AnalysisPreset>> {
        self.observe(self.db.presets().list())
    }

    pub fn statistics(&self) -> CoreResult<StoreStatistics> {
        self.observe(self.db.scans().statistics())
    }

    pub fn instance_names(&self) -> CoreResult<Vec<String>> {
        self.observe(self.db.scans().instance_names())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.db.subscribe()
    }
}
