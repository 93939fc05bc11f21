use crate::generator::profile::SpectrumGenerator;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use spectrumcore::analysis::AnalysisResult;
use spectrumcore::model::{Marker, PresetConfig, ScanKey};
use spectrumcore::query::ScanFilter;
use spectrumcore::telemetry::MetricsSnapshot;
use spectrumcore::{CoreError, SpectrumService};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub preset_name: String,
    pub kind: &'static str,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub scans_generated: usize,
    pub scans_ingested: usize,
    pub duplicates: usize,
    pub purged: usize,
    pub latest: Option<ScanKey>,
    pub analyses: Vec<AnalysisSummary>,
    pub markers: Vec<Marker>,
    pub metrics: MetricsSnapshot,
}

/// One-line description of an analysis result for reports and logs.
pub fn describe(result: &AnalysisResult) -> String {
    match result {
        AnalysisResult::PeakDetection(peaks) => match peaks
            .iter()
            .max_by(|a, b| a.power_dbm.total_cmp(&b.power_dbm))
        {
            Some(peak) => format!(
                "{} peaks, strongest {:.1} dBm at {:.3} MHz",
                peaks.len(),
                peak.power_dbm,
                peak.frequency_mhz
            ),
            None => "no peaks".to_string(),
        },
        AnalysisResult::SignalAnalysis(report) => match &report.overall {
            Some(stats) => format!(
                "mean {:.1} dBm, max {:.1} dBm, {} bands",
                stats.mean,
                stats.max,
                report.bands.len()
            ),
            None => "no samples".to_string(),
        },
        AnalysisResult::Interference(sources) => {
            format!("{} interference sources", sources.len())
        }
        AnalysisResult::Occupancy(report) => format!(
            "{:.1}% occupied ({:.3} of {:.3} MHz)",
            report.occupancy_percentage, report.occupied_bandwidth, report.total_bandwidth
        ),
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
    service: Arc<SpectrumService>,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> anyhow::Result<Self> {
        let service = SpectrumService::open(&config.to_service_config())
            .context("opening scan store")?;
        Ok(Self::with_service(config, Arc::new(service)))
    }

    pub fn with_service(config: WorkflowConfig, service: Arc<SpectrumService>) -> Self {
        Self { config, service }
    }

    pub fn service(&self) -> Arc<SpectrumService> {
        Arc::clone(&self.service)
    }

    /// Generates and ingests a batch ending at `end_time`, applies retention,
    /// then runs every preset over the newest scan and auto-marks its peaks.
    pub fn execute(&self, end_time: DateTime<Utc>) -> anyhow::Result<WorkflowResult> {
        let mut generator = SpectrumGenerator::new(self.config.generator.clone())
            .context("building spectrum generator")?;
        let scans = generator
            .generate_batch(end_time)
            .context("generating scan batch")?;
        let scans_generated = scans.len();

        let mut scans_ingested = 0;
        let mut duplicates = 0;
        for scan in scans {
            match self.service.ingest(scan) {
                Ok(_) => scans_ingested += 1,
                Err(CoreError::DuplicateKey(_)) => duplicates += 1,
                Err(err) => return Err(err).context("ingesting generated scan"),
            }
        }
        log::info!("ingested {scans_ingested} of {scans_generated} generated scans");

        let purged = match self.config.retention_hours {
            Some(hours) => self
                .service
                .database()
                .scans()
                .purge_before(end_time - Duration::hours(hours))
                .context("applying retention")?,
            None => 0,
        };

        let latest = self
            .service
            .latest(&ScanFilter::default())
            .context("resolving latest scan")?;
        let mut analyses = Vec::new();
        let mut markers = Vec::new();
        if let Some(scan) = &latest {
            for preset in self.service.presets().context("listing presets")? {
                let outcome = self
                    .service
                    .apply(scan.scan_id, preset.id)
                    .with_context(|| format!("applying preset `{}`", preset.name))?;
                analyses.push(AnalysisSummary {
                    kind: preset.preset_config.kind_name(),
                    preset_name: outcome.preset_name,
                    summary: describe(&outcome.result),
                });
                if matches!(preset.preset_config, PresetConfig::PeakDetection(_)) && markers.is_empty() {
                    markers = self
                        .service
                        .auto_mark_peaks(scan.scan_id, preset.id)
                        .context("auto-marking peaks")?;
                }
            }
        }

        Ok(WorkflowResult {
            scans_generated,
            scans_ingested,
            duplicates,
            purged,
            latest: latest.map(|scan| scan.key()),
            analyses,
            markers,
            metrics: self.service.metrics(),
        })
    }
}
