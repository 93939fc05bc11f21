use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use spectrumcore::query::QueryLimits;
use spectrumcore::storage::StoreOptions;
use spectrumcore::ServiceConfig;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub store: StoreOptions,
    pub limits: QueryLimits,
    pub generator: GeneratorConfig,
    pub bind_address: SocketAddr,
    /// Scans older than this many hours are purged after ingestion.
    pub retention_hours: Option<i64>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            store: StoreOptions::default(),
            limits: QueryLimits::default(),
            generator: GeneratorConfig::default(),
            bind_address: default_bind_address(),
            retention_hours: None,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(scans: usize, seed: u64, journal: Option<PathBuf>) -> Self {
        let mut config = Self::default();
        config.generator.scans = scans;
        config.generator.seed = seed;
        config.store.journal_path = journal;
        config
    }

    pub fn to_service_config(&self) -> ServiceConfig {
        ServiceConfig {
            store: self.store.clone(),
            limits: self.limits,
            seed_presets: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_produces_service_config() {
        let cfg = WorkflowConfig::from_args(12, 3, Some(PathBuf::from("data/journal.jsonl")));
        assert_eq!(cfg.generator.scans, 12);
        let service = cfg.to_service_config();
        assert_eq!(service.store.journal_path, Some(PathBuf::from("data/journal.jsonl")));
        assert_eq!(service.limits.max_page_size, 100);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"store:\n  lock_timeout_ms: 250\nlimits:\n  max_page_size: 50\ngenerator:\n  scans: 8\n  seed: 11\nbind_address: 0.0.0.0:8080\nretention_hours: 48\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.store.lock_timeout_ms, 250);
        assert_eq!(cfg.store.journal_path, None);
        assert_eq!(cfg.limits.max_page_size, 50);
        assert_eq!(cfg.limits.max_scan_depth, 10_000);
        assert_eq!(cfg.generator.scans, 8);
        assert_eq!(cfg.generator.noise_floor_dbm, -85.0);
        assert_eq!(cfg.bind_address.port(), 8080);
        assert_eq!(cfg.retention_hours, Some(48));
    }

    #[test]
    fn malformed_yaml_names_the_file() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"generator: [not, a, map]\n").unwrap();
        let path = temp.into_temp_path();
        let err = WorkflowConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing workflow config"));
    }
}
