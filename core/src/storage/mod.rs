//! Durable, concurrently accessible tables for scans, markers and presets.
//!
//! All tables live behind `parking_lot` locks acquired with a timeout; a lock
//! that cannot be taken in time surfaces as [`CoreError::StoreUnavailable`]
//! instead of blocking the caller. Locks are always taken in the order
//! scans, markers, presets, journal.

pub mod index;
pub mod journal;
pub mod markers;
pub mod presets;
pub mod scans;

pub use journal::{Journal, JournalEntry};
pub use markers::MarkerStore;
pub use presets::PresetStore;
pub use scans::{InstanceCount, ScanStore, StoreStatistics};

use crate::model::ScanKey;
use crate::prelude::{CoreError, CoreResult};
use crate::telemetry::LogManager;
use markers::MarkerTable;
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use presets::PresetTable;
use scans::ScanTable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// JSON-lines journal; `None` keeps everything in memory.
    pub journal_path: Option<PathBuf>,
    pub lock_timeout_ms: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            journal_path: None,
            lock_timeout_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeKind {
    ScanInserted { scan: ScanKey },
    ScanDeleted { scan: ScanKey },
    MarkerCreated { id: u64, scan: ScanKey },
    MarkerDeleted { id: u64, scan: ScanKey },
}

/// Committed mutation, numbered in commit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub sequence: u64,
    pub kind: ChangeKind,
}

pub struct Database {
    scans: RwLock<ScanTable>,
    markers: RwLock<MarkerTable>,
    presets: RwLock<PresetTable>,
    journal: Option<Mutex<Journal>>,
    changes: broadcast::Sender<ChangeEvent>,
    sequence: AtomicU64,
    lock_timeout: Duration,
    logger: LogManager,
}

impl Database {
    pub fn in_memory() -> Self {
        Self::with_parts(None, &StoreOptions::default())
    }

    /// Opens the store described by `options`, replaying its journal.
    pub fn open(options: &StoreOptions) -> CoreResult<Self> {
        let Some(path) = options.journal_path.as_ref() else {
            return Ok(Self::with_parts(None, options));
        };

        let (journal, entries) = Journal::open(path)?;
        let db = Self::with_parts(Some(journal), options);
        let replayed = entries.len();
        {
            let mut scans = db.scans.write();
            let mut markers = db.markers.write();
            let mut presets = db.presets.write();
            for entry in entries {
                match entry {
                    JournalEntry::InsertScan { scan } => {
                        if let Err(err) = scans.insert(scan) {
                            db.logger.warn(&format!("journal replay skipped scan: {err}"));
                        }
                    }
                    JournalEntry::DeleteScan { key } => {
                        scans.remove(&key);
                        markers.remove_scan(&key);
                    }
                    JournalEntry::CreateMarker { marker } => markers.insert(marker),
                    JournalEntry::DeleteMarker { id } => {
                        markers.remove(id);
                    }
                    JournalEntry::DeleteMarkers { ids } => {
                        for id in ids {
                            markers.remove(id);
                        }
                    }
                    JournalEntry::UpsertPreset { preset } => presets.put(preset),
                }
            }
        }
        db.logger.record(&format!(
            "opened {} with {} journal entries, {} scans",
            path.display(),
            replayed,
            db.scans.read().len()
        ));
        Ok(db)
    }

    fn with_parts(journal: Option<Journal>, options: &StoreOptions) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            scans: RwLock::new(ScanTable::default()),
            markers: RwLock::new(MarkerTable::default()),
            presets: RwLock::new(PresetTable::default()),
            journal: journal.map(Mutex::new),
            changes,
            sequence: AtomicU64::new(0),
            lock_timeout: Duration::from_millis(options.lock_timeout_ms),
            logger: LogManager::for_component("store"),
        }
    }

    pub fn scans(&self) -> ScanStore<'_> {
        ScanStore::new(self)
    }

    pub fn markers(&self) -> MarkerStore<'_> {
        MarkerStore::new(self)
    }

    pub fn presets(&self) -> PresetStore<'_> {
        PresetStore::new(self)
    }

    /// Live feed of committed mutations. Slow subscribers observe `Lagged`
    /// and should re-resolve from the store.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    pub fn is_durable(&self) -> bool {
        self.journal.is_some()
    }

    pub(crate) fn logger(&self) -> &LogManager {
        &self.logger
    }

    fn unavailable(&self, table: &str) -> CoreError {
        self.logger.warn(&format!(
            "{table} lock not acquired within {:?}",
            self.lock_timeout
        ));
        CoreError::StoreUnavailable(format!("{table} table is busy"))
    }

    pub(crate) fn read_scans(&self) -> CoreResult<RwLockReadGuard<'_, ScanTable>> {
        self.scans
            .try_read_for(self.lock_timeout)
            .ok_or_else(|| self.unavailable("scan"))
    }

    pub(crate) fn write_scans(&self) -> CoreResult<RwLockWriteGuard<'_, ScanTable>> {
        self.scans
            .try_write_for(self.lock_timeout)
            .ok_or_else(|| self.unavailable("scan"))
    }

    pub(crate) fn read_markers(&self) -> CoreResult<RwLockReadGuard<'_, MarkerTable>> {
        self.markers
            .try_read_for(self.lock_timeout)
            .ok_or_else(|| self.unavailable("marker"))
    }

    pub(crate) fn write_markers(&self) -> CoreResult<RwLockWriteGuard<'_, MarkerTable>> {
        self.markers
            .try_write_for(self.lock_timeout)
            .ok_or_else(|| self.unavailable("marker"))
    }

    pub(crate) fn read_presets(&self) -> CoreResult<RwLockReadGuard<'_, PresetTable>> {
        self.presets
            .try_read_for(self.lock_timeout)
            .ok_or_else(|| self.unavailable("preset"))
    }

    pub(crate) fn write_presets(&self) -> CoreResult<RwLockWriteGuard<'_, PresetTable>> {
        self.presets
            .try_write_for(self.lock_timeout)
            .ok_or_else(|| self.unavailable("preset"))
    }

    /// Persists `entry` before the caller mutates its table. No-op in memory.
    pub(crate) fn journal(&self, entry: &JournalEntry) -> CoreResult<()> {
        match &self.journal {
            Some(journal) => journal
                .try_lock_for(self.lock_timeout)
                .ok_or_else(|| self.unavailable("journal"))?
                .append(entry),
            None => Ok(()),
        }
    }

    pub(crate) fn publish(&self, change: ChangeKind) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        // No subscribers is not an error.
        let _ = self.changes.send(ChangeEvent { sequence, kind: change });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{default_presets, MarkerType, NewMarker, ScanConfig, ScanRecord};
    use chrono::Utc;
    use uuid::Uuid;

    fn scan(name: &str) -> ScanRecord {
        ScanRecord::new(Utc::now(), Uuid::new_v4(), ScanConfig::new(name, 433.0, 2.0, 2))
            .with_powers(vec![-95.0, -61.0])
    }

    #[test]
    fn busy_table_reports_store_unavailable() {
        let db = Database::with_parts(
            None,
            &StoreOptions {
                journal_path: None,
                lock_timeout_ms: 10,
            },
        );
        let guard = db.write_scans().unwrap();
        let err = db.scans().len().unwrap_err();
        assert!(matches!(err, CoreError::StoreUnavailable(_)));
        assert!(err.is_retryable());
        drop(guard);
        assert_eq!(db.scans().len().unwrap(), 0);
    }

    #[test]
    fn changes_are_broadcast_in_commit_order() {
        let db = Database::in_memory();
        let mut feed = db.subscribe();
        let key = db.scans().insert(scan("ISM")).unwrap();
        let marker = db
            .markers()
            .create(NewMarker::new(key, "M1", 433.0, -61.0, MarkerType::Peak))
            .unwrap();

        let first = feed.try_recv().unwrap();
        let second = feed.try_recv().unwrap();
        assert_eq!(first.kind, ChangeKind::ScanInserted { scan: key });
        assert_eq!(
            second.kind,
            ChangeKind::MarkerCreated {
                id: marker.id,
                scan: key
            }
        );
        assert!(first.sequence < second.sequence);
    }

    #[test]
    fn reopen_replays_journal_with_cascade() {
        let dir = tempfile::tempdir().unwrap();
        let options = StoreOptions {
            journal_path: Some(dir.path().join("journal.jsonl")),
            ..Default::default()
        };

        let (kept, dropped, marker_id) = {
            let db = Database::open(&options).unwrap();
            assert!(db.is_durable());
            let kept = db.scans().insert(scan("kept")).unwrap();
            let dropped = db.scans().insert(scan("dropped")).unwrap();
            let marker = db
                .markers()
                .create(NewMarker::new(kept, "keep", 433.0, -61.0, MarkerType::Manual))
                .unwrap();
            db.markers()
                .create(NewMarker::new(dropped, "gone", 433.0, -61.0, MarkerType::Manual))
                .unwrap();
            db.scans().delete(&dropped).unwrap();
            for preset in default_presets() {
                db.presets().insert(preset).unwrap();
            }
            (kept, dropped, marker.id)
        };

        let db = Database::open(&options).unwrap();
        assert_eq!(db.scans().len().unwrap(), 1);
        assert!(db.scans().contains(&kept).unwrap());
        assert!(!db.scans().contains(&dropped).unwrap());
        assert_eq!(db.markers().len().unwrap(), 1);
        assert_eq!(db.markers().get(marker_id).unwrap().marker_name, "keep");
        assert_eq!(db.presets().list().unwrap().len(), 4);

        let next = db
            .markers()
            .create(NewMarker::new(kept, "after", 433.0, -61.0, MarkerType::Manual))
            .unwrap();
        assert!(next.id > marker_id + 1);
    }
}
