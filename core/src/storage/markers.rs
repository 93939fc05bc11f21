use crate::model::{Marker, NewMarker, ScanKey};
use crate::prelude::{CoreError, CoreResult};
use crate::storage::journal::JournalEntry;
use crate::storage::{ChangeKind, Database};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Default)]
pub(crate) struct MarkerTable {
    by_id: BTreeMap<u64, Marker>,
    by_scan: HashMap<ScanKey, BTreeSet<u64>>,
    next_id: u64,
}

impl MarkerTable {
    pub(crate) fn allocate_id(&mut self) -> u64 {
        self.next_id = self.next_id.max(1);
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn insert(&mut self, marker: Marker) {
        self.next_id = self.next_id.max(marker.id + 1);
        self.by_scan
            .entry(marker.scan_key())
            .or_default()
            .insert(marker.id);
        self.by_id.insert(marker.id, marker);
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<Marker> {
        let marker = self.by_id.remove(&id)?;
        let key = marker.scan_key();
        if let Some(ids) = self.by_scan.get_mut(&key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_scan.remove(&key);
            }
        }
        Some(marker)
    }

    /// Drops every marker bound to `scan`, returning their ids.
    pub(crate) fn remove_scan(&mut self, scan: &ScanKey) -> Vec<u64> {
        let ids: Vec<u64> = self
            .by_scan
            .remove(scan)
            .map(|ids| ids.into_iter().collect())
            .unwrap_or_default();
        for id in &ids {
            self.by_id.remove(id);
        }
        ids
    }

    fn ids_for_scan(&self, scan: &ScanKey) -> Vec<u64> {
        self.by_scan
            .get(scan)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

/// Annotation CRUD. Every marker references exactly one existing scan.
pub struct MarkerStore<'a> {
    db: &'a Database,
}

impl<'a> MarkerStore<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Creates a marker. The scan table stays read-locked until the marker is
    /// written so a concurrent scan delete cannot leave it orphaned.
    pub fn create(&self, marker: NewMarker) -> CoreResult<Marker> {
        marker.validate()?;
        let scan = marker.scan_key();
        let scans = self.db.read_scans()?;
        if !scans.contains(&scan) {
            return Err(CoreError::UnknownScan(format!(
                "marker `{}` references missing scan {scan}",
                marker.marker_name
            )));
        }

        let mut table = self.db.write_markers()?;
        let id = table.allocate_id();
        let created = Marker::from_new(id, marker, Utc::now());
        self.db.journal(&JournalEntry::CreateMarker {
            marker: created.clone(),
        })?;
        table.insert(created.clone());
        drop(table);
        drop(scans);

        self.db.publish(ChangeKind::MarkerCreated { id, scan });
        Ok(created)
    }

    pub fn get(&self, id: u64) -> CoreResult<Marker> {
        self.db
            .read_markers()?
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("marker {id}")))
    }

    pub fn delete(&self, id: u64) -> CoreResult<Marker> {
        let mut table = self.db.write_markers()?;
        let scan = match table.by_id.get(&id) {
            Some(marker) => marker.scan_key(),
            None => return Err(CoreError::NotFound(format!("marker {id}"))),
        };
        self.db.journal(&JournalEntry::DeleteMarker { id })?;
        let removed = table
            .remove(id)
            .ok_or_else(|| CoreError::NotFound(format!("marker {id}")))?;
        drop(table);

        self.db.publish(ChangeKind::MarkerDeleted { id, scan });
        Ok(removed)
    }

    /// Deletes the given markers of `scan` as one unit: when any id is missing
    /// or belongs to another scan, nothing is deleted and the offending ids are
    /// reported.
    pub fn delete_many(&self, scan: &ScanKey, ids: &[u64]) -> CoreResult<usize> {
        let mut table = self.db.write_markers()?;
        let missing: Vec<u64> = ids
            .iter()
            .copied()
            .filter(|id| {
                table
                    .by_id
                    .get(id)
                    .map_or(true, |marker| marker.scan_key() != *scan)
            })
            .collect();
        if !missing.is_empty() {
            self.db.logger().warn(&format!(
                "bulk marker delete on scan {scan} aborted, {} of {} ids missing",
                missing.len(),
                ids.len()
            ));
            return Err(CoreError::BulkDelete { missing });
        }

        let unique: Vec<u64> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        self.remove_all(&mut table, scan, unique)
    }

    /// Deletes every marker of `scan`; returns how many were removed.
    pub fn delete_for_scan(&self, scan: &ScanKey) -> CoreResult<usize> {
        let mut table = self.db.write_markers()?;
        let ids = table.ids_for_scan(scan);
        if ids.is_empty() {
            return Ok(0);
        }
        self.remove_all(&mut table, scan, ids)
    }

    /// Journals `ids` as one entry, then drops them from the table.
    fn remove_all(
        &self,
        table: &mut MarkerTable,
        scan: &ScanKey,
        ids: Vec<u64>,
    ) -> CoreResult<usize> {
        self.db
            .journal(&JournalEntry::DeleteMarkers { ids: ids.clone() })?;
        for &id in &ids {
            table.remove(id);
        }
        for &id in &ids {
            self.db.publish(ChangeKind::MarkerDeleted { id, scan: *scan });
        }
        Ok(ids.len())
    }

    /// Markers of one scan, oldest first.
    pub fn list_for_scan(&self, scan: &ScanKey) -> CoreResult<Vec<Marker>> {
        let table = self.db.read_markers()?;
        let mut markers: Vec<Marker> = table
            .ids_for_scan(scan)
            .into_iter()
            .filter_map(|id| table.by_id.get(&id).cloned())
            .collect();
        markers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(markers)
    }

    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.db.read_markers()?.by_id.len())
    }

    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MarkerType, ScanConfig, ScanRecord};
    use crate::storage::StoreOptions;
    use uuid::Uuid;

    fn seeded() -> (Database, ScanKey) {
        let db = Database::in_memory();
        let scan = ScanRecord::new(Utc::now(), Uuid::new_v4(), ScanConfig::new("LTE", 2655.0, 70.0, 0));
        let key = db.scans().insert(scan).unwrap();
        (db, key)
    }

    fn manual(scan: ScanKey, name: &str) -> NewMarker {
        NewMarker::new(scan, name, 2650.0, -42.0, MarkerType::Manual)
    }

    #[test]
    fn create_requires_existing_scan() {
        let (db, _) = seeded();
        let orphan = ScanKey::new(Utc::now(), Uuid::new_v4());
        let err = db.markers().create(manual(orphan, "M1")).unwrap_err();
        assert!(matches!(err, CoreError::UnknownScan(_)));
        assert!(db.markers().is_empty().unwrap());
    }

    #[test]
    fn list_is_ordered_by_creation() {
        let (db, key) = seeded();
        let first = db.markers().create(manual(key, "M1")).unwrap();
        let second = db.markers().create(manual(key, "M2")).unwrap();
        let third = db.markers().create(manual(key, "M3")).unwrap();

        let ids: Vec<u64> = db
            .markers()
            .list_for_scan(&key)
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
        assert!(first.id < second.id && second.id < third.id);
    }

    #[test]
    fn delete_missing_marker_is_not_found() {
        let (db, key) = seeded();
        let marker = db.markers().create(manual(key, "M1")).unwrap();
        db.markers().delete(marker.id).unwrap();
        assert!(matches!(db.markers().delete(marker.id), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn bulk_delete_is_all_or_nothing() {
        let (db, key) = seeded();
        let a = db.markers().create(manual(key, "A")).unwrap();
        let b = db.markers().create(manual(key, "B")).unwrap();

        let err = db.markers().delete_many(&key, &[a.id, b.id, 999]).unwrap_err();
        assert_eq!(err, CoreError::BulkDelete { missing: vec![999] });
        assert_eq!(db.markers().list_for_scan(&key).unwrap().len(), 2);

        assert_eq!(db.markers().delete_many(&key, &[a.id, b.id]).unwrap(), 2);
        assert!(db.markers().list_for_scan(&key).unwrap().is_empty());
    }

    #[test]
    fn bulk_delete_rejects_markers_of_other_scans() {
        let (db, key) = seeded();
        let other = db
            .scans()
            .insert(ScanRecord::new(Utc::now(), Uuid::new_v4(), ScanConfig::new("FM", 100.0, 20.0, 0)))
            .unwrap();
        let foreign = db.markers().create(manual(other, "X")).unwrap();

        let err = db.markers().delete_many(&key, &[foreign.id]).unwrap_err();
        assert_eq!(err, CoreError::BulkDelete { missing: vec![foreign.id] });
        assert!(db.markers().get(foreign.id).is_ok());
    }

    #[test]
    fn deleting_scan_cascades_markers() {
        let (db, key) = seeded();
        db.markers().create(manual(key, "A")).unwrap();
        db.markers().create(manual(key, "B")).unwrap();

        assert_eq!(db.scans().delete(&key).unwrap(), 2);
        assert!(db.markers().list_for_scan(&key).unwrap().is_empty());
        assert!(db.markers().is_empty().unwrap());
        let err = db.markers().create(manual(key, "late")).unwrap_err();
        assert!(matches!(err, CoreError::UnknownScan(_)));
    }

    fn journaled() -> (tempfile::TempDir, StoreOptions, Database, ScanKey) {
        let dir = tempfile::tempdir().unwrap();
        let options = StoreOptions {
            journal_path: Some(dir.path().join("journal.jsonl")),
            ..Default::default()
        };
        let db = Database::open(&options).unwrap();
        let scan = ScanRecord::new(Utc::now(), Uuid::new_v4(), ScanConfig::new("LTE", 2655.0, 70.0, 0));
        let key = db.scans().insert(scan).unwrap();
        (dir, options, db, key)
    }

    #[test]
    fn non_finite_marker_is_rejected_and_store_reopens() {
        let (_dir, options, db, key) = journaled();
        let err = db
            .markers()
            .create(NewMarker::new(key, "bad", f64::NAN, -42.0, MarkerType::Manual))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord(_)));
        let err = db
            .markers()
            .create(NewMarker::new(key, "loud", 2650.0, f64::INFINITY, MarkerType::Manual))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord(_)));
        let good = db.markers().create(manual(key, "good")).unwrap();
        drop(db);

        let db = Database::open(&options).unwrap();
        assert_eq!(db.markers().len().unwrap(), 1);
        assert_eq!(db.markers().get(good.id).unwrap().marker_name, "good");
    }

    #[test]
    fn failed_bulk_delete_journal_keeps_every_marker() {
        let (_dir, options, db, key) = journaled();
        let ids: Vec<u64> = ["A", "B", "C"]
            .iter()
            .map(|name| db.markers().create(manual(key, name)).unwrap().id)
            .collect();

        db.journal.as_ref().unwrap().lock().fail_next_append(12);
        let err = db.markers().delete_many(&key, &ids).unwrap_err();
        assert!(matches!(err, CoreError::StoreUnavailable(_)));
        assert_eq!(db.markers().list_for_scan(&key).unwrap().len(), 3);

        db.journal.as_ref().unwrap().lock().fail_next_append(0);
        assert!(db.markers().delete_for_scan(&key).is_err());
        assert_eq!(db.markers().len().unwrap(), 3);
        drop(db);

        let db = Database::open(&options).unwrap();
        assert_eq!(db.markers().len().unwrap(), 3);
        assert_eq!(db.markers().delete_many(&key, &ids).unwrap(), 3);
        drop(db);

        let db = Database::open(&options).unwrap();
        assert!(db.markers().is_empty().unwrap());
    }

    #[test]
    fn clear_scan_markers_counts_removed() {
        let (db, key) = seeded();
        assert_eq!(db.markers().delete_for_scan(&key).unwrap(), 0);
        db.markers().create(manual(key, "A")).unwrap();
        assert_eq!(db.markers().delete_for_scan(&key).unwrap(), 1);
    }

    #[test]
    fn clearing_races_single_deletes_without_bulk_errors() {
        let (db, key) = seeded();
        for round in 0..50 {
            let ids: Vec<u64> = (0..4)
                .map(|n| db.markers().create(manual(key, &format!("R{round}_{n}"))).unwrap().id)
                .collect();
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for &id in &ids {
                        let _ = db.markers().delete(id);
                    }
                });
                let cleared = db.markers().delete_for_scan(&key);
                assert!(matches!(cleared, Ok(n) if n <= ids.len()));
            });
            assert!(db.markers().list_for_scan(&key).unwrap().is_empty());
        }
    }
}
