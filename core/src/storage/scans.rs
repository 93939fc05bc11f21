use crate::model::{ScanKey, ScanRecord};
use crate::prelude::{CoreError, CoreResult};
use crate::query::{ScanFilter, ScanOrdering, SortBy, SortOrder};
use crate::storage::index::{BucketIndex, WalkDirection};
use crate::storage::journal::JournalEntry;
use crate::storage::{ChangeKind, Database};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use uuid::Uuid;

type ScanWalk<'a> = Box<dyn Iterator<Item = &'a Arc<ScanRecord>> + 'a>;

/// In-memory scan table: a clustered index on `scan_time` (each time bucket
/// ordered by `scan_id`), a secondary index for the instance-name order and an
/// id lookup.
#[derive(Default)]
pub(crate) struct ScanTable {
    by_time: BucketIndex<DateTime<Utc>, Uuid, Arc<ScanRecord>>,
    by_instance: BucketIndex<Option<String>, (Uuid, DateTime<Utc>), Arc<ScanRecord>>,
    by_id: HashMap<Uuid, BTreeSet<DateTime<Utc>>>,
}

impl ScanTable {
    pub(crate) fn contains(&self, key: &ScanKey) -> bool {
        self.by_time.get(&key.scan_time, &key.scan_id).is_some()
    }

    pub(crate) fn get(&self, key: &ScanKey) -> Option<&Arc<ScanRecord>> {
        self.by_time.get(&key.scan_time, &key.scan_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_time.len()
    }

    pub(crate) fn insert(&mut self, record: ScanRecord) -> CoreResult<()> {
        let key = record.key();
        if self.contains(&key) {
            return Err(CoreError::DuplicateKey(format!("scan {key} already exists")));
        }
        let record = Arc::new(record);
        self.by_instance.insert(
            record.instance_name.clone(),
            (key.scan_id, key.scan_time),
            Arc::clone(&record),
        );
        self.by_id
            .entry(key.scan_id)
            .or_default()
            .insert(key.scan_time);
        self.by_time.insert(key.scan_time, key.scan_id, record);
        Ok(())
    }

    pub(crate) fn remove(&mut self, key: &ScanKey) -> Option<Arc<ScanRecord>> {
        let record = self.by_time.remove(&key.scan_time, &key.scan_id)?;
        self.by_instance
            .remove(&record.instance_name, &(key.scan_id, key.scan_time));
        if let Some(times) = self.by_id.get_mut(&key.scan_id) {
            times.remove(&key.scan_time);
            if times.is_empty() {
                self.by_id.remove(&key.scan_id);
            }
        }
        Some(record)
    }

    /// Matching records in the total order, optionally starting strictly past
    /// `from`. `backward` walks against the order.
    pub(crate) fn walk<'a>(
        &'a self,
        ordering: ScanOrdering,
        filter: &'a ScanFilter,
        from: Option<(ScanKey, Option<String>)>,
        backward: bool,
    ) -> ScanWalk<'a> {
        let direction = WalkDirection {
            outer_forward: (ordering.sort_order == SortOrder::Asc) != backward,
            inner_forward: !backward,
        };

        let walk: ScanWalk<'a> = match ordering.sort_by {
            SortBy::ScanTime => self.by_time.walk(
                filter.time_bounds(),
                from.map(|(key, _)| (key.scan_time, key.scan_id)),
                direction,
            ),
            SortBy::InstanceName => self.by_instance.walk(
                (Bound::Unbounded, Bound::Unbounded),
                from.map(|(key, instance)| (instance, (key.scan_id, key.scan_time))),
                direction,
            ),
        };

        Box::new(walk.filter(move |scan| filter.matches(scan)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStatistics {
    pub total_scans: usize,
    pub unique_instances: usize,
    pub earliest_scan: Option<DateTime<Utc>>,
    pub latest_scan: Option<DateTime<Utc>>,
    pub common_instances: Vec<InstanceCount>,
}

/// Access to the scan table of a [`Database`].
pub struct ScanStore<'a> {
    db: &'a Database,
}

impl<'a> ScanStore<'a> {
    pub(crate) fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Appends an immutable record. Colliding keys are rejected, never
    /// overwritten.
    pub fn insert(&self, record: ScanRecord) -> CoreResult<ScanKey> {
        record.validate()?;
        let key = record.key();

        let mut table = self.db.write_scans()?;
        if table.contains(&key) {
            self.db
                .logger()
                .warn(&format!("rejected duplicate scan {key}"));
            return Err(CoreError::DuplicateKey(format!("scan {key} already exists")));
        }
        self.db.journal(&JournalEntry::InsertScan {
            scan: record.clone(),
        })?;
        table.insert(record)?;
        drop(table);

        self.db.publish(ChangeKind::ScanInserted { scan: key });
        Ok(key)
    }

    pub fn get(&self, scan_time: DateTime<Utc>, scan_id: Uuid) -> CoreResult<ScanRecord> {
        let key = ScanKey::new(scan_time, scan_id);
        self.db
            .read_scans()?
            .get(&key)
            .map(|scan| ScanRecord::clone(scan))
            .ok_or_else(|| CoreError::NotFound(format!("scan {key}")))
    }

    /// Looks a scan up by id alone; if the id was reused, the newest wins.
    pub fn find_by_id(&self, scan_id: Uuid) -> CoreResult<ScanRecord> {
        let table = self.db.read_scans()?;
        table
            .by_id
            .get(&scan_id)
            .and_then(|times| times.iter().next_back())
            .and_then(|&scan_time| table.get(&ScanKey::new(scan_time, scan_id)))
            .map(|scan| ScanRecord::clone(scan))
            .ok_or_else(|| CoreError::NotFound(format!("scan {scan_id}")))
    }

    pub fn contains(&self, key: &ScanKey) -> CoreResult<bool> {
        Ok(self.db.read_scans()?.contains(key))
    }

    pub fn len(&self) -> CoreResult<usize> {
        Ok(self.db.read_scans()?.len())
    }

    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Removes a scan and every marker attached to it. Returns the number of
    /// markers removed.
    pub fn delete(&self, key: &ScanKey) -> CoreResult<usize> {
        let mut table = self.db.write_scans()?;
        if !table.contains(key) {
            return Err(CoreError::NotFound(format!("scan {key}")));
        }
        let mut markers = self.db.write_markers()?;
        self.db.journal(&JournalEntry::DeleteScan { key: *key })?;
        table.remove(key);
        let removed = markers.remove_scan(key);
        drop(markers);
        drop(table);

        self.db.publish(ChangeKind::ScanDeleted { scan: *key });
        Ok(removed.len())
    }

    /// Retention hook: deletes every scan strictly older than `cutoff`,
    /// cascading to markers. Returns the number of scans removed.
    pub fn purge_before(&self, cutoff: DateTime<Utc>) -> CoreResult<usize> {
        let expired: Vec<ScanKey> = {
            let table = self.db.read_scans()?;
            let filter = ScanFilter::default();
            let keys = table
                .walk(ScanOrdering::oldest_first(), &filter, None, false)
                .take_while(|scan| scan.scan_time < cutoff)
                .map(|scan| scan.key())
                .collect();
            keys
        };

        let mut purged = 0;
        for key in &expired {
            match self.delete(key) {
                Ok(_) => purged += 1,
                Err(CoreError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        if purged > 0 {
            self.db.logger().record(&format!(
                "retention purged {purged} scans older than {}",
                cutoff.to_rfc3339()
            ));
        }
        Ok(purged)
    }

    /// One page of matching records plus the total number of matches.
    pub fn page(
        &self,
        ordering: ScanOrdering,
        filter: &ScanFilter,
        offset: usize,
        limit: usize,
    ) -> CoreResult<(Vec<ScanRecord>, usize)> {
        let table = self.db.read_scans()?;
        if filter.is_unrestricted() {
            let items = table
                .walk(ordering, filter, None, false)
                .skip(offset)
                .take(limit)
                .map(|scan| ScanRecord::clone(scan))
                .collect();
            return Ok((items, table.len()));
        }

        let mut items = Vec::with_capacity(limit);
        let mut total = 0;
        for scan in table.walk(ordering, filter, None, false) {
            if total >= offset && items.len() < limit {
                items.push(ScanRecord::clone(scan));
            }
            total += 1;
        }
        Ok((items, total))
    }

    /// First matching record strictly past `reference` in the total order
    /// (`backward` looks the other way).
    pub fn adjacent(
        &self,
        reference: &ScanKey,
        ordering: ScanOrdering,
        filter: &ScanFilter,
        backward: bool,
    ) -> CoreResult<Option<ScanRecord>> {
        let table = self.db.read_scans()?;
        // The time order can resume from a key that has since been purged; the
        // instance order needs the record's instance name.
        let instance_name = match (ordering.sort_by, table.get(reference)) {
            (_, Some(scan)) => scan.instance_name.clone(),
            (SortBy::ScanTime, None) => None,
            (SortBy::InstanceName, None) => {
                return Err(CoreError::NotFound(format!("scan {reference}")));
            }
        };
        let next = table
            .walk(ordering, filter, Some((*reference, instance_name)), backward)
            .next()
            .map(|scan| ScanRecord::clone(scan));
        Ok(next)
    }

    /// Newest matching record, re-resolved on demand.
    pub fn latest(&self, filter: &ScanFilter) -> CoreResult<Option<ScanRecord>> {
        let table = self.db.read_scans()?;
        let latest = table
            .walk(ScanOrdering::newest_first(), filter, None, false)
            .next()
            .map(|scan| ScanRecord::clone(scan));
        Ok(latest)
    }

    /// Keys of matching records newer than `reference_time`, oldest first.
    pub fn inserted_since(
        &self,
        reference_time: DateTime<Utc>,
        filter: &ScanFilter,
    ) -> CoreResult<Vec<ScanKey>> {
        let table = self.db.read_scans()?;
        let mut keys: Vec<ScanKey> = table
            .walk(ScanOrdering::newest_first(), filter, None, false)
            .take_while(|scan| scan.scan_time > reference_time)
            .map(|scan| scan.key())
            .collect();
        keys.reverse();
        Ok(keys)
    }

    pub fn statistics(&self) -> CoreResult<StoreStatistics> {
        let table = self.db.read_scans()?;
        let mut common_instances: Vec<InstanceCount> = table
            .by_instance
            .bucket_sizes()
            .filter_map(|(name, count)| {
                name.as_ref().map(|name| InstanceCount {
                    name: name.clone(),
                    count,
                })
            })
            .collect();
        let unique_instances = common_instances.len();
        common_instances.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        common_instances.truncate(5);

        Ok(StoreStatistics {
            total_scans: table.len(),
            unique_instances,
            earliest_scan: table.by_time.first_key().copied(),
            latest_scan: table.by_time.last_key().copied(),
            common_instances,
        })
    }

    /// Distinct non-empty instance names, sorted.
    pub fn instance_names(&self) -> CoreResult<Vec<String>> {
        let table = self.db.read_scans()?;
        let names = table
            .by_instance
            .bucket_sizes()
            .filter_map(|(name, _)| name.clone())
            .collect();
        Ok(names)
    }
}
