use crate::model::{ScanKey, ScanRecord};
use crate::prelude::{CoreError, CoreResult};
use crate::query::{ScanFilter, ScanOrdering};
use crate::storage::Database;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Step direction relative to the active [`ScanOrdering`], not to time.
///
/// `Next` moves to the record that follows the reference in the listing
/// order. Under the default newest-first ordering that is the next *older*
/// scan; use an oldest-first ordering for "next = newer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Towards the start of the listing.
    Prev,
    /// Towards the end of the listing.
    Next,
}

impl FromStr for Direction {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prev" | "previous" => Ok(Direction::Prev),
            "next" => Ok(Direction::Next),
            other => Err(CoreError::InvalidFilter(format!(
                "unknown direction `{other}`, expected prev or next"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "scan", rename_all = "snake_case")]
pub enum Step {
    Found(ScanRecord),
    /// Nothing further in that direction right now.
    EndOfData,
}

impl Step {
    pub fn into_record(self) -> Option<ScanRecord> {
        match self {
            Step::Found(record) => Some(record),
            Step::EndOfData => None,
        }
    }
}

/// Resolves the neighbour of `reference` in the total order given by
/// `ordering`, skipping records the filter rejects. Works the same whether the
/// reference sits at a page edge or in the middle of a page, and never loads
/// more than the records it walks past.
pub fn step(
    db: &Database,
    reference: &ScanKey,
    direction: Direction,
    ordering: ScanOrdering,
    filter: &ScanFilter,
) -> CoreResult<Step> {
    filter.validate()?;
    let backward = direction == Direction::Prev;
    let found = db.scans().adjacent(reference, ordering, filter, backward)?;
    Ok(found.map_or(Step::EndOfData, Step::Found))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScanConfig;
    use crate::query::{QueryEngine, ScanQuery, SortBy, SortOrder};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn seeded(count: i64) -> (Database, Vec<ScanKey>) {
        let db = Database::in_memory();
        let keys = (0..count)
            .map(|minute| {
                let instance = if minute % 2 == 0 { "SA_Lab_001" } else { "Field_Unit_1" };
                let scan = ScanRecord::new(at(minute), Uuid::new_v4(), ScanConfig::new("ISM", 433.0, 2.0, 0))
                    .with_instance(instance);
                db.scans().insert(scan).unwrap()
            })
            .collect();
        (db, keys)
    }

    fn found(step: Step) -> ScanKey {
        step.into_record().expect("expected a neighbour").key()
    }

    #[test]
    fn next_then_prev_returns_to_start() {
        let (db, keys) = seeded(6);
        let filter = ScanFilter::default();
        for ordering in [
            ScanOrdering::oldest_first(),
            ScanOrdering::newest_first(),
            ScanOrdering::new(SortBy::InstanceName, SortOrder::Asc),
            ScanOrdering::new(SortBy::InstanceName, SortOrder::Desc),
        ] {
            for key in &keys {
                if let Step::Found(next) = step(&db, key, Direction::Next, ordering, &filter).unwrap() {
                    let back = step(&db, &next.key(), Direction::Prev, ordering, &filter).unwrap();
                    assert_eq!(found(back), *key, "{ordering:?}");
                }
            }
        }
    }

    #[test]
    fn ascending_time_steps_to_the_next_newer_scan() {
        let (db, keys) = seeded(3);
        let filter = ScanFilter::default();
        let next = step(&db, &keys[0], Direction::Next, ScanOrdering::oldest_first(), &filter).unwrap();
        assert_eq!(found(next), keys[1]);

        let newest_first = ScanOrdering::newest_first();
        let next = step(&db, &keys[1], Direction::Next, newest_first, &filter).unwrap();
        assert_eq!(found(next), keys[0]);
    }

    #[test]
    fn ends_of_data_are_reported() {
        let (db, keys) = seeded(3);
        let filter = ScanFilter::default();
        let ordering = ScanOrdering::oldest_first();
        assert_eq!(
            step(&db, &keys[2], Direction::Next, ordering, &filter).unwrap(),
            Step::EndOfData
        );
        assert_eq!(
            step(&db, &keys[0], Direction::Prev, ordering, &filter).unwrap(),
            Step::EndOfData
        );
    }

    #[test]
    fn crossing_a_page_boundary_matches_the_next_page() {
        let (db, _) = seeded(9);
        let engine = QueryEngine::default();
        let filter = ScanFilter::default();
        let ordering = ScanOrdering::newest_first();

        let first = engine.execute(&db, &ScanQuery::page(1, 4)).unwrap();
        let second = engine.execute(&db, &ScanQuery::page(2, 4)).unwrap();
        let edge = first.items.last().unwrap().key();

        let next = step(&db, &edge, Direction::Next, ordering, &filter).unwrap();
        assert_eq!(found(next), second.items[0].key());
        let back = step(&db, &second.items[0].key(), Direction::Prev, ordering, &filter).unwrap();
        assert_eq!(found(back), edge);
    }

    #[test]
    fn filter_skips_non_matching_neighbours() {
        let (db, keys) = seeded(5);
        let lab_only = ScanFilter {
            instance_name: Some("lab".into()),
            ..Default::default()
        };
        let next = step(&db, &keys[0], Direction::Next, ScanOrdering::oldest_first(), &lab_only).unwrap();
        assert_eq!(found(next), keys[2]);
    }

    #[test]
    fn time_order_resumes_from_a_deleted_reference() {
        let (db, keys) = seeded(3);
        db.scans().delete(&keys[1]).unwrap();
        let filter = ScanFilter::default();
        let next = step(&db, &keys[1], Direction::Next, ScanOrdering::oldest_first(), &filter).unwrap();
        assert_eq!(found(next), keys[2]);

        let by_instance = ScanOrdering::new(SortBy::InstanceName, SortOrder::Asc);
        assert!(matches!(
            step(&db, &keys[1], Direction::Next, by_instance, &filter),
            Err(CoreError::NotFound(_))
        ));
    }
}
