use crate::model::ScanRecord;
use crate::prelude::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Bound;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    ScanTime,
    InstanceName,
}

impl FromStr for SortBy {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scan_time" => Ok(SortBy::ScanTime),
            "instance_name" => Ok(SortBy::InstanceName),
            other => Err(CoreError::InvalidFilter(format!(
                "cannot sort by `{other}`, expected scan_time or instance_name"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(CoreError::InvalidFilter(format!(
                "unknown sort order `{other}`, expected asc or desc"
            ))),
        }
    }
}

/// Primary sort key and direction. Ties always fall back to `scan_id`
/// ascending, which makes the order total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanOrdering {
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl ScanOrdering {
    pub fn new(sort_by: SortBy, sort_order: SortOrder) -> Self {
        Self {
            sort_by,
            sort_order,
        }
    }

    pub fn newest_first() -> Self {
        Self::new(SortBy::ScanTime, SortOrder::Desc)
    }

    pub fn oldest_first() -> Self {
        Self::new(SortBy::ScanTime, SortOrder::Asc)
    }
}

/// Optional predicates; every populated field must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanFilter {
    /// Case-insensitive substring of the instance name.
    pub instance_name: Option<String>,
    /// Case-insensitive substring of `config.name`.
    pub config_name: Option<String>,
    /// Case-insensitive substring of the comma-joined flag set.
    pub flags_contains: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Exact match on `config.cf`.
    pub center_frequency: Option<f64>,
}

impl ScanFilter {
    pub fn validate(&self) -> CoreResult<()> {
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start > end {
                return Err(CoreError::InvalidFilter(format!(
                    "start_time {} is after end_time {}",
                    start.to_rfc3339(),
                    end.to_rfc3339()
                )));
            }
        }
        if let Some(cf) = self.center_frequency {
            if !cf.is_finite() {
                return Err(CoreError::InvalidFilter(
                    "center_frequency must be a finite number".into(),
                ));
            }
        }
        Ok(())
    }

    /// True when no predicate is set; blank text filters count as unset.
    pub fn is_unrestricted(&self) -> bool {
        let blank = |value: &Option<String>| value.as_deref().map_or(true, |v| v.trim().is_empty());
        blank(&self.instance_name)
            && blank(&self.config_name)
            && blank(&self.flags_contains)
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.center_frequency.is_none()
    }

    /// Inclusive `scan_time` bounds, used to prune the clustered index.
    pub fn time_bounds(&self) -> (Bound<DateTime<Utc>>, Bound<DateTime<Utc>>) {
        (
            self.start_time.map_or(Bound::Unbounded, Bound::Included),
            self.end_time.map_or(Bound::Unbounded, Bound::Included),
        )
    }

    pub fn matches(&self, scan: &ScanRecord) -> bool {
        if self.start_time.is_some_and(|start| scan.scan_time < start) {
            return false;
        }
        if self.end_time.is_some_and(|end| scan.scan_time > end) {
            return false;
        }
        if self.center_frequency.is_some_and(|cf| scan.config.cf != cf) {
            return false;
        }
        contains_ci(scan.instance_name.as_deref(), self.instance_name.as_deref())
            && contains_ci(scan.config.name.as_deref(), self.config_name.as_deref())
            && contains_ci(Some(&scan.flags_text()), self.flags_contains.as_deref())
    }
}

fn contains_ci(haystack: Option<&str>, needle: Option<&str>) -> bool {
    let needle = match needle.map(str::trim) {
        Some(needle) if !needle.is_empty() => needle.to_lowercase(),
        _ => return true,
    };
    haystack.is_some_and(|value| value.to_lowercase().contains(&needle))
}

/// A page request: 1-based page number, page size, ordering and filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanQuery {
    pub page: usize,
    pub page_size: usize,
    #[serde(flatten)]
    pub ordering: ScanOrdering,
    #[serde(flatten)]
    pub filter: ScanFilter,
}

impl Default for ScanQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            ordering: ScanOrdering::default(),
            filter: ScanFilter::default(),
        }
    }
}

impl ScanQuery {
    pub fn page(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size,
            ..Default::default()
        }
    }

    pub fn ordered(mut self, ordering: ScanOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    pub fn filtered(mut self, filter: ScanFilter) -> Self {
        self.filter = filter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScanConfig;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn scan() -> ScanRecord {
        let time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        ScanRecord::new(time, Uuid::new_v4(), ScanConfig::new("WiFi_Ch6_Survey", 2437.0, 20.0, 0))
            .with_instance("SA_Lab_001")
            .with_flags(["signal_detected", "high_signal"])
    }

    #[test]
    fn substring_filters_ignore_case() {
        let filter = ScanFilter {
            instance_name: Some("lab_0".into()),
            config_name: Some("ch6".into()),
            flags_contains: Some("SIGNAL_DET".into()),
            ..Default::default()
        };
        assert!(filter.matches(&scan()));

        let miss = ScanFilter {
            instance_name: Some("mobile".into()),
            ..Default::default()
        };
        assert!(!miss.matches(&scan()));
    }

    #[test]
    fn blank_filters_are_ignored() {
        let filter = ScanFilter {
            instance_name: Some("  ".into()),
            ..Default::default()
        };
        assert!(filter.matches(&scan().with_instance("anything")));
        assert!(filter.is_unrestricted());
        assert!(!ScanFilter {
            center_frequency: Some(2437.0),
            ..Default::default()
        }
        .is_unrestricted());
    }

    #[test]
    fn instance_filter_excludes_unnamed_scans() {
        let mut unnamed = scan();
        unnamed.instance_name = None;
        let filter = ScanFilter {
            instance_name: Some("lab".into()),
            ..Default::default()
        };
        assert!(!filter.matches(&unnamed));
    }

    #[test]
    fn time_bounds_are_inclusive_and_cf_exact() {
        let record = scan();
        let filter = ScanFilter {
            start_time: Some(record.scan_time),
            end_time: Some(record.scan_time),
            center_frequency: Some(2437.0),
            ..Default::default()
        };
        assert!(filter.matches(&record));

        let off = ScanFilter {
            center_frequency: Some(2437.5),
            ..Default::default()
        };
        assert!(!off.matches(&record));
    }

    #[test]
    fn inverted_time_range_is_rejected() {
        let record = scan();
        let filter = ScanFilter {
            start_time: Some(record.scan_time),
            end_time: Some(record.scan_time - chrono::Duration::seconds(1)),
            ..Default::default()
        };
        assert!(matches!(filter.validate(), Err(CoreError::InvalidFilter(_))));
    }

    #[test]
    fn sort_fields_parse_or_reject() {
        assert_eq!("instance_name".parse::<SortBy>().unwrap(), SortBy::InstanceName);
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!(matches!("powers".parse::<SortBy>(), Err(CoreError::InvalidFilter(_))));
    }
}
