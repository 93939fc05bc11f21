use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spectrumcore::model::MarkerType;
use spectrumcore::prelude::{CoreError, CoreResult, ErrorKind};
use spectrumcore::query::{Direction, ScanFilter, ScanOrdering, ScanQuery};
use spectrumcore::storage::StoreStatistics;
use spectrumcore::telemetry::MetricsSnapshot;

/// Raw query-string parameters of the scan routes. Everything arrives as text
/// and is parsed here so malformed values map onto the core's error kinds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub instance_name: Option<String>,
    pub config_name: Option<String>,
    pub flags_contains: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub center_frequency: Option<String>,
    pub direction: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_page(value: &Option<String>, field: &str, default: usize) -> CoreResult<usize> {
    match present(value) {
        Some(raw) => raw
            .parse()
            .map_err(|_| CoreError::InvalidPage(format!("{field} `{raw}` is not a page number"))),
        None => Ok(default),
    }
}

fn parse_time(value: &Option<String>, field: &str) -> CoreResult<Option<DateTime<Utc>>> {
    present(value)
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|time| time.with_timezone(&Utc))
                .map_err(|err| CoreError::InvalidFilter(format!("{field} `{raw}`: {err}")))
        })
        .transpose()
}

impl ScanParams {
    pub fn filter(&self) -> CoreResult<ScanFilter> {
        let center_frequency = present(&self.center_frequency)
            .map(|raw| {
                raw.parse::<f64>().map_err(|_| {
                    CoreError::InvalidFilter(format!("center_frequency `{raw}` is not a number"))
                })
            })
            .transpose()?;
        Ok(ScanFilter {
            instance_name: present(&self.instance_name).map(str::to_string),
            config_name: present(&self.config_name).map(str::to_string),
            flags_contains: present(&self.flags_contains).map(str::to_string),
            start_time: parse_time(&self.start_time, "start_time")?,
            end_time: parse_time(&self.end_time, "end_time")?,
            center_frequency,
        })
    }

    pub fn ordering(&self) -> CoreResult<ScanOrdering> {
        let mut ordering = ScanOrdering::default();
        if let Some(raw) = present(&self.sort_by) {
            ordering.sort_by = raw.parse()?;
        }
        if let Some(raw) = present(&self.sort_order) {
            ordering.sort_order = raw.parse()?;
        }
        Ok(ordering)
    }

    pub fn query(&self) -> CoreResult<ScanQuery> {
        let defaults = ScanQuery::default();
        Ok(ScanQuery::page(
            parse_page(&self.page, "page", defaults.page)?,
            parse_page(&self.page_size, "page_size", defaults.page_size)?,
        )
        .ordered(self.ordering()?)
        .filtered(self.filter()?))
    }

    pub fn direction(&self) -> CoreResult<Direction> {
        match present(&self.direction) {
            Some(raw) => raw.parse(),
            None => Err(CoreError::InvalidFilter("direction is required".into())),
        }
    }
}

/// Body of `POST /scans/{id}/markers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerInput {
    pub marker_name: String,
    pub frequency_mhz: f64,
    pub power_dbm: f64,
    #[serde(default = "default_marker_type")]
    pub marker_type: MarkerType,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_marker_type() -> MarkerType {
    MarkerType::Manual
}

/// Query of `DELETE /scans/{id}/markers`: comma-separated ids, or none to
/// clear the scan.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarkerIds {
    pub ids: Option<String>,
}

impl MarkerIds {
    pub fn parse(&self) -> CoreResult<Option<Vec<u64>>> {
        present(&self.ids)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(|id| {
                        id.parse::<u64>()
                            .map_err(|_| CoreError::InvalidFilter(format!("marker id `{id}`")))
                    })
                    .collect()
            })
            .transpose()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedCount {
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsView {
    pub store: StoreStatistics,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<u64>>,
}

impl From<&CoreError> for ErrorBody {
    fn from(err: &CoreError) -> Self {
        let missing = match err {
            CoreError::BulkDelete { missing } => Some(missing.clone()),
            _ => None,
        };
        Self {
            error: err.kind(),
            message: err.to_string(),
            missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectrumcore::query::{SortBy, SortOrder};

    #[test]
    fn params_build_a_query() {
        let params = ScanParams {
            page: Some("2".into()),
            page_size: Some("15".into()),
            sort_by: Some("instance_name".into()),
            sort_order: Some("asc".into()),
            instance_name: Some(" ".into()),
            start_time: Some("2024-05-01T00:00:00Z".into()),
            center_frequency: Some("2437".into()),
            ..Default::default()
        };
        let query = params.query().unwrap();
        assert_eq!((query.page, query.page_size), (2, 15));
        assert_eq!(query.ordering, ScanOrdering::new(SortBy::InstanceName, SortOrder::Asc));
        assert_eq!(query.filter.instance_name, None);
        assert_eq!(query.filter.center_frequency, Some(2437.0));
        assert!(query.filter.start_time.is_some());
    }

    #[test]
    fn malformed_params_map_to_core_errors() {
        let bad_page = ScanParams {
            page: Some("first".into()),
            ..Default::default()
        };
        assert!(matches!(bad_page.query(), Err(CoreError::InvalidPage(_))));

        let bad_time = ScanParams {
            end_time: Some("yesterday".into()),
            ..Default::default()
        };
        assert!(matches!(bad_time.query(), Err(CoreError::InvalidFilter(_))));

        assert!(matches!(
            ScanParams::default().direction(),
            Err(CoreError::InvalidFilter(_))
        ));
    }

    #[test]
    fn marker_ids_parse_as_a_list() {
        let ids = MarkerIds {
            ids: Some("3, 5,8".into()),
        };
        assert_eq!(ids.parse().unwrap(), Some(vec![3, 5, 8]));
        assert_eq!(MarkerIds::default().parse().unwrap(), None);
        assert!(MarkerIds { ids: Some("x".into()) }.parse().is_err());
    }
}
