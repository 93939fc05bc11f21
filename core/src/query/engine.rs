use crate::model::ScanRecord;
use crate::prelude::{CoreError, CoreResult};
use crate::query::{QueryLimits, ScanQuery};
use crate::storage::Database;
use serde::{Deserialize, Serialize};

/// One page of a filtered, ordered result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPage {
    pub items: Vec<ScanRecord>,
    /// Number of records matching the filter, across all pages.
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl ScanPage {
    fn assemble(items: Vec<ScanRecord>, total: usize, page: usize, page_size: usize) -> Self {
        Self {
            items,
            total,
            page,
            page_size,
            total_pages: total.div_ceil(page_size),
            has_next: page * page_size < total,
            has_prev: page > 1,
        }
    }
}

pub struct QueryEngine {
    limits: QueryLimits,
}

impl QueryEngine {
    pub fn new(limits: QueryLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    /// Rejects malformed requests before the store is touched.
    pub fn validate(&self, query: &ScanQuery) -> CoreResult<()> {
        if query.page == 0 {
            return Err(CoreError::InvalidPage("page numbers start at 1".into()));
        }
        if query.page_size == 0 || query.page_size > self.limits.max_page_size {
            return Err(CoreError::InvalidPage(format!(
                "page_size {} outside 1..={}",
                query.page_size, self.limits.max_page_size
            )));
        }
        let depth = query.page.saturating_mul(query.page_size);
        if depth > self.limits.max_scan_depth {
            return Err(CoreError::InvalidPage(format!(
                "page {} of size {} reaches past the {} record limit",
                query.page, query.page_size, self.limits.max_scan_depth
            )));
        }
        query.filter.validate()
    }

    pub fn execute(&self, db: &Database, query: &ScanQuery) -> CoreResult<ScanPage> {
        self.validate(query)?;
        let offset = (query.page - 1) * query.page_size;
        let (items, total) =
            db.scans()
                .page(query.ordering, &query.filter, offset, query.page_size)?;
        Ok(ScanPage::assemble(items, total, query.page, query.page_size))
    }
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self::new(QueryLimits::default())
    }
}
