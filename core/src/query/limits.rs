use serde::{Deserialize, Serialize};

/// Bounds applied to page requests before they reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    pub max_page_size: usize,
    /// Deepest record position (`page * page_size`) a request may reach.
    pub max_scan_depth: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            max_scan_depth: 10_000,
        }
    }
}
