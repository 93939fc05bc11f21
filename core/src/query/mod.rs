//! Filtered, ordered, paged access to the scan store and stateless
//! navigation between neighbouring records.

pub mod engine;
pub mod limits;
pub mod navigation;
pub mod request;

pub use engine::{QueryEngine, ScanPage};
pub use limits::QueryLimits;
pub use navigation::{step, Direction, Step};
pub use request::{ScanFilter, ScanOrdering, ScanQuery, SortBy, SortOrder};
