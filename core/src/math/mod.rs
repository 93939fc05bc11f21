pub mod stats;
pub mod window;

pub use stats::StatsHelper;
pub use window::{centered_bounds, rolling_median_std};
