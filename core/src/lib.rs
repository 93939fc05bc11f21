//! Core of the RF scan explorer: the scan/marker/preset store, the
//! filter/sort/page query engine, stateless record navigation and the
//! spectrum analysis routines run over a single scan.
//!
//! Outer layers should go through [`SpectrumService`]; the lower modules are
//! public for tooling and tests.

pub mod analysis;
pub mod math;
pub mod model;
pub mod prelude;
pub mod query;
pub mod service;
pub mod storage;
pub mod telemetry;

pub use prelude::{CoreError, CoreResult, ErrorKind};
pub use service::{AnalysisOutcome, ServiceConfig, SpectrumService};
pub use storage::{Database, StoreOptions};
