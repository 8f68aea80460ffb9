//! Per-sample feature attribution for isolation forests.

pub mod attributor;
pub mod importance;

pub use attributor::{compute_importances, IsolationPathAttributor};
pub use importance::{filter, ImportanceTable};
