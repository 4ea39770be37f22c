//! In-memory grid snapshot and the linear flow model backing the simulated
//! solver.

pub mod constraints;
#[cfg(feature = "sim")]
pub mod model;
pub mod snapshot;

pub use constraints::{GlskCapacity, MonitoredBranch, NetworkConstraints};
#[cfg(feature = "sim")]
pub use model::LinearFlowModel;
pub use snapshot::NetworkSnapshot;
