//! Adapter around the external loadflow + remedial-action optimization
//! capability.

pub mod invoker;
pub mod remote;
#[cfg(feature = "sim")]
pub mod simulated;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ZonalValues;
use crate::power_flow::NetworkSnapshot;

pub use invoker::{EvaluationInvoker, InvocationError};
pub use remote::RemoteEvaluator;
#[cfg(feature = "sim")]
pub use simulated::SimulatedEvaluator;

/// Network element whose security margin limits the transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitingElement {
    pub id: String,
    /// Remaining margin (MW); negative means overloaded
    pub margin_mw: f64,
}

/// Raw result of one external evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverResult {
    /// Loadflow convergence
    pub converged: bool,
    /// Elements still overloaded after remedial-action optimization
    #[serde(default)]
    pub overloaded_elements: Vec<LimitingElement>,
    /// Smallest margin over all monitored elements (MW)
    #[serde(default)]
    pub worst_margin: f64,
    /// Requested shift could not be realized by the GLSK
    #[serde(default)]
    pub glsk_exhausted: bool,
}

impl SolverResult {
    pub fn diverged() -> Self {
        Self {
            converged: false,
            overloaded_elements: Vec::new(),
            worst_margin: 0.0,
            glsk_exhausted: false,
        }
    }
}

/// External evaluation capability (loadflow, shift application, RAO).
///
/// Implementations must not mutate the snapshot they are given; the
/// shifts are applied to a copy or sent to a solver that owns its copy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NetworkEvaluator: Send + Sync {
    async fn evaluate(&self, network: &NetworkSnapshot, shifts: &ZonalValues)
        -> Result<SolverResult>;

    /// Short backend name for logs and health reporting
    fn name(&self) -> &'static str;
}
