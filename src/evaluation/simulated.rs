use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::{NetworkEvaluator, SolverResult};
use crate::domain::ZonalValues;
use crate::power_flow::{LinearFlowModel, NetworkSnapshot};

/// In-process solver over the snapshot's own constraints
#[derive(Debug, Clone)]
pub struct SimulatedEvaluator {
    model: LinearFlowModel,
    latency: Duration,
}

impl SimulatedEvaluator {
    pub fn new(divergence_threshold_mw: f64) -> Self {
        Self {
            model: LinearFlowModel::new(divergence_threshold_mw),
            latency: Duration::ZERO,
        }
    }

    /// Pretend every evaluation takes this long
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl NetworkEvaluator for SimulatedEvaluator {
    async fn evaluate(&self, network: &NetworkSnapshot, shifts: &ZonalValues) -> Result<SolverResult> {
        if let Err(reason) = network.constraints.validate() {
            bail!("network {} has invalid constraints: {reason}", network.id);
        }

        let mut working = network.clone();
        working.apply_shifts(shifts);
        if !working.verify_shift_balance() {
            bail!("shifts for network {} are not balanced", network.id);
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.model.solve(&working))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
