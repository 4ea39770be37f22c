use super::{MonitoredBranch, NetworkSnapshot};
use crate::evaluation::{LimitingElement, SolverResult};

/// Linear (DC, PTDF based) flow model with a crude remedial-action stage.
///
/// Stand-in for the external loadflow and RAO: it is deterministic and
/// cheap, which is what development runs and end-to-end tests need.
///
/// Steps for a shifted snapshot:
/// 1. Declare divergence when the shifted volume exceeds the threshold
/// 2. Check every zone's shift against its GLSK capacity
/// 3. Compute branch flows `base + Σ ptdf[z] * shift[z]`
/// 4. Apply each branch's remedial relief, derive margins
#[derive(Debug, Clone)]
pub struct LinearFlowModel {
    divergence_threshold_mw: f64,
}

impl LinearFlowModel {
    pub fn new(divergence_threshold_mw: f64) -> Self {
        Self {
            divergence_threshold_mw,
        }
    }

    pub fn solve(&self, network: &NetworkSnapshot) -> SolverResult {
        if network.shifted_volume_mw() > self.divergence_threshold_mw {
            return SolverResult::diverged();
        }

        let glsk_exhausted = !network
            .constraints
            .exhausted_glsk_zones(&network.applied_shifts)
            .is_empty();

        let elements: Vec<LimitingElement> = network
            .constraints
            .branches
            .iter()
            .map(|branch| LimitingElement {
                id: branch.id.clone(),
                margin_mw: self.margin_after_remedial_actions(branch, network),
            })
            .collect();

        let worst_margin = elements
            .iter()
            .map(|element| element.margin_mw)
            .fold(None, |worst: Option<f64>, margin| {
                Some(worst.map_or(margin, |w| w.min(margin)))
            })
            .unwrap_or(0.0);

        let overloaded_elements = elements
            .into_iter()
            .filter(|element| element.margin_mw < 0.0)
            .collect();

        SolverResult {
            converged: true,
            overloaded_elements,
            worst_margin,
            glsk_exhausted,
        }
    }

    fn branch_flow_mw(&self, branch: &MonitoredBranch, network: &NetworkSnapshot) -> f64 {
        branch.base_flow_mw
            + network
                .applied_shifts
                .iter()
                .map(|(zone, shift)| branch.ptdf.get(zone).copied().unwrap_or(0.0) * shift)
                .sum::<f64>()
    }

    fn margin_after_remedial_actions(&self, branch: &MonitoredBranch, network: &NetworkSnapshot) -> f64 {
        let loading = (self.branch_flow_mw(branch, network).abs() - branch.remedial_relief_mw).max(0.0);
        branch.max_flow_mw - loading
    }
}
