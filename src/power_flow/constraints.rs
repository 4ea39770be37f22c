use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{Zone, ZonalValues};

/// A monitored branch (critical network element)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredBranch {
    /// Branch identifier reported as the limiting element
    pub id: String,

    /// Flow before any shift is applied (MW)
    pub base_flow_mw: f64,

    /// Permanent admissible flow (MW)
    pub max_flow_mw: f64,

    /// Power transfer distribution factor per zone (MW flow per MW injected)
    #[serde(default)]
    pub ptdf: ZonalValues,

    /// Flow reduction the remedial-action optimizer can obtain on this branch (MW)
    #[serde(default)]
    pub remedial_relief_mw: f64,
}

/// Range a zone's generation shift key can realize
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlskCapacity {
    /// Largest upward shift (MW)
    pub max_up_mw: f64,
    /// Largest downward shift (MW, positive number)
    pub max_down_mw: f64,
}

impl GlskCapacity {
    pub fn can_realize(&self, shift_mw: f64) -> bool {
        shift_mw <= self.max_up_mw && -shift_mw <= self.max_down_mw
    }
}

/// Physical limits of a network snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConstraints {
    #[serde(default)]
    pub branches: Vec<MonitoredBranch>,

    /// Zones missing here have unlimited GLSK capacity
    #[serde(default)]
    pub glsk: BTreeMap<Zone, GlskCapacity>,
}

impl NetworkConstraints {
    /// Validate constraints for consistency
    pub fn validate(&self) -> Result<(), String> {
        for branch in &self.branches {
            if !branch.base_flow_mw.is_finite() {
                return Err(format!("branch {} base flow is not finite", branch.id));
            }
            if !branch.max_flow_mw.is_finite() || branch.max_flow_mw <= 0.0 {
                return Err(format!(
                    "branch {} max flow must be positive, got {}",
                    branch.id, branch.max_flow_mw
                ));
            }
            if branch.remedial_relief_mw < 0.0 {
                return Err(format!("branch {} remedial relief cannot be negative", branch.id));
            }
            if let Some((zone, _)) = branch.ptdf.iter().find(|(_, v)| !v.is_finite()) {
                return Err(format!("branch {} ptdf for {zone} is not finite", branch.id));
            }
        }

        for (zone, capacity) in &self.glsk {
            if capacity.max_up_mw < 0.0 || capacity.max_down_mw < 0.0 {
                return Err(format!("GLSK capacity for {zone} cannot be negative"));
            }
        }

        Ok(())
    }

    /// Zones whose shift cannot be realized by their GLSK
    pub fn exhausted_glsk_zones<'a>(&'a self, shifts: &'a ZonalValues) -> Vec<&'a Zone> {
        shifts
            .iter()
            .filter(|(zone, shift)| {
                self.glsk
                    .get(*zone)
                    .map(|capacity| !capacity.can_realize(**shift))
                    .unwrap_or(false)
            })
            .map(|(zone, _)| zone)
            .collect()
    }
}
