use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::NetworkConstraints;
use crate::domain::{zonal_sum, ZonalValues};

/// Allowed imbalance after shifting (MW)
const BALANCE_TOLERANCE_MW: f64 = 1e-6;

/// Frozen grid snapshot a capacity run is computed on.
///
/// The canonical snapshot is shared read-only between probes; every probe
/// works on its own clone with [`NetworkSnapshot::apply_shifts`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Identifier the external solver knows this network by
    pub id: String,

    /// Timestamp the snapshot was taken
    #[serde(default = "Utc::now")]
    pub captured_at: DateTime<Utc>,

    /// Net position per zone (MW, positive = export)
    #[serde(default)]
    pub net_positions: ZonalValues,

    /// Shifts applied to this copy so far (MW)
    #[serde(default)]
    pub applied_shifts: ZonalValues,

    /// Monitored branches and GLSK capacities, used by the in-process solver
    #[serde(default)]
    pub constraints: NetworkConstraints,
}

impl NetworkSnapshot {
    pub fn new(id: impl Into<String>, net_positions: ZonalValues) -> Self {
        Self {
            id: id.into(),
            captured_at: Utc::now(),
            net_positions,
            applied_shifts: ZonalValues::new(),
            constraints: NetworkConstraints::default(),
        }
    }

    pub fn with_constraints(mut self, constraints: NetworkConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    /// Inject per-zone shifts into this copy
    pub fn apply_shifts(&mut self, shifts: &ZonalValues) {
        for (zone, shift) in shifts {
            *self.net_positions.entry(zone.clone()).or_insert(0.0) += shift;
            *self.applied_shifts.entry(zone.clone()).or_insert(0.0) += shift;
        }
    }

    /// Injected and withdrawn power must match after shifting
    pub fn verify_shift_balance(&self) -> bool {
        zonal_sum(&self.applied_shifts).abs() < BALANCE_TOLERANCE_MW
    }

    /// Total power moved by the applied shifts (MW)
    pub fn shifted_volume_mw(&self) -> f64 {
        self.applied_shifts
            .values()
            .filter(|shift| **shift > 0.0)
            .sum()
    }
}

impl fmt::Display for NetworkSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NetworkSnapshot {{ id: {}, zones: {}, branches: {}, shifted: {:.1}MW, balanced: {} }}",
            self.id,
            self.net_positions.len(),
            self.constraints.branches.len(),
            self.shifted_volume_mw(),
            if self.verify_shift_balance() { "yes" } else { "no" }
        )
    }
}
