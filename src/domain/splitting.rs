use serde::Serialize;

use super::{Zone, ZonalValues};
use crate::error::CapacityError;

/// Allowed deviation of the non-reference factor sum from 1
pub const SPLITTING_SUM_TOLERANCE: f64 = 1e-3;

/// Fractional share of a total exchange attributed to each zone.
///
/// The reference zone is not stored: its factor is fixed at -1, meaning it
/// absorbs the opposite of the sum of all other shifts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplittingFactors {
    reference: Zone,
    factors: ZonalValues,
}

impl SplittingFactors {
    pub fn new(reference: Zone, mut factors: ZonalValues) -> Result<Self, CapacityError> {
        if let Some(reference_factor) = factors.remove(&reference) {
            if (reference_factor + 1.0).abs() > SPLITTING_SUM_TOLERANCE {
                return Err(CapacityError::configuration(format!(
                    "reference zone {reference} must have splitting factor -1, got {reference_factor}"
                )));
            }
        }

        if let Some((zone, value)) = factors.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CapacityError::configuration(format!(
                "splitting factor for {zone} is not finite: {value}"
            )));
        }

        let sum: f64 = factors.values().sum();
        if (sum - 1.0).abs() > SPLITTING_SUM_TOLERANCE {
            return Err(CapacityError::configuration(format!(
                "splitting factors must sum to 1, got {sum:.6}"
            )));
        }

        Ok(Self { reference, factors })
    }

    pub fn reference(&self) -> &Zone {
        &self.reference
    }

    /// Factor of a non-reference zone; undeclared zones contribute nothing
    pub fn factor(&self, zone: &Zone) -> f64 {
        self.factors.get(zone).copied().unwrap_or(0.0)
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.factors.keys()
    }
}
