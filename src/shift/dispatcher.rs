use std::collections::BTreeSet;

use crate::domain::{SplittingFactors, Zone, ZonalValues};

/// Converts a total exchange value into per-zone injection shifts.
///
/// For every non-reference zone `z`:
///
/// ```text
/// shift[z] = splitting[z] * total - reference_exchange[z] - merchant_flow[z]
/// ```
///
/// and the reference zone absorbs `-Σ shift[z]`, so injections and
/// withdrawals always balance.
#[derive(Debug, Clone)]
pub struct ShiftDispatcher {
    splitting: SplittingFactors,
    reference_exchanges: ZonalValues,
    merchant_flows: ZonalValues,
}

impl ShiftDispatcher {
    pub fn new(
        splitting: SplittingFactors,
        reference_exchanges: ZonalValues,
        merchant_flows: ZonalValues,
    ) -> Self {
        Self {
            splitting,
            reference_exchanges,
            merchant_flows,
        }
    }

    pub fn reference_zone(&self) -> &Zone {
        self.splitting.reference()
    }

    pub fn dispatch(&self, total_shift: f64) -> ZonalValues {
        let reference = self.splitting.reference();

        // Zones without a splitting factor still carry reference exchanges
        // or merchant flows that must be taken out.
        let zones: BTreeSet<&Zone> = self
            .splitting
            .zones()
            .chain(self.reference_exchanges.keys())
            .chain(self.merchant_flows.keys())
            .filter(|zone| *zone != reference)
            .collect();

        let mut shifts: ZonalValues = zones
            .into_iter()
            .map(|zone| {
                let shift = self.splitting.factor(zone) * total_shift
                    - self.reference_exchanges.get(zone).copied().unwrap_or(0.0)
                    - self.merchant_flows.get(zone).copied().unwrap_or(0.0);
                (zone.clone(), shift)
            })
            .collect();

        let reference_shift = -shifts.values().sum::<f64>();
        shifts.insert(reference.clone(), reference_shift);
        shifts
    }
}
