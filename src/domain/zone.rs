use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Control area identifier (country code or EIC), normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Zone(String);

impl Zone {
    pub fn new(code: impl AsRef<str>) -> Result<Self, String> {
        let code = code.as_ref().trim();
        if code.is_empty() {
            return Err("zone code cannot be empty".to_string());
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(format!("invalid zone code: {code}"));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Zone::new(s)
    }
}

impl TryFrom<String> for Zone {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Zone::new(value)
    }
}

impl From<Zone> for String {
    fn from(zone: Zone) -> Self {
        zone.0
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-zone scalar values (MW or fractions). Ordered so that iteration,
/// logging and serialization are deterministic.
pub type ZonalValues = BTreeMap<Zone, f64>;

/// Sum of all values in a zonal vector
pub fn zonal_sum(values: &ZonalValues) -> f64 {
    values.values().sum()
}
