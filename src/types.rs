use std::fmt;
use std::str::FromStr;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// The five nested geographic levels, coarsest first.
///
/// Containment: commune ⊂ canton ⊂ department ⊂ region ⊂ country, with the
/// canton edge being irregular around Paris, Lyon and Marseille (those
/// cities have pseudo-cantons, see `refdata`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaLevel {
    Country,
    Region,
    Departement,
    Canton,
    Commune,
}

impl AreaLevel {
    pub const ALL: [AreaLevel; 5] = [
        AreaLevel::Country,
        AreaLevel::Region,
        AreaLevel::Departement,
        AreaLevel::Canton,
        AreaLevel::Commune,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AreaLevel::Country => "country",
            AreaLevel::Region => "region",
            AreaLevel::Departement => "departement",
            AreaLevel::Canton => "canton",
            AreaLevel::Commune => "commune",
        }
    }
}

impl fmt::Display for AreaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AreaLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "country" => Ok(AreaLevel::Country),
            "region" => Ok(AreaLevel::Region),
            "departement" => Ok(AreaLevel::Departement),
            "canton" => Ok(AreaLevel::Canton),
            "commune" => Ok(AreaLevel::Commune),
            other => Err(format!("unknown area level: {other}")),
        }
    }
}

/// Published price statistics for one area.
///
/// Values are rounded to whole currency units. Quartiles may be missing
/// when a rollup had no children carrying them; the sale count is always
/// present and at least the configured minimum for published records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaStats {
    pub median_price_m2: Option<f64>,
    pub q25: Option<f64>,
    pub q75: Option<f64>,
    pub n_sales: u32,
}

/// Statistics keyed by area code at one level.
pub type StatsTable = AHashMap<String, AreaStats>;

/// The full five-level statistics set produced by one pipeline run.
/// Replaced wholesale by a later run, never mutated in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsSet {
    pub country: StatsTable,
    pub region: StatsTable,
    pub departement: StatsTable,
    pub canton: StatsTable,
    pub commune: StatsTable,
}

impl StatsSet {
    pub fn level(&self, level: AreaLevel) -> &StatsTable {
        match level {
            AreaLevel::Country => &self.country,
            AreaLevel::Region => &self.region,
            AreaLevel::Departement => &self.departement,
            AreaLevel::Canton => &self.canton,
            AreaLevel::Commune => &self.commune,
        }
    }
}

/// One row of the top-expensive-communes report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopCommune {
    pub city: String,
    pub code: String,
    pub median_price_m2: f64,
    pub volume: u32,
}

#[cfg(test)]
mod tests {
    use super::{AreaLevel, AreaStats, StatsSet};

    #[test]
    fn stats_set_round_trips_through_json() {
        let mut set = StatsSet::default();
        set.commune.insert(
            "33063".into(),
            AreaStats {
                median_price_m2: Some(4_500.0),
                q25: Some(3_200.0),
                q75: None,
                n_sales: 42,
            },
        );
        let text = serde_json::to_string(&set).unwrap();
        let back: StatsSet = serde_json::from_str(&text).unwrap();
        assert_eq!(back.commune["33063"], set.commune["33063"]);
        assert!(back.canton.is_empty());
    }

    #[test]
    fn level_round_trips_through_str() {
        for level in AreaLevel::ALL {
            assert_eq!(level.as_str().parse::<AreaLevel>().unwrap(), level);
        }
    }

    #[test]
    fn unknown_level_is_rejected() {
        assert!("parcel".parse::<AreaLevel>().is_err());
    }
}
