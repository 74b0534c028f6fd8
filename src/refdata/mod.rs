//! Static geographic reference data.
//!
//! Containment maps are loaded once per run into an immutable [`RefTables`]
//! value that is passed explicitly to the aggregator, keeping pipeline runs
//! reproducible and testable in isolation.

mod boundaries;

use ahash::AHashMap;
use anyhow::Result;

use crate::config::Settings;

/// Department → region codes (2016 regions, overseas included).
const DEPT_TO_REGION: &[(&str, &str)] = &[
    // Auvergne-Rhône-Alpes (84)
    ("01", "84"), ("03", "84"), ("07", "84"), ("15", "84"), ("26", "84"),
    ("38", "84"), ("42", "84"), ("43", "84"), ("63", "84"), ("69", "84"),
    ("73", "84"), ("74", "84"),
    // Bourgogne-Franche-Comté (27)
    ("21", "27"), ("25", "27"), ("39", "27"), ("58", "27"), ("70", "27"),
    ("71", "27"), ("89", "27"), ("90", "27"),
    // Bretagne (53)
    ("22", "53"), ("29", "53"), ("35", "53"), ("56", "53"),
    // Centre-Val de Loire (24)
    ("18", "24"), ("28", "24"), ("36", "24"), ("37", "24"), ("41", "24"),
    ("45", "24"),
    // Corse (94)
    ("2A", "94"), ("2B", "94"),
    // Grand Est (44)
    ("08", "44"), ("10", "44"), ("51", "44"), ("52", "44"), ("54", "44"),
    ("55", "44"), ("57", "44"), ("67", "44"), ("68", "44"), ("88", "44"),
    // Hauts-de-France (32)
    ("02", "32"), ("59", "32"), ("60", "32"), ("62", "32"), ("80", "32"),
    // Île-de-France (11)
    ("75", "11"), ("77", "11"), ("78", "11"), ("91", "11"), ("92", "11"),
    ("93", "11"), ("94", "11"), ("95", "11"),
    // Normandie (28)
    ("14", "28"), ("27", "28"), ("50", "28"), ("61", "28"), ("76", "28"),
    // Nouvelle-Aquitaine (75)
    ("16", "75"), ("17", "75"), ("19", "75"), ("23", "75"), ("24", "75"),
    ("33", "75"), ("40", "75"), ("47", "75"), ("64", "75"), ("79", "75"),
    ("86", "75"), ("87", "75"),
    // Occitanie (76)
    ("09", "76"), ("11", "76"), ("12", "76"), ("30", "76"), ("31", "76"),
    ("32", "76"), ("34", "76"), ("46", "76"), ("48", "76"), ("65", "76"),
    ("66", "76"), ("81", "76"), ("82", "76"),
    // Pays de la Loire (52)
    ("44", "52"), ("49", "52"), ("53", "52"), ("72", "52"), ("85", "52"),
    // Provence-Alpes-Côte d'Azur (93)
    ("04", "93"), ("05", "93"), ("06", "93"), ("13", "93"), ("83", "93"),
    ("84", "93"),
    // Overseas
    ("971", "01"), ("972", "02"), ("973", "03"), ("974", "04"), ("976", "06"),
];

/// The three cities split into municipal arrondissements in the source
/// data: (parent commune code, pseudo-canton code, display name).
pub const PLM_CITIES: &[(&str, &str, &str)] = &[
    ("75056", "75_PARIS", "Paris"),
    ("69123", "69_LYON", "Lyon"),
    ("13055", "13_MARSEILLE", "Marseille"),
];

/// Immutable containment maps for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RefTables {
    /// Department code → region code.
    pub dept_to_region: AHashMap<String, String>,
    /// Municipal arrondissement code → parent commune code.
    pub arr_to_commune: AHashMap<String, String>,
    /// Commune code → canton code (pseudo-cantons injected for PLM).
    /// Empty when the boundary shapefile is unavailable; the canton rollup
    /// is then skipped rather than failing the run.
    pub commune_to_canton: AHashMap<String, String>,
}

impl RefTables {
    /// Load all reference tables. Static maps always succeed; the
    /// shapefile-derived commune→canton map degrades to empty with a
    /// warning when the boundary data is missing.
    pub fn load(settings: &Settings) -> Result<Self> {
        let commune_shp = settings.commune_shapefile();
        let commune_to_canton = if commune_shp.exists() {
            boundaries::commune_to_canton_map(&commune_shp)?
        } else {
            log::warn!(
                "[refdata] commune shapefile missing at {}; canton rollup will be skipped",
                commune_shp.display()
            );
            AHashMap::new()
        };

        Ok(Self {
            dept_to_region: dept_to_region(),
            arr_to_commune: arrondissement_to_commune(),
            commune_to_canton,
        })
    }

    /// Build from pre-computed maps (tests, callers with their own data).
    pub fn from_maps(commune_to_canton: AHashMap<String, String>) -> Self {
        Self {
            dept_to_region: dept_to_region(),
            arr_to_commune: arrondissement_to_commune(),
            commune_to_canton,
        }
    }

    /// Sorted department codes, used to drive per-department batching.
    pub fn departments(&self) -> Vec<String> {
        let mut depts: Vec<String> = self.dept_to_region.keys().cloned().collect();
        depts.sort();
        depts
    }
}

/// Department → region as an owned map.
pub fn dept_to_region() -> AHashMap<String, String> {
    DEPT_TO_REGION.iter().map(|(d, r)| (d.to_string(), r.to_string())).collect()
}

/// Arrondissement → parent commune for Paris (75101–75120), Lyon
/// (69381–69389) and Marseille (13201–13216).
pub fn arrondissement_to_commune() -> AHashMap<String, String> {
    let mut map = AHashMap::new();
    for i in 101..=120 {
        map.insert(format!("75{i:03}"), "75056".to_string());
    }
    for i in 381..=389 {
        map.insert(format!("69{i:03}"), "69123".to_string());
    }
    for i in 201..=216 {
        map.insert(format!("13{i:03}"), "13055".to_string());
    }
    map
}

/// Inject the PLM pseudo-canton codes into a commune→canton map. These
/// cities have no true canton in the boundary reference data, so their
/// rolled-up commune records need manual targets.
pub fn inject_pseudo_cantons(map: &mut AHashMap<String, String>) {
    for (commune, canton, _) in PLM_CITIES {
        map.insert(commune.to_string(), canton.to_string());
    }
}
