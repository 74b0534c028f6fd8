//! Weighted statistics rollup across a containment map.
//!
//! The same rule serves both special-case levels: municipal
//! arrondissements roll up into their parent commune, and communes roll up
//! into cantons. Children arrive with independently computed quantiles, so
//! the parent median is the count-weighted mean of child medians and the
//! parent quartiles are plain means of the child quartiles — a documented
//! approximation, not a recomputed quantile.

use ahash::AHashMap;

use crate::types::{AreaStats, StatsTable};

#[derive(Default)]
struct Accumulator {
    weighted_sum: f64,
    weight: f64,
    count: u64,
    q25s: Vec<f64>,
    q75s: Vec<f64>,
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some((values.iter().sum::<f64>() / values.len() as f64).round())
    }
}

/// Roll child statistics up into parents along `containment`
/// (child code → parent code).
///
/// A parent is published only if its accumulated count reaches
/// `min_sales` and at least one child contributed a median. Children
/// absent from `child_stats` simply do not contribute; parents that end
/// up below threshold are omitted, never zero-filled.
pub fn rollup(
    child_stats: &StatsTable,
    containment: &AHashMap<String, String>,
    min_sales: u32,
) -> StatsTable {
    let mut acc: AHashMap<&str, Accumulator> = AHashMap::new();

    for (child, parent) in containment {
        let Some(stats) = child_stats.get(child) else { continue };
        let entry = acc.entry(parent.as_str()).or_default();
        let n = stats.n_sales as f64;
        entry.count += stats.n_sales as u64;
        if let Some(median) = stats.median_price_m2 {
            entry.weighted_sum += median * n;
            entry.weight += n;
        }
        if let Some(q25) = stats.q25 {
            entry.q25s.push(q25);
        }
        if let Some(q75) = stats.q75 {
            entry.q75s.push(q75);
        }
    }

    let mut parents = StatsTable::default();
    for (parent, a) in acc {
        if a.count < min_sales as u64 || a.weight <= 0.0 {
            continue;
        }
        parents.insert(
            parent.to_string(),
            AreaStats {
                median_price_m2: Some((a.weighted_sum / a.weight).round()),
                q25: mean(&a.q25s),
                q75: mean(&a.q75s),
                n_sales: a.count as u32,
            },
        );
    }
    parents
}
