//! Hierarchical price statistics.
//!
//! Country, region and department come from single grouped aggregations
//! over the cleaned transaction table; communes are computed per
//! department in sequential batches to bound peak memory; cantons are
//! derived from commune statistics through the containment map, never by
//! re-querying below commune granularity. Quantiles are delegated to the
//! query engine; the rollup approximation lives in [`crate::pipeline::rollup`].

use ahash::AHashMap;
use anyhow::{Context, Result};
use polars::prelude::*;

use crate::config::Settings;
use crate::pipeline::rollup::rollup;
use crate::refdata::{RefTables, PLM_CITIES};
use crate::types::{AreaLevel, AreaStats, StatsSet, StatsTable, TopCommune};

/// Area code → display name, collected opportunistically along commune
/// statistics.
pub type NameTable = AHashMap<String, String>;

pub struct Aggregator<'a> {
    settings: &'a Settings,
    refs: &'a RefTables,
}

impl<'a> Aggregator<'a> {
    pub fn new(settings: &'a Settings, refs: &'a RefTables) -> Self {
        Self { settings, refs }
    }

    /// Global validity filter: plausible price band, sales only.
    fn valid_filter(&self) -> Expr {
        col("price_m2")
            .gt_eq(lit(self.settings.min_price_m2))
            .and(col("price_m2").lt_eq(lit(self.settings.max_price_m2)))
            .and(col("nature").eq(lit("Vente")))
    }

    fn quantile_aggs() -> [Expr; 4] {
        [
            col("price_m2").quantile(lit(0.5), QuantileMethod::Linear).alias("median"),
            col("price_m2").quantile(lit(0.25), QuantileMethod::Linear).alias("q25"),
            col("price_m2").quantile(lit(0.75), QuantileMethod::Linear).alias("q75"),
            len().cast(DataType::UInt32).alias("n_sales"),
        ]
    }

    /// One grouped aggregation: quantiles + count per `key`, minimum
    /// sample size applied, results keyed by the stringified group code.
    fn grouped_stats(&self, lf: LazyFrame, key: Expr) -> Result<(StatsTable, NameTable)> {
        let mut aggs = Self::quantile_aggs().to_vec();
        aggs.push(col("commune_name").first().alias("name"));

        let df = lf
            .filter(self.valid_filter())
            .group_by([key.alias("code")])
            .agg(aggs)
            .filter(col("n_sales").gt_eq(lit(self.settings.min_sales)))
            .collect()
            .context("[pipeline::stats] Grouped aggregation failed")?;

        extract_stats(&df)
    }

    /// Country-wide statistics under the single key `FR`.
    pub fn country(&self, lf: LazyFrame) -> Result<StatsTable> {
        log::info!("[pipeline::stats] computing country stats");
        let df = lf
            .filter(self.valid_filter())
            .select(Self::quantile_aggs())
            .collect()
            .context("[pipeline::stats] Country aggregation failed")?;

        let mut table = StatsTable::default();
        if df.height() == 1 {
            if let Some(stats) = row_stats(&df, 0)? {
                if stats.n_sales >= self.settings.min_sales {
                    table.insert("FR".to_string(), stats);
                }
            }
        }
        Ok(table)
    }

    /// Department statistics, grouped by department code.
    pub fn department(&self, lf: LazyFrame) -> Result<StatsTable> {
        log::info!("[pipeline::stats] computing department stats");
        Ok(self.grouped_stats(lf, col("dept_code"))?.0)
    }

    /// Region statistics. The region code is derived from the department
    /// code through the static mapping, expressed as a join against a
    /// small reference frame.
    pub fn region(&self, lf: LazyFrame) -> Result<StatsTable> {
        log::info!("[pipeline::stats] computing region stats");
        let mut depts = Vec::with_capacity(self.refs.dept_to_region.len());
        let mut regions = Vec::with_capacity(self.refs.dept_to_region.len());
        for (dept, region) in &self.refs.dept_to_region {
            depts.push(dept.clone());
            regions.push(region.clone());
        }
        let mapping = df!("dept_code" => depts, "region_code" => regions)
            .context("[pipeline::stats] Failed to build dept→region frame")?;

        // Inner join drops departments without a region mapping.
        let joined = lf.join(
            mapping.lazy(),
            [col("dept_code")],
            [col("dept_code")],
            JoinArgs::new(JoinType::Inner),
        );
        Ok(self.grouped_stats(joined, col("region_code"))?.0)
    }

    /// Commune statistics, computed per department in sequential batches
    /// (commune cardinality is large; batching bounds peak memory), then
    /// folding PLM arrondissements into their parent commune records.
    pub fn commune(&self, lf: LazyFrame) -> Result<(StatsTable, NameTable)> {
        log::info!("[pipeline::stats] computing commune stats (batched by department)");
        let mut stats = StatsTable::default();
        let mut names = NameTable::default();

        for dept in self.refs.departments() {
            let batch = lf.clone().filter(col("dept_code").eq(lit(dept.as_str())));
            let (batch_stats, batch_names) = self.grouped_stats(batch, col("insee_com"))?;
            stats.extend(batch_stats);
            names.extend(batch_names);
        }

        // Arrondissements stay published under their own codes; the three
        // parent communes are added on top via the weighted rollup.
        let parents = rollup(&stats, &self.refs.arr_to_commune, self.settings.min_sales);
        stats.extend(parents);
        for (commune, _, name) in PLM_CITIES {
            names.insert(commune.to_string(), name.to_string());
        }

        Ok((stats, names))
    }

    /// Canton statistics, derived from already-computed commune statistics
    /// through the commune→canton containment map. Correctness is bounded
    /// by the commune-level approximation; the transaction feed is never
    /// scanned below commune granularity here.
    pub fn canton(&self, commune_stats: &StatsTable) -> StatsTable {
        if self.refs.commune_to_canton.is_empty() {
            log::warn!("[pipeline::stats] commune→canton map is empty; skipping canton rollup");
            return StatsTable::default();
        }
        log::info!("[pipeline::stats] computing canton stats (from commune aggregation)");
        rollup(commune_stats, &self.refs.commune_to_canton, self.settings.min_sales)
    }

    /// Compute the full five-level set plus the commune name table.
    pub fn compute_all(&self, lf: LazyFrame) -> Result<(StatsSet, NameTable)> {
        let (commune, names) = self.commune(lf.clone())?;
        let canton = self.canton(&commune);
        let set = StatsSet {
            country: self.country(lf.clone())?,
            region: self.region(lf.clone())?,
            departement: self.department(lf)?,
            canton,
            commune,
        };
        Ok((set, names))
    }

    /// Compute a single level (serve-side recomputation path). Canton
    /// needs the commune table first; the others are direct.
    pub fn level_stats(&self, lf: LazyFrame, level: AreaLevel) -> Result<StatsTable> {
        match level {
            AreaLevel::Country => self.country(lf),
            AreaLevel::Region => self.region(lf),
            AreaLevel::Departement => self.department(lf),
            AreaLevel::Commune => Ok(self.commune(lf)?.0),
            AreaLevel::Canton => Ok(self.canton(&self.commune(lf)?.0)),
        }
    }

    /// Top-10 most expensive communes by median, restricted to communes
    /// with enough volume to be reliable.
    pub fn top_expensive(&self, commune_stats: &StatsTable, names: &NameTable) -> Vec<TopCommune> {
        let mut top: Vec<TopCommune> = commune_stats
            .iter()
            .filter(|(_, s)| s.n_sales >= self.settings.top_min_sales)
            .filter_map(|(code, s)| {
                s.median_price_m2.map(|median| TopCommune {
                    city: names.get(code).cloned().unwrap_or_else(|| code.clone()),
                    code: code.clone(),
                    median_price_m2: median,
                    volume: s.n_sales,
                })
            })
            .collect();
        top.sort_by(|a, b| b.median_price_m2.total_cmp(&a.median_price_m2));
        top.truncate(10);
        top
    }
}

/// Read one row of quantile aggregates out of a result frame. Returns
/// `None` when the median is null (empty input under a full-frame
/// aggregation); nulls are never forwarded into published statistics.
fn row_stats(df: &DataFrame, idx: usize) -> Result<Option<AreaStats>> {
    let median = df.column("median")?.f64()?.get(idx);
    let q25 = df.column("q25")?.f64()?.get(idx);
    let q75 = df.column("q75")?.f64()?.get(idx);
    let n_sales = df.column("n_sales")?.u32()?.get(idx).unwrap_or(0);

    Ok(median.map(|median| AreaStats {
        median_price_m2: Some(median.round()),
        q25: q25.map(f64::round),
        q75: q75.map(f64::round),
        n_sales,
    }))
}

/// Turn a grouped result frame (`code`, aggregates, `name`) into tables.
fn extract_stats(df: &DataFrame) -> Result<(StatsTable, NameTable)> {
    let mut stats = StatsTable::default();
    let mut names = NameTable::default();

    let codes = df.column("code")?.str()?.clone();
    let name_col = df.column("name")?.str()?.clone();
    for idx in 0..df.height() {
        let Some(code) = codes.get(idx) else { continue };
        let Some(row) = row_stats(df, idx)? else { continue };
        stats.insert(code.to_string(), row);
        if let Some(name) = name_col.get(idx) {
            names.insert(code.to_string(), name.to_string());
        }
    }
    Ok((stats, names))
}
