//! Transaction deduplication.
//!
//! The raw feed has one row per lot; bulk building sales repeat the same
//! TOTAL price on every lot row, so dividing a row's price by its own
//! surface yields absurd price-per-m2 values. The document identifier that
//! would group lots is never populated in the source data, so lots are
//! grouped under a synthetic key instead: (mutation date, department code,
//! commune code, disposition number, price). Within a group the price is
//! kept once and surfaces are summed.

use anyhow::{Context, Result};
use polars::prelude::*;

/// Raw feed column names (as published).
pub const COL_DATE: &str = "Date mutation";
pub const COL_NATURE: &str = "Nature mutation";
pub const COL_DEPT: &str = "Code departement";
pub const COL_COMMUNE: &str = "Code commune";
pub const COL_POSTAL: &str = "Code postal";
pub const COL_COMMUNE_NAME: &str = "Commune";
pub const COL_TYPE: &str = "Type local";
pub const COL_PRICE: &str = "Valeur fonciere";
pub const COL_SURFACE: &str = "Surface reelle bati";
pub const COL_DISPOSITION: &str = "No disposition";

/// Residential property types retained for statistics.
const RESIDENTIAL_TYPES: [&str; 2] = ["Maison", "Appartement"];

/// Columns of the cleaned transaction table, in output order.
pub const CLEAN_COLUMNS: [&str; 11] = [
    "mutation_date",
    "nature",
    "dept_code",
    "commune_code",
    "postal_code",
    "commune_name",
    "insee_com",
    "price",
    "total_surface",
    "n_lots",
    "price_m2",
];

/// Parse a French-formatted decimal column (comma separator) to Float64.
/// Unparseable values become null and fall to the line filter.
fn french_decimal(name: &str) -> Expr {
    col(name)
        .str()
        .replace_all(lit(","), lit("."), true)
        .cast(DataType::Float64)
}

/// Keep only lines that can contribute to a residential sale: nature
/// "Vente", positive price and surface, residential property type. A
/// transaction mixing a residential and a non-residential lot keeps only
/// its residential lines in the surface sum, because filtering happens
/// before grouping.
fn line_filter() -> Expr {
    col(COL_NATURE)
        .eq(lit("Vente"))
        .and(col("price").gt(lit(0.0)))
        .and(col("surface").gt(lit(0.0)))
        .and(
            col(COL_TYPE)
                .eq(lit(RESIDENTIAL_TYPES[0]))
                .or(col(COL_TYPE).eq(lit(RESIDENTIAL_TYPES[1]))),
        )
}

/// Collapse raw transaction lines into one row per real sale.
///
/// Groups whose summed surface is not strictly positive are dropped, not
/// divided; price-per-m2 is therefore never a division by zero.
pub fn deduplicate(raw: DataFrame) -> Result<DataFrame> {
    raw.lazy()
        .with_columns([
            french_decimal(COL_PRICE).alias("price"),
            french_decimal(COL_SURFACE).alias("surface"),
        ])
        .filter(line_filter())
        .group_by([
            col(COL_DATE),
            col(COL_DEPT),
            col(COL_COMMUNE),
            col(COL_DISPOSITION),
            col("price"),
        ])
        .agg([
            col("surface").sum().alias("total_surface"),
            len().cast(DataType::UInt32).alias("n_lots"),
            col(COL_NATURE).first().alias("nature"),
            col(COL_POSTAL).first().alias("postal_code"),
            col(COL_COMMUNE_NAME).first().alias("commune_name"),
        ])
        .filter(col("total_surface").gt(lit(0.0)))
        .with_columns([
            (col("price") / col("total_surface")).alias("price_m2"),
            concat_str(
                [col(COL_DEPT), col(COL_COMMUNE).str().zfill(lit(3))],
                "",
                true,
            )
            .alias("insee_com"),
        ])
        .rename(
            [COL_DATE, COL_DEPT, COL_COMMUNE],
            ["mutation_date", "dept_code", "commune_code"],
            true,
        )
        .select(CLEAN_COLUMNS.map(col))
        .collect()
        .context("[pipeline::dedup] Failed to deduplicate raw transaction lines")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame(
        rows: &[(&str, &str, &str, &str, &str, &str, &str, &str, &str, &str)],
    ) -> DataFrame {
        // (date, nature, dept, commune, postal, name, type, price, surface, dispo)
        df!(
            COL_DATE => rows.iter().map(|r| r.0).collect::<Vec<_>>(),
            COL_NATURE => rows.iter().map(|r| r.1).collect::<Vec<_>>(),
            COL_DEPT => rows.iter().map(|r| r.2).collect::<Vec<_>>(),
            COL_COMMUNE => rows.iter().map(|r| r.3).collect::<Vec<_>>(),
            COL_POSTAL => rows.iter().map(|r| r.4).collect::<Vec<_>>(),
            COL_COMMUNE_NAME => rows.iter().map(|r| r.5).collect::<Vec<_>>(),
            COL_TYPE => rows.iter().map(|r| r.6).collect::<Vec<_>>(),
            COL_PRICE => rows.iter().map(|r| r.7).collect::<Vec<_>>(),
            COL_SURFACE => rows.iter().map(|r| r.8).collect::<Vec<_>>(),
            COL_DISPOSITION => rows.iter().map(|r| r.9).collect::<Vec<_>>(),
        )
        .unwrap()
    }

    fn single_row(df: &DataFrame) -> (f64, f64, u32, f64, String) {
        assert_eq!(df.height(), 1);
        (
            df.column("price").unwrap().f64().unwrap().get(0).unwrap(),
            df.column("total_surface").unwrap().f64().unwrap().get(0).unwrap(),
            df.column("n_lots").unwrap().u32().unwrap().get(0).unwrap(),
            df.column("price_m2").unwrap().f64().unwrap().get(0).unwrap(),
            df.column("insee_com").unwrap().str().unwrap().get(0).unwrap().to_string(),
        )
    }

    #[test]
    fn bulk_sale_collapses_to_one_transaction() {
        // Three lots of one sale: same date/dept/commune/dispo/price.
        let raw = raw_frame(&[
            ("02/01/2023", "Vente", "75", "101", "75001", "Paris 1er", "Appartement", "900000,00", "40,0", "1"),
            ("02/01/2023", "Vente", "75", "101", "75001", "Paris 1er", "Appartement", "900000,00", "35,0", "1"),
            ("02/01/2023", "Vente", "75", "101", "75001", "Paris 1er", "Appartement", "900000,00", "25,0", "1"),
        ]);
        let clean = deduplicate(raw).unwrap();
        let (price, surface, n_lots, price_m2, insee) = single_row(&clean);
        assert_eq!(price, 900_000.0);
        assert_eq!(surface, 100.0);
        assert_eq!(n_lots, 3);
        assert_eq!(price_m2, 9_000.0);
        assert_eq!(insee, "75101");
    }

    #[test]
    fn mixed_types_keep_only_residential_lines() {
        // Apartment + parking lot in the same disposition: the parking
        // surface must not enter the sum.
        let raw = raw_frame(&[
            ("03/05/2023", "Vente", "69", "381", "69001", "Lyon 1er", "Appartement", "500000,00", "50,0", "1"),
            ("03/05/2023", "Vente", "69", "381", "69001", "Lyon 1er", "Dependance", "500000,00", "12,0", "1"),
        ]);
        let clean = deduplicate(raw).unwrap();
        let (_, surface, n_lots, price_m2, _) = single_row(&clean);
        assert_eq!(surface, 50.0);
        assert_eq!(n_lots, 1);
        assert_eq!(price_m2, 10_000.0);
    }

    #[test]
    fn distinct_keys_stay_distinct() {
        let raw = raw_frame(&[
            ("02/01/2023", "Vente", "33", "063", "33000", "Bordeaux", "Maison", "400000,00", "120,0", "1"),
            ("02/01/2023", "Vente", "33", "063", "33000", "Bordeaux", "Maison", "400000,00", "95,0", "2"),
        ]);
        let clean = deduplicate(raw).unwrap();
        assert_eq!(clean.height(), 2);
    }

    #[test]
    fn non_sales_and_invalid_lines_are_dropped() {
        let raw = raw_frame(&[
            ("02/01/2023", "Echange", "33", "063", "33000", "Bordeaux", "Maison", "400000,00", "120,0", "1"),
            ("02/01/2023", "Vente", "33", "063", "33000", "Bordeaux", "Maison", "0,00", "120,0", "2"),
            ("02/01/2023", "Vente", "33", "063", "33000", "Bordeaux", "Maison", "400000,00", "0,0", "3"),
            ("02/01/2023", "Vente", "33", "063", "33000", "Bordeaux", "Local industriel", "400000,00", "800,0", "4"),
        ]);
        let clean = deduplicate(raw).unwrap();
        assert_eq!(clean.height(), 0);
    }

    #[test]
    fn insee_code_pads_commune_number() {
        let raw = raw_frame(&[
            ("02/01/2023", "Vente", "01", "53", "01000", "Bourg-en-Bresse", "Maison", "250000,00", "100,0", "1"),
        ]);
        let clean = deduplicate(raw).unwrap();
        let (_, _, _, _, insee) = single_row(&clean);
        assert_eq!(insee, "01053");
    }

    #[test]
    fn output_has_expected_schema() {
        let raw = raw_frame(&[
            ("02/01/2023", "Vente", "2A", "004", "20000", "Ajaccio", "Appartement", "300000,00", "60,0", "1"),
        ]);
        let clean = deduplicate(raw).unwrap();
        let names: Vec<&str> = clean.get_column_names_str();
        assert_eq!(names, CLEAN_COLUMNS.to_vec());
    }
}
