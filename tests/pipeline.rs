//! End-to-end pipeline test: raw feed on disk through deduplication,
//! aggregation and JSON persistence, using only the public API.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use foncier::config::Settings;
use foncier::pipeline::stats::Aggregator;
use foncier::refdata::RefTables;
use foncier::store::Store;

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("foncier-e2e-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(dir.join("raw")).unwrap();
    dir
}

const HEADER: &str = "Date mutation|Nature mutation|Code departement|Code commune|Code postal|Commune|Type local|Valeur fonciere|Surface reelle bati|No disposition";

fn write_raw_feed(dir: &PathBuf) {
    let mut file = File::create(dir.join("raw").join("valeursfoncieres-2023.txt")).unwrap();
    writeln!(file, "{HEADER}").unwrap();
    // A bulk sale in Paris 1er: three lots, one real transaction at
    // 900000 / 100m2 = 9000 per m2.
    for surface in ["40,0", "35,0", "25,0"] {
        writeln!(
            file,
            "02/01/2023|Vente|75|101|75001|Paris 1er|Appartement|900000,00|{surface}|1"
        )
        .unwrap();
    }
    // Simple sales in Bordeaux at 4000 and 6000 per m2.
    writeln!(file, "03/01/2023|Vente|33|063|33000|Bordeaux|Maison|400000,00|100,0|1").unwrap();
    writeln!(file, "04/01/2023|Vente|33|063|33000|Bordeaux|Maison|600000,00|100,0|1").unwrap();
    // Lines the filter must drop: an exchange, a zero price, a warehouse.
    writeln!(file, "05/01/2023|Echange|33|063|33000|Bordeaux|Maison|100000,00|80,0|2").unwrap();
    writeln!(file, "05/01/2023|Vente|33|063|33000|Bordeaux|Maison|0,00|80,0|3").unwrap();
    writeln!(file, "05/01/2023|Vente|33|063|33000|Bordeaux|Local industriel|500000,00|800,0|4")
        .unwrap();
}

#[test]
fn raw_feed_to_published_statistics() {
    let dir = scratch_dir();
    write_raw_feed(&dir);

    let mut settings = Settings::with_data_dir(&dir);
    settings.min_sales = 1;
    settings.top_min_sales = 1;

    // Opening the store builds the transaction table from the raw feed.
    let store = Store::open(&settings).unwrap();
    assert_eq!(store.transaction_count(), 3);

    let refs = RefTables::from_maps(Default::default());
    let aggregator = Aggregator::new(&settings, &refs);
    let (set, names) = aggregator.compute_all(store.scan_transactions().unwrap()).unwrap();

    // Country: medians over {9000, 4000, 6000}.
    let fr = &set.country["FR"];
    assert_eq!(fr.n_sales, 3);
    assert_eq!(fr.median_price_m2, Some(6_000.0));

    // Departments and their regions.
    assert_eq!(set.departement["33"].median_price_m2, Some(5_000.0));
    assert_eq!(set.departement["75"].median_price_m2, Some(9_000.0));
    assert_eq!(set.region["75"].n_sales, 2); // Nouvelle-Aquitaine
    assert_eq!(set.region["11"].n_sales, 1); // Île-de-France

    // Communes: the arrondissement is published and rolled into Paris.
    assert_eq!(set.commune["75101"].median_price_m2, Some(9_000.0));
    assert_eq!(set.commune["75056"].median_price_m2, Some(9_000.0));
    assert_eq!(set.commune["33063"].n_sales, 2);
    assert_eq!(names["75056"], "Paris");

    // No canton reference data, so no canton statistics.
    assert!(set.canton.is_empty());

    // Persist and reload through the store.
    store.write_stats(&set).unwrap();
    let reloaded = store.load_stats().unwrap();
    assert_eq!(reloaded.commune["75056"], set.commune["75056"]);

    let top = aggregator.top_expensive(&set.commune, &names);
    assert_eq!(top[0].median_price_m2, 9_000.0);
    assert_eq!(top.last().unwrap().code, "33063");
    store.write_top(&top).unwrap();
    assert_eq!(store.load_top().unwrap().len(), top.len());

    std::fs::remove_dir_all(&dir).unwrap();
}
