//! Boundary reference data read from the Admin Express shapefiles.

use std::path::Path;

use ahash::AHashMap;
use anyhow::{Context, Result};
use shapefile::dbase::{FieldValue, Record};
use shapefile::Reader;

/// Pull a trimmed string attribute out of a dbase record.
fn field_str(record: &Record, name: &str) -> Option<String> {
    match record.get(name) {
        Some(FieldValue::Character(Some(s))) => {
            let s = s.trim();
            if s.is_empty() { None } else { Some(s.to_string()) }
        }
        Some(FieldValue::Numeric(Some(n))) => Some(format!("{n}")),
        _ => None,
    }
}

/// Build the commune→canton containment map from the COMMUNE shapefile.
///
/// Canton codes are synthesized as `INSEE_DEP_INSEE_CAN` (the canton layer
/// itself has no stable standalone code). Communes without a canton
/// attribute are skipped; the PLM pseudo-cantons are injected afterwards
/// since those cities do not exist in the canton reference data.
pub(crate) fn commune_to_canton_map(path: &Path) -> Result<AHashMap<String, String>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("[refdata::boundaries] Failed to open shapefile: {}", path.display()))?;

    let mut map = AHashMap::new();
    for result in reader.iter_shapes_and_records() {
        let (_, record) = result.context("[refdata::boundaries] Error reading shape+record")?;
        let commune = field_str(&record, "INSEE_COM");
        let dept = field_str(&record, "INSEE_DEP");
        let canton = field_str(&record, "INSEE_CAN");
        if let (Some(commune), Some(dept), Some(canton)) = (commune, dept, canton) {
            map.insert(commune, format!("{dept}_{canton}"));
        }
    }

    super::inject_pseudo_cantons(&mut map);
    log::info!("[refdata::boundaries] commune→canton map: {} entries", map.len());
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapefile::dbase::FieldValue;

    fn record(pairs: &[(&str, Option<&str>)]) -> Record {
        let mut record = Record::default();
        for (name, value) in pairs {
            record.insert(
                name.to_string(),
                FieldValue::Character(value.map(str::to_string)),
            );
        }
        record
    }

    #[test]
    fn field_str_trims_and_rejects_empty() {
        let r = record(&[("INSEE_COM", Some(" 01001 ")), ("INSEE_CAN", Some("")), ("NOM", None)]);
        assert_eq!(field_str(&r, "INSEE_COM").as_deref(), Some("01001"));
        assert_eq!(field_str(&r, "INSEE_CAN"), None);
        assert_eq!(field_str(&r, "NOM"), None);
        assert_eq!(field_str(&r, "ABSENT"), None);
    }
}
