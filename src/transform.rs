//! Cleaning of the raw survey table.
//!
//! Column names are normalized, known-useless columns dropped, numeric
//! columns coerced from their French formatting, rate columns rescaled into
//! `[0, 1]`, unusable rows removed and the `insertion_ok` flag derived.

use tracing::{debug, info, warn};

use crate::aggregate::stats::{min_max, quantile};
use crate::columns::{EMPLOYMENT_RATE, INSERTION_FLAG, INSERTION_RATE};
use crate::table::{Column, Table};

/// Columns converted to numbers when present.
pub const NUMERIC_COLS: &[&str] = &[
    "taux_de_reponse",
    "poids_de_la_discipline",
    "taux_dinsertion",
    "taux_d_emploi",
    "taux_d_emploi_salarie_en_france",
    "emplois_cadre_ou_professions_intermediaires",
    "emplois_stables",
    "emplois_a_temps_plein",
    "salaire_net_median_des_emplois_a_temps_plein",
    "salaire_brut_annuel_estime",
    "de_diplomes_boursiers",
    "taux_de_chomage_regional",
    "salaire_net_mensuel_median_regional",
    "emplois_cadre",
    "emplois_exterieurs_a_la_region_de_luniversite",
    "femmes",
    "salaire_net_mensuel_regional_1er_quartile",
    "salaire_net_mensuel_regional_3eme_quartile",
    "nombre_de_reponses",
];

/// Numeric columns holding a share, standardized into `[0, 1]`.
pub const RATE_COLS: &[&str] = &[
    "taux_de_reponse",
    "taux_dinsertion",
    "taux_d_emploi",
    "taux_d_emploi_salarie_en_france",
    "emplois_cadre_ou_professions_intermediaires",
    "emplois_stables",
    "emplois_a_temps_plein",
    "de_diplomes_boursiers",
    "taux_de_chomage_regional",
    "emplois_cadre",
    "emplois_exterieurs_a_la_region_de_luniversite",
    "femmes",
];

/// Columns with no analytical use.
pub const DROP_COLS: &[&str] = &[
    "etablissementactuel",
    "cle_etab",
    "cle_disc",
    "id_paysage",
    "remarque",
    "numero_de_l_etablissement",
];

/// Known spellings of the employment rate header.
pub const ALIASES: &[(&str, &str)] = &[
    ("taux_emploi", EMPLOYMENT_RATE),
    ("taux d emploi", EMPLOYMENT_RATE),
    ("taux d'emploi", EMPLOYMENT_RATE),
    ("taux d\u{2019}emploi", EMPLOYMENT_RATE),
];

/// Tokens meaning "no value" in numeric cells ("ns" = non significatif).
const NUMERIC_SENTINELS: &[&str] = &["ns", "nan", "None", ""];

/// A column whose maximum exceeds this is taken to be in percent.
const PERCENT_THRESHOLD: f64 = 1.5;

/// Quantile of the insertion-rate distribution at which `insertion_ok` flips.
const INSERTION_OK_QUANTILE: f64 = 0.75;

/// Cleans a raw survey table. Never fails: bad cells become nulls.
#[tracing::instrument(skip_all, fields(rows_in = raw.len()))]
pub fn transform(raw: Table) -> Table {
    let mut data = raw;

    data.rename_all(|name| name.trim().to_string());

    for (alias, canonical) in ALIASES {
        if data.has_column(alias) && !data.has_column(canonical) {
            data.rename_column(alias, canonical);
        }
    }

    for name in DROP_COLS {
        data.drop_column(name);
    }

    for name in NUMERIC_COLS {
        if let Some(column) = data.drop_column(name) {
            data.insert_column(name, Column::Number(to_numeric(&column)));
        }
    }

    for name in RATE_COLS {
        if let Some(values) = data.numbers(name) {
            let standardized = standardize_rate(values);
            data.insert_column(name, Column::Number(standardized));
        }
    }

    if let Some(rates) = data.numbers(INSERTION_RATE) {
        let mask: Vec<bool> = rates.iter().map(|v| is_present(*v)).collect();
        data.retain_rows(&mask);
    }

    let flag = insertion_flag(&data);
    data.insert_column(INSERTION_FLAG, Column::Number(flag));

    log_diagnostics(&data);
    data
}

fn is_present(v: Option<f64>) -> bool {
    v.is_some_and(|x| !x.is_nan())
}

/// Parses one cell the way the survey formats numbers: `"85,3"` → `85.3`.
pub fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim().replace(',', ".");
    if NUMERIC_SENTINELS.contains(&cell.as_str()) {
        return None;
    }
    cell.parse::<f64>().ok().filter(|x| !x.is_nan())
}

fn to_numeric(column: &Column) -> Vec<Option<f64>> {
    match column {
        Column::Number(values) => values
            .iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect(),
        Column::Text(values) => values
            .iter()
            .map(|v| v.as_deref().and_then(parse_number))
            .collect(),
    }
}

/// Divides by 100 when the column looks like percentages, then clips.
pub fn standardize_rate(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let scale = match min_max(values) {
        Some((_, max)) if max > PERCENT_THRESHOLD => 100.0,
        _ => 1.0,
    };
    values
        .iter()
        .map(|v| v.map(|x| (x / scale).clamp(0.0, 1.0)))
        .collect()
}

fn insertion_flag(data: &Table) -> Vec<Option<f64>> {
    let zeros = vec![Some(0.0); data.len()];
    let Some(rates) = data.numbers(INSERTION_RATE) else {
        return zeros;
    };
    let Some(threshold) = quantile(rates, INSERTION_OK_QUANTILE) else {
        return zeros;
    };
    rates
        .iter()
        .map(|v| Some(if v.is_some_and(|x| x >= threshold) { 1.0 } else { 0.0 }))
        .collect()
}

fn log_diagnostics(data: &Table) {
    let has_insertion = data.has_column(INSERTION_RATE);
    match data.numbers(EMPLOYMENT_RATE) {
        Some(values) => {
            let nulls = values.iter().filter(|v| !is_present(**v)).count();
            let (min, max) = min_max(values).unzip();
            info!(
                rows = data.len(),
                has_insertion,
                employment_nulls = nulls,
                employment_min = ?min,
                employment_max = ?max,
                "Transform complete"
            );
        }
        None => {
            warn!(
                rows = data.len(),
                has_insertion, "taux_d_emploi absent, check the exact CSV header"
            );
        }
    }
    debug!(columns = ?data.column_names(), "Cleaned columns");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_from_reader;

    fn table(csv: &str) -> Table {
        extract_from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_number_handles_french_format() {
        assert_eq!(parse_number(" 85,3 "), Some(85.3));
        assert_eq!(parse_number("ns"), None);
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number("None"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn test_comma_percent_becomes_fraction() {
        let out = transform(table("taux_dinsertion\n85,3\n90\n"));
        let rates = out.numbers("taux_dinsertion").unwrap();
        assert!((rates[0].unwrap() - 0.853).abs() < 1e-12);
        assert!((rates[1].unwrap() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_rates_are_clipped_into_unit_interval() {
        let out = transform(table(
            "taux_dinsertion;femmes;taux_d_emploi\n50;0,2;-0,1\n120;1,3;0,5\n99;ns;1,2\n",
        ));
        for name in RATE_COLS {
            if let Some(values) = out.numbers(name) {
                assert!(values.iter().flatten().all(|v| (0.0..=1.0).contains(v)));
            }
        }
        assert_eq!(out.numbers("taux_dinsertion").unwrap()[1], Some(1.0));
        assert_eq!(out.numbers("femmes").unwrap()[1], Some(1.0));
        assert_eq!(out.numbers("femmes").unwrap()[2], None);
        assert_eq!(out.numbers("taux_d_emploi").unwrap()[0], Some(0.0));
    }

    #[test]
    fn test_rows_without_insertion_rate_are_dropped() {
        let out = transform(table("domaine;taux_dinsertion\nA;80\nB;ns\nC;\nD;70\n"));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_alias_and_whitespace_normalization() {
        let out = transform(table(" taux d'emploi ;taux_dinsertion;cle_etab\n0,9;0,8;x\n"));
        assert!(out.has_column("taux_d_emploi"));
        assert!(!out.has_column("cle_etab"));
        assert_eq!(out.numbers("taux_d_emploi").unwrap()[0], Some(0.9));
    }

    #[test]
    fn test_alias_does_not_override_canonical_column() {
        let out = transform(table("taux_emploi;taux_d_emploi;taux_dinsertion\n0,1;0,2;0,3\n"));
        assert!(out.has_column("taux_emploi"));
        assert_eq!(out.numbers("taux_d_emploi").unwrap()[0], Some(0.2));
    }

    #[test]
    fn test_insertion_flag_marks_top_quartile() {
        let out = transform(table("taux_dinsertion\n10\n20\n30\n40\n50\n"));
        assert_eq!(
            out.numbers(INSERTION_FLAG).unwrap(),
            &[Some(0.0), Some(0.0), Some(0.0), Some(1.0), Some(1.0)]
        );
    }

    #[test]
    fn test_insertion_flag_defaults_to_zero() {
        let out = transform(table("domaine\nA\nB\n"));
        assert_eq!(out.numbers(INSERTION_FLAG).unwrap(), &[Some(0.0), Some(0.0)]);

        let out = transform(table("taux_dinsertion\nns\n"));
        assert!(out.is_empty());
        assert!(out.has_column(INSERTION_FLAG));
    }
}
