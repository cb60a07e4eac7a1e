//! Weighted aggregates written by the batch pipeline.
//!
//! Each grouping yields rows `{key, taux_dinsertion_moy, taux_emploi_moy,
//! salaire_median, n}`. Missing source columns are an error here.

use crate::aggregate::grouping::{AggregateTable, GroupSpec, Metric, SortOrder, aggregate};
use crate::columns::{
    ACADEMY, EMPLOYMENT_RATE, FIELD, INSERTION_RATE, MEDIAN_SALARY, REGION, RESPONSES, YEAR,
};
use crate::error::AggregateError;
use crate::reference::ReferenceTables;
use crate::table::{Column, Table};

pub const INSERTION_MEAN: &str = "taux_dinsertion_moy";
pub const EMPLOYMENT_MEAN: &str = "taux_emploi_moy";
pub const SALARY_MEDIAN: &str = "salaire_median";
pub const WEIGHT_TOTAL: &str = "n";

/// Alternative spellings tried for the region aggregate's inputs.
const ACADEMY_CANDIDATES: &[&str] = &[ACADEMY, "Académie", "nom_academie"];
const WEIGHT_CANDIDATES: &[&str] = &[RESPONSES, "n", "reponses", "nb_reponses"];
const INSERTION_CANDIDATES: &[&str] = &[INSERTION_RATE, "taux_d_insertion", "taux_insertion"];
const EMPLOYMENT_CANDIDATES: &[&str] = &[EMPLOYMENT_RATE, "taux_emploi"];
const SALARY_CANDIDATES: &[&str] = &[MEDIAN_SALARY, "salaire_median", "salaire_net_median"];

fn outcome_spec(
    grouping: &str,
    key: &str,
    insertion: &str,
    employment: &str,
    salary: &str,
) -> GroupSpec {
    GroupSpec::new(grouping, key)
        .metric(Metric::weighted_mean(INSERTION_MEAN, insertion))
        .metric(Metric::weighted_mean(EMPLOYMENT_MEAN, employment))
        .metric(Metric::weighted_median(SALARY_MEDIAN, salary))
        .metric(Metric::weight_sum(WEIGHT_TOTAL))
        .sort(SortOrder::ByMetricDesc(INSERTION_MEAN.to_string()))
}

fn standard_spec(grouping: &str, key: &str) -> GroupSpec {
    outcome_spec(grouping, key, INSERTION_RATE, EMPLOYMENT_RATE, MEDIAN_SALARY)
}

/// Per survey year, ordered by year.
pub fn by_year(table: &Table) -> Result<AggregateTable, AggregateError> {
    aggregate(table, &standard_spec("by_year", YEAR).sort(SortOrder::ByKey))
}

/// Per field of study, best insertion first.
pub fn by_domaine(table: &Table) -> Result<AggregateTable, AggregateError> {
    aggregate(table, &standard_spec("by_domaine", FIELD))
}

/// Per academy, best insertion first.
pub fn by_academie(table: &Table) -> Result<AggregateTable, AggregateError> {
    aggregate(table, &standard_spec("by_academie", ACADEMY))
}

fn pick_column<'a>(table: &Table, candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().find(|c| table.has_column(c))
}

/// Per region, best insertion first.
///
/// Academies are mapped through `refs`; rows with an unmapped academy are
/// left out. Input columns are resolved through a few known spellings.
pub fn by_region(table: &Table, refs: &ReferenceTables) -> Result<AggregateTable, AggregateError> {
    let resolved = [
        ("academie", pick_column(table, ACADEMY_CANDIDATES)),
        ("insertion", pick_column(table, INSERTION_CANDIDATES)),
        ("emploi", pick_column(table, EMPLOYMENT_CANDIDATES)),
        ("salaire", pick_column(table, SALARY_CANDIDATES)),
    ];
    let missing: Vec<String> = resolved
        .iter()
        .filter(|(_, c)| c.is_none())
        .map(|(label, _)| label.to_string())
        .collect();

    let [Some(academy), Some(insertion), Some(employment), Some(salary)] =
        resolved.map(|(_, c)| c)
    else {
        return Err(AggregateError::MissingColumns {
            grouping: "by_region".into(),
            missing,
        });
    };

    let regions: Vec<Option<String>> = match table.column(academy) {
        Some(Column::Text(values)) => values
            .iter()
            .map(|a| a.as_deref().and_then(|a| refs.region_of(a)).map(str::to_string))
            .collect(),
        _ => vec![None; table.len()],
    };

    let mut with_region = table.clone();
    with_region.insert_column(REGION, Column::Text(regions));

    let mut spec = outcome_spec("by_region", REGION, insertion, employment, salary);
    if let Some(weight) = pick_column(table, WEIGHT_CANDIDATES) {
        spec = spec.weight_column(weight);
    }
    aggregate(&with_region, &spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::GroupKey;

    fn text(values: &[&str]) -> Column {
        Column::Text(values.iter().map(|s| Some(s.to_string())).collect())
    }

    fn num(values: &[f64]) -> Column {
        Column::Number(values.iter().copied().map(Some).collect())
    }

    fn cleaned() -> Table {
        Table::from_columns(vec![
            ("annee".into(), num(&[2021.0, 2020.0, 2021.0, 2020.0])),
            ("domaine".into(), text(&["DEG", "STS", "DEG", "LLA"])),
            ("academie".into(), text(&["Lyon", "Grenoble", "Paris", "Atlantis"])),
            ("taux_dinsertion".into(), num(&[0.5, 0.9, 0.8, 0.7])),
            ("taux_d_emploi".into(), num(&[0.6, 0.95, 0.85, 0.75])),
            (
                "salaire_net_median_des_emplois_a_temps_plein".into(),
                num(&[20000.0, 25000.0, 30000.0, 1.0]),
            ),
            ("nombre_de_reponses".into(), num(&[10.0, 1.0, 30.0, 2.0])),
        ])
    }

    #[test]
    fn test_by_year_sorted_by_year() {
        let out = by_year(&cleaned()).unwrap();
        let years: Vec<String> = out.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(years, ["2020", "2021"]);

        let y2021 = GroupKey::Number(2021.0);
        assert!((out.value(&y2021, INSERTION_MEAN).unwrap() - 0.725).abs() < 1e-12);
        assert_eq!(out.value(&y2021, SALARY_MEDIAN), Some(30000.0));
        assert_eq!(out.value(&y2021, WEIGHT_TOTAL), Some(40.0));
    }

    #[test]
    fn test_by_domaine_sorted_by_insertion_desc() {
        let out = by_domaine(&cleaned()).unwrap();
        let keys: Vec<String> = out.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["STS", "DEG", "LLA"]);
    }

    #[test]
    fn test_by_region_drops_unmapped_academies() {
        let out = by_region(&cleaned(), &ReferenceTables::builtin()).unwrap();
        let keys: Vec<String> = out.keys().iter().map(|k| k.to_string()).collect();
        // Île-de-France (0.8) ahead of Auvergne-Rhône-Alpes (5.9 / 11)
        assert_eq!(keys, ["Île-de-France", "Auvergne-Rhône-Alpes"]);

        let ara = GroupKey::Text("Auvergne-Rhône-Alpes".into());
        assert_eq!(out.value(&ara, WEIGHT_TOTAL), Some(11.0));
    }

    #[test]
    fn test_by_region_resolves_alternate_spellings() {
        let table = Table::from_columns(vec![
            ("nom_academie".into(), text(&["Lille"])),
            ("taux_insertion".into(), num(&[0.4])),
            ("taux_d_emploi".into(), num(&[0.5])),
            ("salaire_median".into(), num(&[1800.0])),
            ("nb_reponses".into(), num(&[4.0])),
        ]);
        let out = by_region(&table, &ReferenceTables::builtin()).unwrap();
        let hdf = GroupKey::Text("Hauts-de-France".into());
        assert_eq!(out.value(&hdf, WEIGHT_TOTAL), Some(4.0));
        assert_eq!(out.value(&hdf, SALARY_MEDIAN), Some(1800.0));
    }

    #[test]
    fn test_by_region_missing_columns_error_names_them() {
        let table = Table::from_columns(vec![("domaine".into(), text(&["A"]))]);
        let err = by_region(&table, &ReferenceTables::builtin()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("academie"));
        assert!(msg.contains("salaire"));
    }

    #[test]
    fn test_batch_missing_column_is_error() {
        let mut table = cleaned();
        table.drop_column("taux_d_emploi");
        let err = by_academie(&table).unwrap_err();
        assert!(err.to_string().contains("taux_d_emploi"));
    }
}
