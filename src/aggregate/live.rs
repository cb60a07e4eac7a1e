//! Aggregates recomputed on request from the cleaned snapshot.
//!
//! These return unweighted means and medians plus a salary mean weighted by
//! respondents (every respondent of the group in the denominator, salaried
//! or not), grouped in key order. Missing columns yield an empty table
//! instead of an error so the dashboard keeps rendering.

use tracing::debug;

use crate::aggregate::batch::{INSERTION_MEAN, SALARY_MEDIAN, WEIGHT_TOTAL};
use crate::aggregate::grouping::{AggregateTable, GroupSpec, Metric, aggregate};
use crate::columns::{FIELD, INSERTION_RATE, MEDIAN_SALARY, SCHOLARSHIP_SHARE, WOMEN_SHARE, YEAR};
use crate::table::Table;

pub const SALARY_MEAN: &str = "salaire_moyen";
pub const WOMEN_MEAN: &str = "part_femmes";
pub const SCHOLARSHIP_MEAN: &str = "part_boursiers";

fn aggregate_or_empty(table: &Table, spec: GroupSpec) -> AggregateTable {
    aggregate(table, &spec).unwrap_or_else(|e| {
        debug!(error = %e, "Live aggregate unavailable, returning empty result");
        AggregateTable::empty(&spec)
    })
}

/// `{domaine, taux_dinsertion_moy, salaire_median, salaire_moyen, n}`
pub fn by_domaine(table: &Table) -> AggregateTable {
    let spec = GroupSpec::new("by_domaine", FIELD)
        .metric(Metric::mean(INSERTION_MEAN, INSERTION_RATE))
        .metric(Metric::median(SALARY_MEDIAN, MEDIAN_SALARY))
        .metric(Metric::respondent_mean(SALARY_MEAN, MEDIAN_SALARY))
        .metric(Metric::weight_sum(WEIGHT_TOTAL));
    aggregate_or_empty(table, spec)
}

/// `{domaine, taux_dinsertion_moy, part_femmes, n, salaire_median, salaire_moyen}`
pub fn genre_by_domaine(table: &Table) -> AggregateTable {
    let spec = GroupSpec::new("genre_by_domaine", FIELD)
        .metric(Metric::mean(INSERTION_MEAN, INSERTION_RATE))
        .metric(Metric::mean(WOMEN_MEAN, WOMEN_SHARE))
        .metric(Metric::weight_sum(WEIGHT_TOTAL))
        .metric(Metric::median(SALARY_MEDIAN, MEDIAN_SALARY))
        .metric(Metric::respondent_mean(SALARY_MEAN, MEDIAN_SALARY));
    aggregate_or_empty(table, spec)
}

/// `{annee, taux_dinsertion_moy, part_femmes, n}`
pub fn genre_by_year(table: &Table) -> AggregateTable {
    let spec = GroupSpec::new("genre_by_year", YEAR)
        .metric(Metric::mean(INSERTION_MEAN, INSERTION_RATE))
        .metric(Metric::mean(WOMEN_MEAN, WOMEN_SHARE))
        .metric(Metric::weight_sum(WEIGHT_TOTAL));
    aggregate_or_empty(table, spec)
}

/// `{domaine, taux_dinsertion_moy, part_boursiers, n, salaire_median}`
pub fn equite_by_domaine(table: &Table) -> AggregateTable {
    let spec = GroupSpec::new("equite_by_domaine", FIELD)
        .metric(Metric::mean(INSERTION_MEAN, INSERTION_RATE))
        .metric(Metric::mean(SCHOLARSHIP_MEAN, SCHOLARSHIP_SHARE))
        .metric(Metric::weight_sum(WEIGHT_TOTAL))
        .metric(Metric::median(SALARY_MEDIAN, MEDIAN_SALARY));
    aggregate_or_empty(table, spec)
}
