//! Group-by engine shared by the batch loader and the live web endpoints.
//!
//! A [`GroupSpec`] names the key column and the list of [`Metric`]s to
//! compute per group. Every weighted metric uses the same raw per-row weight.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::aggregate::stats;
use crate::columns::RESPONSES;
use crate::error::AggregateError;
use crate::table::{Column, GroupKey, Table};
use crate::transform::parse_number;

/// How one output field is computed from a group's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    WeightedMean,
    WeightedMedian,
    /// Σ(v·w) over rows with a value, over Σw of the whole group.
    RespondentMean,
    Mean,
    Median,
    /// Sum of row weights, nulls counted as zero. Reads no source column.
    WeightSum,
}

#[derive(Debug, Clone)]
pub struct Metric {
    pub name: String,
    pub column: Option<String>,
    pub kind: MetricKind,
}

impl Metric {
    fn over(name: &str, column: &str, kind: MetricKind) -> Self {
        Metric {
            name: name.to_string(),
            column: Some(column.to_string()),
            kind,
        }
    }

    pub fn weighted_mean(name: &str, column: &str) -> Self {
        Self::over(name, column, MetricKind::WeightedMean)
    }

    pub fn weighted_median(name: &str, column: &str) -> Self {
        Self::over(name, column, MetricKind::WeightedMedian)
    }

    pub fn respondent_mean(name: &str, column: &str) -> Self {
        Self::over(name, column, MetricKind::RespondentMean)
    }

    pub fn mean(name: &str, column: &str) -> Self {
        Self::over(name, column, MetricKind::Mean)
    }

    pub fn median(name: &str, column: &str) -> Self {
        Self::over(name, column, MetricKind::Median)
    }

    pub fn weight_sum(name: &str) -> Self {
        Metric {
            name: name.to_string(),
            column: None,
            kind: MetricKind::WeightSum,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortOrder {
    /// Ascending group key.
    ByKey,
    /// Descending by the named metric, nulls last, ties in key order.
    ByMetricDesc(String),
}

/// Description of one grouped aggregate.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    /// Label used in errors and logs.
    pub grouping: String,
    pub key_column: String,
    /// Field name of the key in the output rows.
    pub key_name: String,
    pub metrics: Vec<Metric>,
    pub sort: SortOrder,
    /// Row weights; each row weighs 1 when the column is absent.
    pub weight_column: String,
}

impl GroupSpec {
    pub fn new(grouping: &str, key_column: &str) -> Self {
        GroupSpec {
            grouping: grouping.to_string(),
            key_column: key_column.to_string(),
            key_name: key_column.to_string(),
            metrics: Vec::new(),
            sort: SortOrder::ByKey,
            weight_column: RESPONSES.to_string(),
        }
    }

    pub fn key_name(mut self, name: &str) -> Self {
        self.key_name = name.to_string();
        self
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn weight_column(mut self, column: &str) -> Self {
        self.weight_column = column.to_string();
        self
    }

    /// Source columns that must exist in the table.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut required = vec![self.key_column.as_str()];
        for m in &self.metrics {
            if let Some(c) = m.column.as_deref() {
                if !required.contains(&c) {
                    required.push(c);
                }
            }
        }
        required
    }
}

/// One output row: the group key and one value per metric.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub key: GroupKey,
    pub values: Vec<Option<f64>>,
}

/// Result of a grouped aggregate. Serializes as a JSON array of objects,
/// the key field first, then the metrics in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTable {
    pub key_name: String,
    pub metric_names: Vec<String>,
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn empty(spec: &GroupSpec) -> Self {
        AggregateTable {
            key_name: spec.key_name.clone(),
            metric_names: spec.metrics.iter().map(|m| m.name.clone()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of `metric` for the group `key`.
    pub fn value(&self, key: &GroupKey, metric: &str) -> Option<f64> {
        let idx = self.metric_names.iter().position(|m| m == metric)?;
        self.rows
            .iter()
            .find(|r| &r.key == key)
            .and_then(|r| r.values[idx])
    }

    pub fn keys(&self) -> Vec<&GroupKey> {
        self.rows.iter().map(|r| &r.key).collect()
    }
}

struct RowView<'a> {
    table: &'a AggregateTable,
    row: &'a AggregateRow,
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.row.values.len() + 1))?;
        map.serialize_entry(&self.table.key_name, &self.row.key)?;
        for (name, value) in self.table.metric_names.iter().zip(&self.row.values) {
            map.serialize_entry(name, &value.filter(|v| v.is_finite()))?;
        }
        map.end()
    }
}

impl Serialize for AggregateTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowView { table: self, row })?;
        }
        seq.end()
    }
}

/// Numeric view of a column, parsing text cells when needed.
pub(crate) fn numeric_values(column: &Column) -> Cow<'_, [Option<f64>]> {
    match column {
        Column::Number(v) => Cow::Borrowed(v),
        Column::Text(v) => Cow::Owned(
            v.iter()
                .map(|c| c.as_deref().and_then(parse_number))
                .collect(),
        ),
    }
}

/// Groups `table` and computes `spec`'s metrics per group.
///
/// # Errors
///
/// [`AggregateError::MissingColumns`] listing every required column the
/// table does not have.
pub fn aggregate(table: &Table, spec: &GroupSpec) -> Result<AggregateTable, AggregateError> {
    let missing: Vec<String> = spec
        .required_columns()
        .into_iter()
        .filter(|c| !table.has_column(c))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(AggregateError::MissingColumns {
            grouping: spec.grouping.clone(),
            missing,
        });
    }

    let key_column = table
        .column(&spec.key_column)
        .ok_or_else(|| AggregateError::MissingColumns {
            grouping: spec.grouping.clone(),
            missing: vec![spec.key_column.clone()],
        })?;

    let weights: Cow<'_, [Option<f64>]> = match table.column(&spec.weight_column) {
        Some(c) => numeric_values(c),
        None => Cow::Owned(vec![Some(1.0); table.len()]),
    };

    let sources: Vec<Option<Cow<'_, [Option<f64>]>>> = spec
        .metrics
        .iter()
        .map(|m| {
            m.column
                .as_deref()
                .and_then(|c| table.column(c))
                .map(numeric_values)
        })
        .collect();

    let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    for row in 0..table.len() {
        if let Some(key) = key_column.key_at(row) {
            groups.entry(key).or_default().push(row);
        }
    }

    let mut rows: Vec<AggregateRow> = groups
        .into_iter()
        .map(|(key, idx)| {
            let w: Vec<Option<f64>> = idx.iter().map(|&i| weights[i]).collect();
            let values = spec
                .metrics
                .iter()
                .zip(&sources)
                .map(|(metric, source)| {
                    let v: Vec<Option<f64>> = match source {
                        Some(s) => idx.iter().map(|&i| s[i]).collect(),
                        None => Vec::new(),
                    };
                    compute(metric.kind, &v, &w)
                })
                .collect();
            AggregateRow { key, values }
        })
        .collect();

    if let SortOrder::ByMetricDesc(name) = &spec.sort {
        if let Some(idx) = spec.metrics.iter().position(|m| &m.name == name) {
            rows.sort_by(|a, b| match (a.values[idx], b.values[idx]) {
                (Some(x), Some(y)) => y.total_cmp(&x),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }
    }

    Ok(AggregateTable {
        key_name: spec.key_name.clone(),
        metric_names: spec.metrics.iter().map(|m| m.name.clone()).collect(),
        rows,
    })
}

fn compute(kind: MetricKind, values: &[Option<f64>], weights: &[Option<f64>]) -> Option<f64> {
    match kind {
        MetricKind::WeightedMean => stats::weighted_mean(values, weights),
        MetricKind::WeightedMedian => stats::weighted_median(values, weights),
        MetricKind::RespondentMean => stats::respondent_mean(values, weights),
        MetricKind::Mean => stats::mean(values),
        MetricKind::Median => stats::median(values),
        MetricKind::WeightSum => Some(stats::sum(weights)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(values: &[&str]) -> Column {
        Column::Text(values.iter().map(|s| Some(s.to_string())).collect())
    }

    fn num(values: &[f64]) -> Column {
        Column::Number(values.iter().copied().map(Some).collect())
    }

    fn spec() -> GroupSpec {
        GroupSpec::new("by_domaine", "domaine")
            .metric(Metric::weighted_mean("taux_dinsertion_moy", "taux_dinsertion"))
            .metric(Metric::weight_sum("n"))
            .sort(SortOrder::ByMetricDesc("taux_dinsertion_moy".into()))
    }

    #[test]
    fn test_weighted_mean_per_group() {
        let table = Table::from_columns(vec![
            ("domaine".into(), text(&["A", "A", "B"])),
            ("taux_dinsertion".into(), num(&[0.5, 0.8, 0.6])),
            ("nombre_de_reponses".into(), num(&[10.0, 30.0, 5.0])),
        ]);
        let out = aggregate(&table, &spec()).unwrap();

        let a = GroupKey::Text("A".into());
        assert!((out.value(&a, "taux_dinsertion_moy").unwrap() - 0.725).abs() < 1e-12);
        assert_eq!(out.value(&a, "n"), Some(40.0));
        // sorted by descending mean: A (0.725) before B (0.6)
        assert_eq!(out.keys(), vec![&a, &GroupKey::Text("B".into())]);
    }

    #[test]
    fn test_missing_weight_column_defaults_to_one() {
        let table = Table::from_columns(vec![
            ("domaine".into(), text(&["A", "A"])),
            ("taux_dinsertion".into(), num(&[0.5, 0.7])),
        ]);
        let out = aggregate(&table, &spec()).unwrap();
        let a = GroupKey::Text("A".into());
        assert!((out.value(&a, "taux_dinsertion_moy").unwrap() - 0.6).abs() < 1e-12);
        assert_eq!(out.value(&a, "n"), Some(2.0));
    }

    #[test]
    fn test_missing_columns_are_all_reported() {
        let table = Table::from_columns(vec![("annee".into(), num(&[2020.0]))]);
        match aggregate(&table, &spec()) {
            Err(AggregateError::MissingColumns { grouping, missing }) => {
                assert_eq!(grouping, "by_domaine");
                assert_eq!(missing, vec!["domaine", "taux_dinsertion"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_null_means_sort_last_and_serialize_as_null() {
        let table = Table::from_columns(vec![
            ("domaine".into(), text(&["A", "B", "C"])),
            (
                "taux_dinsertion".into(),
                Column::Number(vec![None, Some(0.2), Some(0.9)]),
            ),
        ]);
        let out = aggregate(&table, &spec()).unwrap();
        let order: Vec<String> = out.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(order, ["C", "B", "A"]);

        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json[2]["domaine"], "A");
        assert!(json[2]["taux_dinsertion_moy"].is_null());
        assert_eq!(json[2]["n"], 1.0);
    }

    #[test]
    fn test_rows_with_null_keys_are_skipped() {
        let table = Table::from_columns(vec![
            (
                "domaine".into(),
                Column::Text(vec![Some("A".into()), None]),
            ),
            ("taux_dinsertion".into(), num(&[0.5, 0.9])),
        ]);
        let out = aggregate(&table, &spec()).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_text_metric_column_is_coerced() {
        let table = Table::from_columns(vec![
            ("domaine".into(), text(&["A", "A"])),
            ("taux_dinsertion".into(), text(&["0,5", "ns"])),
        ]);
        let out = aggregate(&table, &spec()).unwrap();
        assert_eq!(
            out.value(&GroupKey::Text("A".into()), "taux_dinsertion_moy"),
            Some(0.5)
        );
    }

    #[test]
    fn test_serialized_field_order() {
        let table = Table::from_columns(vec![
            ("domaine".into(), text(&["A"])),
            ("taux_dinsertion".into(), num(&[0.5])),
        ]);
        let out = aggregate(&table, &spec()).unwrap();
        let json = serde_json::to_string(&out).unwrap();
        assert_eq!(json, r#"[{"domaine":"A","taux_dinsertion_moy":0.5,"n":1.0}]"#);
    }
}
