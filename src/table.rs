//! Minimal in-memory columnar table shared by every pipeline stage.

use std::cmp::Ordering;
use std::fmt;

use serde::{Serialize, Serializer};

/// A single column. Every column in a [`Table`] has the same length.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Number(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Number(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cell at `row` as a grouping key, or `None` for nulls.
    pub fn key_at(&self, row: usize) -> Option<GroupKey> {
        match self {
            Column::Number(v) => v
                .get(row)
                .copied()
                .flatten()
                .filter(|x| !x.is_nan())
                .map(GroupKey::Number),
            Column::Text(v) => v.get(row).cloned().flatten().map(GroupKey::Text),
        }
    }

    fn retain(&mut self, mask: &[bool]) {
        match self {
            Column::Number(v) => retain_by_mask(v, mask),
            Column::Text(v) => retain_by_mask(v, mask),
        }
    }
}

fn retain_by_mask<T>(values: &mut Vec<T>, mask: &[bool]) {
    let mut keep = mask.iter();
    values.retain(|_| *keep.next().unwrap_or(&false));
}

/// Ordered named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Builds a table from `(name, column)` pairs.
    ///
    /// Columns shorter than the longest one are padded with nulls.
    pub fn from_columns(columns: Vec<(String, Column)>) -> Self {
        let rows = columns.iter().map(|(_, c)| c.len()).max().unwrap_or(0);
        let mut table = Table {
            names: Vec::with_capacity(columns.len()),
            columns: Vec::with_capacity(columns.len()),
            rows,
        };
        for (name, mut column) in columns {
            match &mut column {
                Column::Number(v) => v.resize(rows, None),
                Column::Text(v) => v.resize(rows, None),
            }
            table.names.push(name);
            table.columns.push(column);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    /// Numeric view of a column; `None` when missing or textual.
    pub fn numbers(&self, name: &str) -> Option<&[Option<f64>]> {
        match self.column(name)? {
            Column::Number(v) => Some(v),
            Column::Text(_) => None,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Renames `from` to `to`. Returns `false` when `from` does not exist.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.position(from) {
            Some(i) => {
                self.names[i] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Maps every column name through `f`.
    pub fn rename_all(&mut self, f: impl Fn(&str) -> String) {
        for name in &mut self.names {
            *name = f(name);
        }
    }

    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let i = self.position(name)?;
        self.names.remove(i);
        Some(self.columns.remove(i))
    }

    /// Replaces the column called `name`, or appends it.
    ///
    /// # Panics
    ///
    /// Panics if the column length differs from the table length on a
    /// non-empty table.
    pub fn insert_column(&mut self, name: &str, column: Column) {
        if self.columns.is_empty() {
            self.rows = column.len();
        }
        assert_eq!(column.len(), self.rows, "column `{name}` has wrong length");
        match self.position(name) {
            Some(i) => self.columns[i] = column,
            None => {
                self.names.push(name.to_string());
                self.columns.push(column);
            }
        }
    }

    /// Keeps only rows whose `mask` entry is `true`.
    pub fn retain_rows(&mut self, mask: &[bool]) {
        for column in &mut self.columns {
            column.retain(mask);
        }
        self.rows = mask.iter().take(self.rows).filter(|k| **k).count();
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Value of a grouping column for one group.
#[derive(Debug, Clone)]
pub enum GroupKey {
    Number(f64),
    Text(String),
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (GroupKey::Number(a), GroupKey::Number(b)) => a.total_cmp(b),
            (GroupKey::Number(_), GroupKey::Text(_)) => Ordering::Less,
            (GroupKey::Text(_), GroupKey::Number(_)) => Ordering::Greater,
            (GroupKey::Text(a), GroupKey::Text(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Number(x) => write!(f, "{x}"),
            GroupKey::Text(s) => f.write_str(s),
        }
    }
}

impl Serialize for GroupKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            // years come through as floats; keep them integral on the wire
            GroupKey::Number(x) if x.fract() == 0.0 && x.abs() < 9.0e15 => {
                serializer.serialize_i64(*x as i64)
            }
            GroupKey::Number(x) => serializer.serialize_f64(*x),
            GroupKey::Text(s) => serializer.serialize_str(s),
        }
    }
}
