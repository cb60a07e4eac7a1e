//! CSV extraction for the raw survey export.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use tracing::debug;

use crate::table::{Column, Table};

/// Field separator of the survey export.
pub const DELIMITER: u8 = b';';

/// Cell contents read as missing values.
pub const NA_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// Reads a semicolon-delimited UTF-8 file into a [`Table`].
///
/// Column types are inferred: a column whose every non-missing cell parses
/// as a float becomes numeric, anything else stays textual. Ragged rows are
/// tolerated.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not valid CSV/UTF-8.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn extract(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening survey CSV {}", path.display()))?;
    let table = extract_from_reader(file)
        .with_context(|| format!("reading survey CSV {}", path.display()))?;
    debug!(
        rows = table.len(),
        columns = table.column_names().len(),
        "CSV extracted"
    );
    Ok(table)
}

/// Same as [`extract`] over any reader.
pub fn extract_from_reader<R: Read>(reader: R) -> Result<Table> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("reading CSV header")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];

    for (row_no, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        for (i, column) in cells.iter_mut().enumerate() {
            let value = record.get(i).filter(|v| !is_na(v)).map(str::to_string);
            column.push(value);
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| (name, infer_column(values)))
        .collect();

    Ok(Table::from_columns(columns))
}

fn is_na(value: &str) -> bool {
    NA_TOKENS.contains(&value.trim())
}

fn infer_column(values: Vec<Option<String>>) -> Column {
    let numeric = values
        .iter()
        .flatten()
        .all(|v| v.trim().parse::<f64>().is_ok());

    if numeric {
        Column::Number(
            values
                .iter()
                .map(|v| v.as_deref().and_then(|s| s.trim().parse().ok()))
                .collect(),
        )
    } else {
        Column::Text(values)
    }
}
