//! Extract → transform → load, end to end.

use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::extract::extract;
use crate::reference::ReferenceTables;
use crate::snapshot::{self, LoadReport};
use crate::table::Table;
use crate::transform::transform;

/// Runs the full ETL from the raw CSV at `input` into `out_dir`.
#[tracing::instrument(skip_all, fields(input = %input.display(), out_dir = %out_dir.display()))]
pub fn run(input: &Path, out_dir: &Path, refs: &ReferenceTables) -> Result<LoadReport> {
    let raw = extract(input)?;
    info!(rows = raw.len(), columns = raw.column_names().len(), "Raw survey loaded");

    let data = transform(raw);
    let report = snapshot::load(&data, out_dir, refs)?;

    for file in &report.files {
        info!(file = %out_dir.join(&file.name).display(), rows = file.rows, "Output");
    }
    info!(warnings = report.warnings.len(), "ETL complete");
    Ok(report)
}

/// Extracts and cleans `input` without writing anything.
pub fn clean(input: &Path) -> Result<Table> {
    Ok(transform(extract(input)?))
}
