//! Persistence of the processed snapshot.
//!
//! The cleaned table is stored as `clean.parquet`; each batch aggregate as a
//! records-oriented JSON array next to it. Every run overwrites the files.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Array, ArrayRef, AsArray, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Float32Type, Float64Type, Int32Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::batch;
use crate::aggregate::stats::min_max;
use crate::columns::{EMPLOYMENT_RATE, INSERTION_RATE, RESPONSES};
use crate::error::SnapshotError;
use crate::reference::ReferenceTables;
use crate::table::{Column, Table};

pub const CLEAN_FILE: &str = "clean.parquet";
pub const BY_YEAR_FILE: &str = "by_year.json";
pub const BY_DOMAINE_FILE: &str = "by_domaine.json";
pub const BY_ACADEMIE_FILE: &str = "by_academie.json";
pub const BY_REGION_FILE: &str = "by_region.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Tolerance of the `[0, 1]` sanity check on rate columns.
const RATE_TOLERANCE: f64 = 0.01;

/// Summary of one pipeline run, also written as `manifest.json`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoadReport {
    pub generated_at: DateTime<Utc>,
    pub rows: usize,
    pub files: Vec<OutputFile>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutputFile {
    pub name: String,
    pub rows: usize,
}

/// Writes the cleaned table and every batch aggregate into `out_dir`.
///
/// # Errors
///
/// Fails when a batch aggregate lacks its source columns or a file cannot
/// be written. Sanity-check findings are only logged.
#[tracing::instrument(skip_all, fields(out_dir = %out_dir.display(), rows = data.len()))]
pub fn load(data: &Table, out_dir: &Path, refs: &ReferenceTables) -> Result<LoadReport> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    // an interrupted run must not leave the previous manifest behind
    let manifest = out_dir.join(MANIFEST_FILE);
    match std::fs::remove_file(&manifest) {
        Ok(()) => debug!(path = %manifest.display(), "Previous manifest removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(SnapshotError::io(&manifest, e).into()),
    }

    let warnings = sanity_check(data);

    // aggregates first, so a missing column fails before any file is touched
    let aggregates = [
        (BY_YEAR_FILE, batch::by_year(data)?),
        (BY_DOMAINE_FILE, batch::by_domaine(data)?),
        (BY_ACADEMIE_FILE, batch::by_academie(data)?),
        (BY_REGION_FILE, batch::by_region(data, refs)?),
    ];

    write_parquet(&out_dir.join(CLEAN_FILE), data)?;
    let mut files = vec![OutputFile {
        name: CLEAN_FILE.to_string(),
        rows: data.len(),
    }];

    for (name, table) in &aggregates {
        write_json(&out_dir.join(name), table)?;
        info!(file = name, groups = table.len(), "Aggregate written");
        files.push(OutputFile {
            name: name.to_string(),
            rows: table.len(),
        });
    }

    let report = LoadReport {
        generated_at: Utc::now(),
        rows: data.len(),
        files,
        warnings,
    };
    write_json(&manifest, &report)?;
    Ok(report)
}

/// Logs (and returns) out-of-range rates and negative weights.
pub fn sanity_check(data: &Table) -> Vec<String> {
    let mut warnings = Vec::new();

    for name in [INSERTION_RATE, EMPLOYMENT_RATE] {
        if let Some((min, max)) = data.numbers(name).and_then(min_max) {
            if min < -RATE_TOLERANCE || max > 1.0 + RATE_TOLERANCE {
                warn!(column = name, min, max, "Rate outside [0,1]");
                warnings.push(format!("{name} outside [0,1]: min={min}, max={max}"));
            }
        }
    }

    if let Some(weights) = data.numbers(RESPONSES) {
        let negative = weights.iter().flatten().filter(|w| **w < 0.0).count();
        if negative > 0 {
            warn!(rows = negative, "Negative nombre_de_reponses");
            warnings.push(format!("{RESPONSES} negative on {negative} rows"));
        }
    }

    warnings
}

/// Serializes `value` as JSON into `path`, replacing any previous file.
pub fn write_json(path: &Path, value: &impl Serialize) -> Result<(), SnapshotError> {
    let body = serde_json::to_vec(value).map_err(|e| SnapshotError::json(path, e))?;
    std::fs::write(path, body).map_err(|e| SnapshotError::io(path, e))?;
    debug!(path = %path.display(), "JSON written");
    Ok(())
}

pub fn read_json(path: &Path) -> Result<serde_json::Value, SnapshotError> {
    let text = std::fs::read_to_string(path).map_err(|e| SnapshotError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| SnapshotError::json(path, e))
}

/// Writes `table` as a single-batch Parquet file of nullable Float64 / Utf8
/// columns.
pub fn write_parquet(path: &Path, table: &Table) -> Result<(), SnapshotError> {
    let mut fields = Vec::new();
    let mut arrays: Vec<ArrayRef> = Vec::new();

    for (name, column) in table.columns() {
        match column {
            Column::Number(values) => {
                fields.push(Field::new(name, DataType::Float64, true));
                arrays.push(Arc::new(Float64Array::from(values.clone())));
            }
            Column::Text(values) => {
                fields.push(Field::new(name, DataType::Utf8, true));
                arrays.push(Arc::new(StringArray::from(
                    values.iter().map(Option::as_deref).collect::<Vec<_>>(),
                )));
            }
        }
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = if arrays.is_empty() {
        RecordBatch::new_empty(schema.clone())
    } else {
        RecordBatch::try_new(schema.clone(), arrays)?
    };

    let file = File::create(path).map_err(|e| SnapshotError::io(path, e))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    debug!(path = %path.display(), rows = table.len(), "Parquet written");
    Ok(())
}

/// Reads a Parquet file back into a [`Table`].
///
/// Integer and float columns become numeric, string columns textual; other
/// types are skipped.
pub fn read_parquet(path: &Path) -> Result<Table, SnapshotError> {
    let file = File::open(path).map_err(|e| SnapshotError::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut columns: Vec<(String, Column)> = schema
        .fields()
        .iter()
        .filter_map(|f| {
            let empty = match f.data_type() {
                DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32 => {
                    Column::Number(Vec::new())
                }
                DataType::Utf8 | DataType::LargeUtf8 => Column::Text(Vec::new()),
                other => {
                    warn!(column = %f.name(), data_type = ?other, "Skipping unsupported column");
                    return None;
                }
            };
            Some((f.name().clone(), empty))
        })
        .collect();

    for batch in reader {
        let batch = batch?;
        for (name, column) in &mut columns {
            let Some(array) = batch.column_by_name(name) else {
                continue;
            };
            append_array(column, array.as_ref());
        }
    }

    Ok(Table::from_columns(columns))
}

fn append_array(column: &mut Column, array: &dyn Array) {
    match column {
        Column::Number(out) => match array.data_type() {
            DataType::Float64 => out.extend(array.as_primitive::<Float64Type>().iter()),
            DataType::Float32 => out.extend(
                array
                    .as_primitive::<Float32Type>()
                    .iter()
                    .map(|v| v.map(f64::from)),
            ),
            DataType::Int64 => out.extend(
                array
                    .as_primitive::<Int64Type>()
                    .iter()
                    .map(|v| v.map(|x| x as f64)),
            ),
            DataType::Int32 => out.extend(
                array
                    .as_primitive::<Int32Type>()
                    .iter()
                    .map(|v| v.map(f64::from)),
            ),
            _ => out.extend(std::iter::repeat_n(None, array.len())),
        },
        Column::Text(out) => match array.data_type() {
            DataType::Utf8 => out.extend(
                array
                    .as_string::<i32>()
                    .iter()
                    .map(|v| v.map(str::to_string)),
            ),
            DataType::LargeUtf8 => out.extend(
                array
                    .as_string::<i64>()
                    .iter()
                    .map(|v| v.map(str::to_string)),
            ),
            _ => out.extend(std::iter::repeat_n(None, array.len())),
        },
    }
}

/// Paths of the snapshot files inside a data directory.
#[derive(Debug, Clone)]
pub struct SnapshotPaths {
    pub dir: PathBuf,
}

impl SnapshotPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn clean(&self) -> PathBuf {
        self.dir.join(CLEAN_FILE)
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}
