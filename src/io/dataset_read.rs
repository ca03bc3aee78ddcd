use std::fs;
use std::path::Path;

use tracing::{debug, instrument};

use crate::error::{ReconError, Result};
use crate::io::excel_read;
use crate::model::{Dataset, Record, Value};

/// Loads a dataset, choosing the reader from the file extension:
/// `.json` (array of objects), `.csv` (header row) or `.xlsx`/`.xlsm`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn read_dataset(path: &Path, sheet: Option<&str>) -> Result<Dataset> {
    if !path.exists() {
        return Err(ReconError::MissingInput(path.to_path_buf()));
    }
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let dataset = match extension.as_str() {
        "json" => read_json(path)?,
        "csv" => read_csv(path)?,
        "xlsx" | "xlsm" => excel_read::read_dataset(path, sheet)?,
        other => return Err(ReconError::UnsupportedFormat(format!("dataset file '.{other}'"))),
    };
    debug!(rows = dataset.len(), "dataset loaded");
    Ok(dataset)
}

/// Reads a JSON array of flat objects.
pub fn read_json(path: &Path) -> Result<Dataset> {
    let source = fs::read_to_string(path)?;
    let json: serde_json::Value = serde_json::from_str(&source)?;
    Dataset::from_json(&json).ok_or_else(|| {
        ReconError::InvalidDataset(format!(
            "{} must contain a JSON array of objects",
            path.display()
        ))
    })
}

/// Reads a CSV file with a header row, inferring a type per cell.
pub fn read_csv(path: &Path) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(column, cell)| (column.to_string(), infer_value(cell)))
            .collect();
        records.push(record);
    }
    Ok(Dataset::new(records))
}

/// Empty text is null; otherwise integer, float and boolean are tried in
/// turn before falling back to the raw string.
pub fn infer_value(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::Integer(integer);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if float.is_finite() {
            return Value::Float(float);
        }
    }
    match trimmed.to_lowercase().as_str() {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ => Value::String(cell.to_string()),
    }
}
