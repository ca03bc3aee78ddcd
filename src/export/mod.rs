//! Rendering of a [`ComparisonResult`] into spreadsheet, CSV and JSON
//! reports.
//!
//! The core hands over a structured result; everything format-specific
//! (sheet naming, cell cleaning, truncation) happens here.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::json;
use tracing::{debug, info, instrument};

use crate::aggregate::ComparisonResult;
use crate::error::{ReconError, Result};
use crate::io::{csv_write, excel_write};
use crate::model::{Dataset, Record, Value};

pub const SUMMARY_SHEET: &str = "Summary";
pub const DIFFERENCES_SHEET: &str = "Differences";
pub const MISSING_IN_TARGET_SHEET: &str = "Missing_in_Target";
pub const MISSING_IN_SOURCE_SHEET: &str = "Missing_in_Source";
pub const SOURCE_DUPLICATES_SHEET: &str = "Source_Duplicates";
pub const TARGET_DUPLICATES_SHEET: &str = "Target_Duplicates";
pub const METADATA_SHEET: &str = "Metadata";

/// Longest text an Excel cell accepts.
pub const MAX_EXCEL_CELL_LENGTH: usize = 32_767;

/// Report file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
    Json,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Xlsx => write!(f, "xlsx"),
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ReconError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(ReconError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// A table that will be materialised as a sheet or a CSV file.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    /// Suffix used for the CSV file of this table.
    pub file_suffix: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// All tables of one comparison report, in sheet order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportData {
    pub tables: Vec<SheetTable>,
}

impl ReportData {
    pub fn table(&self, sheet_name: &str) -> Option<&SheetTable> {
        self.tables.iter().find(|table| table.sheet_name == sheet_name)
    }
}

/// Writes the result into `directory` and returns the files created.
#[instrument(
    level = "info",
    skip(result),
    fields(comparison = %result.name, directory = %directory.display())
)]
pub fn export_result(
    result: &ComparisonResult,
    format: ExportFormat,
    directory: &Path,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(directory)?;
    let stem = file_stem(result);

    let files = match format {
        ExportFormat::Xlsx => {
            let path = directory.join(format!("{stem}.xlsx"));
            excel_write::write_workbook(&path, &build_report(result))?;
            vec![path]
        }
        ExportFormat::Csv => {
            let mut files = Vec::new();
            for table in build_report(result).tables {
                if table.rows.is_empty() {
                    debug!(sheet = %table.sheet_name, "skipping empty table");
                    continue;
                }
                let path = directory.join(format!("{stem}_{}.csv", table.file_suffix));
                csv_write::write_table(&path, &table)?;
                files.push(path);
            }
            files
        }
        ExportFormat::Json => {
            let path = directory.join(format!("{stem}.json"));
            let document = serde_json::to_string_pretty(&result_to_json(result)?)?;
            fs::write(&path, document)?;
            vec![path]
        }
    };

    info!(file_count = files.len(), %format, "comparison exported");
    Ok(files)
}

/// `<name>_<YYYYmmdd_HHMMSS>` with path separators replaced.
pub fn file_stem(result: &ComparisonResult) -> String {
    let name: String = result
        .name
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    format!("{name}_{}", result.timestamp.format("%Y%m%d_%H%M%S"))
}

/// Flattens a result into one table per output category.
pub fn build_report(result: &ComparisonResult) -> ReportData {
    let mut sheet_names = SheetNameRegistry::default();
    let tables = vec![
        summary_table(result),
        differences_table(result),
        dataset_table(
            MISSING_IN_TARGET_SHEET,
            "missing_in_target",
            &result.differences.missing_in_target,
        ),
        dataset_table(
            MISSING_IN_SOURCE_SHEET,
            "missing_in_source",
            &result.differences.missing_in_source,
        ),
        dataset_table(
            SOURCE_DUPLICATES_SHEET,
            "source_duplicates",
            &result.differences.source_duplicates,
        ),
        dataset_table(
            TARGET_DUPLICATES_SHEET,
            "target_duplicates",
            &result.differences.target_duplicates,
        ),
        metadata_table(result),
    ]
    .into_iter()
    .map(|mut table| {
        table.sheet_name = sheet_names.assign(&table.sheet_name);
        table
    })
    .collect();

    ReportData { tables }
}

fn summary_table(result: &ComparisonResult) -> SheetTable {
    let summary = &result.summary;
    let rows = vec![
        ("Comparison Name", Value::from(result.name.as_str())),
        (
            "Timestamp",
            Value::from(result.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
        ),
        ("Source Records", count(summary.source_rows)),
        ("Target Records", count(summary.target_rows)),
        ("Source Clean Records", count(summary.source_clean_rows)),
        ("Target Clean Records", count(summary.target_clean_rows)),
        ("Source Duplicates", count(summary.source_duplicates)),
        ("Target Duplicates", count(summary.target_duplicates)),
        ("Common Columns", count(result.metadata.common_columns.len())),
        ("Field Differences", count(summary.field_differences)),
        ("Missing in Target", count(summary.missing_in_target)),
        ("Missing in Source", count(summary.missing_in_source)),
        ("Total Differences", count(summary.total_differences)),
        (
            "Match Percentage",
            Value::from(format!("{:.2}%", summary.match_percentage)),
        ),
    ];

    SheetTable {
        sheet_name: SUMMARY_SHEET.to_string(),
        file_suffix: "summary".to_string(),
        columns: vec!["Metric".to_string(), "Value".to_string()],
        rows: rows
            .into_iter()
            .map(|(metric, value)| vec![Value::from(metric), value])
            .collect(),
    }
}

fn differences_table(result: &ComparisonResult) -> SheetTable {
    let key_columns = &result.metadata.key_columns;
    let mut columns = key_columns.clone();
    columns.extend(
        ["column", "source_value", "target_value"]
            .iter()
            .map(|name| name.to_string()),
    );

    let rows = result
        .differences
        .fields
        .iter()
        .map(|difference| {
            let mut row: Vec<Value> = key_columns
                .iter()
                .map(|column| {
                    difference
                        .key
                        .iter()
                        .find(|(name, _)| name == column)
                        .map(|(_, value)| value.clone())
                        .unwrap_or(Value::Null)
                })
                .collect();
            row.push(Value::from(difference.column.as_str()));
            row.push(difference.source_value.clone());
            row.push(difference.target_value.clone());
            row
        })
        .collect();

    SheetTable {
        sheet_name: DIFFERENCES_SHEET.to_string(),
        file_suffix: "differences".to_string(),
        columns,
        rows,
    }
}

fn dataset_table(sheet_name: &str, file_suffix: &str, dataset: &Dataset) -> SheetTable {
    let columns = dataset.columns();
    let rows = dataset
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| record.value_or_null(column).clone())
                .collect()
        })
        .collect();

    SheetTable {
        sheet_name: sheet_name.to_string(),
        file_suffix: file_suffix.to_string(),
        columns,
        rows,
    }
}

fn metadata_table(result: &ComparisonResult) -> SheetTable {
    let metadata = &result.metadata;
    let tolerance = metadata
        .tolerance
        .iter()
        .map(|(column, threshold)| format!("{column}={threshold}"))
        .collect::<Vec<_>>()
        .join(", ");
    let strategy = serde_json::to_value(metadata.key_strategy)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default();
    let policy = serde_json::to_value(metadata.string_policy)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default();

    let mut rows: Vec<Vec<Value>> = vec![
        vec!["key_columns".into(), metadata.key_columns.join(", ").into()],
        vec!["key_strategy".into(), strategy.into()],
        vec!["key_candidates".into(), metadata.key_candidates.join(", ").into()],
        vec!["key_unique".into(), Value::Boolean(metadata.key_unique)],
        vec!["common_columns".into(), metadata.common_columns.join(", ").into()],
        vec!["excluded_columns".into(), metadata.excluded_columns.join(", ").into()],
        vec!["source_only_columns".into(), metadata.source_only_columns.join(", ").into()],
        vec!["target_only_columns".into(), metadata.target_only_columns.join(", ").into()],
        vec!["tolerance".into(), tolerance.into()],
        vec!["string_policy".into(), policy.into()],
    ];
    for warning in &metadata.warnings {
        rows.push(vec![Value::from("warning"), Value::from(warning.as_str())]);
    }

    SheetTable {
        sheet_name: METADATA_SHEET.to_string(),
        file_suffix: "metadata".to_string(),
        columns: vec!["Setting".to_string(), "Value".to_string()],
        rows,
    }
}

fn count(value: usize) -> Value {
    Value::Integer(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Builds the JSON report document.
pub fn result_to_json(result: &ComparisonResult) -> Result<serde_json::Value> {
    let fields: Vec<serde_json::Value> = result
        .differences
        .fields
        .iter()
        .map(|difference| {
            let key: serde_json::Map<String, serde_json::Value> = difference
                .key
                .iter()
                .map(|(column, value)| (column.clone(), value.to_json()))
                .collect();
            json!({
                "key": key,
                "column": difference.column,
                "source_value": difference.source_value.to_json(),
                "target_value": difference.target_value.to_json(),
            })
        })
        .collect();

    Ok(json!({
        "comparison_name": result.name,
        "timestamp": result.timestamp.to_rfc3339(),
        "summary": serde_json::to_value(&result.summary)?,
        "metadata": serde_json::to_value(&result.metadata)?,
        "differences": {
            "fields": fields,
            "missing_in_target": dataset_to_json(&result.differences.missing_in_target),
            "missing_in_source": dataset_to_json(&result.differences.missing_in_source),
            "source_duplicates": dataset_to_json(&result.differences.source_duplicates),
            "target_duplicates": dataset_to_json(&result.differences.target_duplicates),
        },
    }))
}

fn dataset_to_json(dataset: &Dataset) -> serde_json::Value {
    serde_json::Value::Array(dataset.iter().map(record_to_json).collect())
}

fn record_to_json(record: &Record) -> serde_json::Value {
    serde_json::Value::Object(
        record
            .fields()
            .iter()
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect(),
    )
}

/// Removes NUL characters, folds line endings and truncates to
/// `max_length` characters, marking truncation with `...`.
pub fn clean_cell_text(text: &str, max_length: usize) -> String {
    let cleaned = text.replace('\0', "").replace("\r\n", "\n").replace('\r', "\n");
    if cleaned.chars().count() <= max_length {
        return cleaned;
    }
    let mut truncated: String = cleaned.chars().take(max_length.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}

#[derive(Debug, Default)]
struct SheetNameRegistry {
    used: HashSet<String>,
}

impl SheetNameRegistry {
    fn assign(&mut self, raw: &str) -> String {
        let base = sanitize_sheet_name(raw);
        if self.used.insert(base.clone()) {
            return base;
        }

        let mut counter = 1;
        loop {
            let suffix = format!("_{counter}");
            let prefix: String = base.chars().take(31 - suffix.len()).collect();
            let candidate = format!("{prefix}{suffix}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            counter += 1;
        }
    }
}

/// Applies Excel sheet-name rules: at most 31 characters, none of
/// `: \ / ? * [ ]` or quotes.
pub fn sanitize_sheet_name(raw: &str) -> String {
    let invalid = [':', '\\', '/', '?', '*', '[', ']', '\'', '"'];
    let mut sanitized: String = raw
        .chars()
        .map(|ch| {
            if invalid.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect::<String>()
        .trim()
        .to_string();

    if sanitized.is_empty() {
        sanitized = "Sheet".to_string();
    }
    if sanitized.chars().count() > 31 {
        sanitized = sanitized.chars().take(31).collect();
    }
    sanitized
}
