use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::error::{ReconError, Result};
use crate::model::{Dataset, Record, Value};

/// Reads a dataset from a worksheet. The first row holds the column names;
/// blank rows are skipped. Without `sheet`, the first sheet is used.
pub fn read_dataset(path: &Path, sheet: Option<&str>) -> Result<Dataset> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ReconError::InvalidWorkbook("workbook has no sheets".into()))?,
    };
    let range = read_required_sheet(&mut workbook, &sheet_name)?;
    Ok(range_to_dataset(&range))
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ReconError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(ReconError::from)?;
    Ok(range)
}

fn range_to_dataset(range: &Range<DataType>) -> Dataset {
    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(first_row) => first_row.iter().map(cell_to_header).collect(),
        None => return Dataset::default(),
    };

    rows.filter(|row| row.iter().any(|cell| !matches!(cell, DataType::Empty)))
        .map(|row| {
            headers
                .iter()
                .enumerate()
                .filter(|(_, header)| !header.is_empty())
                .map(|(col_idx, header)| (header.clone(), cell_to_value(row.get(col_idx))))
                .collect::<Record>()
        })
        .collect()
}

fn cell_to_header(cell: &DataType) -> String {
    match cell {
        DataType::Empty => String::new(),
        other => other.to_string(),
    }
}

fn cell_to_value(cell: Option<&DataType>) -> Value {
    match cell {
        Some(DataType::String(value)) => Value::String(value.clone()),
        Some(DataType::Float(value)) => Value::Float(*value),
        Some(DataType::Int(value)) => Value::Integer(*value),
        Some(DataType::Bool(value)) => Value::Boolean(*value),
        Some(DataType::DateTime(serial)) => excel_serial_to_timestamp(*serial)
            .map(Value::Timestamp)
            .unwrap_or(Value::Float(*serial)),
        Some(DataType::Empty) | None => Value::Null,
        Some(other) => Value::String(other.to_string()),
    }
}

/// Converts an Excel serial date (days since 1899-12-30, fraction = time of
/// day) into a timestamp.
fn excel_serial_to_timestamp(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}
