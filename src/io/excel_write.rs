use std::path::Path;

use rust_xlsxwriter::{Table, Workbook, Worksheet};

use crate::error::{ReconError, Result};
use crate::export::{MAX_EXCEL_CELL_LENGTH, ReportData, clean_cell_text};
use crate::model::Value;

/// Largest integer magnitude an Excel number cell holds exactly.
const MAX_EXACT_INTEGER: u64 = 1 << 53;

/// Writes the report tables to an `.xlsx` workbook, one sheet per table.
pub fn write_workbook(path: &Path, report: &ReportData) -> Result<()> {
    let mut workbook = Workbook::new();

    for table in &report.tables {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&table.sheet_name)?;

        for (col_idx, header) in table.columns.iter().enumerate() {
            worksheet.write_string(0, column_index(col_idx)?, header)?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            let excel_row = row_index(row_idx + 1)?;
            for (col_idx, cell) in row.iter().enumerate() {
                write_cell(worksheet, excel_row, column_index(col_idx)?, cell)?;
            }
        }

        if table.rows.is_empty() || table.columns.is_empty() {
            continue;
        }
        let mut excel_table = Table::new();
        excel_table.set_autofilter(true);
        let col_end = column_index(table.columns.len() - 1)?;
        worksheet.add_table(0, 0, row_index(table.rows.len())?, col_end, &excel_table)?;
    }

    workbook.save(path)?;
    Ok(())
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, value: &Value) -> Result<()> {
    match value {
        value if value.is_null() => {}
        Value::Integer(number) if number.unsigned_abs() > MAX_EXACT_INTEGER => {
            worksheet.write_string(row, col, number.to_string())?;
        }
        Value::Integer(number) => {
            worksheet.write_number(row, col, *number as f64)?;
        }
        Value::Float(number) => {
            worksheet.write_number(row, col, *number)?;
        }
        Value::Boolean(flag) => {
            worksheet.write_boolean(row, col, *flag)?;
        }
        other => {
            let text = clean_cell_text(&other.to_string(), MAX_EXCEL_CELL_LENGTH);
            worksheet.write_string(row, col, &text)?;
        }
    }
    Ok(())
}

fn column_index(index: usize) -> Result<u16> {
    u16::try_from(index)
        .map_err(|_| ReconError::InvalidWorkbook(format!("column {index} exceeds the sheet width")))
}

fn row_index(index: usize) -> Result<u32> {
    u32::try_from(index)
        .map_err(|_| ReconError::InvalidWorkbook(format!("row {index} exceeds the sheet height")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_positions_are_rejected() {
        assert_eq!(column_index(3).expect("small column"), 3);
        assert!(matches!(
            column_index(70_000),
            Err(ReconError::InvalidWorkbook(_))
        ));
        assert!(row_index(usize::MAX).is_err());
    }
}
