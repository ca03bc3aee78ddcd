use std::path::Path;

use crate::error::Result;
use crate::export::{SheetTable, clean_cell_text};

/// Writes one report table as a CSV file with a header row.
pub fn write_table(path: &Path, table: &SheetTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(
            row.iter()
                .map(|value| clean_cell_text(&value.to_string(), usize::MAX)),
        )?;
    }
    writer.flush()?;
    Ok(())
}
