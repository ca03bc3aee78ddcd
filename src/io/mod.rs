//! File adapters around the in-memory core: dataset acquisition for the CLI
//! and report writers for the exporter.

pub mod csv_write;
pub mod dataset_read;
pub mod excel_read;
pub mod excel_write;
