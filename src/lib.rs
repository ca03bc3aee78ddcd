//! Core library for the table-recon command line application.
//!
//! The library reconciles two tabular datasets and explains their
//! discrepancies. The pipeline stages are kept narrow and composable:
//! column canonicalisation and deduplication in [`normalize`], key inference
//! in [`keys`], cell equality in [`compare`], joining in [`matcher`] and
//! [`missing`], and result assembly in [`aggregate`]. [`engine`] wires them
//! together and [`registry`] keeps results by name. File adapters live under
//! [`io`] and report rendering under [`export`].

pub mod aggregate;
pub mod compare;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod io;
pub mod keys;
pub mod logging;
pub mod matcher;
pub mod missing;
pub mod model;
pub mod normalize;
pub mod registry;

pub use aggregate::{ComparisonResult, Differences, Metadata, Summary};
pub use compare::{StringPolicy, Tolerance, differs};
pub use config::ReconConfig;
pub use engine::{CompareOptions, Reconciler, run, run_with_numeric_tolerance};
pub use error::{ReconError, Result};
pub use export::ExportFormat;
pub use model::{Dataset, Record, Value};
pub use registry::{ResultRegistry, ResultSummary};
