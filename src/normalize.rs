//! Column-name canonicalisation and key-based deduplication.
//!
//! Normalization is fail-open: a dataset that cannot be cleaned is handed
//! back without deduplication together with a [`NormalizeWarning`], so one
//! malformed column never blocks a whole reconciliation run.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::model::{Dataset, KeyTuple, Record, canonical_column};

/// Clean records plus the records routed aside as key duplicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedDataset {
    pub clean: Dataset,
    pub duplicates: Dataset,
}

/// Why normalization fell back to the original dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizeWarning {
    /// Two raw columns of the same record share a canonical name.
    ColumnCollision { record: usize, column: String },
    /// A requested key column does not appear in any record.
    MissingKeyColumn { column: String },
}

impl fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ColumnCollision { record, column } => write!(
                f,
                "record {record}: several columns normalise to '{column}'"
            ),
            Self::MissingKeyColumn { column } => {
                write!(f, "key column '{column}' is absent from the dataset")
            }
        }
    }
}

/// Outcome tag of a normalization call.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeStatus {
    Cleaned,
    FellBack(NormalizeWarning),
}

/// Tagged normalization result. On fallback `dataset.duplicates` is empty
/// and `dataset.clean` holds every input record: the original input after a
/// column collision, the canonicalised input when a key column is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    pub dataset: NormalizedDataset,
    pub status: NormalizeStatus,
}

impl Normalization {
    fn cleaned(dataset: NormalizedDataset) -> Self {
        Self {
            dataset,
            status: NormalizeStatus::Cleaned,
        }
    }

    fn fell_back(clean: Dataset, warning: NormalizeWarning) -> Self {
        Self {
            dataset: NormalizedDataset {
                clean,
                duplicates: Dataset::default(),
            },
            status: NormalizeStatus::FellBack(warning),
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self.status, NormalizeStatus::Cleaned)
    }

    pub fn warning(&self) -> Option<&NormalizeWarning> {
        match &self.status {
            NormalizeStatus::Cleaned => None,
            NormalizeStatus::FellBack(warning) => Some(warning),
        }
    }
}

/// Canonicalises column names and, when a key is given, removes records
/// whose key tuple was already seen.
///
/// `key_columns` must already be canonical. An empty key skips
/// deduplication.
#[instrument(level = "debug", skip(dataset, key_columns), fields(rows = dataset.len()))]
pub fn normalize(dataset: &Dataset, key_columns: &[String], label: &str) -> Normalization {
    let canonical = match canonicalize_columns(dataset) {
        Ok(canonical) => canonical,
        Err(warning) => {
            warn!(dataset = label, %warning, "normalization fell back to original data");
            return Normalization::fell_back(dataset.clone(), warning);
        }
    };

    if key_columns.is_empty() {
        debug!(dataset = label, "no key supplied, deduplication skipped");
        return Normalization::cleaned(NormalizedDataset {
            clean: canonical,
            duplicates: Dataset::default(),
        });
    }

    if let Some(column) = missing_key_column(&canonical, key_columns) {
        let warning = NormalizeWarning::MissingKeyColumn {
            column: column.to_string(),
        };
        warn!(dataset = label, %warning, "deduplication skipped");
        return Normalization::fell_back(canonical, warning);
    }

    Normalization::cleaned(deduplicate(&canonical, key_columns, label))
}

/// Returns a copy of the dataset with every column name canonicalised.
pub fn canonicalize_columns(dataset: &Dataset) -> Result<Dataset, NormalizeWarning> {
    let mut records = Vec::with_capacity(dataset.len());
    for (index, record) in dataset.iter().enumerate() {
        let mut seen = HashSet::with_capacity(record.len());
        let mut canonical = Record::new();
        for (column, value) in record.fields() {
            let name = canonical_column(column);
            if !seen.insert(name.clone()) {
                return Err(NormalizeWarning::ColumnCollision {
                    record: index,
                    column: name,
                });
            }
            canonical.insert(name, value.clone());
        }
        records.push(canonical);
    }
    Ok(Dataset::new(records))
}

/// Keeps the first record per key tuple and routes every later one to the
/// duplicate set, whatever its non-key fields hold.
pub fn deduplicate(dataset: &Dataset, key_columns: &[String], label: &str) -> NormalizedDataset {
    let mut seen: HashSet<KeyTuple> = HashSet::with_capacity(dataset.len());
    let mut clean = Vec::with_capacity(dataset.len());
    let mut duplicates = Vec::new();

    for record in dataset.iter() {
        if seen.insert(record.key(key_columns)) {
            clean.push(record.clone());
        } else {
            duplicates.push(record.clone());
        }
    }

    info!(
        dataset = label,
        key = ?key_columns,
        clean = clean.len(),
        duplicates = duplicates.len(),
        "deduplicated dataset"
    );

    NormalizedDataset {
        clean: Dataset::new(clean),
        duplicates: Dataset::new(duplicates),
    }
}

fn missing_key_column<'a>(dataset: &Dataset, key_columns: &'a [String]) -> Option<&'a str> {
    if dataset.is_empty() {
        return None;
    }
    key_columns
        .iter()
        .find(|column| !dataset.has_column(column))
        .map(String::as_str)
}
