use std::collections::HashSet;

use tracing::debug;

use crate::model::{Dataset, KeyTuple};

/// Returns every record of `reference` whose key tuple appears nowhere in
/// `other`, in `reference` order.
///
/// All key columns must match the same counterpart record. An empty key
/// reports nothing.
pub fn find_missing(reference: &Dataset, other: &Dataset, key_columns: &[String]) -> Dataset {
    if key_columns.is_empty() {
        debug!("no key columns, missing-record detection skipped");
        return Dataset::default();
    }

    let present: HashSet<KeyTuple> = other
        .iter()
        .map(|record| record.key(key_columns))
        .collect();

    reference
        .iter()
        .filter(|record| !present.contains(&record.key(key_columns)))
        .cloned()
        .collect()
}
