use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::compare::{Tolerance, differs};
use crate::model::{Dataset, KeyTuple, Record, Value};

/// One differing cell of a record pair matched by key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDifference {
    /// Key columns with the shared key values.
    pub key: Vec<(String, Value)>,
    pub column: String,
    pub source_value: Value,
    pub target_value: Value,
}

/// Inner-joins the clean datasets on the key and reports every common
/// non-key column whose values differ.
///
/// Records whose key exists on one side only are left to the missing-record
/// detector. An empty key yields no differences. Output follows source
/// record order, then `columns` order.
pub fn match_records(
    source: &Dataset,
    target: &Dataset,
    key_columns: &[String],
    columns: &[String],
    tolerance: &Tolerance,
) -> Vec<FieldDifference> {
    if key_columns.is_empty() {
        debug!("no key columns, field comparison skipped");
        return Vec::new();
    }

    let target_index = index_by_key(target, key_columns);
    let compared: Vec<&String> = columns
        .iter()
        .filter(|column| !key_columns.contains(*column))
        .collect();

    let mut differences = Vec::new();
    let mut matched = 0usize;
    for source_record in source.iter() {
        let Some(target_record) = target_index.get(&source_record.key(key_columns)) else {
            continue;
        };
        matched += 1;

        for column in &compared {
            let source_value = source_record.value_or_null(column);
            let target_value = target_record.value_or_null(column);
            if differs(source_value, target_value, column, tolerance) {
                differences.push(FieldDifference {
                    key: source_record.key_values(key_columns),
                    column: (*column).clone(),
                    source_value: source_value.clone(),
                    target_value: target_value.clone(),
                });
            }
        }
    }

    debug!(
        matched_pairs = matched,
        compared_columns = compared.len(),
        differences = differences.len(),
        "record matching finished"
    );
    differences
}

/// Maps each key tuple to its first record.
fn index_by_key<'a>(dataset: &'a Dataset, key_columns: &[String]) -> HashMap<KeyTuple, &'a Record> {
    let mut index = HashMap::with_capacity(dataset.len());
    for record in dataset.iter() {
        index.entry(record.key(key_columns)).or_insert(record);
    }
    index
}
