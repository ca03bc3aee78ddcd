//! Key inference for callers that do not name their key columns.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{info, warn};

use crate::model::{Dataset, KeyTuple};

/// How the key columns of a comparison were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Named by the caller.
    Supplied,
    /// First common column whose name contains `id`.
    IdLikeColumn,
    /// First common column with distinct values in both datasets.
    UniqueColumn,
    /// Last resort: the first common column, uniqueness not guaranteed.
    FirstCommonColumn,
    /// No key could be determined; matching is skipped.
    None,
}

/// Outcome of key resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyResolution {
    /// Ordered key columns, empty when none could be found.
    pub columns: Vec<String>,
    pub strategy: KeyStrategy,
    /// Every common id-like column seen, in source order.
    pub candidates: Vec<String>,
    /// Whether the key identifies records uniquely in both datasets.
    pub unique: bool,
}

impl KeyResolution {
    pub fn supplied(columns: Vec<String>, source: &Dataset, target: &Dataset) -> Self {
        let unique = !columns.is_empty()
            && is_unique(source, &columns)
            && is_unique(target, &columns);
        let strategy = if columns.is_empty() {
            KeyStrategy::None
        } else {
            KeyStrategy::Supplied
        };
        Self {
            columns,
            strategy,
            candidates: Vec::new(),
            unique,
        }
    }

    pub fn none() -> Self {
        Self {
            columns: Vec::new(),
            strategy: KeyStrategy::None,
            candidates: Vec::new(),
            unique: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// A key from the last-resort rule, or one that failed the uniqueness
    /// check, cannot be trusted to pair records correctly.
    pub fn is_reliable(&self) -> bool {
        !self.is_empty() && self.unique && self.strategy != KeyStrategy::FirstCommonColumn
    }
}

/// Picks key columns for two canonicalised datasets.
///
/// The first applicable rule wins: an id-like common column, then the first
/// common column that is distinct in both datasets, then the first common
/// column. The chosen key is always checked for uniqueness.
pub fn resolve_keys(source: &Dataset, target: &Dataset) -> KeyResolution {
    let common = common_columns(source, target);
    if common.is_empty() {
        warn!("no columns shared by both datasets, no key can be inferred");
        return KeyResolution::none();
    }

    let candidates: Vec<String> = common
        .iter()
        .filter(|column| column.contains("id"))
        .cloned()
        .collect();

    let (column, strategy) = if let Some(first) = candidates.first() {
        (first.clone(), KeyStrategy::IdLikeColumn)
    } else if let Some(unique) = common
        .iter()
        .find(|column| is_unique(source, column_slice(column)) && is_unique(target, column_slice(column)))
    {
        (unique.clone(), KeyStrategy::UniqueColumn)
    } else {
        (common[0].clone(), KeyStrategy::FirstCommonColumn)
    };

    let columns = vec![column];
    let unique = is_unique(source, &columns) && is_unique(target, &columns);
    if unique {
        info!(key = ?columns, ?strategy, "inferred key columns");
    } else {
        warn!(
            key = ?columns,
            ?strategy,
            "inferred key is not unique, matches for repeated values are unreliable"
        );
    }

    KeyResolution {
        columns,
        strategy,
        candidates,
        unique,
    }
}

/// Columns present in both datasets, in source order.
pub fn common_columns(source: &Dataset, target: &Dataset) -> Vec<String> {
    let target_columns: HashSet<String> = target.columns().into_iter().collect();
    source
        .columns()
        .into_iter()
        .filter(|column| target_columns.contains(column))
        .collect()
}

/// Whether the key tuple is distinct across every record of the dataset.
pub fn is_unique(dataset: &Dataset, key_columns: &[String]) -> bool {
    let mut seen: HashSet<KeyTuple> = HashSet::with_capacity(dataset.len());
    dataset
        .iter()
        .all(|record| seen.insert(record.key(key_columns)))
}

fn column_slice(column: &String) -> &[String] {
    std::slice::from_ref(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    fn dataset(rows: Vec<Record>) -> Dataset {
        Dataset::new(rows)
    }

    #[test]
    fn id_like_column_wins_and_candidates_are_listed() {
        let source = dataset(vec![
            Record::new().with("name", "a").with("customer_id", 1).with("order_id", 7),
        ]);
        let target = dataset(vec![
            Record::new().with("order_id", 7).with("customer_id", 1).with("name", "a"),
        ]);
        let resolution = resolve_keys(&source, &target);
        assert_eq!(resolution.columns, vec!["customer_id"]);
        assert_eq!(resolution.strategy, KeyStrategy::IdLikeColumn);
        assert_eq!(resolution.candidates, vec!["customer_id", "order_id"]);
        assert!(resolution.unique);
    }

    #[test]
    fn unique_column_is_chosen_without_id_columns() {
        let source = dataset(vec![
            Record::new().with("group", "x").with("code", "A"),
            Record::new().with("group", "x").with("code", "B"),
        ]);
        let target = dataset(vec![
            Record::new().with("group", "y").with("code", "A"),
            Record::new().with("group", "z").with("code", "C"),
        ]);
        let resolution = resolve_keys(&source, &target);
        assert_eq!(resolution.columns, vec!["code"]);
        assert_eq!(resolution.strategy, KeyStrategy::UniqueColumn);
        assert!(resolution.is_reliable());
    }

    #[test]
    fn falls_back_to_first_common_column_and_flags_it() {
        let source = dataset(vec![
            Record::new().with("colour", "red"),
            Record::new().with("colour", "red"),
        ]);
        let target = dataset(vec![Record::new().with("colour", "red")]);
        let resolution = resolve_keys(&source, &target);
        assert_eq!(resolution.columns, vec!["colour"]);
        assert_eq!(resolution.strategy, KeyStrategy::FirstCommonColumn);
        assert!(!resolution.unique);
        assert!(!resolution.is_reliable());
    }

    #[test]
    fn disjoint_schemas_yield_no_key() {
        let source = dataset(vec![Record::new().with("a", 1)]);
        let target = dataset(vec![Record::new().with("b", 1)]);
        let resolution = resolve_keys(&source, &target);
        assert!(resolution.is_empty());
        assert_eq!(resolution.strategy, KeyStrategy::None);
    }
}
