//! The comparison pipeline and the caller-facing [`Reconciler`].
//!
//! A comparison runs synchronously: normalization of both datasets, key
//! resolution, record matching, missing-record detection in both directions
//! and aggregation. [`run`] returns the result to the caller only;
//! [`Reconciler`] additionally stores it in a [`ResultRegistry`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::aggregate::{self, ComparisonResult, Findings, Resolved};
use crate::compare::{StringPolicy, Tolerance};
use crate::error::{ReconError, Result};
use crate::export::{self, ExportFormat};
use crate::keys::{self, KeyResolution, KeyStrategy};
use crate::matcher;
use crate::missing;
use crate::model::{Dataset, canonical_columns};
use crate::normalize::{self, Normalization, NormalizedDataset};
use crate::registry::{ResultRegistry, ResultSummary};

/// Caller choices for one comparison. Column names may use any case or
/// surrounding whitespace; they are canonicalised before use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    /// Ordered key columns. Empty means infer.
    pub key_columns: Vec<String>,
    /// Columns left out of field comparison.
    pub exclude_columns: Vec<String>,
    pub tolerance: Tolerance,
}

impl CompareOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a numeric threshold; it is validated when the comparison runs.
    pub fn tolerance(mut self, column: impl Into<String>, threshold: f64) -> Self {
        self.tolerance.numeric.insert(column.into(), threshold);
        self
    }

    pub fn strings(mut self, policy: StringPolicy) -> Self {
        self.tolerance.strings = policy;
        self
    }

    pub fn string_override(mut self, column: impl Into<String>, policy: StringPolicy) -> Self {
        self.tolerance.string_overrides.insert(column.into(), policy);
        self
    }
}

/// Compares `source` against `target` without storing the result.
///
/// Only an invalid tolerance is an error. Data problems degrade the result
/// and are listed in `metadata.warnings`.
#[instrument(
    level = "info",
    skip_all,
    fields(comparison = %name, source_rows = source.len(), target_rows = target.len())
)]
pub fn run(
    name: &str,
    source: &Dataset,
    target: &Dataset,
    options: &CompareOptions,
) -> Result<ComparisonResult> {
    let tolerance = options.tolerance.canonicalized()?;
    let requested_key = canonical_columns(&options.key_columns);
    let excluded = canonical_columns(&options.exclude_columns);
    let mut warnings = Vec::new();

    let (source_data, target_data, key) = if requested_key.is_empty() {
        prepare_with_inferred_key(source, target, &mut warnings)
    } else {
        prepare_with_supplied_key(source, target, requested_key, &mut warnings)
    };

    let excluded_set: HashSet<&str> = excluded.iter().map(String::as_str).collect();
    let source_columns = source_data.clean.columns();
    let target_columns = target_data.clean.columns();
    let common_columns: Vec<String> = keys::common_columns(&source_data.clean, &target_data.clean)
        .into_iter()
        .filter(|column| !excluded_set.contains(column.as_str()))
        .collect();
    let source_only_columns = exclusive_columns(&source_columns, &target_columns, &excluded_set);
    let target_only_columns = exclusive_columns(&target_columns, &source_columns, &excluded_set);

    if common_columns.is_empty() && !(source_data.clean.is_empty() && target_data.clean.is_empty()) {
        warn!("datasets share no comparable columns, only missing records can be reported");
    }

    let fields = matcher::match_records(
        &source_data.clean,
        &target_data.clean,
        &key.columns,
        &common_columns,
        &tolerance,
    );
    let missing_in_target = missing::find_missing(&source_data.clean, &target_data.clean, &key.columns);
    let missing_in_source = missing::find_missing(&target_data.clean, &source_data.clean, &key.columns);

    let result = aggregate::aggregate(
        name,
        Findings {
            source_rows: source.len(),
            target_rows: target.len(),
            source: source_data,
            target: target_data,
            fields,
            missing_in_target,
            missing_in_source,
        },
        Resolved {
            key,
            common_columns,
            excluded_columns: excluded,
            source_only_columns,
            target_only_columns,
            tolerance: tolerance.numeric.clone(),
            string_policy: tolerance.strings,
            warnings,
        },
    );

    info!(
        field_differences = result.summary.field_differences,
        missing_in_target = result.summary.missing_in_target,
        missing_in_source = result.summary.missing_in_source,
        match_percentage = result.summary.match_percentage,
        "comparison completed"
    );
    Ok(result)
}

/// Like [`run`], applying `numeric_tolerance` to every common column that
/// holds only numbers. Thresholds already present in `options` win.
pub fn run_with_numeric_tolerance(
    name: &str,
    source: &Dataset,
    target: &Dataset,
    numeric_tolerance: f64,
    options: &CompareOptions,
) -> Result<ComparisonResult> {
    let mut options = options.clone();
    apply_numeric_tolerance(&mut options, source, target, numeric_tolerance)?;
    run(name, source, target, &options)
}

fn apply_numeric_tolerance(
    options: &mut CompareOptions,
    source: &Dataset,
    target: &Dataset,
    numeric_tolerance: f64,
) -> Result<()> {
    if numeric_tolerance.is_nan() || numeric_tolerance < 0.0 {
        return Err(ReconError::InvalidTolerance {
            column: "*".to_string(),
            value: numeric_tolerance,
        });
    }
    let mut scalar = Tolerance::default();
    for column in numeric_columns(source, target) {
        scalar.set_numeric(&column, numeric_tolerance)?;
    }
    let explicit: HashSet<String> = canonical_columns(
        &options.tolerance.numeric.keys().collect::<Vec<_>>(),
    )
    .into_iter()
    .collect();
    for (column, threshold) in scalar.numeric {
        if !explicit.contains(&column) {
            options.tolerance.numeric.insert(column, threshold);
        }
    }
    Ok(())
}

/// Common columns whose non-null values are all numeric in both datasets.
pub fn numeric_columns(source: &Dataset, target: &Dataset) -> Vec<String> {
    let source = normalize::canonicalize_columns(source).unwrap_or_else(|_| source.clone());
    let target = normalize::canonicalize_columns(target).unwrap_or_else(|_| target.clone());
    keys::common_columns(&source, &target)
        .into_iter()
        .filter(|column| {
            let mut seen_number = false;
            let all_numeric = source.iter().chain(target.iter()).all(|record| {
                match record.get(column) {
                    Some(value) if value.is_numeric() => {
                        seen_number = true;
                        true
                    }
                    Some(value) => value.is_null(),
                    None => true,
                }
            });
            all_numeric && seen_number
        })
        .collect()
}

fn prepare_with_supplied_key(
    source: &Dataset,
    target: &Dataset,
    requested_key: Vec<String>,
    warnings: &mut Vec<String>,
) -> (NormalizedDataset, NormalizedDataset, KeyResolution) {
    let source_data = take_normalized(
        normalize::normalize(source, &requested_key, "source"),
        "source",
        warnings,
    );
    let target_data = take_normalized(
        normalize::normalize(target, &requested_key, "target"),
        "target",
        warnings,
    );

    let usable = requested_key.iter().all(|column| {
        (source_data.clean.is_empty() || source_data.clean.has_column(column))
            && (target_data.clean.is_empty() || target_data.clean.has_column(column))
    });
    let key = if usable {
        KeyResolution::supplied(requested_key, &source_data.clean, &target_data.clean)
    } else {
        warn!(key = ?requested_key, "key columns missing from a dataset, matching skipped");
        warnings.push(format!(
            "key {requested_key:?} is not present in both datasets; no records were matched"
        ));
        KeyResolution::none()
    };
    (source_data, target_data, key)
}

fn prepare_with_inferred_key(
    source: &Dataset,
    target: &Dataset,
    warnings: &mut Vec<String>,
) -> (NormalizedDataset, NormalizedDataset, KeyResolution) {
    let source_norm = normalize::normalize(source, &[], "source");
    let target_norm = normalize::normalize(target, &[], "target");
    let source_cleaned = source_norm.is_clean();
    let target_cleaned = target_norm.is_clean();
    let source_data = take_normalized(source_norm, "source", warnings);
    let target_data = take_normalized(target_norm, "target", warnings);

    let key = keys::resolve_keys(&source_data.clean, &target_data.clean);
    match key.strategy {
        KeyStrategy::None => {
            if !(source_data.clean.is_empty() && target_data.clean.is_empty()) {
                warnings.push("no key column could be inferred; no records were matched".into());
            }
            return (source_data, target_data, key);
        }
        KeyStrategy::FirstCommonColumn => warnings.push(format!(
            "key {:?} is a last-resort guess; treat matches as unreliable",
            key.columns
        )),
        _ if !key.unique => warnings.push(format!(
            "inferred key {:?} is not unique; later records sharing a key were set aside as duplicates",
            key.columns
        )),
        _ => {}
    }

    let source_data = if source_cleaned {
        normalize::deduplicate(&source_data.clean, &key.columns, "source")
    } else {
        source_data
    };
    let target_data = if target_cleaned {
        normalize::deduplicate(&target_data.clean, &key.columns, "target")
    } else {
        target_data
    };
    (source_data, target_data, key)
}

fn take_normalized(
    normalization: Normalization,
    label: &str,
    warnings: &mut Vec<String>,
) -> NormalizedDataset {
    if let Some(warning) = normalization.warning() {
        warnings.push(format!("{label}: {warning}; compared without cleaning"));
    }
    normalization.dataset
}

fn exclusive_columns(
    columns: &[String],
    other: &[String],
    excluded: &HashSet<&str>,
) -> Vec<String> {
    let other: HashSet<&str> = other.iter().map(String::as_str).collect();
    columns
        .iter()
        .filter(|column| !other.contains(column.as_str()) && !excluded.contains(column.as_str()))
        .cloned()
        .collect()
}

/// Runs comparisons and keeps their results in a shared registry.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    registry: Arc<ResultRegistry>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a caller-owned registry, e.g. one shared between workers.
    pub fn with_registry(registry: Arc<ResultRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ResultRegistry> {
        &self.registry
    }

    /// Compares two datasets and stores the result under `name`, replacing
    /// any earlier result with that name.
    pub fn compare(
        &self,
        name: &str,
        source: &Dataset,
        target: &Dataset,
        options: &CompareOptions,
    ) -> Result<Arc<ComparisonResult>> {
        let result = run(name, source, target, options)?;
        Ok(self.registry.store(result))
    }

    /// [`Reconciler::compare`] with one scalar tolerance for every numeric
    /// common column.
    pub fn compare_with_numeric_tolerance(
        &self,
        name: &str,
        source: &Dataset,
        target: &Dataset,
        numeric_tolerance: f64,
        options: &CompareOptions,
    ) -> Result<Arc<ComparisonResult>> {
        let result = run_with_numeric_tolerance(name, source, target, numeric_tolerance, options)?;
        Ok(self.registry.store(result))
    }

    pub fn get_result(&self, name: &str) -> Option<Arc<ComparisonResult>> {
        self.registry.get(name)
    }

    pub fn get_summary(&self, name: &str) -> Option<ResultSummary> {
        self.registry.summary(name)
    }

    pub fn get_all_summaries(&self) -> BTreeMap<String, ResultSummary> {
        self.registry.summaries()
    }

    pub fn clear(&self) {
        self.registry.clear();
    }

    /// Exports a stored result into `directory`. Failures are reported as
    /// [`ReconError::Export`]; the stored result is unaffected.
    pub fn export(&self, name: &str, format: ExportFormat, directory: &Path) -> Result<Vec<PathBuf>> {
        let result = self
            .registry
            .get(name)
            .ok_or_else(|| ReconError::UnknownComparison(name.to_string()))?;
        export::export_result(&result, format, directory).map_err(|source| {
            warn!(comparison = name, error = %source, "export failed");
            ReconError::Export {
                name: name.to_string(),
                source: Box::new(source),
            }
        })
    }
}
