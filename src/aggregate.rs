//! Assembly of a [`ComparisonResult`] and its match score.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::compare::StringPolicy;
use crate::error::{ReconError, Result};
use crate::keys::{KeyResolution, KeyStrategy};
use crate::matcher::FieldDifference;
use crate::model::Dataset;
use crate::normalize::NormalizedDataset;

/// Counters describing one reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub source_rows: usize,
    pub target_rows: usize,
    pub source_clean_rows: usize,
    pub target_clean_rows: usize,
    pub source_duplicates: usize,
    pub target_duplicates: usize,
    pub field_differences: usize,
    pub missing_in_target: usize,
    pub missing_in_source: usize,
    pub total_differences: usize,
    pub match_percentage: f64,
}

/// How the comparison was configured once keys and columns were resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub key_columns: Vec<String>,
    pub key_strategy: KeyStrategy,
    pub key_candidates: Vec<String>,
    pub key_unique: bool,
    pub common_columns: Vec<String>,
    pub excluded_columns: Vec<String>,
    pub source_only_columns: Vec<String>,
    pub target_only_columns: Vec<String>,
    pub tolerance: BTreeMap<String, f64>,
    pub string_policy: StringPolicy,
    /// Fail-open recoveries that degraded this comparison.
    pub warnings: Vec<String>,
}

/// Categorised findings of a comparison.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Differences {
    pub fields: Vec<FieldDifference>,
    pub missing_in_target: Dataset,
    pub missing_in_source: Dataset,
    pub source_duplicates: Dataset,
    pub target_duplicates: Dataset,
}

/// Immutable outcome of one comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    pub name: String,
    pub summary: Summary,
    pub metadata: Metadata,
    pub differences: Differences,
    pub timestamp: DateTime<Utc>,
}

impl ComparisonResult {
    pub fn has_differences(&self) -> bool {
        self.summary.total_differences > 0
    }

    /// False when the key came from the last-resort rule or did not identify
    /// records uniquely, or when no key could be used at all.
    pub fn is_reliable(&self) -> bool {
        !self.metadata.key_columns.is_empty()
            && self.metadata.key_unique
            && self.metadata.key_strategy != KeyStrategy::FirstCommonColumn
    }

    pub fn ensure_no_differences(&self) -> Result<()> {
        self.ensure_at_most(0)
    }

    /// Fails when more than `allowed` differences were found.
    pub fn ensure_at_most(&self, allowed: usize) -> Result<()> {
        let found = self.summary.total_differences;
        if found > allowed {
            return Err(ReconError::DifferencesExceeded {
                name: self.name.clone(),
                found,
                allowed,
            });
        }
        Ok(())
    }
}

/// Pipeline outputs handed to [`aggregate`].
#[derive(Debug)]
pub struct Findings {
    pub source_rows: usize,
    pub target_rows: usize,
    pub source: NormalizedDataset,
    pub target: NormalizedDataset,
    pub fields: Vec<FieldDifference>,
    pub missing_in_target: Dataset,
    pub missing_in_source: Dataset,
}

/// Configuration facts recorded in [`Metadata`].
#[derive(Debug)]
pub struct Resolved {
    pub key: KeyResolution,
    pub common_columns: Vec<String>,
    pub excluded_columns: Vec<String>,
    pub source_only_columns: Vec<String>,
    pub target_only_columns: Vec<String>,
    pub tolerance: BTreeMap<String, f64>,
    pub string_policy: StringPolicy,
    pub warnings: Vec<String>,
}

/// Combines the pipeline outputs into one result stamped with the current
/// time.
pub fn aggregate(name: &str, findings: Findings, resolved: Resolved) -> ComparisonResult {
    let field_differences = findings.fields.len();
    let missing_in_target = findings.missing_in_target.len();
    let missing_in_source = findings.missing_in_source.len();
    let total_differences = field_differences + missing_in_target + missing_in_source;
    let source_clean_rows = findings.source.clean.len();
    let target_clean_rows = findings.target.clean.len();

    let summary = Summary {
        source_rows: findings.source_rows,
        target_rows: findings.target_rows,
        source_clean_rows,
        target_clean_rows,
        source_duplicates: findings.source.duplicates.len(),
        target_duplicates: findings.target.duplicates.len(),
        field_differences,
        missing_in_target,
        missing_in_source,
        total_differences,
        match_percentage: match_percentage(
            source_clean_rows,
            target_clean_rows,
            total_differences,
        ),
    };

    let metadata = Metadata {
        key_columns: resolved.key.columns,
        key_strategy: resolved.key.strategy,
        key_candidates: resolved.key.candidates,
        key_unique: resolved.key.unique,
        common_columns: resolved.common_columns,
        excluded_columns: resolved.excluded_columns,
        source_only_columns: resolved.source_only_columns,
        target_only_columns: resolved.target_only_columns,
        tolerance: resolved.tolerance,
        string_policy: resolved.string_policy,
        warnings: resolved.warnings,
    };

    ComparisonResult {
        name: name.to_string(),
        summary,
        metadata,
        differences: Differences {
            fields: findings.fields,
            missing_in_target: findings.missing_in_target,
            missing_in_source: findings.missing_in_source,
            source_duplicates: findings.source.duplicates,
            target_duplicates: findings.target.duplicates,
        },
        timestamp: Utc::now(),
    }
}

/// Share of records without a detected discrepancy, relative to the larger
/// clean dataset. Two empty datasets match fully; the score never drops
/// below zero.
pub fn match_percentage(source_clean: usize, target_clean: usize, total_differences: usize) -> f64 {
    let total = source_clean.max(target_clean);
    if total == 0 {
        return 100.0;
    }
    let total = total as f64;
    ((total - total_differences as f64) / total * 100.0).max(0.0)
}
