//! Tolerance-aware cell equality.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ReconError, Result};
use crate::model::{Value, canonical_column};

/// Absolute difference below which two numbers with no configured tolerance
/// still count as equal. Absorbs floating-point representation noise.
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// How two strings are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringPolicy {
    /// Trim surrounding whitespace and ignore case.
    #[default]
    Relaxed,
    /// Byte-for-byte equality.
    Exact,
}

/// Per-column numeric thresholds and string policies used by [`differs`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    /// Column → maximum absolute difference still considered equal.
    pub numeric: BTreeMap<String, f64>,
    /// Policy for columns without an override.
    pub strings: StringPolicy,
    /// Column → string policy override.
    pub string_overrides: BTreeMap<String, StringPolicy>,
}

impl Tolerance {
    /// Builds a tolerance map with canonical column names, rejecting
    /// negative or NaN thresholds.
    pub fn from_numeric<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut tolerance = Tolerance::default();
        for (column, threshold) in entries {
            tolerance.set_numeric(column.as_ref(), threshold)?;
        }
        Ok(tolerance)
    }

    pub fn set_numeric(&mut self, column: &str, threshold: f64) -> Result<()> {
        if threshold.is_nan() || threshold < 0.0 {
            return Err(ReconError::InvalidTolerance {
                column: column.to_string(),
                value: threshold,
            });
        }
        self.numeric.insert(canonical_column(column), threshold);
        Ok(())
    }

    pub fn with_strings(mut self, policy: StringPolicy) -> Self {
        self.strings = policy;
        self
    }

    /// Returns a copy with every column name canonicalised and thresholds
    /// validated. Entries that canonicalise to the same column must agree.
    pub fn canonicalized(&self) -> Result<Self> {
        let mut tolerance = Tolerance {
            strings: self.strings,
            ..Tolerance::default()
        };
        for (column, threshold) in &self.numeric {
            let canonical = canonical_column(column);
            if let Some(existing) = tolerance.numeric.get(&canonical) {
                if existing != threshold {
                    return Err(conflicting_entries(&canonical, existing, threshold));
                }
            }
            tolerance.set_numeric(column, *threshold)?;
        }
        for (column, policy) in &self.string_overrides {
            let canonical = canonical_column(column);
            if let Some(existing) = tolerance.string_overrides.get(&canonical) {
                if existing != policy {
                    return Err(conflicting_entries(&canonical, existing, policy));
                }
            }
            tolerance.string_overrides.insert(canonical, *policy);
        }
        Ok(tolerance)
    }

    pub fn numeric_threshold(&self, column: &str) -> f64 {
        self.numeric.get(column).copied().unwrap_or(DEFAULT_EPSILON)
    }

    pub fn string_policy(&self, column: &str) -> StringPolicy {
        self.string_overrides
            .get(column)
            .copied()
            .unwrap_or(self.strings)
    }
}

fn conflicting_entries(column: &str, first: &dyn fmt::Debug, second: &dyn fmt::Debug) -> ReconError {
    ReconError::Config(format!(
        "conflicting tolerance entries for column '{column}': {first:?} and {second:?}"
    ))
}

/// Decides whether two cell values of `column` differ.
///
/// Nulls (including NaN) equal only nulls. Numbers differ when their
/// absolute difference exceeds the column threshold. Strings follow the
/// column's [`StringPolicy`]. Anything else, including a type mismatch,
/// differs unless the values are identical.
pub fn differs(a: &Value, b: &Value, column: &str, tolerance: &Tolerance) -> bool {
    match (a.is_null(), b.is_null()) {
        (true, true) => return false,
        (true, false) | (false, true) => return true,
        (false, false) => {}
    }

    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => {
            let delta = (i128::from(*x) - i128::from(*y)).unsigned_abs() as f64;
            delta > tolerance.numeric_threshold(column)
        }
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => (x - y).abs() > tolerance.numeric_threshold(column),
                _ => true,
            }
        }
        (Value::String(x), Value::String(y)) => match tolerance.string_policy(column) {
            StringPolicy::Relaxed => x.trim().to_lowercase() != y.trim().to_lowercase(),
            StringPolicy::Exact => x != y,
        },
        _ => a != b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn salary_tolerance(threshold: f64) -> Tolerance {
        Tolerance::from_numeric([("salary", threshold)]).expect("valid tolerance")
    }

    #[test]
    fn nulls_only_equal_nulls() {
        let tolerance = Tolerance::default();
        assert!(!differs(&Value::Null, &Value::Null, "c", &tolerance));
        assert!(!differs(&Value::Float(f64::NAN), &Value::Null, "c", &tolerance));
        assert!(differs(&Value::Null, &Value::from(0), "c", &tolerance));
        assert!(differs(&Value::from(""), &Value::Null, "c", &tolerance));
    }

    #[test]
    fn numbers_use_default_epsilon_without_tolerance() {
        let tolerance = Tolerance::default();
        assert!(!differs(&Value::from(0.1 + 0.2), &Value::from(0.3), "x", &tolerance));
        assert!(!differs(&Value::from(5), &Value::from(5.0), "x", &tolerance));
        assert!(differs(&Value::from(5), &Value::from(5.001), "x", &tolerance));
    }

    #[test]
    fn tolerance_is_monotonic_around_the_difference() {
        let a = Value::from(50_000.0);
        let b = Value::from(50_050.0);
        for threshold in [0.0, 10.0, 49.0, 49.999] {
            assert!(differs(&a, &b, "salary", &salary_tolerance(threshold)));
        }
        for threshold in [50.0, 50.5, 100.0, 1e9] {
            assert!(!differs(&a, &b, "salary", &salary_tolerance(threshold)));
        }
    }

    #[test]
    fn tolerance_only_applies_to_its_column() {
        let tolerance = salary_tolerance(100.0);
        assert!(differs(&Value::from(1.0), &Value::from(2.0), "bonus", &tolerance));
    }

    #[test]
    fn extreme_integers_do_not_overflow() {
        let tolerance = Tolerance::default();
        assert!(differs(&Value::from(i64::MIN), &Value::from(i64::MAX), "n", &tolerance));
    }

    #[test]
    fn strings_are_relaxed_by_default() {
        let tolerance = Tolerance::default();
        assert!(!differs(&Value::from("OK"), &Value::from(" ok "), "status", &tolerance));
        assert!(differs(&Value::from("Bob"), &Value::from("Robert"), "name", &tolerance));
    }

    #[test]
    fn exact_string_policy_can_be_selected_per_column() {
        let mut tolerance = Tolerance::default();
        tolerance
            .string_overrides
            .insert("status".to_string(), StringPolicy::Exact);
        assert!(differs(&Value::from("OK"), &Value::from("ok"), "status", &tolerance));
        assert!(!differs(&Value::from("OK"), &Value::from("ok"), "name", &tolerance));

        let exact = Tolerance::default().with_strings(StringPolicy::Exact);
        assert!(differs(&Value::from("a "), &Value::from("a"), "name", &exact));
    }

    #[test]
    fn mismatched_types_differ() {
        let tolerance = Tolerance::default();
        assert!(differs(&Value::from("1"), &Value::from(1), "c", &tolerance));
        assert!(differs(&Value::from(true), &Value::from(1), "c", &tolerance));
        assert!(!differs(&Value::from(true), &Value::from(true), "c", &tolerance));
    }

    #[test]
    fn columns_differing_only_in_case_must_agree() {
        let mut tolerance = Tolerance::default();
        tolerance.numeric.insert("Salary".to_string(), 100.0);
        tolerance.numeric.insert("salary ".to_string(), 100.0);
        let canonical = tolerance.canonicalized().expect("matching entries merge");
        assert_eq!(canonical.numeric.get("salary"), Some(&100.0));

        tolerance.numeric.insert("salary".to_string(), 5.0);
        assert!(matches!(tolerance.canonicalized(), Err(ReconError::Config(_))));

        let mut strings = Tolerance::default();
        strings.string_overrides.insert("Status".to_string(), StringPolicy::Exact);
        strings.string_overrides.insert("status".to_string(), StringPolicy::Relaxed);
        assert!(matches!(strings.canonicalized(), Err(ReconError::Config(_))));
    }

    #[test]
    fn negative_or_nan_tolerance_is_rejected() {
        assert!(Tolerance::from_numeric([("salary", -1.0)]).is_err());
        assert!(Tolerance::from_numeric([("salary", f64::NAN)]).is_err());
    }
}
