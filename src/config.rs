use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::compare::StringPolicy;
use crate::engine::CompareOptions;
use crate::error::{ReconError, Result};
use crate::export::ExportFormat;

/// Comparison settings loaded from a JSON file by the command-line tool.
///
/// ```json
/// {
///   "key_columns": ["id"],
///   "exclude_columns": ["updated_at"],
///   "tolerance": { "numeric": { "salary": 100.0 }, "strings": "exact" },
///   "numeric_tolerance": 0.01,
///   "max_differences": 0,
///   "export_format": "xlsx",
///   "output_dir": "output/exports"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    #[serde(flatten)]
    pub options: CompareOptions,
    /// One threshold for every numeric common column.
    pub numeric_tolerance: Option<f64>,
    /// Fail the run when more differences are found.
    pub max_differences: Option<usize>,
    pub export_format: Option<String>,
    pub output_dir: Option<PathBuf>,
}

impl ReconConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReconError::MissingInput(path.to_path_buf()));
        }
        let source = fs::read_to_string(path)?;
        let config: ReconConfig = serde_json::from_str(&source)
            .map_err(|err| ReconError::Config(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(threshold) = self.numeric_tolerance {
            if threshold.is_nan() || threshold < 0.0 {
                return Err(ReconError::Config(format!(
                    "numeric_tolerance must be a non-negative number, got {threshold}"
                )));
            }
        }
        self.options.tolerance.canonicalized()?;
        self.format()?;
        Ok(())
    }

    /// Export format, defaulting to xlsx.
    pub fn format(&self) -> Result<ExportFormat> {
        match &self.export_format {
            Some(name) => name.parse(),
            None => Ok(ExportFormat::Xlsx),
        }
    }

    pub fn string_policy(&self) -> StringPolicy {
        self.options.tolerance.strings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flattened_options() {
        let config: ReconConfig = serde_json::from_value(serde_json::json!({
            "key_columns": ["ID"],
            "tolerance": { "numeric": { "salary": 100.0 }, "strings": "exact" },
            "max_differences": 3,
            "export_format": "csv"
        }))
        .expect("config parsed");

        assert_eq!(config.options.key_columns, vec!["ID"]);
        assert_eq!(config.options.tolerance.numeric.get("salary"), Some(&100.0));
        assert_eq!(config.string_policy(), StringPolicy::Exact);
        assert_eq!(config.max_differences, Some(3));
        assert_eq!(config.format().expect("format"), ExportFormat::Csv);
    }

    #[test]
    fn rejects_negative_numeric_tolerance() {
        let config = ReconConfig {
            numeric_tolerance: Some(-0.5),
            ..ReconConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
