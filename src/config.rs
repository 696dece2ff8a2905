// ⚙️ Detection Config - thresholds as data
// Every field has a default, so a partial JSON file is enough

use crate::detectors::{ChainDetector, CycleDetector, FanDetector};
use crate::error::{DetectionError, Result as DetectionResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Shortest cycle reported (default: 3)
    pub cycle_min_length: usize,

    /// Longest cycle reported (default: 5)
    pub cycle_max_length: usize,

    /// Fan window width in hours (default: 72)
    pub fan_time_window_hours: u32,

    /// Transactions needed inside one fan window (default: 10)
    pub fan_threshold: usize,

    /// Shortest chain reported, in accounts (default: 3)
    pub chain_min_length: usize,

    /// Max transactions of a shell account (default: 5)
    pub shell_max_transactions: usize,

    /// Relative amount tolerance for shells (default: 0.2)
    pub shell_amount_tolerance: f64,

    pub merge_overlapping_rings: bool,

    /// Run the three detectors on the rayon pool
    pub parallel: bool,

    /// Checked between pipeline stages
    pub time_budget_secs: Option<f64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            cycle_min_length: 3,
            cycle_max_length: 5,
            fan_time_window_hours: 72,
            fan_threshold: 10,
            chain_min_length: 3,
            shell_max_transactions: 5,
            shell_amount_tolerance: 0.2,
            merge_overlapping_rings: true,
            parallel: true,
            time_budget_secs: None,
        }
    }
}

impl DetectionConfig {
    /// Load and validate a JSON config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: DetectionConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DetectionResult<()> {
        let invalid = |msg: String| Err(DetectionError::InvalidConfig(msg));

        if self.cycle_min_length < 2 {
            return invalid(format!(
                "cycle_min_length must be at least 2, got {}",
                self.cycle_min_length
            ));
        }
        if self.cycle_min_length > self.cycle_max_length {
            return invalid(format!(
                "cycle_min_length {} exceeds cycle_max_length {}",
                self.cycle_min_length, self.cycle_max_length
            ));
        }
        if self.fan_time_window_hours == 0 {
            return invalid("fan_time_window_hours must be positive".to_string());
        }
        if self.fan_threshold == 0 {
            return invalid("fan_threshold must be at least 1".to_string());
        }
        if self.chain_min_length < 2 {
            return invalid(format!(
                "chain_min_length must be at least 2, got {}",
                self.chain_min_length
            ));
        }
        if self.shell_max_transactions == 0 {
            return invalid("shell_max_transactions must be at least 1".to_string());
        }
        if self.shell_amount_tolerance.is_nan() || self.shell_amount_tolerance < 0.0 {
            return invalid(format!(
                "shell_amount_tolerance must be non-negative, got {}",
                self.shell_amount_tolerance
            ));
        }
        if let Some(budget) = self.time_budget_secs {
            if budget.is_nan() || budget <= 0.0 {
                return invalid(format!("time_budget_secs must be positive, got {budget}"));
            }
        }
        Ok(())
    }

    pub fn cycle_detector(&self) -> CycleDetector {
        CycleDetector::new(self.cycle_min_length, self.cycle_max_length)
    }

    pub fn fan_detector(&self) -> FanDetector {
        FanDetector::new(self.fan_time_window_hours, self.fan_threshold)
    }

    pub fn chain_detector(&self) -> ChainDetector {
        ChainDetector::new(
            self.chain_min_length,
            self.shell_max_transactions,
            self.shell_amount_tolerance,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = DetectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cycle_detector().max_length, 5);
        assert_eq!(config.fan_detector().threshold, 10);
        assert_eq!(config.chain_detector().max_length(), 9);
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let config = DetectionConfig {
            cycle_min_length: 6,
            cycle_max_length: 4,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DetectionError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_values() {
        let zero_window = DetectionConfig {
            fan_time_window_hours: 0,
            ..Default::default()
        };
        assert!(zero_window.validate().is_err());

        let negative_tolerance = DetectionConfig {
            shell_amount_tolerance: -0.1,
            ..Default::default()
        };
        assert!(negative_tolerance.validate().is_err());

        let no_budget = DetectionConfig {
            time_budget_secs: Some(0.0),
            ..Default::default()
        };
        assert!(no_budget.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"fan_threshold": 15, "parallel": false}}"#).unwrap();

        let config = DetectionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.fan_threshold, 15);
        assert!(!config.parallel);
        assert_eq!(config.cycle_max_length, 5);
    }

    #[test]
    fn test_invalid_file_reports_context() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"cycle_min_length": 1}}"#).unwrap();
        assert!(DetectionConfig::from_file(file.path()).is_err());

        let err = DetectionConfig::from_file("/nonexistent/config.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
