// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::benchmark::{BenchmarkParams, Strategy};
use crate::error::{IngestError, Result};
use crate::record::PayloadSpec;
use serde::Deserialize;
use std::path::Path;
use tablestore::MAX_BATCH_SIZE;

/// Parameter grid for a benchmark suite, usually read from YAML.
///
/// Missing fields take their defaults, unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuiteConfig {
    pub record_count: u64,
    pub batch_sizes: Vec<usize>,
    pub partition_counts: Vec<u64>,
    pub strategies: Vec<Strategy>,
    pub max_in_flight: usize,
    pub payload_width: usize,
    pub payload_seed: u64,
    /// Write results to the results table
    pub export: bool,
    /// Delete each run's table after it completes
    pub cleanup: bool,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        let payload = PayloadSpec::default();
        Self {
            record_count: 1000,
            batch_sizes: vec![10, 50, 100],
            partition_counts: vec![1, 10],
            strategies: vec![Strategy::Sequential, Strategy::Concurrent],
            max_in_flight: 8,
            payload_width: payload.width,
            payload_seed: payload.seed,
            export: true,
            cleanup: true,
        }
    }
}

impl SuiteConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.record_count == 0 {
            return Err(IngestError::invalid_config("record_count must be positive"));
        }
        if self.batch_sizes.is_empty() {
            return Err(IngestError::invalid_config("batch_sizes is empty"));
        }
        if self.partition_counts.is_empty() {
            return Err(IngestError::invalid_config("partition_counts is empty"));
        }
        if self.strategies.is_empty() {
            return Err(IngestError::invalid_config("strategies is empty"));
        }
        if let Some(size) = self
            .batch_sizes
            .iter()
            .find(|size| !(1..=MAX_BATCH_SIZE).contains(*size))
        {
            return Err(IngestError::invalid_config(format!(
                "batch size {size} is outside 1..={MAX_BATCH_SIZE}"
            )));
        }
        if self.partition_counts.contains(&0) {
            return Err(IngestError::invalid_config("partition counts must be at least 1"));
        }
        if self.max_in_flight == 0 {
            return Err(IngestError::invalid_config("max_in_flight must be at least 1"));
        }
        Ok(())
    }

    #[must_use]
    pub fn payload(&self) -> PayloadSpec {
        PayloadSpec {
            width: self.payload_width,
            seed: self.payload_seed,
        }
    }

    /// Every batch size × partition count × strategy, in that nesting order
    #[must_use]
    pub fn combinations(&self) -> Vec<BenchmarkParams> {
        let payload = self.payload();
        let mut grid = Vec::with_capacity(
            self.batch_sizes.len() * self.partition_counts.len() * self.strategies.len(),
        );
        for &batch_size in &self.batch_sizes {
            for &partition_count in &self.partition_counts {
                for &strategy in &self.strategies {
                    grid.push(
                        BenchmarkParams::new(self.record_count, batch_size, partition_count, strategy)
                            .with_max_in_flight(self.max_in_flight)
                            .with_payload(payload.clone()),
                    );
                }
            }
        }
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_yaml() -> Result<()> {
        let config = SuiteConfig::from_yaml_str(
            r#"
record_count: 500
batch_sizes: [25, 100]
partition_counts: [1, 4, 16]
strategies: [sequential, concurrent]
max_in_flight: 4
payload_width: 16
export: false
cleanup: false
"#,
        )?;
        assert_eq!(config.record_count, 500);
        assert_eq!(config.partition_counts, vec![1, 4, 16]);
        assert_eq!(config.max_in_flight, 4);
        assert!(!config.export);
        assert_eq!(config.combinations().len(), 2 * 3 * 2);
        Ok(())
    }

    #[test]
    fn test_defaults_fill_missing_fields() -> Result<()> {
        let config = SuiteConfig::from_yaml_str("record_count: 20\n")?;
        assert_eq!(config.record_count, 20);
        assert_eq!(config.batch_sizes, SuiteConfig::default().batch_sizes);
        assert!(config.cleanup);
        Ok(())
    }

    #[test]
    fn test_combination_order() -> Result<()> {
        let config = SuiteConfig::from_yaml_str(
            "batch_sizes: [10, 20]\npartition_counts: [3]\nstrategies: [concurrent, sequential]\n",
        )?;
        let grid: Vec<_> = config
            .combinations()
            .into_iter()
            .map(|p| (p.batch_size, p.partition_count, p.strategy))
            .collect();
        assert_eq!(
            grid,
            vec![
                (10, 3, Strategy::Concurrent),
                (10, 3, Strategy::Sequential),
                (20, 3, Strategy::Concurrent),
                (20, 3, Strategy::Sequential),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_validation_failures() {
        for yaml in [
            "record_count: 0\n",
            "batch_sizes: []\n",
            "batch_sizes: [101]\n",
            "partition_counts: [0]\n",
            "strategies: []\n",
            "max_in_flight: 0\n",
        ] {
            assert!(
                matches!(SuiteConfig::from_yaml_str(yaml), Err(IngestError::InvalidConfig(_))),
                "{yaml} should be rejected"
            );
        }
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            SuiteConfig::from_yaml_str("strategies: [sideways]\n"),
            Err(IngestError::Yaml(_))
        ));
        assert!(matches!(
            SuiteConfig::from_yaml_str("records: 10\n"),
            Err(IngestError::Yaml(_))
        ));
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("suite.yaml");
        std::fs::write(&path, "record_count: 42\nstrategies: [sequential]\n")?;
        let config = SuiteConfig::load(&path)?;
        assert_eq!(config.record_count, 42);
        assert_eq!(config.strategies, vec![Strategy::Sequential]);

        assert!(matches!(
            SuiteConfig::load(dir.path().join("missing.yaml")),
            Err(IngestError::Io(_))
        ));
        Ok(())
    }
}
