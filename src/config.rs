use anyhow::{Context, Result, ensure};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::composer::types::FetchOptions;

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    4
}

/// Processing parameters, stored as a JSON file:
///
/// ```json
/// {
///   "mov_stack": [1, 5, 10],
///   "start_date": "2024-01-01",
///   "end_date": "2024-06-30",
///   "data_dir": "data"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    pub mov_stack: Vec<u32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Params {
    /// Loads and validates the parameters from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("in config {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let params: Params = serde_json::from_str(content)?;
        ensure!(
            params.start_date <= params.end_date,
            "start_date {} is after end_date {}",
            params.start_date,
            params.end_date
        );
        ensure!(
            params.fetch_timeout_secs > 0,
            "fetch_timeout_secs must be at least 1"
        );
        Ok(params)
    }

    /// Every day from `start_date` to `end_date`, inclusive.
    pub fn date_list(&self) -> Vec<NaiveDate> {
        self.start_date
            .iter_days()
            .take_while(|d| *d <= self.end_date)
            .collect()
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            concurrency: self.concurrency,
            timeout: Duration::from_secs(self.fetch_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = Params::from_json(
            r#"{"mov_stack": [1, 5], "start_date": "2024-01-01", "end_date": "2024-01-03"}"#,
        )
        .unwrap();

        assert_eq!(params.mov_stack, vec![1, 5]);
        assert_eq!(params.data_dir, PathBuf::from("data"));
        assert_eq!(params.fetch_options().timeout, Duration::from_secs(30));
        assert_eq!(params.fetch_options().concurrency, 4);
    }

    #[test]
    fn test_date_list_inclusive() {
        let params = Params::from_json(
            r#"{"mov_stack": [1], "start_date": "2024-02-27", "end_date": "2024-03-01"}"#,
        )
        .unwrap();

        let days = params.date_list();
        assert_eq!(days.len(), 4);
        assert_eq!(days[2], NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(days[3], params.end_date);
    }

    #[test]
    fn test_zero_fetch_timeout_rejected() {
        let result = Params::from_json(
            r#"{"mov_stack": [1], "start_date": "2024-01-01", "end_date": "2024-01-02", "fetch_timeout_secs": 0}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_reversed_range_rejected() {
        let result = Params::from_json(
            r#"{"mov_stack": [1], "start_date": "2024-03-01", "end_date": "2024-01-01"}"#,
        );
        assert!(result.is_err());
    }
}
