//! Options controlling a single cleanup run.

use anyhow::{Result, bail};
use common::config::{CleanupConfig, Configuration};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Toggles and batch sizes for one [`clean_workspace`](crate::clean_workspace) call.
///
/// Blob cleanup always runs. The three toggles are independent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CleanupOptions {
    /// Remove every candidate that is not an employee.
    #[serde(default)]
    pub recruit: bool,

    /// Remove every tracker issue.
    #[serde(default)]
    pub tracker: bool,

    /// Erase all transaction-log entries of documents that were removed.
    #[serde(default)]
    pub remove_tx: bool,

    /// Candidates removed per apply context.
    ///
    /// Default: 100
    #[serde(default = "default_candidate_batch_size")]
    pub candidate_batch_size: usize,

    /// Issues removed per apply context.
    ///
    /// Default: 5
    #[serde(default = "default_issue_batch_size")]
    pub issue_batch_size: usize,

    /// Upper bound on opening the session and the raw log handle.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

fn default_candidate_batch_size() -> usize {
    100
}

fn default_issue_batch_size() -> usize {
    5
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            recruit: false,
            tracker: false,
            remove_tx: false,
            candidate_batch_size: default_candidate_batch_size(),
            issue_batch_size: default_issue_batch_size(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl From<&CleanupConfig> for CleanupOptions {
    fn from(config: &CleanupConfig) -> Self {
        Self {
            recruit: config.recruit,
            tracker: config.tracker,
            remove_tx: config.remove_tx,
            candidate_batch_size: config.candidate_batch_size,
            issue_batch_size: config.issue_batch_size,
            ..Self::default()
        }
    }
}

impl From<&Configuration> for CleanupOptions {
    fn from(config: &Configuration) -> Self {
        Self {
            connect_timeout: config.transactor.connect_timeout,
            ..Self::from(&config.cleanup)
        }
    }
}

impl CleanupOptions {
    /// Options with every optional phase switched on.
    pub fn all() -> Self {
        Self {
            recruit: true,
            tracker: true,
            remove_tx: true,
            ..Self::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.candidate_batch_size == 0 {
            bail!("candidate_batch_size must be greater than 0");
        }
        if self.issue_batch_size == 0 {
            bail!("issue_batch_size must be greater than 0");
        }
        if self.connect_timeout.is_zero() {
            bail!("connect_timeout must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let options = CleanupOptions::default();
        assert!(!options.recruit);
        assert!(!options.tracker);
        assert!(!options.remove_tx);
        assert_eq!(options.candidate_batch_size, 100);
        assert_eq!(options.issue_batch_size, 5);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_batch_sizes() {
        let options = CleanupOptions {
            candidate_batch_size: 0,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = CleanupOptions {
            issue_batch_size: 0,
            ..Default::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("issue_batch_size"));
    }

    #[test]
    fn test_from_configuration() {
        let mut config = Configuration::default();
        config.cleanup.tracker = true;
        config.cleanup.issue_batch_size = 2;
        config.transactor.connect_timeout = Duration::from_secs(3);

        let options = CleanupOptions::from(&config);
        assert!(options.tracker);
        assert!(!options.recruit);
        assert_eq!(options.issue_batch_size, 2);
        assert_eq!(options.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_deserialize_partial() {
        let options: CleanupOptions =
            serde_json::from_str(r#"{"recruit": true, "connect_timeout": "5s"}"#).unwrap();
        assert!(options.recruit);
        assert_eq!(options.candidate_batch_size, 100);
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
    }
}
