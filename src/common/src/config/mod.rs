use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

pub const DEFAULT_CONFIG_FILE: &str = "wsclean.toml";
pub const ENV_PREFIX: &str = "WSCLEAN__";

/// Raw database holding the transaction-log table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub dsn: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("sqlite://.data/workspace.db"),
        }
    }
}

/// Document-store (transactor) endpoint
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactorConfig {
    pub dsn: String,
    /// Maximum time to wait for a connection
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for TransactorConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("sqlite://.data/workspace.db"),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    pub dsn: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("memory://"),
        }
    }
}

/// Full-text search service. Accepted for compatibility with the platform
/// tooling; the cleaner does not call it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    pub url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://localhost:9200"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Remove candidates that are not employees
    #[serde(default)]
    pub recruit: bool,
    /// Remove every issue
    #[serde(default)]
    pub tracker: bool,
    /// Erase the log history of removed documents
    #[serde(default)]
    pub remove_tx: bool,
    #[serde(default = "default_candidate_batch_size")]
    pub candidate_batch_size: usize,
    #[serde(default = "default_issue_batch_size")]
    pub issue_batch_size: usize,
}

fn default_candidate_batch_size() -> usize {
    100
}

fn default_issue_batch_size() -> usize {
    5
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            recruit: false,
            tracker: false,
            remove_tx: false,
            candidate_batch_size: default_candidate_batch_size(),
            issue_batch_size: default_issue_batch_size(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    pub database: DatabaseConfig,
    pub transactor: TransactorConfig,
    pub storage: StorageConfig,
    pub search: SearchConfig,
    pub cleanup: CleanupConfig,
}

impl Configuration {
    /// Load defaults, then `wsclean.toml` from the working directory, then
    /// `WSCLEAN__SECTION__KEY` environment variables.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(DEFAULT_CONFIG_FILE))
    }

    /// Same layering as [`Configuration::load`] with an explicit file.
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(path))
    }

    fn figment(file: figment::providers::Data<Toml>) -> Result<Self, Box<figment::Error>> {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)
    }
}
