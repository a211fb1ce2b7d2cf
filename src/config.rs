use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

const DEFAULT_DB_PATH: &str = "stock-ledger.db";
const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;
const DEFAULT_LOG_FILTER: &str = "info";
const CONFIG_FILE: &str = "config/inventory";
const ENV_PREFIX: &str = "STOCK";

/// Runtime settings for the inventory service.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct InventoryConfig {
    /// Directory of the sled database
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Re-runs allowed for a unit of work that conflicts with a concurrent writer
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,

    /// `EnvFilter` directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_PATH)
}

fn default_max_conflict_retries() -> u32 {
    DEFAULT_MAX_CONFLICT_RETRIES
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_conflict_retries: default_max_conflict_retries(),
            log_filter: default_log_filter(),
        }
    }
}

impl InventoryConfig {
    /// Layer built-in defaults, an optional `config/inventory.*` file and
    /// `STOCK__*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let settings = Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("max_conflict_retries", DEFAULT_MAX_CONFLICT_RETRIES as i64)?
            .set_default("log_filter", DEFAULT_LOG_FILTER)?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("failed to assemble inventory configuration")?;

        let config: InventoryConfig = settings
            .try_deserialize()
            .context("invalid inventory configuration")?;

        info!(
            db_path = %config.db_path.display(),
            max_conflict_retries = config.max_conflict_retries,
            "configuration loaded"
        );
        Ok(config)
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }
}
