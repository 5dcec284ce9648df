//! Configuration for the ledger

use crate::sweep::CatchUp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Storage backend
    pub backend: StorageBackend,

    /// Account holding custody of deposited funds; withdrawals and reward
    /// claims are paid from it
    pub custody_account: String,

    /// Vault ids accepted by withdraw / claim operations
    pub vaults: Vec<String>,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Maturity sweep configuration
    pub sweep: SweepConfig,

    /// Deposit policy parameters (consulted by the request router)
    pub params: DepositParams,

    /// Genesis file imported into an empty store on startup
    pub genesis_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/custody-ledger"),
            service_name: "custody-ledger".to_string(),
            backend: StorageBackend::RocksDb,
            custody_account: "custody".to_string(),
            vaults: vec!["orion".to_string()],
            rocksdb: RocksDBConfig::default(),
            sweep: SweepConfig::default(),
            params: DepositParams::default(),
            genesis_path: None,
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// In-process map, lost on exit
    Memory,
    /// RocksDB under `data_dir`
    RocksDb,
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Level 0 file num compaction trigger
    pub level0_file_num_compaction_trigger: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 2,
            target_file_size_mb: 64,
            max_background_jobs: 2,
            level0_file_num_compaction_trigger: 4,
            enable_statistics: false,
        }
    }
}

/// Maturity sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Sweep every skipped day when the clock jumps ahead by more than one
    /// day. When false the gap is logged and only the supplied day is swept.
    pub catch_up_skipped_days: bool,

    /// Longest gap swept in one tick when catching up. A longer jump is
    /// rejected and the marker stays put.
    pub max_catch_up_days: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            catch_up_skipped_days: true,
            max_catch_up_days: 366,
        }
    }
}

impl SweepConfig {
    /// Catch-up policy for epoch ticks
    pub fn catch_up(&self) -> CatchUp {
        if self.catch_up_skipped_days {
            CatchUp::UpTo(self.max_catch_up_days)
        } else {
            CatchUp::Skip
        }
    }
}

/// Deposit policy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DepositParams {
    /// Denoms accepted for deposit
    pub whitelisted_denoms: Vec<String>,

    /// Minimum value of a single deposit, in oracle quote units
    pub min_deposit_value: Decimal,
}

impl Default for DepositParams {
    fn default() -> Self {
        Self {
            whitelisted_denoms: vec!["uatom".to_string()],
            min_deposit_value: Decimal::new(100, 0),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(backend) = std::env::var("LEDGER_BACKEND") {
            config.backend = match backend.to_ascii_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "rocksdb" => StorageBackend::RocksDb,
                other => {
                    return Err(crate::Error::Config(format!(
                        "Unknown LEDGER_BACKEND '{}'",
                        other
                    )))
                }
            };
        }

        if let Ok(account) = std::env::var("LEDGER_CUSTODY_ACCOUNT") {
            config.custody_account = account;
        }

        if let Ok(name) = std::env::var("LEDGER_SERVICE_NAME") {
            config.service_name = name;
        }

        if let Ok(path) = std::env::var("LEDGER_GENESIS") {
            config.genesis_path = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    /// Check identifiers and parameters
    pub fn validate(&self) -> crate::Result<()> {
        if self.custody_account.is_empty() {
            return Err(crate::Error::Config("custody_account is empty".to_string()));
        }
        if self.vaults.is_empty() {
            return Err(crate::Error::Config("no vaults configured".to_string()));
        }
        for vault in &self.vaults {
            crate::types::Vault::new(vault.as_str())
                .map_err(|e| crate::Error::Config(format!("vault '{}': {}", vault, e)))?;
        }
        for denom in &self.params.whitelisted_denoms {
            crate::types::Denom::new(denom.as_str())
                .map_err(|e| crate::Error::Config(format!("whitelisted denom: {}", e)))?;
        }
        if self.sweep.catch_up_skipped_days && self.sweep.max_catch_up_days == 0 {
            return Err(crate::Error::Config(
                "max_catch_up_days must be positive when catching up".to_string(),
            ));
        }
        if self.params.min_deposit_value.is_sign_negative() {
            return Err(crate::Error::Config(
                "min_deposit_value must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
