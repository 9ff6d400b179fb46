//! Oracle configuration loading and management.

use biolock_core::Address;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::submitter::RetryPolicy;

/// Full configuration for the oracle.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OracleConfig {
    /// Oracle identity and processing settings.
    #[serde(default)]
    pub oracle: OracleSection,

    /// RSA key pair locations.
    #[serde(default)]
    pub keys: KeysConfig,

    /// Result submission retry settings.
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Intake / status API settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Ledger bridge settings.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleSection {
    /// Ledger account results are submitted from.
    #[serde(default = "default_account")]
    pub account: String,
    /// First block to process; `0` replays the full history.
    #[serde(default)]
    pub from_block: u64,
    /// Capacity of the bounded request channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Matcher distance threshold.
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_public_key_path")]
    pub public_key_path: PathBuf,
    #[serde(default = "default_private_key_path")]
    pub private_key_path: PathBuf,
    /// Modulus size used by `--init`.
    #[serde(default = "default_rsa_bits")]
    pub rsa_bits: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Grace period for in-flight submissions at shutdown.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API listen address.
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    /// API port.
    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Base URL of the ledger bridge results are posted to.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    /// Per-request timeout for gateway calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_account() -> String {
    Address::ZERO.to_string()
}
fn default_channel_capacity() -> usize {
    256
}
fn default_distance_threshold() -> f64 {
    biolock_matcher::strategy::DEFAULT_DISTANCE_THRESHOLD
}
fn default_public_key_path() -> PathBuf {
    PathBuf::from("./keys/oracle_public.pem")
}
fn default_private_key_path() -> PathBuf {
    PathBuf::from("./keys/oracle_private.pem")
}
fn default_rsa_bits() -> usize {
    biolock_crypto::keywrap::DEFAULT_RSA_BITS
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff_ms() -> u64 {
    200
}
fn default_max_backoff_ms() -> u64 {
    10_000
}
fn default_drain_timeout_secs() -> u64 {
    30
}
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    9101
}
fn default_gateway_url() -> String {
    "http://127.0.0.1:8545".into()
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for OracleSection {
    fn default() -> Self {
        Self {
            account: default_account(),
            from_block: 0,
            channel_capacity: default_channel_capacity(),
            distance_threshold: default_distance_threshold(),
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            public_key_path: default_public_key_path(),
            private_key_path: default_private_key_path(),
            rsa_bits: default_rsa_bits(),
        }
    }
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl SubmissionConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl LedgerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl OracleConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: OracleConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// The oracle's ledger account.
    pub fn account(&self) -> anyhow::Result<Address> {
        self.oracle
            .account
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid oracle account: {}", e))
    }

    /// Socket address of the HTTP API.
    pub fn api_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.api.listen_addr, self.api.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid API address: {}", e))
    }

    /// Directory of the RocksDB result journal.
    pub fn journal_path(&self) -> PathBuf {
        self.storage.data_dir.join("journal")
    }
}
