//! Issuer configuration.
//!
//! Everything the pipeline and the transfer service need is carried in an
//! [`IssuerConfig`] built once at startup and passed in explicitly. Secret key
//! material is deliberately not part of this struct; see [`crate::keys`].

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use std::path::Path;
use std::time::Duration;

use crate::error::{TokenError, TokenResult};
use crate::transfer::MAX_HISTORY_LIMIT;
use crate::types::{Amount, Attribute, TokenMetadata, INITIAL_SUPPLY, TOKEN_DECIMALS};

/// Environment variable holding the RPC provider API key.
pub const API_KEY_ENV_VAR: &str = "HELIUS_API_KEY";
/// Environment variable overriding the RPC base URL.
pub const RPC_URL_ENV_VAR: &str = "SOLANA_RPC_URL";
/// Environment variable overriding the minimum operator balance.
pub const MIN_BALANCE_ENV_VAR: &str = "MIN_BALANCE_LAMPORTS";

const MAX_NAME_LENGTH: usize = 32;
const MAX_SYMBOL_LENGTH: usize = 10;
const MAX_URI_LENGTH: usize = 200;

/// Commitment level used for reads and confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl From<Commitment> for CommitmentConfig {
    fn from(level: Commitment) -> Self {
        match level {
            Commitment::Processed => CommitmentConfig::processed(),
            Commitment::Confirmed => CommitmentConfig::confirmed(),
            Commitment::Finalized => CommitmentConfig::finalized(),
        }
    }
}

/// RPC provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Base endpoint URL
    pub url: String,
    /// Provider API key, appended as `?api-key=`
    pub api_key: Option<String>,
    /// Commitment for reads and confirmation
    pub commitment: Commitment,
    /// Outbound request quota
    pub requests_per_second: u32,
    /// Signature status poll interval while awaiting confirmation
    pub confirm_poll_interval_ms: u64,
}

impl RpcConfig {
    /// Full endpoint URL including the API key, if any.
    pub fn endpoint(&self) -> String {
        match &self.api_key {
            Some(key) if !key.is_empty() => {
                format!("{}/?api-key={}", self.url.trim_end_matches('/'), key)
            }
            _ => self.url.clone(),
        }
    }

    pub fn confirm_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_interval_ms)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "https://mainnet.helius-rpc.com".to_string(),
            api_key: None,
            commitment: Commitment::Confirmed,
            requests_per_second: 10,
            confirm_poll_interval_ms: 500,
        }
    }
}

/// Retry supervisor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub delay_ms: u64,
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 2000,
        }
    }
}

/// The token to issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    #[serde(flatten)]
    pub metadata: TokenMetadata,
    pub decimals: u8,
    /// Initial supply in whole tokens
    pub initial_supply: u64,
}

impl TokenConfig {
    /// Initial supply scaled to base units.
    pub fn initial_supply_base_units(&self) -> TokenResult<Amount> {
        Amount::from_whole(self.initial_supply, self.decimals)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            metadata: TokenMetadata::default(),
            decimals: TOKEN_DECIMALS,
            initial_supply: INITIAL_SUPPLY,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    pub rpc: RpcConfig,
    /// Minimum operator balance in lamports (default 0.1 SOL)
    pub min_balance_lamports: u64,
    pub retry: RetryConfig,
    pub token: TokenConfig,
    /// SQLite file for cross-run checkpoints; in-memory when unset
    pub checkpoint_db: Option<String>,
    /// Default result cap for history queries
    pub history_limit: usize,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            min_balance_lamports: 100_000_000,
            retry: RetryConfig::default(),
            token: TokenConfig::default(),
            checkpoint_db: None,
            history_limit: 10,
        }
    }
}

impl IssuerConfig {
    /// Load configuration from an optional TOML file, then apply
    /// environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> TokenResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> TokenResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TokenError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> TokenResult<Self> {
        toml::from_str(content).map_err(|e| TokenError::Config(format!("parse error: {}", e)))
    }

    fn apply_env_overrides(&mut self) -> TokenResult<()> {
        if let Ok(key) = std::env::var(API_KEY_ENV_VAR) {
            self.rpc.api_key = Some(key);
        }
        if let Ok(url) = std::env::var(RPC_URL_ENV_VAR) {
            self.rpc.url = url;
        }
        if let Ok(raw) = std::env::var(MIN_BALANCE_ENV_VAR) {
            self.min_balance_lamports = raw.parse().map_err(|_| {
                TokenError::Config(format!("{} must be an integer, got {:?}", MIN_BALANCE_ENV_VAR, raw))
            })?;
        }
        Ok(())
    }

    /// Check value ranges. Reports every problem, not just the first.
    pub fn validate(&self) -> TokenResult<()> {
        let mut errors = Vec::new();
        let metadata = &self.token.metadata;

        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }
        if self.rpc.requests_per_second == 0 {
            errors.push("rpc.requests_per_second must be at least 1".to_string());
        }
        if metadata.name.len() > MAX_NAME_LENGTH {
            errors.push(format!("token.name exceeds {} bytes", MAX_NAME_LENGTH));
        }
        if metadata.symbol.len() > MAX_SYMBOL_LENGTH {
            errors.push(format!("token.symbol exceeds {} bytes", MAX_SYMBOL_LENGTH));
        }
        if metadata.onchain_uri().len() > MAX_URI_LENGTH {
            errors.push(format!("token.uri exceeds {} bytes", MAX_URI_LENGTH));
        }
        if let Err(e) = self.token.initial_supply_base_units() {
            errors.push(e.to_string());
        }
        if self.history_limit == 0 || self.history_limit > MAX_HISTORY_LIMIT {
            errors.push(format!(
                "history_limit must be between 1 and {}",
                MAX_HISTORY_LIMIT
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TokenError::Config(errors.join(", ")))
        }
    }
}

/// Builder for [`IssuerConfig`] with sensible defaults.
pub struct IssuerConfigBuilder {
    config: IssuerConfig,
}

impl IssuerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: IssuerConfig::default(),
        }
    }

    /// Set the RPC endpoint and API key.
    pub fn with_rpc(mut self, url: impl Into<String>, api_key: Option<String>) -> Self {
        self.config.rpc.url = url.into();
        self.config.rpc.api_key = api_key;
        self
    }

    pub fn with_commitment(mut self, commitment: Commitment) -> Self {
        self.config.rpc.commitment = commitment;
        self
    }

    pub fn with_min_balance(mut self, lamports: u64) -> Self {
        self.config.min_balance_lamports = lamports;
        self
    }

    /// Set retry attempts and the flat inter-attempt delay.
    pub fn with_retry(mut self, max_attempts: usize, delay_ms: u64) -> Self {
        self.config.retry = RetryConfig {
            max_attempts,
            delay_ms,
        };
        self
    }

    pub fn with_metadata(mut self, metadata: TokenMetadata) -> Self {
        self.config.token.metadata = metadata;
        self
    }

    pub fn with_attribute(mut self, trait_type: &str, value: &str) -> Self {
        self.config.token.metadata.attributes.push(Attribute {
            trait_type: trait_type.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn with_supply(mut self, initial_supply: u64, decimals: u8) -> Self {
        self.config.token.initial_supply = initial_supply;
        self.config.token.decimals = decimals;
        self
    }

    pub fn with_checkpoint_db(mut self, path: impl Into<String>) -> Self {
        self.config.checkpoint_db = Some(path.into());
        self
    }

    pub fn with_confirm_poll_interval(mut self, interval_ms: u64) -> Self {
        self.config.rpc.confirm_poll_interval_ms = interval_ms;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> TokenResult<IssuerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for IssuerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
