//! Issuance checkpoints.
//!
//! A checkpoint records which pipeline steps of a run have already landed on
//! the ledger, so a retried attempt resumes instead of creating a second mint
//! or minting the supply twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::IssuerConfig;
use crate::error::{TokenError, TokenResult};

/// Progress of one issuance run.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuanceCheckpoint {
    pub run_id: String,
    /// Mint address, recorded before the create transaction is submitted
    pub mint: Option<Pubkey>,
    pub mint_create_signature: Option<Signature>,
    pub mint_create_blockhash: Option<Hash>,
    pub mint_confirmed: bool,
    pub token_account: Option<Pubkey>,
    /// Mint-to signature, recorded before submission
    pub mint_signature: Option<Signature>,
    /// Blockhash the mint-to transaction was signed against
    pub mint_blockhash: Option<Hash>,
    pub supply_confirmed: bool,
    pub metadata: Option<Pubkey>,
    pub metadata_signature: Option<Signature>,
    pub updated_at: DateTime<Utc>,
}

impl IssuanceCheckpoint {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            mint: None,
            mint_create_signature: None,
            mint_create_blockhash: None,
            mint_confirmed: false,
            token_account: None,
            mint_signature: None,
            mint_blockhash: None,
            supply_confirmed: false,
            metadata: None,
            metadata_signature: None,
            updated_at: Utc::now(),
        }
    }

    /// True once every step has been recorded.
    pub fn is_complete(&self) -> bool {
        self.mint_confirmed
            && self.token_account.is_some()
            && self.supply_confirmed
            && self.metadata.is_some()
    }
}

/// Persistence contract for checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, run_id: &str) -> TokenResult<Option<IssuanceCheckpoint>>;

    /// Insert or replace the checkpoint for `checkpoint.run_id`.
    async fn save(&self, checkpoint: &IssuanceCheckpoint) -> TokenResult<()>;

    /// Forget a run. Clearing an unknown run is not an error.
    async fn clear(&self, run_id: &str) -> TokenResult<()>;
}

/// Process-local store. Survives retries, not restarts.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<HashMap<String, IssuanceCheckpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, run_id: &str) -> TokenResult<Option<IssuanceCheckpoint>> {
        Ok(self.checkpoints.lock().await.get(run_id).cloned())
    }

    async fn save(&self, checkpoint: &IssuanceCheckpoint) -> TokenResult<()> {
        self.checkpoints
            .lock()
            .await
            .insert(checkpoint.run_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn clear(&self, run_id: &str) -> TokenResult<()> {
        self.checkpoints.lock().await.remove(run_id);
        Ok(())
    }
}

/// Helper type for reading checkpoints back from SQLite.
#[derive(FromRow)]
struct CheckpointRow {
    run_id: String,
    mint: Option<String>,
    mint_create_signature: Option<String>,
    mint_create_blockhash: Option<String>,
    mint_confirmed: bool,
    token_account: Option<String>,
    mint_signature: Option<String>,
    mint_blockhash: Option<String>,
    supply_confirmed: bool,
    metadata: Option<String>,
    metadata_signature: Option<String>,
    updated_at: DateTime<Utc>,
}

fn parse_column<T: FromStr>(column: &str, value: Option<String>) -> TokenResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            T::from_str(&raw).map_err(|e| {
                TokenError::Checkpoint(format!("corrupt {} column {:?}: {}", column, raw, e))
            })
        })
        .transpose()
}

impl TryFrom<CheckpointRow> for IssuanceCheckpoint {
    type Error = TokenError;

    fn try_from(row: CheckpointRow) -> TokenResult<Self> {
        Ok(Self {
            run_id: row.run_id,
            mint: parse_column("mint", row.mint)?,
            mint_create_signature: parse_column("mint_create_signature", row.mint_create_signature)?,
            mint_create_blockhash: parse_column("mint_create_blockhash", row.mint_create_blockhash)?,
            mint_confirmed: row.mint_confirmed,
            token_account: parse_column("token_account", row.token_account)?,
            mint_signature: parse_column("mint_signature", row.mint_signature)?,
            mint_blockhash: parse_column("mint_blockhash", row.mint_blockhash)?,
            supply_confirmed: row.supply_confirmed,
            metadata: parse_column("metadata", row.metadata)?,
            metadata_signature: parse_column("metadata_signature", row.metadata_signature)?,
            updated_at: row.updated_at,
        })
    }
}

/// SQLite-backed store so an interrupted run can be resumed by a later process.
pub struct SqliteCheckpointStore {
    pool: Pool<Sqlite>,
}

impl SqliteCheckpointStore {
    /// Open (creating if needed) the checkpoint database at `path`.
    pub async fn connect(path: &str) -> TokenResult<Self> {
        Self::connect_url(&format!("sqlite:{}?mode=rwc", path)).await
    }

    /// Open the database named by `checkpoint_db`. Fails when none is
    /// configured, since only a persistent store outlives the process.
    pub async fn from_config(config: &IssuerConfig) -> TokenResult<Self> {
        match &config.checkpoint_db {
            Some(path) => Self::connect(path).await,
            None => Err(TokenError::Config(
                "checkpoint_db is not configured".to_string(),
            )),
        }
    }

    /// Private in-memory database, mostly useful in tests.
    pub async fn in_memory() -> TokenResult<Self> {
        Self::connect_url("sqlite::memory:").await
    }

    async fn connect_url(url: &str) -> TokenResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS issuance_checkpoints (
                run_id TEXT PRIMARY KEY NOT NULL,
                mint TEXT,
                mint_create_signature TEXT,
                mint_create_blockhash TEXT,
                mint_confirmed BOOLEAN NOT NULL DEFAULT 0,
                token_account TEXT,
                mint_signature TEXT,
                mint_blockhash TEXT,
                supply_confirmed BOOLEAN NOT NULL DEFAULT 0,
                metadata TEXT,
                metadata_signature TEXT,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        info!("Checkpoint store ready at {}", url);
        Ok(Self { pool })
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, run_id: &str) -> TokenResult<Option<IssuanceCheckpoint>> {
        let row = sqlx::query_as::<_, CheckpointRow>(
            "SELECT * FROM issuance_checkpoints WHERE run_id = ?",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(IssuanceCheckpoint::try_from).transpose()
    }

    async fn save(&self, checkpoint: &IssuanceCheckpoint) -> TokenResult<()> {
        sqlx::query(
            r#"
            INSERT INTO issuance_checkpoints (
                run_id, mint, mint_create_signature, mint_create_blockhash, mint_confirmed,
                token_account, mint_signature, mint_blockhash,
                supply_confirmed, metadata, metadata_signature, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(run_id) DO UPDATE SET
                mint = excluded.mint,
                mint_create_signature = excluded.mint_create_signature,
                mint_create_blockhash = excluded.mint_create_blockhash,
                mint_confirmed = excluded.mint_confirmed,
                token_account = excluded.token_account,
                mint_signature = excluded.mint_signature,
                mint_blockhash = excluded.mint_blockhash,
                supply_confirmed = excluded.supply_confirmed,
                metadata = excluded.metadata,
                metadata_signature = excluded.metadata_signature,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&checkpoint.run_id)
        .bind(checkpoint.mint.map(|k| k.to_string()))
        .bind(checkpoint.mint_create_signature.map(|s| s.to_string()))
        .bind(checkpoint.mint_create_blockhash.map(|h| h.to_string()))
        .bind(checkpoint.mint_confirmed)
        .bind(checkpoint.token_account.map(|k| k.to_string()))
        .bind(checkpoint.mint_signature.map(|s| s.to_string()))
        .bind(checkpoint.mint_blockhash.map(|h| h.to_string()))
        .bind(checkpoint.supply_confirmed)
        .bind(checkpoint.metadata.map(|k| k.to_string()))
        .bind(checkpoint.metadata_signature.map(|s| s.to_string()))
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Saved checkpoint for run {}", checkpoint.run_id);
        Ok(())
    }

    async fn clear(&self, run_id: &str) -> TokenResult<()> {
        sqlx::query("DELETE FROM issuance_checkpoints WHERE run_id = ?")
            .bind(run_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
