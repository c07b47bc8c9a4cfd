//! Token issuance: balance precondition, the ordered pipeline, checkpoints and
//! the retry supervisor that wraps them.

pub mod balance_guard;
pub mod checkpoint;
pub mod pipeline;
pub mod retry;

pub use balance_guard::BalanceGuard;
pub use checkpoint::{
    CheckpointStore, IssuanceCheckpoint, MemoryCheckpointStore, SqliteCheckpointStore,
};
pub use pipeline::IssuancePipeline;
pub use retry::RetrySupervisor;

use solana_sdk::signature::Keypair;
use std::sync::Arc;
use tracing::info;

use crate::config::IssuerConfig;
use crate::error::TokenResult;
use crate::ledger::LedgerClient;
use crate::types::IssuanceReport;

/// Fresh run identifier; a new run always issues a new token.
pub fn new_run_id(symbol: &str) -> String {
    format!(
        "{}-{}",
        symbol.to_lowercase(),
        chrono::Utc::now().format("%Y%m%d%H%M%S%3f")
    )
}

/// The issuance pipeline under its retry supervisor.
pub struct Issuer {
    pipeline: IssuancePipeline,
    supervisor: RetrySupervisor,
}

impl Issuer {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        checkpoints: Arc<dyn CheckpointStore>,
        operator: Arc<Keypair>,
        config: &IssuerConfig,
    ) -> Self {
        let pipeline = IssuancePipeline::new(
            ledger,
            checkpoints,
            operator,
            BalanceGuard::new(config.min_balance_lamports),
            config.token.clone(),
        );
        Self {
            pipeline,
            supervisor: RetrySupervisor::from_config(&config.retry),
        }
    }

    /// Issue the configured token, retrying the whole pipeline on
    /// retryable failures.
    pub async fn issue(&self, run_id: &str) -> TokenResult<IssuanceReport> {
        info!(
            "Issuing token for run {} (up to {} attempts)",
            run_id,
            self.supervisor.max_attempts()
        );
        self.supervisor
            .run(|attempt| {
                info!(attempt, "Starting issuance attempt {}", attempt);
                self.pipeline.run(run_id)
            })
            .await
    }
}
