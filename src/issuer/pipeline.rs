//! Token issuance pipeline.
//!
//! Steps run strictly in order and each is logged before it executes:
//! balance check, mint creation, token account resolution, initial supply
//! mint, confirmation, metadata publication, report. Progress is written to a
//! [`CheckpointStore`] after every step that changes the ledger.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::balance_guard::BalanceGuard;
use super::checkpoint::{CheckpointStore, IssuanceCheckpoint};
use crate::config::TokenConfig;
use crate::error::{TokenError, TokenResult};
use crate::ledger::instructions::{self, MINT_ACCOUNT_LEN};
use crate::ledger::{build_transaction, resolve_token_account, submit_and_confirm, LedgerClient};
use crate::types::{Amount, IssuanceReport};

pub struct IssuancePipeline {
    ledger: Arc<dyn LedgerClient>,
    checkpoints: Arc<dyn CheckpointStore>,
    operator: Arc<Keypair>,
    guard: BalanceGuard,
    token: TokenConfig,
}

impl IssuancePipeline {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        checkpoints: Arc<dyn CheckpointStore>,
        operator: Arc<Keypair>,
        guard: BalanceGuard,
        token: TokenConfig,
    ) -> Self {
        Self {
            ledger,
            checkpoints,
            operator,
            guard,
            token,
        }
    }

    pub fn operator(&self) -> Pubkey {
        self.operator.pubkey()
    }

    /// Run every step for `run_id`, skipping the ones its checkpoint
    /// already records.
    #[instrument(skip(self), fields(operator = %self.operator.pubkey()))]
    pub async fn run(&self, run_id: &str) -> TokenResult<IssuanceReport> {
        let supply = self.token.initial_supply_base_units()?;
        let mut checkpoint = self
            .checkpoints
            .load(run_id)
            .await?
            .unwrap_or_else(|| IssuanceCheckpoint::new(run_id));

        info!(step = 1, "Checking operator balance");
        self.guard
            .check(self.ledger.as_ref(), &self.operator.pubkey())
            .await?;

        let mint = self.create_mint(&mut checkpoint).await?;

        info!(step = 3, "Resolving token account for mint {}", mint);
        let operator = self.operator.pubkey();
        let token_account =
            resolve_token_account(self.ledger.as_ref(), &self.operator, &operator, &mint).await?;
        info!("Token Account: {}", token_account);
        if checkpoint.token_account != Some(token_account) {
            checkpoint.token_account = Some(token_account);
            self.save(&mut checkpoint).await?;
        }

        let mint_signature = self
            .mint_initial_supply(&mut checkpoint, &mint, &token_account, supply)
            .await?;

        let (metadata, metadata_signature) = self.publish_metadata(&mut checkpoint, &mint).await?;

        info!(step = 7, "Token issuance completed for run {}", run_id);
        Ok(IssuanceReport {
            run_id: run_id.to_string(),
            mint,
            token_account,
            metadata,
            mint_signature,
            metadata_signature,
            supply,
        })
    }

    async fn save(&self, checkpoint: &mut IssuanceCheckpoint) -> TokenResult<()> {
        checkpoint.updated_at = chrono::Utc::now();
        self.checkpoints.save(checkpoint).await
    }

    async fn create_mint(&self, checkpoint: &mut IssuanceCheckpoint) -> TokenResult<Pubkey> {
        if let (true, Some(mint)) = (checkpoint.mint_confirmed, checkpoint.mint) {
            info!(step = 2, "Resuming with existing mint {}", mint);
            return Ok(mint);
        }

        if let Some(mint) = checkpoint.mint {
            info!(step = 2, "Checking whether earlier mint {} was created", mint);
            if self.earlier_mint_landed(checkpoint, &mint).await? {
                info!("Reusing mint {}", mint);
                checkpoint.mint_confirmed = true;
                self.save(checkpoint).await?;
                return Ok(mint);
            }
            warn!("Earlier mint {} was never created, creating a new one", mint);
            checkpoint.mint = None;
            checkpoint.mint_create_signature = None;
            checkpoint.mint_create_blockhash = None;
            self.save(checkpoint).await?;
        }

        info!(
            step = 2,
            "Creating mint with {} decimals",
            self.token.decimals
        );
        let mint_keypair = Keypair::new();
        let mint = mint_keypair.pubkey();
        let operator = self.operator.pubkey();
        let rent = self
            .ledger
            .minimum_balance_for_rent_exemption(MINT_ACCOUNT_LEN)
            .await?;
        let ixs = instructions::create_mint(&operator, &mint, &operator, self.token.decimals, rent)?;
        let blockhash = self.ledger.latest_blockhash().await?;
        let transaction = build_transaction(&ixs, &self.operator, &[&mint_keypair], blockhash)?;

        // recorded before submission so a resumed run can find the mint if it landed
        checkpoint.mint = Some(mint);
        checkpoint.mint_create_signature = transaction.signatures.first().copied();
        checkpoint.mint_create_blockhash = Some(blockhash);
        self.save(checkpoint).await?;

        self.ledger.send_and_confirm(&transaction).await?;

        info!("Token created! Mint address: {}", mint);
        checkpoint.mint_confirmed = true;
        self.save(checkpoint).await?;
        Ok(mint)
    }

    /// Whether the create transaction recorded for `mint` reached the ledger.
    async fn earlier_mint_landed(
        &self,
        checkpoint: &IssuanceCheckpoint,
        mint: &Pubkey,
    ) -> TokenResult<bool> {
        if self.ledger.account_exists(mint).await? {
            return Ok(true);
        }
        let (Some(signature), Some(blockhash)) =
            (checkpoint.mint_create_signature, checkpoint.mint_create_blockhash)
        else {
            return Ok(false);
        };

        match self.ledger.confirm(&signature, &blockhash).await {
            Ok(()) => Ok(true),
            Err(TokenError::ConfirmationTimeout { .. }) | Err(TokenError::TransactionFailed { .. }) => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn mint_initial_supply(
        &self,
        checkpoint: &mut IssuanceCheckpoint,
        mint: &Pubkey,
        token_account: &Pubkey,
        supply: Amount,
    ) -> TokenResult<Signature> {
        if let (true, Some(signature)) = (checkpoint.supply_confirmed, checkpoint.mint_signature) {
            info!(step = 4, "Initial supply already minted ({})", signature);
            return Ok(signature);
        }

        if let (Some(signature), Some(blockhash)) =
            (checkpoint.mint_signature, checkpoint.mint_blockhash)
        {
            info!(
                step = 5,
                "Awaiting confirmation of earlier mint transaction {}", signature
            );
            match self.ledger.confirm(&signature, &blockhash).await {
                Ok(()) => {
                    checkpoint.supply_confirmed = true;
                    self.save(checkpoint).await?;
                    return Ok(signature);
                }
                Err(e @ TokenError::ConfirmationTimeout { .. })
                | Err(e @ TokenError::TransactionFailed { .. }) => {
                    warn!("Earlier mint transaction did not land ({}), minting again", e);
                    checkpoint.mint_signature = None;
                    checkpoint.mint_blockhash = None;
                    self.save(checkpoint).await?;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            step = 4,
            "Minting {} base units to {}", supply, token_account
        );
        let blockhash = self.ledger.latest_blockhash().await?;
        let ix = instructions::mint_to(mint, token_account, &self.operator.pubkey(), supply)?;
        let transaction = build_transaction(&[ix], &self.operator, &[], blockhash)?;

        // recorded before submission so a resumed run can tell whether it landed
        checkpoint.mint_signature = transaction.signatures.first().copied();
        checkpoint.mint_blockhash = Some(blockhash);
        self.save(checkpoint).await?;

        let signature = self.ledger.send(&transaction).await?;

        info!(step = 5, "Awaiting confirmation of {}", signature);
        self.ledger.confirm(&signature, &blockhash).await?;

        checkpoint.mint_signature = Some(signature);
        checkpoint.supply_confirmed = true;
        self.save(checkpoint).await?;
        info!("Minted {} base units to {}", supply, token_account);
        Ok(signature)
    }

    async fn publish_metadata(
        &self,
        checkpoint: &mut IssuanceCheckpoint,
        mint: &Pubkey,
    ) -> TokenResult<(Pubkey, Option<Signature>)> {
        let metadata = instructions::metadata_address(mint);

        if self.ledger.account_exists(&metadata).await? {
            info!(step = 6, "Metadata {} already published", metadata);
            if checkpoint.metadata != Some(metadata) {
                checkpoint.metadata = Some(metadata);
                self.save(checkpoint).await?;
            }
            return Ok((metadata, checkpoint.metadata_signature));
        }

        info!(
            step = 6,
            "Publishing metadata for {} ({})", self.token.metadata.name, self.token.metadata.symbol
        );
        let operator = self.operator.pubkey();
        let ix = instructions::create_metadata(&operator, mint, &operator, &self.token.metadata);
        let signature = submit_and_confirm(self.ledger.as_ref(), &[ix], &self.operator, &[]).await?;

        checkpoint.metadata = Some(metadata);
        checkpoint.metadata_signature = Some(signature);
        self.save(checkpoint).await?;
        info!("Metadata published at {}", metadata);
        Ok((metadata, Some(signature)))
    }
}
