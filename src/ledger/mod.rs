//! Ledger client boundary.
//!
//! Every network interaction goes through [`LedgerClient`], so the issuance
//! pipeline and the transfer service never talk to an RPC node directly.
//! [`RpcLedger`] is the production implementation.

pub mod accounts;
pub mod instructions;
pub mod rate_limit;
pub mod rpc;

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::Transaction;
use solana_transaction_status::EncodedConfirmedTransactionWithStatusMeta;

use crate::error::{TokenError, TokenResult};
use crate::types::SignatureInfo;

pub use accounts::{associated_token_address, resolve_token_account};
pub use rate_limit::RpcRateLimiter;
pub use rpc::RpcLedger;

/// Formal contract for the remote ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Native balance in lamports.
    async fn balance(&self, address: &Pubkey) -> TokenResult<u64>;

    /// Lamports needed to keep an account of `data_len` bytes rent exempt.
    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> TokenResult<u64>;

    async fn account_exists(&self, address: &Pubkey) -> TokenResult<bool>;

    async fn latest_blockhash(&self) -> TokenResult<Hash>;

    /// Submit a signed transaction and wait until it is confirmed.
    async fn send_and_confirm(&self, transaction: &Transaction) -> TokenResult<Signature>;

    /// Submit a signed transaction without waiting for confirmation.
    async fn send(&self, transaction: &Transaction) -> TokenResult<Signature>;

    /// Wait for `signature` to reach the configured commitment.
    ///
    /// Fails with [`TokenError::ConfirmationTimeout`] once `blockhash` is no
    /// longer valid and the signature has not landed.
    async fn confirm(&self, signature: &Signature, blockhash: &Hash) -> TokenResult<()>;

    /// UI-scaled balance of an SPL token account, exactly as the node reports it.
    async fn token_ui_balance(&self, token_account: &Pubkey) -> TokenResult<Option<f64>>;

    /// Most recent signatures touching `address`, newest first.
    async fn signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> TokenResult<Vec<SignatureInfo>>;

    async fn transaction(
        &self,
        signature: &Signature,
    ) -> TokenResult<EncodedConfirmedTransactionWithStatusMeta>;
}

/// Sign `instructions` against `blockhash` with `payer` paying fees.
pub fn build_transaction(
    instructions: &[Instruction],
    payer: &Keypair,
    extra_signers: &[&Keypair],
    blockhash: Hash,
) -> TokenResult<Transaction> {
    let mut signers: Vec<&Keypair> = Vec::with_capacity(extra_signers.len() + 1);
    signers.push(payer);
    signers.extend_from_slice(extra_signers);

    let mut transaction = Transaction::new_with_payer(instructions, Some(&payer.pubkey()));
    transaction
        .try_sign(&signers, blockhash)
        .map_err(|e| TokenError::Instruction(format!("failed to sign transaction: {}", e)))?;
    Ok(transaction)
}

/// Build, sign and submit `instructions`, waiting for confirmation.
pub async fn submit_and_confirm(
    ledger: &dyn LedgerClient,
    instructions: &[Instruction],
    payer: &Keypair,
    extra_signers: &[&Keypair],
) -> TokenResult<Signature> {
    let blockhash = ledger.latest_blockhash().await?;
    let transaction = build_transaction(instructions, payer, extra_signers, blockhash)?;
    ledger.send_and_confirm(&transaction).await
}
