//! Token transfers and read-only token account queries.

use futures_util::future::try_join_all;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

use crate::error::{TokenError, TokenResult};
use crate::keys::{decode_secret_key, parse_address};
use crate::ledger::{
    associated_token_address, build_transaction, instructions, resolve_token_account,
    LedgerClient,
};
use crate::types::{Amount, HistoryEntry};

/// Default number of history entries fetched.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Largest page `getSignaturesForAddress` accepts.
pub const MAX_HISTORY_LIMIT: usize = 1_000;

/// Transfers and lookups over one shared ledger connection.
pub struct TransferService {
    ledger: Arc<dyn LedgerClient>,
}

impl TransferService {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    /// Transfer `amount` base units of `mint` from the sender to `recipient`.
    ///
    /// Both token accounts are created if missing, with the sender paying.
    /// Returns the submitted signature without waiting for confirmation.
    pub async fn transfer(
        &self,
        sender_secret: &str,
        recipient: &str,
        mint: &str,
        amount: u64,
    ) -> TokenResult<Signature> {
        let result = async {
            let sender = decode_secret_key(sender_secret)?;
            let recipient = parse_address(recipient)?;
            let mint = parse_address(mint)?;
            self.transfer_with_keypair(&sender, &recipient, &mint, Amount(amount))
                .await
        }
        .await;

        if let Err(e) = &result {
            error!("Error transferring tokens: {}", e);
        }
        result
    }

    #[instrument(skip(self, sender), fields(sender = %sender.pubkey()))]
    pub async fn transfer_with_keypair(
        &self,
        sender: &Keypair,
        recipient: &Pubkey,
        mint: &Pubkey,
        amount: Amount,
    ) -> TokenResult<Signature> {
        let ledger = self.ledger.as_ref();
        let source = resolve_token_account(ledger, sender, &sender.pubkey(), mint).await?;
        let destination = resolve_token_account(ledger, sender, recipient, mint).await?;

        let ix = instructions::transfer(&source, &destination, &sender.pubkey(), amount)?;
        let blockhash = ledger.latest_blockhash().await?;
        let transaction = build_transaction(&[ix], sender, &[], blockhash)?;
        let signature = ledger.send(&transaction).await?;

        info!("Transfer successful! Transaction signature: {}", signature);
        Ok(signature)
    }

    /// UI-scaled balance of `wallet`'s token account for `mint`, exactly as
    /// the node reports it (`None` when the node omits the UI amount).
    ///
    /// Strictly read-only: a wallet without a token account has a zero balance.
    pub async fn token_balance(&self, wallet: &str, mint: &str) -> TokenResult<Option<f64>> {
        let result = async {
            let wallet = parse_address(wallet)?;
            let mint = parse_address(mint)?;
            let account = associated_token_address(&wallet, &mint);

            if !self.ledger.account_exists(&account).await? {
                debug!("No token account {} for wallet {}", account, wallet);
                return Ok(Some(0.0));
            }
            self.ledger.token_ui_balance(&account).await
        }
        .await;

        if let Err(e) = &result {
            error!("Error getting token balance: {}", e);
        }
        result
    }

    /// Like [`TransferService::token_balance`], but creates the token account
    /// when missing, funded by `payer`.
    pub async fn token_balance_with_payer(
        &self,
        wallet: &Pubkey,
        mint: &Pubkey,
        payer: &Keypair,
    ) -> TokenResult<Option<f64>> {
        let account = resolve_token_account(self.ledger.as_ref(), payer, wallet, mint).await?;
        self.ledger.token_ui_balance(&account).await
    }

    /// Up to `limit` most recent transactions touching `token_account`,
    /// newest first. Details are fetched concurrently; any failed fetch
    /// fails the whole call.
    pub async fn transaction_history(
        &self,
        token_account: &str,
        limit: usize,
    ) -> TokenResult<Vec<HistoryEntry>> {
        let result = async {
            let address = parse_address(token_account)?;
            if limit == 0 || limit > MAX_HISTORY_LIMIT {
                return Err(TokenError::InvalidArgument(format!(
                    "history limit must be between 1 and {}, got {}",
                    MAX_HISTORY_LIMIT, limit
                )));
            }
            let signatures = self.ledger.signatures_for_address(&address, limit).await?;

            let fetches = signatures.into_iter().map(|info| async move {
                let transaction = self.ledger.transaction(&info.signature).await?;
                Ok::<_, TokenError>(HistoryEntry {
                    signature: info.signature,
                    block_time: info.block_time,
                    transaction,
                })
            });
            try_join_all(fetches).await
        }
        .await;

        match &result {
            Ok(entries) => debug!("Fetched {} history entries for {}", entries.len(), token_account),
            Err(e) => error!("Error getting transaction history: {}", e),
        }
        result
    }
}
