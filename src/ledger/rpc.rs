//! [`LedgerClient`] over a Solana JSON-RPC endpoint.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::{EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use super::{LedgerClient, RpcRateLimiter};
use crate::config::RpcConfig;
use crate::error::{TokenError, TokenResult};
use crate::types::SignatureInfo;

/// Shared read-only connection to an RPC node.
pub struct RpcLedger {
    client: RpcClient,
    commitment: CommitmentConfig,
    limiter: RpcRateLimiter,
    poll_interval: Duration,
}

impl RpcLedger {
    pub fn new(config: &RpcConfig) -> Self {
        let commitment = CommitmentConfig::from(config.commitment);
        Self {
            client: RpcClient::new_with_commitment(config.endpoint(), commitment),
            commitment,
            limiter: RpcRateLimiter::new(config.requests_per_second),
            poll_interval: config.confirm_poll_interval(),
        }
    }

    pub fn commitment(&self) -> CommitmentConfig {
        self.commitment
    }

    async fn signature_status(&self, signature: &Signature) -> TokenResult<Option<()>> {
        self.limiter.acquire().await;
        match self
            .client
            .get_signature_status_with_commitment(signature, self.commitment)
            .await?
        {
            Some(Ok(())) => Ok(Some(())),
            Some(Err(e)) => Err(TokenError::TransactionFailed {
                signature: signature.to_string(),
                reason: e.to_string(),
            }),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl LedgerClient for RpcLedger {
    #[instrument(skip(self))]
    async fn balance(&self, address: &Pubkey) -> TokenResult<u64> {
        self.limiter.acquire().await;
        Ok(self.client.get_balance(address).await?)
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> TokenResult<u64> {
        self.limiter.acquire().await;
        Ok(self
            .client
            .get_minimum_balance_for_rent_exemption(data_len)
            .await?)
    }

    async fn account_exists(&self, address: &Pubkey) -> TokenResult<bool> {
        self.limiter.acquire().await;
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await?;
        Ok(response.value.is_some())
    }

    async fn latest_blockhash(&self) -> TokenResult<Hash> {
        self.limiter.acquire().await;
        Ok(self.client.get_latest_blockhash().await?)
    }

    #[instrument(skip(self, transaction))]
    async fn send_and_confirm(&self, transaction: &Transaction) -> TokenResult<Signature> {
        self.limiter.acquire().await;
        Ok(self.client.send_and_confirm_transaction(transaction).await?)
    }

    #[instrument(skip(self, transaction))]
    async fn send(&self, transaction: &Transaction) -> TokenResult<Signature> {
        self.limiter.acquire().await;
        Ok(self.client.send_transaction(transaction).await?)
    }

    #[instrument(skip(self))]
    async fn confirm(&self, signature: &Signature, blockhash: &Hash) -> TokenResult<()> {
        loop {
            if self.signature_status(signature).await?.is_some() {
                debug!("Signature {} confirmed", signature);
                return Ok(());
            }

            self.limiter.acquire().await;
            let still_valid = self
                .client
                .is_blockhash_valid(blockhash, self.commitment)
                .await?;
            if !still_valid {
                // it may have landed between the two calls
                if self.signature_status(signature).await?.is_some() {
                    return Ok(());
                }
                warn!("Blockhash {} expired before {} was confirmed", blockhash, signature);
                return Err(TokenError::ConfirmationTimeout {
                    signature: signature.to_string(),
                });
            }

            sleep(self.poll_interval).await;
        }
    }

    async fn token_ui_balance(&self, token_account: &Pubkey) -> TokenResult<Option<f64>> {
        self.limiter.acquire().await;
        let amount = self.client.get_token_account_balance(token_account).await?;
        Ok(amount.ui_amount)
    }

    #[instrument(skip(self))]
    async fn signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> TokenResult<Vec<SignatureInfo>> {
        self.limiter.acquire().await;
        let config = GetConfirmedSignaturesForAddress2Config {
            before: None,
            until: None,
            limit: Some(limit),
            commitment: Some(self.commitment),
        };
        let statuses = self
            .client
            .get_signatures_for_address_with_config(address, config)
            .await?;

        statuses
            .into_iter()
            .map(|status| {
                let signature = Signature::from_str(&status.signature).map_err(|e| {
                    TokenError::Network(format!(
                        "node returned malformed signature {}: {}",
                        status.signature, e
                    ))
                })?;
                Ok(SignatureInfo {
                    signature,
                    slot: status.slot,
                    block_time: status.block_time,
                })
            })
            .collect()
    }

    async fn transaction(
        &self,
        signature: &Signature,
    ) -> TokenResult<EncodedConfirmedTransactionWithStatusMeta> {
        self.limiter.acquire().await;
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };
        Ok(self
            .client
            .get_transaction_with_config(signature, config)
            .await?)
    }
}
