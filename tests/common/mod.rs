//! In-memory ledger used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_program;
use solana_sdk::transaction::Transaction;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction,
    EncodedTransactionWithStatusMeta,
};
use spl_issuer::error::{TokenError, TokenResult};
use spl_issuer::ledger::LedgerClient;
use spl_issuer::types::SignatureInfo;
use spl_token::instruction::TokenInstruction;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct MockState {
    balances: HashMap<Pubkey, u64>,
    accounts: HashSet<Pubkey>,
    token_balances: HashMap<Pubkey, Option<f64>>,
    landed: HashSet<Signature>,
    sent: Vec<Transaction>,
    history: HashMap<Pubkey, Vec<SignatureInfo>>,
    broken_fetches: HashSet<Signature>,
    failing_balance_calls: usize,
    failing_sends: usize,
    dropped_sends: usize,
    failing_confirms: usize,
    lost_acks: usize,
    balance_calls: usize,
}

/// A ledger that lands every transaction it accepts, with failure injection.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, address: Pubkey, lamports: u64) {
        self.state.lock().unwrap().balances.insert(address, lamports);
    }

    pub fn add_account(&self, address: Pubkey) {
        self.state.lock().unwrap().accounts.insert(address);
    }

    pub fn set_token_balance(&self, account: Pubkey, ui_amount: f64) {
        let mut state = self.state.lock().unwrap();
        state.accounts.insert(account);
        state.token_balances.insert(account, Some(ui_amount));
    }

    /// An existing token account whose UI amount the node does not report.
    pub fn set_unreported_token_balance(&self, account: Pubkey) {
        let mut state = self.state.lock().unwrap();
        state.accounts.insert(account);
        state.token_balances.insert(account, None);
    }

    /// Record history for `address`; `entries` must be newest first.
    pub fn set_history(&self, address: Pubkey, entries: Vec<SignatureInfo>) {
        self.state.lock().unwrap().history.insert(address, entries);
    }

    pub fn break_fetch(&self, signature: Signature) {
        self.state.lock().unwrap().broken_fetches.insert(signature);
    }

    /// The next `n` balance queries fail with a network error.
    pub fn fail_balance_calls(&self, n: usize) {
        self.state.lock().unwrap().failing_balance_calls = n;
    }

    /// The next `n` submissions fail with a network error before reaching the ledger.
    pub fn fail_sends(&self, n: usize) {
        self.state.lock().unwrap().failing_sends = n;
    }

    /// The next `n` unconfirmed submissions are accepted but never land.
    pub fn drop_sends(&self, n: usize) {
        self.state.lock().unwrap().dropped_sends = n;
    }

    /// The next `n` confirmation waits fail with a network error.
    pub fn fail_confirms(&self, n: usize) {
        self.state.lock().unwrap().failing_confirms = n;
    }

    /// The next `n` confirmed submissions land but report a network error.
    pub fn lose_acks(&self, n: usize) {
        self.state.lock().unwrap().lost_acks = n;
    }

    pub fn balance_calls(&self) -> usize {
        self.state.lock().unwrap().balance_calls
    }

    pub fn sent(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn account_exists_now(&self, address: &Pubkey) -> bool {
        self.state.lock().unwrap().accounts.contains(address)
    }

    /// Decoded SPL token instructions across every submitted transaction.
    pub fn token_instructions(&self) -> Vec<TokenInstruction<'static>> {
        self.sent()
            .iter()
            .flat_map(|tx| {
                let keys = tx.message.account_keys.clone();
                tx.message
                    .instructions
                    .iter()
                    .filter(move |ix| keys[ix.program_id_index as usize] == spl_token::id())
                    .filter_map(|ix| TokenInstruction::unpack(&ix.data).ok())
                    .map(into_static)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Amounts of every mint-to instruction submitted.
    pub fn minted_amounts(&self) -> Vec<u64> {
        self.token_instructions()
            .into_iter()
            .filter_map(|ix| match ix {
                TokenInstruction::MintTo { amount } => Some(amount),
                _ => None,
            })
            .collect()
    }

    /// Amounts of every transfer instruction submitted.
    pub fn transferred_amounts(&self) -> Vec<u64> {
        self.token_instructions()
            .into_iter()
            .filter_map(|ix| match ix {
                TokenInstruction::Transfer { amount } => Some(amount),
                _ => None,
            })
            .collect()
    }

    /// Number of submitted transactions that allocate a mint account.
    pub fn created_mints(&self) -> usize {
        self.programs_per_transaction()
            .iter()
            .filter(|programs| programs.contains(&system_program::id()))
            .count()
    }

    /// Program ids invoked by each submitted transaction, in order.
    pub fn programs_per_transaction(&self) -> Vec<Vec<Pubkey>> {
        self.sent()
            .iter()
            .map(|tx| {
                tx.message
                    .instructions
                    .iter()
                    .map(|ix| tx.message.account_keys[ix.program_id_index as usize])
                    .collect()
            })
            .collect()
    }

    fn submit(&self, transaction: &Transaction, allow_drop: bool) -> TokenResult<Signature> {
        let mut state = self.state.lock().unwrap();
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(TokenError::Network("connection reset by peer".to_string()));
        }

        let signature = transaction.signatures[0];
        state.sent.push(transaction.clone());

        if allow_drop && state.dropped_sends > 0 {
            state.dropped_sends -= 1;
            return Ok(signature);
        }

        // land: record every account the transaction creates
        let keys = &transaction.message.account_keys;
        for ix in &transaction.message.instructions {
            let program = keys[ix.program_id_index as usize];
            let created = if program == system_program::id() {
                ix.accounts.get(1)
            } else if program == spl_associated_token_account::id() {
                ix.accounts.get(1)
            } else if program == mpl_token_metadata::ID {
                ix.accounts.first()
            } else {
                None
            };
            if let Some(index) = created {
                state.accounts.insert(keys[*index as usize]);
            }
        }
        state.landed.insert(signature);

        if !allow_drop && state.lost_acks > 0 {
            state.lost_acks -= 1;
            return Err(TokenError::Network("confirmation ack lost".to_string()));
        }
        Ok(signature)
    }
}

fn into_static(ix: TokenInstruction<'_>) -> TokenInstruction<'static> {
    match ix {
        TokenInstruction::MintTo { amount } => TokenInstruction::MintTo { amount },
        TokenInstruction::Transfer { amount } => TokenInstruction::Transfer { amount },
        TokenInstruction::InitializeMint2 {
            decimals,
            mint_authority,
            freeze_authority,
        } => TokenInstruction::InitializeMint2 {
            decimals,
            mint_authority,
            freeze_authority,
        },
        // other instructions are not inspected by the tests
        _ => TokenInstruction::Revoke,
    }
}

pub fn encoded_transaction(
    slot: u64,
    block_time: Option<i64>,
) -> EncodedConfirmedTransactionWithStatusMeta {
    EncodedConfirmedTransactionWithStatusMeta {
        slot,
        transaction: EncodedTransactionWithStatusMeta {
            transaction: EncodedTransaction::LegacyBinary(String::new()),
            meta: None,
            version: None,
        },
        block_time,
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn balance(&self, address: &Pubkey) -> TokenResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.balance_calls += 1;
        if state.failing_balance_calls > 0 {
            state.failing_balance_calls -= 1;
            return Err(TokenError::Network("getBalance timed out".to_string()));
        }
        Ok(state.balances.get(address).copied().unwrap_or(0))
    }

    async fn minimum_balance_for_rent_exemption(&self, data_len: usize) -> TokenResult<u64> {
        Ok((data_len as u64 + 128) * 6_960)
    }

    async fn account_exists(&self, address: &Pubkey) -> TokenResult<bool> {
        Ok(self.state.lock().unwrap().accounts.contains(address))
    }

    async fn latest_blockhash(&self) -> TokenResult<Hash> {
        Ok(Hash::new_unique())
    }

    async fn send_and_confirm(&self, transaction: &Transaction) -> TokenResult<Signature> {
        self.submit(transaction, false)
    }

    async fn send(&self, transaction: &Transaction) -> TokenResult<Signature> {
        self.submit(transaction, true)
    }

    async fn confirm(&self, signature: &Signature, _blockhash: &Hash) -> TokenResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_confirms > 0 {
            state.failing_confirms -= 1;
            return Err(TokenError::Network("getSignatureStatuses failed".to_string()));
        }
        if state.landed.contains(signature) {
            Ok(())
        } else {
            Err(TokenError::ConfirmationTimeout {
                signature: signature.to_string(),
            })
        }
    }

    async fn token_ui_balance(&self, token_account: &Pubkey) -> TokenResult<Option<f64>> {
        let state = self.state.lock().unwrap();
        if !state.accounts.contains(token_account) {
            return Err(TokenError::Network(format!(
                "could not find account {}",
                token_account
            )));
        }
        Ok(state
            .token_balances
            .get(token_account)
            .copied()
            .unwrap_or(Some(0.0)))
    }

    async fn signatures_for_address(
        &self,
        address: &Pubkey,
        limit: usize,
    ) -> TokenResult<Vec<SignatureInfo>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .history
            .get(address)
            .map(|entries| entries.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn transaction(
        &self,
        signature: &Signature,
    ) -> TokenResult<EncodedConfirmedTransactionWithStatusMeta> {
        let state = self.state.lock().unwrap();
        if state.broken_fetches.contains(signature) {
            return Err(TokenError::Network(format!("getTransaction failed for {}", signature)));
        }
        let info = state
            .history
            .values()
            .flatten()
            .find(|info| &info.signature == signature)
            .cloned()
            .ok_or_else(|| TokenError::Network(format!("unknown signature {}", signature)))?;
        Ok(encoded_transaction(info.slot, info.block_time))
    }
}
