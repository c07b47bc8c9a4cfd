//! Operator balance precondition.

use solana_sdk::native_token::lamports_to_sol;
use solana_sdk::pubkey::Pubkey;
use tracing::{info, instrument};

use crate::error::{TokenError, TokenResult};
use crate::ledger::LedgerClient;

/// Fails fast when the paying account cannot cover issuance costs.
#[derive(Debug, Clone, Copy)]
pub struct BalanceGuard {
    min_balance_lamports: u64,
}

impl BalanceGuard {
    pub fn new(min_balance_lamports: u64) -> Self {
        Self {
            min_balance_lamports,
        }
    }

    pub fn min_balance_lamports(&self) -> u64 {
        self.min_balance_lamports
    }

    /// Return the observed balance of `address`, or
    /// [`TokenError::InsufficientFunds`] when it is below the minimum.
    #[instrument(skip(self, ledger))]
    pub async fn check(&self, ledger: &dyn LedgerClient, address: &Pubkey) -> TokenResult<u64> {
        let balance = ledger.balance(address).await?;

        if balance < self.min_balance_lamports {
            return Err(TokenError::InsufficientFunds {
                required: self.min_balance_lamports,
                actual: balance,
            });
        }

        info!("Operator balance: {} SOL", lamports_to_sol(balance));
        Ok(balance)
    }
}
