//! Error types shared by the issuance pipeline and the transfer service.

use solana_client::client_error::ClientError;
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use thiserror::Error;

/// Errors that can occur while issuing or moving tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Operator balance is below the configured minimum.
    #[error(
        "insufficient funds: balance {actual} lamports ({actual_sol:.4} SOL) is below the required minimum of {required} lamports ({required_sol:.4} SOL)",
        actual_sol = as_sol(.actual),
        required_sol = as_sol(.required)
    )]
    InsufficientFunds { required: u64, actual: u64 },

    /// RPC connection or request failed.
    #[error("network error: {0}")]
    Network(String),

    /// Transaction was not confirmed before its blockhash expired.
    #[error("transaction {signature} was not confirmed before its blockhash expired")]
    ConfirmationTimeout { signature: String },

    /// A transaction landed but failed on-chain.
    #[error("transaction {signature} failed: {reason}")]
    TransactionFailed { signature: String, reason: String },

    /// Malformed public address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed or unsupported secret key material.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A call argument is outside the range the ledger accepts.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An instruction could not be built from its inputs.
    #[error("instruction error: {0}")]
    Instruction(String),

    /// Configuration is missing or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Checkpoint storage failed.
    #[error("checkpoint storage error: {0}")]
    Checkpoint(String),
}

impl TokenError {
    /// Whether re-running the whole issuance pipeline can clear this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TokenError::Network(_)
                | TokenError::ConfirmationTimeout { .. }
                | TokenError::TransactionFailed { .. }
                | TokenError::Checkpoint(_)
        )
    }

    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, TokenError::InsufficientFunds { .. })
    }
}

impl From<ClientError> for TokenError {
    fn from(err: ClientError) -> Self {
        TokenError::Network(err.to_string())
    }
}

impl From<sqlx::Error> for TokenError {
    fn from(err: sqlx::Error) -> Self {
        TokenError::Checkpoint(err.to_string())
    }
}

fn as_sol(lamports: &u64) -> f64 {
    *lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;
