//! spl-issuer - SPL token issuance and transfer orchestration for Solana
//!
//! This crate sequences the ledger calls needed to issue a fungible token
//! (mint, token account, initial supply, on-chain metadata) under a bounded
//! retry supervisor, and to move that token between wallets.

pub mod config;
pub mod error;
pub mod issuer;
pub mod keys;
pub mod ledger;
pub mod transfer;
pub mod types;

// Re-export main types for convenience
pub use config::{IssuerConfig, IssuerConfigBuilder};
pub use error::{TokenError, TokenResult};
pub use issuer::{Issuer, IssuancePipeline, RetrySupervisor};
pub use ledger::{LedgerClient, RpcLedger};
pub use transfer::TransferService;
pub use types::{Amount, HistoryEntry, IssuanceReport, TokenMetadata};
