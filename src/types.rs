//! Core types and data structures shared by the issuer and the transfer service.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::EncodedConfirmedTransactionWithStatusMeta;

use crate::error::{TokenError, TokenResult};

/// Decimal precision used for every token this crate issues.
pub const TOKEN_DECIMALS: u8 = 9;

/// Whole tokens minted into the operator account on issuance.
pub const INITIAL_SUPPLY: u64 = 1_000_000_000;

/// A token quantity in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(pub u64);

impl Amount {
    /// Scale a whole-token count by `10^decimals`.
    ///
    /// Integer arithmetic only; fails instead of wrapping when the result
    /// does not fit in a `u64`.
    pub fn from_whole(whole: u64, decimals: u8) -> TokenResult<Self> {
        10u64
            .checked_pow(decimals as u32)
            .and_then(|scale| whole.checked_mul(scale))
            .map(Amount)
            .ok_or_else(|| {
                TokenError::Config(format!(
                    "{} tokens at {} decimals overflows u64 base units",
                    whole, decimals
                ))
            })
    }

    pub fn base_units(&self) -> u64 {
        self.0
    }

    /// Human-readable amount; only used for display.
    pub fn to_ui(&self, decimals: u8) -> f64 {
        self.0 as f64 / 10f64.powi(decimals as i32)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: String,
}

/// Token metadata record.
///
/// `name`, `symbol` and `uri` are written on-chain; the rest lives in the
/// off-chain JSON document that `uri` points to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image: String,
    /// Location of the off-chain JSON document. Falls back to `image`.
    pub uri: Option<String>,
    pub attributes: Vec<Attribute>,
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self {
            name: "ApeArmor Token".to_string(),
            symbol: "APE".to_string(),
            description: "ApeArmor Token on Solana".to_string(),
            image: "https://arweave.net/your-image-url".to_string(),
            uri: None,
            attributes: vec![Attribute {
                trait_type: "Category".to_string(),
                value: "Token".to_string(),
            }],
        }
    }
}

impl TokenMetadata {
    /// URI stored in the on-chain record.
    pub fn onchain_uri(&self) -> &str {
        self.uri.as_deref().unwrap_or(&self.image)
    }

    /// The off-chain JSON document to host at [`TokenMetadata::onchain_uri`].
    pub fn offchain_document(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "symbol": self.symbol,
            "description": self.description,
            "image": self.image,
            "attributes": self.attributes,
        })
    }
}

/// Addresses and signatures produced by a successful issuance.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuanceReport {
    pub run_id: String,
    pub mint: Pubkey,
    pub token_account: Pubkey,
    pub metadata: Pubkey,
    /// Signature of the confirmed mint-to transaction.
    pub mint_signature: Signature,
    /// `None` when the metadata account already existed on resume.
    pub metadata_signature: Option<Signature>,
    pub supply: Amount,
}

/// One entry returned by a signatures-for-address lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureInfo {
    pub signature: Signature,
    pub slot: u64,
    pub block_time: Option<i64>,
}

/// A transaction in a token account's history.
#[derive(Debug)]
pub struct HistoryEntry {
    pub signature: Signature,
    pub block_time: Option<i64>,
    pub transaction: EncodedConfirmedTransactionWithStatusMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_supply_scales_exactly() {
        let amount = Amount::from_whole(INITIAL_SUPPLY, TOKEN_DECIMALS).unwrap();
        assert_eq!(amount.base_units(), 1_000_000_000_000_000_000);
    }

    #[test]
    fn test_scaling_overflow_is_rejected() {
        assert!(Amount::from_whole(u64::MAX, 1).is_err());
        assert!(Amount::from_whole(1, 20).is_err());
        assert_eq!(Amount::from_whole(7, 0).unwrap(), Amount(7));
    }

    #[test]
    fn test_metadata_uri_fallback() {
        let mut metadata = TokenMetadata::default();
        assert_eq!(metadata.onchain_uri(), metadata.image);

        metadata.uri = Some("https://arweave.net/meta.json".to_string());
        assert_eq!(metadata.onchain_uri(), "https://arweave.net/meta.json");
    }

    #[test]
    fn test_offchain_document_fields() {
        let doc = TokenMetadata::default().offchain_document();
        assert_eq!(doc["symbol"], "APE");
        assert_eq!(doc["attributes"][0]["trait_type"], "Category");
        assert_eq!(doc["attributes"][0]["value"], "Token");
    }
}
