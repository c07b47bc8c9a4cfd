//! Key and address parsing.
//!
//! Operator secrets arrive either as a hex string or as a JSON byte array.
//! Both decode to the same 64-byte ed25519 keypair representation, and hex is
//! the single export format.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use std::str::FromStr;

use crate::error::{TokenError, TokenResult};

/// Environment variable holding the operator secret key.
pub const SECRET_KEY_ENV_VAR: &str = "SECRET_KEY";

/// Environment variable holding the transfer sender secret key.
pub const SENDER_SECRET_KEY_ENV_VAR: &str = "SENDER_SECRET_KEY";

const KEYPAIR_LENGTH: usize = 64;

/// Decode secret key material in either supported encoding.
pub fn decode_secret_key(material: &str) -> TokenResult<Keypair> {
    let trimmed = material.trim();
    let bytes = if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(trimmed)
            .map_err(|e| TokenError::InvalidKey(format!("malformed JSON byte array: {}", e)))?
    } else {
        let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        hex::decode(hex_str)
            .map_err(|e| TokenError::InvalidKey(format!("malformed hex string: {}", e)))?
    };

    keypair_from_bytes(&bytes)
}

/// Build a keypair from its 64-byte secret+public representation.
pub fn keypair_from_bytes(bytes: &[u8]) -> TokenResult<Keypair> {
    if bytes.len() != KEYPAIR_LENGTH {
        return Err(TokenError::InvalidKey(format!(
            "expected {} bytes, got {}",
            KEYPAIR_LENGTH,
            bytes.len()
        )));
    }
    Keypair::try_from(bytes).map_err(|e| TokenError::InvalidKey(e.to_string()))
}

/// Canonical export encoding for secret keys.
pub fn encode_secret_key_hex(keypair: &Keypair) -> String {
    hex::encode(keypair.to_bytes())
}

/// Read and decode a secret key from the named environment variable.
pub fn secret_key_from_env(var: &str) -> TokenResult<Keypair> {
    let material = std::env::var(var)
        .map_err(|_| TokenError::Config(format!("environment variable {} not set", var)))?;
    decode_secret_key(&material)
}

/// Parse a base58 public address.
pub fn parse_address(address: &str) -> TokenResult<Pubkey> {
    Pubkey::from_str(address.trim())
        .map_err(|e| TokenError::InvalidAddress(format!("{}: {}", address, e)))
}
