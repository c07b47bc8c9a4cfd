//! Associated token account resolution.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use tracing::{debug, info, instrument};

use super::{instructions, submit_and_confirm, LedgerClient};
use crate::error::TokenResult;

/// Deterministic associated token account address for (`owner`, `mint`).
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(owner, mint)
}

/// Return the associated token account for (`owner`, `mint`), creating it
/// with `payer` funding the rent when it does not exist yet.
///
/// Repeated calls for the same pair always return the same address.
#[instrument(skip(ledger, payer), fields(payer = %payer.pubkey()))]
pub async fn resolve_token_account(
    ledger: &dyn LedgerClient,
    payer: &Keypair,
    owner: &Pubkey,
    mint: &Pubkey,
) -> TokenResult<Pubkey> {
    let address = associated_token_address(owner, mint);

    if ledger.account_exists(&address).await? {
        debug!("Token account {} already exists", address);
        return Ok(address);
    }

    let ix = instructions::create_token_account(&payer.pubkey(), owner, mint);
    let signature = submit_and_confirm(ledger, &[ix], payer, &[]).await?;
    info!("Created token account {} (signature: {})", address, signature);

    Ok(address)
}
