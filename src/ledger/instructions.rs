//! Instruction builders for the SPL Token, Associated Token Account and
//! Metaplex Token Metadata programs.

use mpl_token_metadata::accounts::Metadata;
use mpl_token_metadata::instructions::CreateMetadataAccountV3Builder;
use mpl_token_metadata::types::DataV2;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::Mint;

use crate::error::{TokenError, TokenResult};
use crate::types::{Amount, TokenMetadata};

/// Size of an SPL mint account.
pub const MINT_ACCOUNT_LEN: usize = Mint::LEN;

fn instruction_error(err: impl std::fmt::Display) -> TokenError {
    TokenError::Instruction(err.to_string())
}

/// Allocate and initialise a mint. `authority` becomes both the mint and the
/// freeze authority.
pub fn create_mint(
    payer: &Pubkey,
    mint: &Pubkey,
    authority: &Pubkey,
    decimals: u8,
    rent_lamports: u64,
) -> TokenResult<Vec<Instruction>> {
    let allocate = system_instruction::create_account(
        payer,
        mint,
        rent_lamports,
        MINT_ACCOUNT_LEN as u64,
        &spl_token::id(),
    );
    let initialize = spl_token::instruction::initialize_mint2(
        &spl_token::id(),
        mint,
        authority,
        Some(authority),
        decimals,
    )
    .map_err(instruction_error)?;

    Ok(vec![allocate, initialize])
}

/// Create the associated token account for (`owner`, `mint`); a no-op on the
/// ledger when it already exists.
pub fn create_token_account(payer: &Pubkey, owner: &Pubkey, mint: &Pubkey) -> Instruction {
    spl_associated_token_account::instruction::create_associated_token_account_idempotent(
        payer,
        owner,
        mint,
        &spl_token::id(),
    )
}

pub fn mint_to(
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: Amount,
) -> TokenResult<Instruction> {
    spl_token::instruction::mint_to(
        &spl_token::id(),
        mint,
        destination,
        authority,
        &[],
        amount.base_units(),
    )
    .map_err(instruction_error)
}

pub fn transfer(
    source: &Pubkey,
    destination: &Pubkey,
    authority: &Pubkey,
    amount: Amount,
) -> TokenResult<Instruction> {
    spl_token::instruction::transfer(
        &spl_token::id(),
        source,
        destination,
        authority,
        &[],
        amount.base_units(),
    )
    .map_err(instruction_error)
}

/// Address of the metadata account for `mint`.
pub fn metadata_address(mint: &Pubkey) -> Pubkey {
    Metadata::find_pda(mint).0
}

/// Publish the on-chain metadata record for `mint`. Zero seller fee, no
/// creators, not mutable afterwards.
pub fn create_metadata(
    payer: &Pubkey,
    mint: &Pubkey,
    authority: &Pubkey,
    metadata: &TokenMetadata,
) -> Instruction {
    let data = DataV2 {
        name: metadata.name.clone(),
        symbol: metadata.symbol.clone(),
        uri: metadata.onchain_uri().to_string(),
        seller_fee_basis_points: 0,
        creators: None,
        collection: None,
        uses: None,
    };

    CreateMetadataAccountV3Builder::new()
        .metadata(metadata_address(mint))
        .mint(*mint)
        .mint_authority(*authority)
        .payer(*payer)
        .update_authority(*authority, true)
        .data(data)
        .is_mutable(false)
        .instruction()
}

#[cfg(test)]
mod tests {
    use super::*;
    use spl_token::instruction::TokenInstruction;
    use spl_token::solana_program::program_option::COption;

    #[test]
    fn test_create_mint_sets_both_authorities() {
        let payer = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let ixs = create_mint(&payer, &mint, &payer, 9, 1_461_600).unwrap();
        assert_eq!(ixs.len(), 2);
        assert_eq!(ixs[1].program_id, spl_token::id());

        match TokenInstruction::unpack(&ixs[1].data).unwrap() {
            TokenInstruction::InitializeMint2 {
                decimals,
                mint_authority,
                freeze_authority,
            } => {
                assert_eq!(decimals, 9);
                assert_eq!(mint_authority, payer);
                assert_eq!(freeze_authority, COption::Some(payer));
            }
            other => panic!("unexpected instruction {:?}", other),
        }
    }

    #[test]
    fn test_mint_to_carries_exact_amount() {
        let mint = Pubkey::new_unique();
        let account = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let amount = Amount::from_whole(1_000_000_000, 9).unwrap();

        let ix = mint_to(&mint, &account, &authority, amount).unwrap();
        match TokenInstruction::unpack(&ix.data).unwrap() {
            TokenInstruction::MintTo { amount } => {
                assert_eq!(amount, 1_000_000_000_000_000_000)
            }
            other => panic!("unexpected instruction {:?}", other),
        }
    }

    #[test]
    fn test_token_account_instruction_targets_derived_address() {
        let payer = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let ix = create_token_account(&payer, &owner, &mint);
        let expected =
            spl_associated_token_account::get_associated_token_address(&owner, &mint);
        assert_eq!(ix.program_id, spl_associated_token_account::id());
        assert_eq!(ix.accounts[1].pubkey, expected);
    }

    #[test]
    fn test_metadata_address_is_deterministic() {
        let mint = Pubkey::new_unique();
        assert_eq!(metadata_address(&mint), metadata_address(&mint));
        assert_ne!(metadata_address(&mint), mint);

        let ix = create_metadata(&mint, &mint, &mint, &TokenMetadata::default());
        assert_eq!(ix.program_id, mpl_token_metadata::ID);
        assert_eq!(ix.accounts[0].pubkey, metadata_address(&mint));
    }
}
