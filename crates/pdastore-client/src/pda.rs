//! Program derived address (PDA) derivation.
//!
//! Thin wrappers over `solana_sdk::pubkey::Pubkey`, which hashes
//! `seeds.. || program_id || "ProgramDerivedAddress"` and retries with a
//! descending bump seed until the digest is not a valid ed25519 point. An
//! off-curve address has no private key, so only the owning program can sign
//! for it. Seed limits are checked here first so that they surface as
//! configuration errors.

use solana_sdk::pubkey::{Pubkey, PubkeyError};
use tracing::debug;

use crate::address::Address;
use crate::constants::{MAX_SEEDS, MAX_SEED_LEN};
use crate::error::{ClientError, ClientResult};

/// True when `bytes` decompress to a point on the ed25519 curve.
pub fn is_on_curve(bytes: &[u8; 32]) -> bool {
    Pubkey::new_from_array(*bytes).is_on_curve()
}

fn check_seeds(seeds: &[&[u8]], max_seeds: usize) -> ClientResult<()> {
    if seeds.len() > max_seeds {
        return Err(ClientError::configuration(format!(
            "at most {max_seeds} seeds allowed, got {}",
            seeds.len()
        )));
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(ClientError::configuration(format!(
            "seed of {} bytes exceeds {MAX_SEED_LEN}",
            seed.len()
        )));
    }
    Ok(())
}

/// Hash seeds with the program id. Fails when the seeds exceed the network
/// limits or the result lands on the curve.
pub fn create_program_address(seeds: &[&[u8]], program: &Address) -> ClientResult<Address> {
    check_seeds(seeds, MAX_SEEDS)?;
    match Pubkey::create_program_address(seeds, &Pubkey::new_from_array(program.to_bytes())) {
        Ok(address) => Ok(Address::new(address.to_bytes())),
        Err(PubkeyError::InvalidSeeds) => Err(ClientError::Derivation { program: *program }),
        Err(e) => Err(ClientError::configuration(format!("invalid seeds: {e}"))),
    }
}

/// Find the first off-curve address, trying bump seeds from 255 downwards.
/// One seed slot is reserved for the bump.
pub fn find_program_address(seeds: &[&[u8]], program: &Address) -> ClientResult<(Address, u8)> {
    check_seeds(seeds, MAX_SEEDS - 1)?;
    Pubkey::try_find_program_address(seeds, &Pubkey::new_from_array(program.to_bytes()))
        .map(|(address, bump)| (Address::new(address.to_bytes()), bump))
        .ok_or(ClientError::Derivation { program: *program })
}

/// Storage account of `user` under `program`. The only seed is the user's
/// public key bytes; the on-chain program derives the same address.
pub fn derive_storage_address(program: &Address, user: &Address) -> ClientResult<(Address, u8)> {
    let derived = find_program_address(&[user.as_ref()], program)?;
    debug!(%program, %user, address = %derived.0, bump = derived.1, "derived storage address");
    Ok(derived)
}
