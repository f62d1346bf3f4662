//! Constants shared between the on-chain storage program and clients.
//!
//! Keep these stable because they affect PDA derivation and the wire format.

use crate::address::Address;

/// Maximum number of seeds accepted by PDA derivation (bump included).
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Default per-transaction size ceiling (IPv6 MTU minus headers).
pub const PACKET_DATA_SIZE: usize = 1232;

/// `11111111111111111111111111111111`
pub const SYSTEM_PROGRAM_ID: Address = Address::new([0u8; 32]);

/// `SysvarRent111111111111111111111111111111111`
pub const SYSVAR_RENT_ID: Address = Address::new([
    6, 167, 213, 23, 25, 44, 92, 81, 33, 140, 201, 76, 61, 74, 241, 127, 88, 218, 238, 8, 155, 161,
    253, 68, 227, 219, 217, 138, 0, 0, 0, 0,
]);

/// Devnet deployment of the storage program.
pub const DEFAULT_PROGRAM_ID: &str = "GxL6gD17N57d4Ub1Gx2xao16LQd8G7uQE2crtW8bKFNe";

pub(crate) const DEFAULT_PROGRAM_ID_BYTES: [u8; 32] = [
    237, 11, 215, 168, 139, 109, 246, 131, 138, 243, 4, 26, 230, 244, 246, 86, 187, 118, 172, 128,
    109, 75, 150, 168, 234, 129, 170, 48, 138, 163, 46, 239,
];

pub fn default_program_id() -> Address {
    Address::new(DEFAULT_PROGRAM_ID_BYTES)
}

/// RPC endpoints of the public clusters.
pub mod endpoints {
    pub const LOCALHOST: &str = "http://127.0.0.1:8899";
    pub const DEVNET: &str = "https://api.devnet.solana.com";
    pub const MAINNET: &str = "https://api.mainnet-beta.solana.com";

    /// Public mainnet endpoint request budget.
    pub const MAINNET_QPS: u32 = 2;
}
