//! Fixed-width value types that cross the wire: account addresses,
//! signatures (which double as transaction ids) and freshness tokens.
//!
//! All of them print and parse as base58, the network's textual form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ClientError;

fn decode_exact<const N: usize>(s: &str, what: &str) -> Result<[u8; N], ClientError> {
    let bytes = bs58::decode(s.trim())
        .into_vec()
        .map_err(|e| ClientError::configuration(format!("invalid base58 {what}: {e}")))?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| {
        ClientError::configuration(format!(
            "{what} must decode to {N} bytes, got {}",
            bytes.len()
        ))
    })
}

macro_rules! base58_bytes {
    ($name:ident, $len:expr, $what:literal) => {
        impl $name {
            pub const LEN: usize = $len;

            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, ClientError> {
                <[u8; $len]>::try_from(bytes).map(Self).map_err(|_| {
                    ClientError::decode(format!(
                        concat!($what, " must be {} bytes, got {}"),
                        $len,
                        bytes.len()
                    ))
                })
            }

            pub const fn to_bytes(&self) -> [u8; $len] {
                self.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&bs58::encode(&self.0).into_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self)
            }
        }

        impl FromStr for $name {
            type Err = ClientError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_exact::<$len>(s, $what).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// A 32-byte account address (public key or program derived address).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 32]);

base58_bytes!(Address, 32, "address");

/// A 64-byte ed25519 signature. The fee payer's signature is also the
/// transaction id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

base58_bytes!(Signature, 64, "signature");

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

/// Transaction id as returned by `send_transaction`.
pub type TransactionId = Signature;

/// Recent blockhash bounding a transaction's validity window.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FreshnessToken([u8; 32]);

base58_bytes!(FreshnessToken, 32, "blockhash");
