//! Signing identities.
//!
//! The client never holds an ambient wallet: every operation receives the
//! identity that authorizes it. Key management stays outside this crate;
//! [`Identity`] is the only capability the protocol needs from it.

use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;

use crate::address::{Address, Signature};
use crate::error::{ClientError, ClientResult};

/// A public identity plus the ability to sign with its private half.
pub trait Identity: Send + Sync {
    fn public(&self) -> Address;

    fn sign(&self, message: &[u8]) -> Signature;
}

impl Identity for Keypair {
    fn public(&self) -> Address {
        Address::new(self.pubkey().to_bytes())
    }

    fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.sign_message(message);
        let mut out = [0u8; 64];
        out.copy_from_slice(sig.as_ref());
        Signature::new(out)
    }
}

/// Parse a base58 encoded 64-byte keypair (secret followed by public key).
/// The secret is never included in the error.
pub fn keypair_from_base58(secret: &str) -> ClientResult<Keypair> {
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(ClientError::configuration("private key is empty"));
    }
    let bytes = bs58::decode(secret)
        .into_vec()
        .map_err(|_| ClientError::configuration("private key is not valid base58"))?;
    if bytes.len() != 64 {
        return Err(ClientError::configuration(format!(
            "private key must be 64 bytes, got {}",
            bytes.len()
        )));
    }
    Keypair::from_bytes(&bytes)
        .map_err(|_| ClientError::configuration("private key does not match its public half"))
}
