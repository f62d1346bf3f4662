//! Signed transaction envelope.
//!
//! One 64-byte signature per required signer in account-table order,
//! followed by the unsigned body. The bytes are the network's
//! `solana_sdk::transaction::Transaction` as bincode.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use solana_sdk::signature::Signature as WireSignature;
use solana_sdk::transaction::Transaction;

use crate::address::{Address, Signature, TransactionId};
use crate::error::{ClientError, ClientResult};
use crate::identity::Identity;
use crate::message::{wire_deserialize, UnsignedTransaction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    signatures: Vec<Signature>,
    message: UnsignedTransaction,
}

impl SignedTransaction {
    /// Sign `message` with the supplied keys. Every required signer must be
    /// present among `keys`; extra keys are ignored.
    pub fn sign(message: UnsignedTransaction, keys: &[&dyn Identity]) -> ClientResult<Self> {
        let body = message.encode();
        let signatures = message
            .required_signers()
            .iter()
            .map(|signer| {
                keys.iter()
                    .find(|k| k.public() == *signer)
                    .map(|k| k.sign(&body))
                    .ok_or(ClientError::MissingSigner { address: *signer })
            })
            .collect::<ClientResult<Vec<_>>>()?;
        Ok(Self { signatures, message })
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn message(&self) -> &UnsignedTransaction {
        &self.message
    }

    /// The fee payer's signature, which the network uses as the id.
    pub fn id(&self) -> TransactionId {
        self.signatures[0]
    }

    /// Signers whose signature does not match the body.
    pub fn invalid_signers(&self) -> Vec<Address> {
        self.message
            .required_signers()
            .iter()
            .zip(self.to_wire().verify_with_results())
            .filter(|(_, valid)| !valid)
            .map(|(signer, _)| *signer)
            .collect()
    }

    fn to_wire(&self) -> Transaction {
        Transaction {
            signatures: self.signatures.iter().map(|s| WireSignature::from(s.to_bytes())).collect(),
            message: self.message.to_wire(),
        }
    }

    pub fn encode(&self) -> ClientResult<Vec<u8>> {
        bincode::serialize(&self.to_wire())
            .map_err(|e| ClientError::decode(format!("transaction does not serialize: {e}")))
    }

    pub fn decode(bytes: &[u8]) -> ClientResult<Self> {
        let wire: Transaction = wire_deserialize(bytes, "transaction")?;
        let message = UnsignedTransaction::from_wire(wire.message)?;
        if wire.signatures.len() != message.header().num_required_signatures as usize {
            return Err(ClientError::decode(format!(
                "{} signatures for {} required signers",
                wire.signatures.len(),
                message.header().num_required_signatures
            )));
        }
        let signatures = wire
            .signatures
            .iter()
            .map(|s| Signature::from_slice(s.as_ref()))
            .collect::<ClientResult<Vec<_>>>()?;
        Ok(Self { signatures, message })
    }

    pub fn to_base64(&self) -> ClientResult<String> {
        Ok(STANDARD.encode(self.encode()?))
    }

    pub fn from_base64(s: &str) -> ClientResult<Self> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|e| ClientError::decode(format!("invalid base64 transaction: {e}")))?;
        Self::decode(&bytes)
    }
}
