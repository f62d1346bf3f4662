//! Error taxonomy for the storage client.
//!
//! Local validation failures (configuration, requisition shape, missing
//! signer) are raised before any network call. Network-facing failures carry
//! the node's error payload verbatim in an [`RpcError`].

use std::time::Duration;

use thiserror::Error;

use crate::address::{Address, Signature};
use crate::rpc::RpcError;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or malformed identity, program id, or client setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No off-curve address exists for the seeds; fatal.
    #[error("no program derived address found for program {program}")]
    Derivation { program: Address },

    /// The storage account has never been created.
    #[error("storage account {address} does not exist")]
    AccountNotFound { address: Address },

    /// A required signer's key was not supplied to `sign`.
    #[error("missing signature for required signer {address}")]
    MissingSigner { address: Address },

    /// The node rejected the transaction.
    #[error("transaction rejected: {0}")]
    Submission(RpcError),

    /// No finalized status observed before the deadline. The outcome is
    /// unknown: re-query by id rather than resubmitting.
    #[error("transaction {id} not confirmed after {waited:?}")]
    ConfirmationTimeout { id: Signature, waited: Duration },

    /// The transaction was handed to the node but its fate could not be
    /// observed. Re-query by id rather than resubmitting.
    #[error("transaction {id} outcome unknown: {source}")]
    Unconfirmed { id: Signature, source: RpcError },

    /// A requisition or transaction failed local shape checks.
    #[error("invalid requisition: {0}")]
    Requisition(String),

    /// Query failure (account lookup, blockhash, requery).
    #[error("rpc error: {0}")]
    Rpc(RpcError),

    /// Wire bytes could not be encoded or decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn requisition(msg: impl Into<String>) -> Self {
        Self::Requisition(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// True when the node rejected the transaction because its recent
    /// blockhash expired. Retrying with a fresh blockhash is safe in that case.
    pub fn is_stale_blockhash(&self) -> bool {
        match self {
            Self::Submission(err) => err.is_stale_blockhash(),
            _ => false,
        }
    }

    /// True when the outcome of an already-sent transaction is unknown.
    pub fn is_outcome_unknown(&self) -> bool {
        matches!(self, Self::ConfirmationTimeout { .. } | Self::Unconfirmed { .. })
    }

    /// Id of the transaction whose outcome is unknown, for `requery`.
    pub fn transaction_id(&self) -> Option<Signature> {
        match self {
            Self::ConfirmationTimeout { id, .. } | Self::Unconfirmed { id, .. } => Some(*id),
            _ => None,
        }
    }
}
