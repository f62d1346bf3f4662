//! Network collaborator interface.
//!
//! The protocol core consumes a node through [`RpcTransport`]: account
//! queries, blockhash queries, submission and status polling. Responses are
//! surfaced as-is; node error payloads travel in [`RpcError`] untouched.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::{Address, FreshnessToken, Signature};

pub mod http;

pub use http::HttpRpc;

/// Ledger state the node answers from, weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    #[default]
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub lamports: u64,
    pub owner: Address,
    pub data: Vec<u8>,
    pub executable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: FreshnessToken,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmation_status: Option<Commitment>,
    /// Execution error as reported by the node, `None` on success.
    pub err: Option<Value>,
}

impl SignatureStatus {
    pub fn reached(&self, target: Commitment) -> bool {
        self.confirmation_status.is_some_and(|c| c >= target)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub slot: u64,
    pub logs: Vec<String>,
    pub err: Option<Value>,
}

/// JSON-RPC error object, kept verbatim. Transport failures (no response at
/// all) use code [`RpcError::TRANSPORT`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub const TRANSPORT: i64 = -1;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn transport(err: impl fmt::Display) -> Self {
        Self::new(Self::TRANSPORT, err.to_string())
    }

    pub fn is_transport(&self) -> bool {
        self.code == Self::TRANSPORT
    }

    /// The node did not recognize the transaction's recent blockhash.
    pub fn is_stale_blockhash(&self) -> bool {
        self.message.contains("Blockhash not found")
            || self
                .data
                .as_ref()
                .and_then(|d| d.get("err"))
                .is_some_and(|e| e == "BlockhashNotFound")
    }

    /// Program logs attached to a failed preflight simulation.
    pub fn simulation_logs(&self) -> Vec<String> {
        self.data
            .as_ref()
            .and_then(|d| d.get("logs"))
            .and_then(Value::as_array)
            .map(|logs| logs.iter().filter_map(|l| l.as_str().map(str::to_owned)).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)?;
        if let Some(data) = &self.data {
            write!(f, " {data}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

/// Node operations the protocol core depends on.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// `None` when the account does not exist.
    async fn get_account_info(
        &self,
        address: &Address,
        commitment: Commitment,
    ) -> Result<Option<AccountSnapshot>, RpcError>;

    async fn get_latest_blockhash(&self, commitment: Commitment) -> Result<LatestBlockhash, RpcError>;

    /// Submit a base64 encoded signed transaction.
    async fn send_transaction(&self, encoded: &str) -> Result<Signature, RpcError>;

    /// One entry per id, `None` for ids the node has not seen.
    async fn get_signature_statuses(
        &self,
        ids: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, RpcError>;

    /// `None` until the transaction is visible at `commitment`.
    async fn get_transaction(
        &self,
        id: &Signature,
        commitment: Commitment,
    ) -> Result<Option<TransactionRecord>, RpcError>;
}

#[async_trait]
impl<T: RpcTransport + ?Sized> RpcTransport for Arc<T> {
    async fn get_account_info(
        &self,
        address: &Address,
        commitment: Commitment,
    ) -> Result<Option<AccountSnapshot>, RpcError> {
        (**self).get_account_info(address, commitment).await
    }

    async fn get_latest_blockhash(&self, commitment: Commitment) -> Result<LatestBlockhash, RpcError> {
        (**self).get_latest_blockhash(commitment).await
    }

    async fn send_transaction(&self, encoded: &str) -> Result<Signature, RpcError> {
        (**self).send_transaction(encoded).await
    }

    async fn get_signature_statuses(
        &self,
        ids: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, RpcError> {
        (**self).get_signature_statuses(ids).await
    }

    async fn get_transaction(
        &self,
        id: &Signature,
        commitment: Commitment,
    ) -> Result<Option<TransactionRecord>, RpcError> {
        (**self).get_transaction(id, commitment).await
    }
}
