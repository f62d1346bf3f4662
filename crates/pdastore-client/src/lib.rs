//! pdastore-client
//!
//! Client-side protocol layer for the PDA storage program: each user owns
//! one program derived data account holding an arbitrary byte payload.
//!
//! It includes:
//! - PDA derivation matching the network bit-for-bit
//! - requisition (instruction) assembly and canonical transaction encoding
//! - signing, submission and confirmation polling
//! - a storage client implementing write, read, update and resize
//!
//! Network access goes through the [`rpc::RpcTransport`] trait; [`HttpRpc`]
//! is the JSON-RPC implementation. Keys are supplied per call through
//! [`Identity`]; there is no default wallet.

pub mod address;
pub mod config;
pub mod constants;
pub mod error;
pub mod identity;
pub mod message;
pub mod pda;
pub mod rent;
pub mod requisition;
pub mod rpc;
pub mod storage;
pub mod submitter;
pub mod transaction;

pub use address::{Address, FreshnessToken, Signature, TransactionId};
pub use config::{validate_config, ClientConfig, ConfirmPolicy, LimitsConfig, Network};
pub use error::{ClientError, ClientResult};
pub use identity::{keypair_from_base58, Identity};
pub use message::{build_transaction, TransactionBuilder, UnsignedTransaction};
pub use pda::derive_storage_address;
pub use rent::{RentDirection, RentEcho, RentSchedule};
pub use requisition::{AccountReference, Permission, Requisition, RequisitionBuilder};
pub use rpc::{Commitment, HttpRpc, RpcError, RpcTransport};
pub use storage::{OperationReport, ReadOutcome, StorageClient};
pub use submitter::{Confirmation, ExecutionStatus, TransactionSubmitter};
pub use transaction::SignedTransaction;
