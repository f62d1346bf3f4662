//! Storage client: one PDA data account per user under the storage program.
//!
//! Every mutating operation runs the same pipeline: resolve the storage
//! address, look up the account, assemble the requisition, submit and confirm,
//! report. Reads stop after the lookup and never send a transaction.
//!
//! The program expects its accounts in this exact order:
//! 1. authority (writable, signer, pays rent)
//! 2. storage account (writable)
//! 3. system program
//! 4. rent sysvar
//!
//! The instruction payload is the complete new content of the account. The
//! program resizes the account to the payload length and settles the
//! rent-exempt balance with the authority in the same transaction.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::address::{Address, TransactionId};
use crate::config::{validate_config, ClientConfig};
use crate::constants::{SYSTEM_PROGRAM_ID, SYSVAR_RENT_ID};
use crate::error::{ClientError, ClientResult};
use crate::identity::Identity;
use crate::message::build_transaction;
use crate::pda::derive_storage_address;
use crate::rent::RentEcho;
use crate::requisition::{Permission, Requisition};
use crate::rpc::{AccountSnapshot, RpcTransport};
use crate::submitter::{ExecutionStatus, TransactionSubmitter};

/// Result of a read. A never-written account is `Absent`; an account shrunk
/// to zero bytes still exists and reads as `Found(vec![])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Found(Vec<u8>),
    Absent,
}

impl ReadOutcome {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Found(bytes) => Some(bytes),
            Self::Absent => None,
        }
    }
}

/// Outcome of a write, update or resize.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationReport {
    pub address: Address,
    pub transaction_id: TransactionId,
    pub logs: Vec<String>,
    pub status: ExecutionStatus,
    /// Predicted rent movement; the program is authoritative.
    pub rent: RentEcho,
}

impl OperationReport {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }
}

#[derive(Debug, Clone)]
pub struct StorageClient<T> {
    config: ClientConfig,
    submitter: TransactionSubmitter<T>,
}

impl<T: RpcTransport> StorageClient<T> {
    pub fn new(config: ClientConfig, rpc: T) -> ClientResult<Self> {
        validate_config(&config)?;
        let submitter = TransactionSubmitter::new(rpc, config.limits, config.commitment);
        Ok(Self { config, submitter })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn submitter(&self) -> &TransactionSubmitter<T> {
        &self.submitter
    }

    /// The user's storage account address.
    pub fn storage_address(&self, user: &Address) -> ClientResult<Address> {
        derive_storage_address(&self.config.program_id, user).map(|(address, _bump)| address)
    }

    /// Current content of `user`'s storage account.
    pub async fn read(&self, user: &Address) -> ClientResult<ReadOutcome> {
        let address = self.storage_address(user)?;
        Ok(match self.lookup(&address).await? {
            Some(account) => ReadOutcome::Found(account.data),
            None => ReadOutcome::Absent,
        })
    }

    /// Create the account with `payload`, or overwrite it if it exists.
    pub async fn write(&self, authority: &dyn Identity, payload: &[u8]) -> ClientResult<OperationReport> {
        let address = self.storage_address(&authority.public())?;
        let before = self.lookup(&address).await?.map(|a| a.data.len());
        if before.is_none() {
            debug!(%address, "storage account absent; write will create it");
        }
        self.commit(authority, address, before, payload.to_vec()).await
    }

    /// Replace the content of an existing account.
    pub async fn update(&self, authority: &dyn Identity, payload: &[u8]) -> ClientResult<OperationReport> {
        let address = self.storage_address(&authority.public())?;
        let existing = self.require(&address).await?;
        self.commit(authority, address, Some(existing.data.len()), payload.to_vec())
            .await
    }

    /// Resize an existing account to `new_len`, truncating or zero-extending
    /// its content. Resizing to zero is deletion; the rent is refunded.
    pub async fn resize(&self, authority: &dyn Identity, new_len: usize) -> ClientResult<OperationReport> {
        let address = self.storage_address(&authority.public())?;
        let mut data = self.require(&address).await?.data;
        let before = data.len();
        data.resize(new_len, 0);
        self.commit(authority, address, Some(before), data).await
    }

    /// The storage program's single instruction for `authority`.
    pub fn storage_requisition(
        &self,
        authority: &Address,
        storage: &Address,
        payload: Vec<u8>,
    ) -> ClientResult<Requisition> {
        Requisition::builder()
            .with_program(self.config.program_id)
            .push_account(*authority, Permission::WritableSigner)
            .push_account(*storage, Permission::Writable)
            .push_account(SYSTEM_PROGRAM_ID, Permission::ReadOnly)
            .push_account(SYSVAR_RENT_ID, Permission::ReadOnly)
            .set_payload(payload)
            .with_payload_limit(self.config.limits.max_transaction_bytes)
            .build()
    }

    async fn lookup(&self, address: &Address) -> ClientResult<Option<AccountSnapshot>> {
        let account = self
            .submitter
            .rpc()
            .get_account_info(address, self.config.commitment)
            .await
            .map_err(ClientError::Rpc)?;
        if let Some(a) = &account {
            if a.owner != self.config.program_id {
                warn!(%address, owner = %a.owner, "storage account is not owned by the storage program");
            }
        }
        debug!(%address, exists = account.is_some(), "looked up storage account");
        Ok(account)
    }

    async fn require(&self, address: &Address) -> ClientResult<AccountSnapshot> {
        self.lookup(address)
            .await?
            .ok_or(ClientError::AccountNotFound { address: *address })
    }

    async fn commit(
        &self,
        authority: &dyn Identity,
        address: Address,
        before: Option<usize>,
        payload: Vec<u8>,
    ) -> ClientResult<OperationReport> {
        let payer = authority.public();
        let rent = self.config.rent.echo(before, payload.len());
        let requisition = self.storage_requisition(&payer, &address, payload)?;

        let freshness = self.submitter.fetch_freshness().await?;
        let unsigned = build_transaction(&payer, freshness, std::slice::from_ref(&requisition))?;
        let confirmation = self
            .submitter
            .send_and_confirm(unsigned, &[authority], &self.config.confirm)
            .await?;

        info!(
            %address,
            id = %confirmation.id,
            before = ?before,
            after = rent.size_after,
            rent_delta = rent.expected_delta as i64,
            success = confirmation.is_success(),
            "storage write confirmed"
        );

        Ok(OperationReport {
            address,
            transaction_id: confirmation.id,
            logs: confirmation.logs,
            status: confirmation.status,
            rent,
        })
    }
}
