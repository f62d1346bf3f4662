//! Requisitions: the in-memory description of one instruction before it is
//! compiled into a transaction.
//!
//! Account order is part of the contract with the on-chain program. The
//! builder preserves insertion order exactly and never sorts.

use crate::address::Address;
use crate::constants::PACKET_DATA_SIZE;
use crate::error::{ClientError, ClientResult};

/// Account permission flags. Bit 0 marks writable, bit 1 marks signer; the
/// numeric values are the network's account-metadata encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Permission {
    ReadOnly = 0,
    Writable = 1,
    Signer = 2,
    WritableSigner = 3,
}

impl Permission {
    pub fn from_bits(bits: u8) -> ClientResult<Self> {
        match bits {
            0 => Ok(Self::ReadOnly),
            1 => Ok(Self::Writable),
            2 => Ok(Self::Signer),
            3 => Ok(Self::WritableSigner),
            _ => Err(ClientError::requisition(format!(
                "permission bits out of range: {bits}"
            ))),
        }
    }

    pub const fn bits(self) -> u8 {
        self as u8
    }

    pub const fn is_writable(self) -> bool {
        self.bits() & 0b01 != 0
    }

    pub const fn is_signer(self) -> bool {
        self.bits() & 0b10 != 0
    }

    pub fn from_flags(signer: bool, writable: bool) -> Self {
        match (signer, writable) {
            (false, false) => Self::ReadOnly,
            (false, true) => Self::Writable,
            (true, false) => Self::Signer,
            (true, true) => Self::WritableSigner,
        }
    }

    /// Strongest combination of two permissions on the same account.
    pub fn merge(self, other: Self) -> Self {
        Self::from_flags(
            self.is_signer() || other.is_signer(),
            self.is_writable() || other.is_writable(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountReference {
    pub address: Address,
    pub permission: Permission,
}

impl AccountReference {
    pub fn new(address: Address, permission: Permission) -> Self {
        Self { address, permission }
    }
}

/// One instruction: target program, ordered account references, opaque
/// payload. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requisition {
    program: Address,
    accounts: Vec<AccountReference>,
    payload: Vec<u8>,
}

impl Requisition {
    pub fn builder() -> RequisitionBuilder {
        RequisitionBuilder::default()
    }

    pub fn program(&self) -> &Address {
        &self.program
    }

    pub fn accounts(&self) -> &[AccountReference] {
        &self.accounts
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Reassemble from already-validated parts (used by the decoder).
    pub(crate) fn from_parts(program: Address, accounts: Vec<AccountReference>, payload: Vec<u8>) -> Self {
        Self { program, accounts, payload }
    }
}

#[derive(Debug, Clone)]
pub struct RequisitionBuilder {
    program: Option<Address>,
    accounts: Vec<AccountReference>,
    payload: Vec<u8>,
    payload_limit: usize,
}

impl Default for RequisitionBuilder {
    fn default() -> Self {
        Self {
            program: None,
            accounts: Vec::new(),
            payload: Vec::new(),
            payload_limit: PACKET_DATA_SIZE,
        }
    }
}

impl RequisitionBuilder {
    pub fn with_program(mut self, program: Address) -> Self {
        self.program = Some(program);
        self
    }

    pub fn push_account(mut self, address: Address, permission: Permission) -> Self {
        self.accounts.push(AccountReference::new(address, permission));
        self
    }

    pub fn set_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Network per-transaction size ceiling; the payload alone may not
    /// exceed it.
    pub fn with_payload_limit(mut self, limit: usize) -> Self {
        self.payload_limit = limit;
        self
    }

    pub fn build(self) -> ClientResult<Requisition> {
        let program = self
            .program
            .ok_or_else(|| ClientError::configuration("requisition has no program id"))?;
        if self.accounts.is_empty() {
            return Err(ClientError::requisition("at least one account reference is required"));
        }
        if self.payload.len() > self.payload_limit {
            return Err(ClientError::requisition(format!(
                "payload of {} bytes exceeds the {} byte transaction ceiling",
                self.payload.len(),
                self.payload_limit
            )));
        }
        Ok(Requisition {
            program,
            accounts: self.accounts,
            payload: self.payload,
        })
    }
}
