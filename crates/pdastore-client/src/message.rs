//! Transaction assembly: compiles requisitions into the canonical unsigned
//! body (legacy message format) that signers sign over.
//!
//! The bytes are the network's legacy message, produced and parsed through
//! `solana_sdk::message::legacy::Message`:
//! - header: required signatures, read-only signed, read-only unsigned (u8 each)
//! - compact-u16 list of 32-byte account addresses
//! - 32-byte freshness token (recent blockhash)
//! - compact-u16 list of instructions: program index, account indices,
//!   payload bytes
//!
//! The account table is deduplicated and ordered: writable signers, read-only
//! signers, writable non-signers, read-only non-signers. The fee payer is
//! always entry 0. Within a group, first-occurrence order is kept.

use std::cmp::Reverse;

use bincode::Options as _;
use serde::de::DeserializeOwned;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::CompiledInstruction;
use solana_sdk::message::{legacy, MessageHeader as WireHeader};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::sanitize::Sanitize as _;
use tracing::debug;

use crate::address::{Address, FreshnessToken};
use crate::error::{ClientError, ClientResult};
use crate::requisition::{AccountReference, Permission, Requisition};

/// Account indices are single bytes on the wire.
pub const MAX_ACCOUNT_TABLE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
}

/// One requisition as indices into the account table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRequisition {
    pub program_index: u8,
    pub account_indices: Vec<u8>,
    pub payload: Vec<u8>,
}

/// Canonical unsigned transaction body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    header: MessageHeader,
    accounts: Vec<Address>,
    freshness: FreshnessToken,
    instructions: Vec<CompiledRequisition>,
}

#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    payer: Address,
    freshness: FreshnessToken,
    requisitions: Vec<Requisition>,
}

impl TransactionBuilder {
    pub fn new(payer: Address, freshness: FreshnessToken) -> Self {
        Self { payer, freshness, requisitions: Vec::new() }
    }

    /// Requisitions execute in push order.
    pub fn push(mut self, requisition: Requisition) -> Self {
        self.requisitions.push(requisition);
        self
    }

    pub fn extend(mut self, requisitions: impl IntoIterator<Item = Requisition>) -> Self {
        self.requisitions.extend(requisitions);
        self
    }

    pub fn build(self) -> ClientResult<UnsignedTransaction> {
        build_transaction(&self.payer, self.freshness, &self.requisitions)
    }
}

/// Compile `requisitions` for `payer`. Order of requisitions is preserved.
pub fn build_transaction(
    payer: &Address,
    freshness: FreshnessToken,
    requisitions: &[Requisition],
) -> ClientResult<UnsignedTransaction> {
    if requisitions.is_empty() {
        return Err(ClientError::requisition("transaction needs at least one requisition"));
    }

    let mut table: Vec<AccountReference> = vec![AccountReference::new(*payer, Permission::WritableSigner)];
    let mut note = |r: AccountReference| match table.iter_mut().find(|e| e.address == r.address) {
        Some(existing) => existing.permission = existing.permission.merge(r.permission),
        None => table.push(r),
    };
    for rq in requisitions {
        note(AccountReference::new(*rq.program(), Permission::ReadOnly));
        for r in rq.accounts() {
            note(*r);
        }
    }

    // Stable: first-occurrence order survives inside each permission group.
    table.sort_by_key(|e| Reverse(e.permission.bits()));

    if table.len() > MAX_ACCOUNT_TABLE {
        return Err(ClientError::requisition(format!(
            "{} distinct accounts exceed the {MAX_ACCOUNT_TABLE} entry table",
            table.len()
        )));
    }
    if let Some(extra) = table
        .iter()
        .skip(1)
        .find(|e| e.permission == Permission::WritableSigner)
    {
        return Err(ClientError::requisition(format!(
            "{} is writable+signer; only the fee payer may be",
            extra.address
        )));
    }

    let count = |what: &str, n: usize| {
        u8::try_from(n).map_err(|_| {
            ClientError::requisition(format!("{n} {what} accounts exceed the header limit of {}", u8::MAX))
        })
    };
    let header = MessageHeader {
        num_required_signatures: count("signer", table.iter().filter(|e| e.permission.is_signer()).count())?,
        num_readonly_signed: count(
            "read-only signer",
            table.iter().filter(|e| e.permission == Permission::Signer).count(),
        )?,
        num_readonly_unsigned: count(
            "read-only",
            table.iter().filter(|e| e.permission == Permission::ReadOnly).count(),
        )?,
    };

    let accounts: Vec<Address> = table.iter().map(|e| e.address).collect();
    let index_of = |address: &Address| -> u8 {
        // Every address was inserted above and the table fits in a byte.
        accounts.iter().position(|a| a == address).unwrap_or_default() as u8
    };

    let instructions = requisitions
        .iter()
        .map(|rq| CompiledRequisition {
            program_index: index_of(rq.program()),
            account_indices: rq.accounts().iter().map(|r| index_of(&r.address)).collect(),
            payload: rq.payload().to_vec(),
        })
        .collect();

    debug!(
        payer = %payer,
        accounts = accounts.len(),
        requisitions = requisitions.len(),
        signers = header.num_required_signatures,
        "assembled transaction"
    );

    Ok(UnsignedTransaction { header, accounts, freshness, instructions })
}

impl UnsignedTransaction {
    pub fn header(&self) -> MessageHeader {
        self.header
    }

    pub fn account_keys(&self) -> &[Address] {
        &self.accounts
    }

    pub fn freshness(&self) -> FreshnessToken {
        self.freshness
    }

    pub fn instructions(&self) -> &[CompiledRequisition] {
        &self.instructions
    }

    pub fn payer(&self) -> &Address {
        &self.accounts[0]
    }

    /// Accounts that must sign, in signature order.
    pub fn required_signers(&self) -> &[Address] {
        &self.accounts[..self.header.num_required_signatures as usize]
    }

    /// Permission of the table entry at `index`, as implied by the header.
    pub fn permission_of(&self, index: usize) -> Permission {
        let h = &self.header;
        let signers = h.num_required_signatures as usize;
        if index < signers {
            Permission::from_flags(true, index < signers - h.num_readonly_signed as usize)
        } else {
            Permission::from_flags(false, index < self.accounts.len() - h.num_readonly_unsigned as usize)
        }
    }

    /// Rebuild the requisitions. Account permissions are the table's merged
    /// permissions, so an address referenced with different flags comes back
    /// with the strongest of them.
    pub fn requisitions(&self) -> Vec<Requisition> {
        self.instructions
            .iter()
            .map(|ix| {
                let accounts = ix
                    .account_indices
                    .iter()
                    .map(|&i| AccountReference::new(self.accounts[i as usize], self.permission_of(i as usize)))
                    .collect();
                Requisition::from_parts(self.accounts[ix.program_index as usize], accounts, ix.payload.clone())
            })
            .collect()
    }

    /// Canonical bytes signed by every required signer.
    pub fn encode(&self) -> Vec<u8> {
        self.to_wire().serialize()
    }

    /// Parse message bytes. Trailing bytes and headers or indices that do
    /// not fit the account table are rejected.
    pub fn decode(bytes: &[u8]) -> ClientResult<Self> {
        Self::from_wire(wire_deserialize(bytes, "message")?)
    }

    pub(crate) fn to_wire(&self) -> legacy::Message {
        legacy::Message {
            header: WireHeader {
                num_required_signatures: self.header.num_required_signatures,
                num_readonly_signed_accounts: self.header.num_readonly_signed,
                num_readonly_unsigned_accounts: self.header.num_readonly_unsigned,
            },
            account_keys: self
                .accounts
                .iter()
                .map(|a| Pubkey::new_from_array(a.to_bytes()))
                .collect(),
            recent_blockhash: Hash::new_from_array(self.freshness.to_bytes()),
            instructions: self
                .instructions
                .iter()
                .map(|ix| CompiledInstruction {
                    program_id_index: ix.program_index,
                    accounts: ix.account_indices.clone(),
                    data: ix.payload.clone(),
                })
                .collect(),
        }
    }

    pub(crate) fn from_wire(message: legacy::Message) -> ClientResult<Self> {
        message
            .sanitize()
            .map_err(|e| ClientError::decode(format!("inconsistent message: {e}")))?;
        let header = MessageHeader {
            num_required_signatures: message.header.num_required_signatures,
            num_readonly_signed: message.header.num_readonly_signed_accounts,
            num_readonly_unsigned: message.header.num_readonly_unsigned_accounts,
        };
        let accounts = message
            .account_keys
            .iter()
            .map(|k| Address::new(k.to_bytes()))
            .collect();
        let instructions = message
            .instructions
            .into_iter()
            .map(|ix| CompiledRequisition {
                program_index: ix.program_id_index,
                account_indices: ix.accounts,
                payload: ix.data,
            })
            .collect();
        Ok(Self {
            header,
            accounts,
            freshness: FreshnessToken::new(message.recent_blockhash.to_bytes()),
            instructions,
        })
    }
}

/// Strict bincode reading for wire bytes: fixed-width integers, no
/// trailing bytes.
pub(crate) fn wire_deserialize<T: DeserializeOwned>(bytes: &[u8], what: &str) -> ClientResult<T> {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
        .deserialize(bytes)
        .map_err(|e| ClientError::decode(format!("malformed {what}: {e}")))
}
