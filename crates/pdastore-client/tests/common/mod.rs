//! In-memory ledger implementing `RpcTransport`.
//!
//! It verifies signatures, issues a new blockhash per landed transaction
//! while the last [`BLOCKHASH_WINDOW`] stay valid, rejects unknown or
//! expired blockhashes and duplicate submissions, charges fees, and executes the storage program the
//! way the deployed program does: create on first write, then settle the
//! rent-exempt balance with the authority and realloc to the payload length.
//! Failed executions are rejected at "preflight" with the node's error shape
//! and leave state untouched.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use pdastore_client::constants::SYSTEM_PROGRAM_ID;
use pdastore_client::rpc::{
    AccountSnapshot, Commitment, LatestBlockhash, RpcError, RpcTransport, SignatureStatus,
    TransactionRecord,
};
use pdastore_client::{
    derive_storage_address, Address, FreshnessToken, RentSchedule, Signature, SignedTransaction,
};

pub const FEE_PER_SIGNATURE: u64 = 5_000;
pub const MAX_PERMITTED_DATA_INCREASE: usize = 10_240;
/// Recent blockhashes accepted, newest last.
pub const BLOCKHASH_WINDOW: usize = 150;

#[derive(Debug, Clone)]
pub struct LedgerAccount {
    pub lamports: u64,
    pub owner: Address,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
struct Landed {
    slot: u64,
    logs: Vec<String>,
    err: Option<Value>,
    polls_until_final: u32,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<Address, LedgerAccount>,
    recent_blockhashes: VecDeque<FreshnessToken>,
    blockhash_counter: u64,
    slot: u64,
    landed: HashMap<Signature, Landed>,
    hold_finality: bool,
    submissions: usize,
}

pub struct LocalLedger {
    program_id: Address,
    rent: RentSchedule,
    /// Status polls a landed transaction stays `confirmed` before finalizing.
    finality_polls: u32,
    state: Mutex<State>,
}

impl LocalLedger {
    pub fn new(program_id: Address, rent: RentSchedule) -> Self {
        let ledger = Self {
            program_id,
            rent,
            finality_polls: 2,
            state: Mutex::new(State::default()),
        };
        next_blockhash(&mut ledger.state.lock().unwrap());
        ledger
    }

    pub fn rent(&self) -> RentSchedule {
        self.rent
    }

    pub fn airdrop(&self, to: &Address, lamports: u64) {
        let mut st = self.state.lock().unwrap();
        st.accounts
            .entry(*to)
            .or_insert_with(|| LedgerAccount { lamports: 0, owner: SYSTEM_PROGRAM_ID, data: vec![] })
            .lamports += lamports;
    }

    pub fn balance(&self, address: &Address) -> u64 {
        self.account(address).map_or(0, |a| a.lamports)
    }

    pub fn account(&self, address: &Address) -> Option<LedgerAccount> {
        self.state.lock().unwrap().accounts.get(address).cloned()
    }

    pub fn submissions(&self) -> usize {
        self.state.lock().unwrap().submissions
    }

    /// Issue a new blockhash and expire every earlier one.
    pub fn expire_blockhashes(&self) -> FreshnessToken {
        let mut st = self.state.lock().unwrap();
        st.recent_blockhashes.clear();
        next_blockhash(&mut st)
    }

    /// Landed transactions stay `confirmed` until released.
    pub fn hold_finality(&self) {
        self.state.lock().unwrap().hold_finality = true;
    }

    pub fn release_finality(&self) {
        let mut st = self.state.lock().unwrap();
        st.hold_finality = false;
        for landed in st.landed.values_mut() {
            landed.polls_until_final = 0;
        }
    }

    fn is_final(st: &State, landed: &Landed) -> bool {
        !st.hold_finality && landed.polls_until_final == 0
    }

    fn simulation_failure(message: &str, err: Value, logs: Vec<String>) -> RpcError {
        RpcError::new(-32002, format!("Transaction simulation failed: {message}"))
            .with_data(json!({ "err": err, "logs": logs, "accounts": null, "unitsConsumed": 0 }))
    }

    fn execute_storage(
        &self,
        accounts: &mut HashMap<Address, LedgerAccount>,
        tx: &SignedTransaction,
        ix_index: usize,
        logs: &mut Vec<String>,
    ) -> Result<(), Value> {
        let message = tx.message();
        let ix = &message.instructions()[ix_index];
        let fail = |e: Value| json!({ "InstructionError": [ix_index, e] });

        if ix.account_indices.len() < 4 {
            return Err(fail(json!("NotEnoughAccountKeys")));
        }
        let user_idx = ix.account_indices[0] as usize;
        let data_idx = ix.account_indices[1] as usize;
        let user = message.account_keys()[user_idx];
        let data_key = message.account_keys()[data_idx];
        if !message.permission_of(user_idx).is_signer() {
            return Err(fail(json!("MissingRequiredSignature")));
        }
        if !message.permission_of(data_idx).is_writable() {
            return Err(fail(json!("ReadonlyDataModified")));
        }
        let (expected, _) = derive_storage_address(&self.program_id, &user).map_err(|_| fail(json!("InvalidSeeds")))?;
        if expected != data_key {
            return Err(fail(json!("InvalidSeeds")));
        }

        let payload = &ix.payload;
        let minimum = self.rent.minimum_balance(payload.len());
        let user_lamports = accounts.get(&user).map_or(0, |a| a.lamports);
        let existing = accounts.get(&data_key).filter(|a| a.lamports > 0).cloned();

        match existing {
            None => {
                logs.push(format!("Program {SYSTEM_PROGRAM_ID} invoke [2]"));
                if user_lamports < minimum {
                    logs.push(format!(
                        "Transfer: insufficient lamports {user_lamports}, need {minimum}"
                    ));
                    logs.push(format!("Program {SYSTEM_PROGRAM_ID} failed: custom program error: 0x1"));
                    return Err(fail(json!({ "Custom": 1 })));
                }
                logs.push(format!("Program {SYSTEM_PROGRAM_ID} success"));
                if let Some(a) = accounts.get_mut(&user) {
                    a.lamports -= minimum;
                }
                accounts.insert(
                    data_key,
                    LedgerAccount { lamports: minimum, owner: self.program_id, data: payload.clone() },
                );
            }
            Some(mut data) => {
                if payload.len() > data.data.len() + MAX_PERMITTED_DATA_INCREASE {
                    return Err(fail(json!("InvalidRealloc")));
                }
                if minimum > data.lamports {
                    let need = minimum - data.lamports;
                    logs.push(format!("Program {SYSTEM_PROGRAM_ID} invoke [2]"));
                    if user_lamports < need {
                        logs.push(format!("Transfer: insufficient lamports {user_lamports}, need {need}"));
                        logs.push(format!("Program {SYSTEM_PROGRAM_ID} failed: custom program error: 0x1"));
                        return Err(fail(json!({ "Custom": 1 })));
                    }
                    logs.push(format!("Program {SYSTEM_PROGRAM_ID} success"));
                    if let Some(a) = accounts.get_mut(&user) {
                        a.lamports -= need;
                    }
                    data.lamports = minimum;
                } else if minimum < data.lamports {
                    let refund = data.lamports - minimum;
                    if let Some(a) = accounts.get_mut(&user) {
                        a.lamports += refund;
                    }
                    data.lamports = minimum;
                }
                data.data = payload.clone();
                accounts.insert(data_key, data);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RpcTransport for LocalLedger {
    async fn get_account_info(
        &self,
        address: &Address,
        _commitment: Commitment,
    ) -> Result<Option<AccountSnapshot>, RpcError> {
        let st = self.state.lock().unwrap();
        Ok(st.accounts.get(address).filter(|a| a.lamports > 0).map(|a| AccountSnapshot {
            lamports: a.lamports,
            owner: a.owner,
            data: a.data.clone(),
            executable: false,
        }))
    }

    async fn get_latest_blockhash(&self, _commitment: Commitment) -> Result<LatestBlockhash, RpcError> {
        let st = self.state.lock().unwrap();
        let blockhash = st.recent_blockhashes.back().copied().unwrap_or_default();
        Ok(LatestBlockhash { blockhash, last_valid_block_height: st.slot + BLOCKHASH_WINDOW as u64 })
    }

    async fn send_transaction(&self, encoded: &str) -> Result<Signature, RpcError> {
        let tx = SignedTransaction::from_base64(encoded)
            .map_err(|e| RpcError::new(-32602, format!("invalid transaction: {e}")))?;
        let mut st = self.state.lock().unwrap();
        st.submissions += 1;

        if !tx.invalid_signers().is_empty() {
            return Err(RpcError::new(-32003, "Transaction signature verification failure"));
        }
        if !st.recent_blockhashes.contains(&tx.message().freshness()) {
            return Err(Self::simulation_failure("Blockhash not found", json!("BlockhashNotFound"), vec![]));
        }
        let id = tx.id();
        if st.landed.contains_key(&id) {
            return Err(Self::simulation_failure(
                "This transaction has already been processed",
                json!("AlreadyProcessed"),
                vec![],
            ));
        }

        let payer = *tx.message().payer();
        let fee = FEE_PER_SIGNATURE * tx.signatures().len() as u64;
        match st.accounts.get(&payer) {
            None => {
                return Err(Self::simulation_failure(
                    "Attempt to debit an account but found no record of a prior credit.",
                    json!("AccountNotFound"),
                    vec![],
                ))
            }
            Some(a) if a.lamports < fee => {
                return Err(Self::simulation_failure(
                    "Insufficient funds for fee",
                    json!("InsufficientFundsForFee"),
                    vec![],
                ))
            }
            Some(_) => {}
        }

        let mut accounts = st.accounts.clone();
        if let Some(a) = accounts.get_mut(&payer) {
            a.lamports -= fee;
        }
        let mut logs = Vec::new();
        for (i, ix) in tx.message().instructions().iter().enumerate() {
            let program = tx.message().account_keys()[ix.program_index as usize];
            logs.push(format!("Program {program} invoke [1]"));
            if program != self.program_id {
                return Err(Self::simulation_failure(
                    &format!("Error processing Instruction {i}: incorrect program id for instruction"),
                    json!({ "InstructionError": [i, "IncorrectProgramId"] }),
                    logs,
                ));
            }
            if let Err(err) = self.execute_storage(&mut accounts, &tx, i, &mut logs) {
                logs.push(format!("Program {program} failed"));
                return Err(Self::simulation_failure(
                    &format!("Error processing Instruction {i}"),
                    err,
                    logs,
                ));
            }
            logs.push(format!("Program {program} consumed 1783 of 200000 compute units"));
            logs.push(format!("Program {program} success"));
        }

        st.accounts = accounts;
        st.slot += 1;
        next_blockhash(&mut st);
        let slot = st.slot;
        let polls_until_final = self.finality_polls;
        st.landed.insert(id, Landed { slot, logs, err: None, polls_until_final });
        Ok(id)
    }

    async fn get_signature_statuses(
        &self,
        ids: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, RpcError> {
        let mut st = self.state.lock().unwrap();
        let hold = st.hold_finality;
        Ok(ids
            .iter()
            .map(|id| {
                st.landed.get_mut(id).map(|landed| {
                    let finalized = !hold && landed.polls_until_final == 0;
                    if !hold && landed.polls_until_final > 0 {
                        landed.polls_until_final -= 1;
                    }
                    SignatureStatus {
                        slot: landed.slot,
                        confirmation_status: Some(if finalized {
                            Commitment::Finalized
                        } else {
                            Commitment::Confirmed
                        }),
                        err: landed.err.clone(),
                    }
                })
            })
            .collect())
    }

    async fn get_transaction(
        &self,
        id: &Signature,
        commitment: Commitment,
    ) -> Result<Option<TransactionRecord>, RpcError> {
        let st = self.state.lock().unwrap();
        Ok(st.landed.get(id).and_then(|landed| {
            let visible = commitment < Commitment::Finalized || Self::is_final(&st, landed);
            visible.then(|| TransactionRecord {
                slot: landed.slot,
                logs: landed.logs.clone(),
                err: landed.err.clone(),
            })
        }))
    }
}

fn next_blockhash(st: &mut State) -> FreshnessToken {
    st.blockhash_counter += 1;
    let digest: [u8; 32] = Sha256::digest(st.blockhash_counter.to_le_bytes()).into();
    let hash = FreshnessToken::new(digest);
    st.recent_blockhashes.push_back(hash);
    if st.recent_blockhashes.len() > BLOCKHASH_WINDOW {
        st.recent_blockhashes.pop_front();
    }
    hash
}

/// Wraps a ledger and fails chosen calls the way a congested node does.
pub struct Flaky {
    pub inner: Arc<LocalLedger>,
    /// Status polls are rate limited.
    pub status_outage: bool,
    /// The transaction reaches the ledger but the reply is lost.
    pub lose_send_reply: bool,
}

impl Flaky {
    pub fn new(inner: Arc<LocalLedger>) -> Self {
        Self { inner, status_outage: false, lose_send_reply: false }
    }
}

#[async_trait]
impl RpcTransport for Flaky {
    async fn get_account_info(
        &self,
        address: &Address,
        commitment: Commitment,
    ) -> Result<Option<AccountSnapshot>, RpcError> {
        self.inner.get_account_info(address, commitment).await
    }

    async fn get_latest_blockhash(&self, commitment: Commitment) -> Result<LatestBlockhash, RpcError> {
        self.inner.get_latest_blockhash(commitment).await
    }

    async fn send_transaction(&self, encoded: &str) -> Result<Signature, RpcError> {
        let id = self.inner.send_transaction(encoded).await?;
        if self.lose_send_reply {
            return Err(RpcError::transport("connection reset by peer"));
        }
        Ok(id)
    }

    async fn get_signature_statuses(
        &self,
        ids: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, RpcError> {
        if self.status_outage {
            return Err(RpcError::new(429, "Too many requests for a specific RPC call"));
        }
        self.inner.get_signature_statuses(ids).await
    }

    async fn get_transaction(
        &self,
        id: &Signature,
        commitment: Commitment,
    ) -> Result<Option<TransactionRecord>, RpcError> {
        self.inner.get_transaction(id, commitment).await
    }
}

/// Storage program id used by the integration tests.
pub fn program_id() -> Address {
    Address::new([42u8; 32])
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
