//! Signing, submission and confirmation polling.
//!
//! Submission happens once; nothing here retries a send. Confirmation polls
//! at a fixed interval with both a poll budget and an overall deadline. A
//! deadline miss means the outcome is unknown, so callers should
//! [`TransactionSubmitter::requery`] by id instead of resubmitting. The same
//! holds for any RPC failure after the transaction left the client: it is
//! reported as [`ClientError::Unconfirmed`] carrying the id.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::address::{FreshnessToken, Signature, TransactionId};
use crate::config::{ConfirmPolicy, LimitsConfig};
use crate::error::{ClientError, ClientResult};
use crate::identity::Identity;
use crate::message::UnsignedTransaction;
use crate::rpc::{Commitment, RpcTransport, TransactionRecord};
use crate::transaction::SignedTransaction;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Succeeded,
    /// The program or runtime rejected the transaction after it landed.
    Failed { error: Value },
}

/// Final state of a landed transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub id: TransactionId,
    pub slot: u64,
    /// Program log lines, in execution order.
    pub logs: Vec<String>,
    pub status: ExecutionStatus,
}

impl Confirmation {
    fn from_record(id: TransactionId, record: TransactionRecord) -> Self {
        let status = match record.err {
            Some(error) => ExecutionStatus::Failed { error },
            None => ExecutionStatus::Succeeded,
        };
        Self { id, slot: record.slot, logs: record.logs, status }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }

    /// `Custom(n)` program error code, if the failure carried one.
    pub fn program_error_code(&self) -> Option<u32> {
        let ExecutionStatus::Failed { error } = &self.status else {
            return None;
        };
        // {"InstructionError": [index, {"Custom": n}]}
        error
            .get("InstructionError")?
            .get(1)?
            .get("Custom")?
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
    }
}

#[derive(Debug, Clone)]
pub struct TransactionSubmitter<T> {
    rpc: T,
    limits: LimitsConfig,
    commitment: Commitment,
}

impl<T: RpcTransport> TransactionSubmitter<T> {
    pub fn new(rpc: T, limits: LimitsConfig, commitment: Commitment) -> Self {
        Self { rpc, limits, commitment }
    }

    pub fn rpc(&self) -> &T {
        &self.rpc
    }

    /// Recent blockhash to bind a new transaction to.
    pub async fn fetch_freshness(&self) -> ClientResult<FreshnessToken> {
        let latest = self
            .rpc
            .get_latest_blockhash(self.commitment)
            .await
            .map_err(ClientError::Rpc)?;
        debug!(blockhash = %latest.blockhash, last_valid = latest.last_valid_block_height, "fetched blockhash");
        Ok(latest.blockhash)
    }

    pub fn sign(&self, unsigned: UnsignedTransaction, keys: &[&dyn Identity]) -> ClientResult<SignedTransaction> {
        SignedTransaction::sign(unsigned, keys)
    }

    pub async fn submit(&self, signed: &SignedTransaction) -> ClientResult<TransactionId> {
        let wire = signed.encode()?;
        if wire.len() > self.limits.max_transaction_bytes {
            return Err(ClientError::requisition(format!(
                "signed transaction is {} bytes, ceiling is {}",
                wire.len(),
                self.limits.max_transaction_bytes
            )));
        }

        let encoded = signed.to_base64()?;
        let id = match self.rpc.send_transaction(&encoded).await {
            Ok(id) => id,
            Err(err) if err.is_transport() => {
                // The request may have reached the node before the reply was lost.
                warn!(id = %signed.id(), error = %err, "send reply lost; outcome unknown");
                return Err(ClientError::Unconfirmed { id: signed.id(), source: err });
            }
            Err(err) => {
                warn!(id = %signed.id(), code = err.code, message = %err.message, "transaction rejected");
                return Err(ClientError::Submission(err));
            }
        };
        if id != signed.id() {
            warn!(expected = %signed.id(), returned = %id, "node returned a different transaction id");
        }
        info!(%id, bytes = wire.len(), "transaction submitted");
        Ok(id)
    }

    /// Poll until the transaction reaches `policy.target`, then fetch its logs.
    pub async fn confirm(&self, id: &TransactionId, policy: &ConfirmPolicy) -> ClientResult<Confirmation> {
        let started = Instant::now();
        match tokio::time::timeout(policy.timeout, self.poll(id, policy)).await {
            Ok(Ok(Some(confirmation))) => {
                info!(%id, slot = confirmation.slot, success = confirmation.is_success(), "transaction confirmed");
                Ok(confirmation)
            }
            Ok(Err(e)) => {
                warn!(%id, error = %e, "confirmation polling failed; outcome unknown");
                Err(e)
            }
            Ok(Ok(None)) | Err(_) => {
                let waited = started.elapsed();
                warn!(%id, ?waited, "confirmation deadline passed; outcome unknown");
                Err(ClientError::ConfirmationTimeout { id: *id, waited })
            }
        }
    }

    async fn poll(&self, id: &Signature, policy: &ConfirmPolicy) -> ClientResult<Option<Confirmation>> {
        let mut ticker = tokio::time::interval(policy.poll_interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for attempt in 1..=policy.max_polls {
            ticker.tick().await;
            let statuses = match self.rpc.get_signature_statuses(std::slice::from_ref(id)).await {
                Ok(statuses) => statuses,
                Err(e) if e.is_transport() => {
                    warn!(%id, attempt, error = %e, "status poll failed");
                    continue;
                }
                Err(e) => return Err(ClientError::Unconfirmed { id: *id, source: e }),
            };

            let status = statuses.into_iter().next().flatten();
            debug!(%id, attempt, status = ?status.as_ref().and_then(|s| s.confirmation_status), "polled status");
            if !status.is_some_and(|s| s.reached(policy.target)) {
                continue;
            }

            match self.rpc.get_transaction(id, policy.target).await {
                Ok(Some(record)) => return Ok(Some(Confirmation::from_record(*id, record))),
                Ok(None) => debug!(%id, "status final but transaction not yet queryable"),
                Err(e) if e.is_transport() => warn!(%id, error = %e, "transaction lookup failed"),
                Err(e) => return Err(ClientError::Unconfirmed { id: *id, source: e }),
            }
        }
        Ok(None)
    }

    /// One-shot lookup of a finalized transaction, for recovering after a
    /// confirmation timeout.
    pub async fn requery(&self, id: &TransactionId) -> ClientResult<Option<Confirmation>> {
        let record = self
            .rpc
            .get_transaction(id, Commitment::Finalized)
            .await
            .map_err(ClientError::Rpc)?;
        Ok(record.map(|r| Confirmation::from_record(*id, r)))
    }

    pub async fn send_and_confirm(
        &self,
        unsigned: UnsignedTransaction,
        keys: &[&dyn Identity],
        policy: &ConfirmPolicy,
    ) -> ClientResult<Confirmation> {
        let signed = self.sign(unsigned, keys)?;
        let id = self.submit(&signed).await?;
        self.confirm(&id, policy).await
    }
}
