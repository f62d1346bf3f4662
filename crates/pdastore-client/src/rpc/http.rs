//! JSON-RPC 2.0 over HTTP implementation of [`RpcTransport`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{
    AccountSnapshot, Commitment, LatestBlockhash, RpcError, RpcTransport, SignatureStatus,
    TransactionRecord,
};
use crate::address::{Address, Signature};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a single node endpoint. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct HttpRpc {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
    min_interval: Option<Duration>,
    last_request: Mutex<Option<Instant>>,
}

impl HttpRpc {
    pub fn new(url: impl Into<String>, qps: Option<u32>, request_timeout: Duration) -> ClientResult<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ClientError::configuration("rpc url must not be empty"));
        }
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ClientError::configuration(format!("http client: {e}")))?;
        let min_interval = match qps {
            Some(0) => return Err(ClientError::configuration("qps must be greater than zero")),
            Some(q) => Some(Duration::from_secs(1) / q),
            None => None,
        };
        Ok(Self {
            url,
            http,
            next_id: AtomicU64::new(1),
            min_interval,
            last_request: Mutex::new(None),
        })
    }

    pub fn from_config(cfg: &ClientConfig) -> ClientResult<Self> {
        Self::new(cfg.rpc_url.clone(), cfg.qps, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn throttle(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            tokio::time::sleep_until(prev + interval).await;
        }
        *last = Some(Instant::now());
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        self.throttle().await;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        trace!(method, id, "rpc request");

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(RpcError::transport)?;
        let status = resp.status();
        let envelope: Envelope = resp.json().await.map_err(|e| {
            RpcError::transport(format!("{method}: http {status}: {e}"))
        })?;

        if let Some(err) = envelope.error {
            debug!(method, code = err.code, message = %err.message, "rpc error");
            return Err(err);
        }
        serde_json::from_value(envelope.result)
            .map_err(|e| RpcError::transport(format!("{method}: unexpected result shape: {e}")))
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiAccount {
    lamports: u64,
    owner: String,
    data: (String, String),
    executable: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiBlockhash {
    blockhash: String,
    last_valid_block_height: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiSignatureStatus {
    slot: u64,
    #[serde(default)]
    confirmation_status: Option<Commitment>,
    #[serde(default)]
    err: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiTransaction {
    slot: u64,
    #[serde(default)]
    meta: Option<UiMeta>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiMeta {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    log_messages: Option<Vec<String>>,
}

fn malformed(what: &str, e: impl std::fmt::Display) -> RpcError {
    RpcError::transport(format!("malformed {what} in response: {e}"))
}

fn decode_account(ui: UiAccount) -> Result<AccountSnapshot, RpcError> {
    let (encoded, encoding) = ui.data;
    if encoding != "base64" {
        return Err(malformed("account data encoding", encoding));
    }
    Ok(AccountSnapshot {
        lamports: ui.lamports,
        owner: ui.owner.parse().map_err(|e| malformed("owner", e))?,
        data: STANDARD.decode(encoded).map_err(|e| malformed("account data", e))?,
        executable: ui.executable,
    })
}

#[async_trait]
impl RpcTransport for HttpRpc {
    async fn get_account_info(
        &self,
        address: &Address,
        commitment: Commitment,
    ) -> Result<Option<AccountSnapshot>, RpcError> {
        let resp: WithContext<Option<UiAccount>> = self
            .call(
                "getAccountInfo",
                json!([address.to_string(), { "encoding": "base64", "commitment": commitment }]),
            )
            .await?;
        resp.value.map(decode_account).transpose()
    }

    async fn get_latest_blockhash(&self, commitment: Commitment) -> Result<LatestBlockhash, RpcError> {
        let resp: WithContext<UiBlockhash> = self
            .call("getLatestBlockhash", json!([{ "commitment": commitment }]))
            .await?;
        Ok(LatestBlockhash {
            blockhash: resp.value.blockhash.parse().map_err(|e| malformed("blockhash", e))?,
            last_valid_block_height: resp.value.last_valid_block_height,
        })
    }

    async fn send_transaction(&self, encoded: &str) -> Result<Signature, RpcError> {
        let id: String = self
            .call(
                "sendTransaction",
                json!([encoded, { "encoding": "base64", "preflightCommitment": Commitment::Confirmed }]),
            )
            .await?;
        id.parse().map_err(|e| malformed("signature", e))
    }

    async fn get_signature_statuses(
        &self,
        ids: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, RpcError> {
        let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let resp: WithContext<Vec<Option<UiSignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([ids, { "searchTransactionHistory": true }]),
            )
            .await?;
        Ok(resp
            .value
            .into_iter()
            .map(|s| {
                s.map(|s| SignatureStatus {
                    slot: s.slot,
                    confirmation_status: s.confirmation_status,
                    err: s.err.filter(|e| !e.is_null()),
                })
            })
            .collect())
    }

    async fn get_transaction(
        &self,
        id: &Signature,
        commitment: Commitment,
    ) -> Result<Option<TransactionRecord>, RpcError> {
        // The node refuses `processed` for this method.
        let commitment = commitment.max(Commitment::Confirmed);
        let resp: Option<UiTransaction> = self
            .call(
                "getTransaction",
                json!([id.to_string(), {
                    "encoding": "json",
                    "commitment": commitment,
                    "maxSupportedTransactionVersion": 0
                }]),
            )
            .await?;
        Ok(resp.map(|tx| {
            let meta = tx.meta.unwrap_or(UiMeta { err: None, log_messages: None });
            TransactionRecord {
                slot: tx.slot,
                logs: meta.log_messages.unwrap_or_default(),
                err: meta.err.filter(|e| !e.is_null()),
            }
        }))
    }
}
