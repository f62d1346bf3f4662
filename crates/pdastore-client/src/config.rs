//! Configuration for the storage client.
//!
//! Configuration is an explicit value passed to constructors. The crate does
//! not read environment variables or keep process-wide settings, so several
//! clients against different clusters can live in one process.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::constants::{default_program_id, endpoints, PACKET_DATA_SIZE};
use crate::error::{ClientError, ClientResult};
use crate::rent::RentSchedule;
use crate::rpc::Commitment;

/// Smallest signed transaction the storage program can receive: one
/// signature, header, five accounts, blockhash, one empty instruction.
pub const MIN_TRANSACTION_BYTES: usize = 1 + 64 + 3 + 1 + 5 * 32 + 32 + 1 + 1 + 1 + 4 + 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub rpc_url: String,
    pub program_id: Address,
    /// Commitment used for account lookups and blockhash queries.
    pub commitment: Commitment,
    pub confirm: ConfirmPolicy,
    pub limits: LimitsConfig,
    pub rent: RentSchedule,
    /// Request budget for the endpoint; `None` disables throttling.
    pub qps: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::for_network(Network::Localhost)
    }
}

impl ClientConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            rpc_url: network.rpc_url().to_string(),
            program_id: default_program_id(),
            commitment: Commitment::Confirmed,
            confirm: ConfirmPolicy::default(),
            limits: LimitsConfig::default(),
            rent: RentSchedule::default(),
            qps: network.default_qps(),
        }
    }

    pub fn with_program_id(mut self, program_id: Address) -> Self {
        self.program_id = program_id;
        self
    }

    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = url.into();
        self
    }

    pub fn from_json(s: &str) -> ClientResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| ClientError::configuration(format!("invalid client config: {e}")))?;
        validate_config(&cfg)?;
        Ok(cfg)
    }
}

/// How long and how often to poll for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmPolicy {
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub target: Commitment,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            max_polls: 120,
            target: Commitment::Finalized,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Network per-transaction size ceiling for the signed wire form.
    pub max_transaction_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { max_transaction_bytes: PACKET_DATA_SIZE }
    }
}

/// Known clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Localhost,
    Devnet,
    Mainnet,
}

impl Network {
    pub fn rpc_url(&self) -> &'static str {
        match self {
            Self::Localhost => endpoints::LOCALHOST,
            Self::Devnet => endpoints::DEVNET,
            Self::Mainnet => endpoints::MAINNET,
        }
    }

    pub fn default_qps(&self) -> Option<u32> {
        match self {
            Self::Mainnet => Some(endpoints::MAINNET_QPS),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Localhost => "localhost",
            Self::Devnet => "devnet",
            Self::Mainnet => "mainnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "localhost" | "local" => Ok(Self::Localhost),
            "devnet" => Ok(Self::Devnet),
            "mainnet" | "mainnet-beta" => Ok(Self::Mainnet),
            other => Err(ClientError::configuration(format!("unknown network: {other}"))),
        }
    }
}

/// Validate a full configuration object.
pub fn validate_config(cfg: &ClientConfig) -> ClientResult<()> {
    if cfg.rpc_url.trim().is_empty() {
        return Err(ClientError::configuration("rpc_url must not be empty"));
    }
    if cfg.confirm.poll_interval.is_zero() {
        return Err(ClientError::configuration("poll_interval must be greater than zero"));
    }
    if cfg.confirm.max_polls == 0 {
        return Err(ClientError::configuration("max_polls must be greater than zero"));
    }
    if cfg.confirm.poll_interval > cfg.confirm.timeout {
        return Err(ClientError::configuration("poll_interval must not exceed timeout"));
    }
    if cfg.limits.max_transaction_bytes < MIN_TRANSACTION_BYTES {
        return Err(ClientError::configuration(format!(
            "max_transaction_bytes must be at least {MIN_TRANSACTION_BYTES}"
        )));
    }
    if !(cfg.rent.exemption_threshold > 0.0) {
        return Err(ClientError::configuration("rent exemption_threshold must be positive"));
    }
    if cfg.qps == Some(0) {
        return Err(ClientError::configuration("qps must be greater than zero"));
    }
    Ok(())
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
