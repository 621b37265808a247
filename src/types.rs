//! Type definitions for the mc library

use ring::digest::{digest, SHA256};
use serde::{Deserialize, Serialize};

use crate::constant::{
    PUBLIC_HORIZON_URL, PUBLIC_NETWORK_PASSPHRASE, TEST_HORIZON_URL, TEST_NETWORK_PASSPHRASE,
};
use crate::error::{McError, Result, TransportError};

/// Stellar network selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// Public network (production)
    Public,
    /// Test network (development, has a faucet)
    Test,
}

impl Network {
    /// Resolve the value of `STELLAR_NETWORK`. Unset means `test`.
    pub fn from_env_value(value: Option<&str>) -> Result<Self> {
        match value {
            None | Some("test") => Ok(Network::Test),
            Some("public") => Ok(Network::Public),
            Some(other) => Err(McError::Config(format!(
                "Unknown Stellar network: \"{}\". Stellar network is set by the \"STELLAR_NETWORK\" \
                 environment variable. Possible values are \"public\", \"test\". An unset \
                 \"STELLAR_NETWORK\" is treated as \"test\".",
                other
            ))),
        }
    }

    pub fn passphrase(&self) -> &'static str {
        match self {
            Network::Public => PUBLIC_NETWORK_PASSPHRASE,
            Network::Test => TEST_NETWORK_PASSPHRASE,
        }
    }

    pub fn horizon_url(&self) -> &'static str {
        match self {
            Network::Public => PUBLIC_HORIZON_URL,
            Network::Test => TEST_HORIZON_URL,
        }
    }
}

/// Passphrase and endpoint of the network this process talks to.
///
/// Built once at startup and handed by reference to everything that needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    pub passphrase: String,
    pub endpoint_url: String,
}

impl NetworkContext {
    pub fn new(passphrase: impl Into<String>, endpoint_url: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
            endpoint_url: endpoint_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Network id: SHA-256 of the passphrase
    pub fn network_id(&self) -> [u8; 32] {
        let mut id = [0u8; 32];
        id.copy_from_slice(digest(&SHA256, self.passphrase.as_bytes()).as_ref());
        id
    }

    pub fn is_public(&self) -> bool {
        self.passphrase == PUBLIC_NETWORK_PASSPHRASE
    }
}

impl From<Network> for NetworkContext {
    fn from(network: Network) -> Self {
        NetworkContext::new(network.passphrase(), network.horizon_url())
    }
}

/// Account state as returned by Horizon, kept as the raw JSON object so it
/// renders back in Horizon's own field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountRecord(serde_json::Map<String, serde_json::Value>);

impl AccountRecord {
    pub fn account_id(&self) -> Option<&str> {
        self.0.get("account_id").and_then(|v| v.as_str())
    }

    /// Horizon sends the sequence as a decimal string
    pub fn sequence_number(&self) -> Result<i64> {
        let sequence = self
            .0
            .get("sequence")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                McError::Transport(TransportError::Decode(
                    "account record has no sequence".to_string(),
                ))
            })?;
        sequence.parse::<i64>().map_err(|e| {
            McError::Transport(TransportError::Decode(format!(
                "invalid sequence \"{}\": {}",
                sequence, e
            )))
        })
    }

    pub fn fields(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }
}

/// Outcome of handing a signed envelope to the network
#[derive(Debug)]
pub enum SubmissionResult {
    Accepted { ledger_sequence: u32 },
    /// Transaction code first, then one code per operation
    Rejected { result_codes: Vec<String> },
    TransportFailed { cause: TransportError },
}

impl SubmissionResult {
    /// Collapse into the ledger sequence, turning the failure variants into errors.
    pub fn into_ledger(self) -> Result<u32> {
        match self {
            SubmissionResult::Accepted { ledger_sequence } => Ok(ledger_sequence),
            SubmissionResult::Rejected { result_codes } => Err(McError::Rejected { result_codes }),
            SubmissionResult::TransportFailed { cause } => Err(McError::Transport(cause)),
        }
    }
}
