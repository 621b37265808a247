//! Horizon client: account reads, transaction submission and the test faucet

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{McError, Result, TransportError};
use crate::sign::SignedEnvelope;
use crate::types::{AccountRecord, NetworkContext, SubmissionResult};

/// Read-only view of ledger accounts
pub trait AccountReader {
    /// Current sequence number of `address`; `AccountNotFound` if it has no account
    fn current_sequence(&self, address: &str) -> Result<i64>;

    fn details(&self, address: &str) -> Result<AccountRecord>;
}

/// Takes signed envelopes to one network
pub trait Submitter {
    fn network(&self) -> &NetworkContext;

    fn submit(&self, envelope: &SignedEnvelope) -> Result<SubmissionResult>;
}

/// Blocking client for a Horizon endpoint
///
/// No timeout is set here; requests use the HTTP client's defaults.
///
/// # Example
///
/// ```rust,no_run
/// use stellar_mc::{HorizonClient, Network, NetworkContext};
/// use stellar_mc::client::AccountReader;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HorizonClient::new(NetworkContext::from(Network::Test))?;
/// let seq = client.current_sequence("GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF")?;
/// println!("sequence: {}", seq);
/// # Ok(())
/// # }
/// ```
pub struct HorizonClient {
    network: NetworkContext,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct SubmitSuccess {
    ledger: u32,
}

/// RFC 7807 problem document as Horizon renders it
#[derive(Debug, Deserialize)]
struct Problem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    extras: Option<ProblemExtras>,
}

#[derive(Debug, Deserialize)]
struct ProblemExtras {
    result_codes: Option<ResultCodes>,
}

#[derive(Debug, Deserialize)]
struct ResultCodes {
    transaction: Option<String>,
    #[serde(default)]
    operations: Vec<String>,
}

impl HorizonClient {
    pub fn new(network: NetworkContext) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().build()?;
        Ok(Self { network, client })
    }

    pub fn network(&self) -> &NetworkContext {
        &self.network
    }

    /// Encode and submit a signed envelope
    pub fn submit(&self, envelope: &SignedEnvelope) -> Result<SubmissionResult> {
        let blob = envelope.to_base64()?;
        Ok(self.submit_encoded(&blob))
    }

    /// Submit an already signed, base64 encoded envelope
    pub fn submit_encoded(&self, blob: &str) -> SubmissionResult {
        let url = format!("{}/transactions", self.network.endpoint_url);
        debug!("posting transaction to {}", url);

        let response = match self.client.post(&url).form(&[("tx", blob)]).send() {
            Ok(response) => response,
            Err(e) => return SubmissionResult::TransportFailed { cause: e.into() },
        };
        let status = response.status();
        let body = match response.text() {
            Ok(body) => body,
            Err(e) => return SubmissionResult::TransportFailed { cause: e.into() },
        };

        let result = classify_submission(status.as_u16(), &body);
        match &result {
            SubmissionResult::Accepted { ledger_sequence } => {
                info!("transaction accepted in ledger {}", ledger_sequence)
            }
            SubmissionResult::Rejected { result_codes } => {
                info!("transaction rejected: {:?}", result_codes)
            }
            SubmissionResult::TransportFailed { cause } => debug!("submission failed: {}", cause),
        }
        result
    }

    /// Ask the test network's faucet to create and fund `address`
    pub fn fund_test_account(&self, address: &str) -> Result<()> {
        if self.network.is_public() {
            return Err(McError::Config(
                "accounts can only be funded on the test network".to_string(),
            ));
        }

        let url = format!("{}/friendbot", self.network.endpoint_url);
        let response = self.client.get(&url).query(&[("addr", address)]).send()?;
        let status = response.status();
        let body = response.text()?;

        if status != StatusCode::OK {
            return Err(McError::Transport(TransportError::Status {
                status: status.as_u16(),
                body: format!("could not fund {}, horizon said: {}", address, body),
            }));
        }

        info!("funded test account {}", address);
        Ok(())
    }

    fn load_account(&self, address: &str) -> Result<AccountRecord> {
        let url = format!("{}/accounts/{}", self.network.endpoint_url, address);
        debug!("loading account from {}", url);

        let response = self.client.get(&url).send()?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(McError::AccountNotFound(address.to_string()));
        }
        let body = response.text()?;
        if !status.is_success() {
            return Err(McError::Transport(TransportError::Status {
                status: status.as_u16(),
                body,
            }));
        }

        serde_json::from_str(&body)
            .map_err(|e| McError::Transport(TransportError::Decode(e.to_string())))
    }
}

impl Submitter for HorizonClient {
    fn network(&self) -> &NetworkContext {
        HorizonClient::network(self)
    }

    fn submit(&self, envelope: &SignedEnvelope) -> Result<SubmissionResult> {
        HorizonClient::submit(self, envelope)
    }
}

impl AccountReader for HorizonClient {
    fn current_sequence(&self, address: &str) -> Result<i64> {
        self.load_account(address)?.sequence_number()
    }

    fn details(&self, address: &str) -> Result<AccountRecord> {
        self.load_account(address)
    }
}

/// Map a `/transactions` response to its outcome.
///
/// Success needs a `ledger` field. Failures carrying `extras.result_codes`
/// are rejections, with the transaction code first. A failed-transaction
/// problem without decodable codes is a decode failure; anything else is a
/// plain status failure.
pub fn classify_submission(status: u16, body: &str) -> SubmissionResult {
    if (200..300).contains(&status) {
        return match serde_json::from_str::<SubmitSuccess>(body) {
            Ok(success) => SubmissionResult::Accepted {
                ledger_sequence: success.ledger,
            },
            Err(e) => SubmissionResult::TransportFailed {
                cause: TransportError::Decode(format!("acceptance body: {}", e)),
            },
        };
    }

    let problem = match serde_json::from_str::<Problem>(body) {
        Ok(problem) => problem,
        Err(_) => {
            return SubmissionResult::TransportFailed {
                cause: TransportError::Status {
                    status,
                    body: body.to_string(),
                },
            }
        }
    };

    match problem.extras {
        Some(ProblemExtras {
            result_codes:
                Some(ResultCodes {
                    transaction: Some(transaction),
                    operations,
                }),
        }) => {
            let mut result_codes = vec![transaction];
            result_codes.extend(operations);
            SubmissionResult::Rejected { result_codes }
        }
        Some(ProblemExtras {
            result_codes: Some(_),
        }) => SubmissionResult::TransportFailed {
            cause: TransportError::Decode(
                "horizon result codes carry no transaction code".to_string(),
            ),
        },
        _ if problem.kind.ends_with("transaction_failed") => SubmissionResult::TransportFailed {
            cause: TransportError::Decode(
                "failed to extract result codes from horizon response".to_string(),
            ),
        },
        _ => SubmissionResult::TransportFailed {
            cause: TransportError::Status {
                status,
                body: body.to_string(),
            },
        },
    }
}
