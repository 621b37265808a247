//! One function per command verb.

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::info;

use crate::builder;
use crate::client::{AccountReader, HorizonClient, Submitter};
use crate::error::{McError, Result};
use crate::keypair::Keypair;
use crate::mutator::Mutator;
use crate::parse::{self, Request};
use crate::sign;

pub fn fund_test_account(client: &HorizonClient, address: &str) -> Result<()> {
    client.fund_test_account(address)
}

/// Write a fresh seed to `path` and its address to `path.pub`
pub fn generate_keys(path: &Path) -> Result<Keypair> {
    let pair = Keypair::random()?;
    let seed = pair
        .seed()
        .ok_or_else(|| McError::InvalidKey("generated key has no seed".to_string()))?;

    let pub_path = public_key_path(path);
    fs::write(&pub_path, pair.address())?;
    fs::write(path, seed)?;

    info!(
        "keys are created and stored in: {} and {}",
        pub_path.display(),
        path.display()
    );
    Ok(pair)
}

fn public_key_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".pub");
    PathBuf::from(name)
}

/// Submit a pre-built base64 envelope as is
pub fn submit_raw(client: &HorizonClient, blob: &str) -> Result<u32> {
    let blob = blob.trim();
    if STANDARD.decode(blob)?.is_empty() {
        return Err(McError::Encoding("empty transaction".to_string()));
    }
    client.submit_encoded(blob).into_ledger()
}

/// Indented JSON rendering of the account
pub fn account_details(accounts: &impl AccountReader, address: &str) -> Result<String> {
    let record = accounts.details(address)?;
    Ok(serde_json::to_string_pretty(&record)?)
}

pub fn send_payment<L>(ledger: &L, document: &str, options: &[Mutator]) -> Result<u32>
where
    L: AccountReader + Submitter,
{
    let request = parse::parse_payment(document)?;
    execute(ledger, request, options)
}

pub fn change_trust<L>(ledger: &L, document: &str, options: &[Mutator]) -> Result<u32>
where
    L: AccountReader + Submitter,
{
    let request = parse::parse_change_trust(document)?;
    execute(ledger, request, options)
}

pub fn new_transaction<L>(ledger: &L, document: &str, options: &[Mutator]) -> Result<u32>
where
    L: AccountReader + Submitter,
{
    let request = parse::parse_transaction(document)?;
    execute(ledger, request, options)
}

/// assemble, sign, submit
fn execute<L>(ledger: &L, request: Request, options: &[Mutator]) -> Result<u32>
where
    L: AccountReader + Submitter,
{
    let Request {
        source_account,
        mut mutators,
        signers,
    } = request;
    mutators.extend_from_slice(options);

    let draft = builder::build(&source_account, ledger.network(), mutators, ledger)?;
    let from = draft.source().address();
    for mutator in draft.mutators() {
        if let Mutator::Payment(payment) = mutator {
            info!(
                "sending {} {} from {} to {}",
                payment.amount, payment.asset_code, from, payment.destination
            );
        }
    }

    let envelope = sign::sign(draft, &signers)?;
    ledger.submit(&envelope)?.into_ledger()
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::error::ParseError;
    use crate::sign::SignedEnvelope;
    use crate::types::{AccountRecord, Network, NetworkContext, SubmissionResult};
    use crate::xdr::OperationBody;

    const SEED: &str = "SAAACAQDAQCQMBYIBEFAWDANBYHRAEISCMKBKFQXDAMRUGY4DUPB6NKI";
    const ADDRESS: &str = "GAB2CB576PHBBPQ5ODORRZ2LYCMWPZGWGCN2KDK7DXOIMZASKUY3QZ6Q";
    const OTHER: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";

    /// Knows both accounts and keeps whatever is submitted
    struct StubLedger {
        network: NetworkContext,
        submitted: RefCell<Vec<SignedEnvelope>>,
    }

    impl StubLedger {
        fn new() -> Self {
            Self {
                network: NetworkContext::from(Network::Test),
                submitted: RefCell::new(Vec::new()),
            }
        }

        fn last(&self) -> SignedEnvelope {
            self.submitted.borrow().last().cloned().unwrap()
        }
    }

    impl AccountReader for StubLedger {
        fn current_sequence(&self, address: &str) -> Result<i64> {
            match address {
                ADDRESS | OTHER => Ok(100),
                _ => Err(McError::AccountNotFound(address.to_string())),
            }
        }

        fn details(&self, address: &str) -> Result<AccountRecord> {
            let body = format!(
                r#"{{"id":"{0}","account_id":"{0}","sequence":"100","balances":[]}}"#,
                address
            );
            Ok(serde_json::from_str(&body)?)
        }
    }

    impl Submitter for StubLedger {
        fn network(&self) -> &NetworkContext {
            &self.network
        }

        fn submit(&self, envelope: &SignedEnvelope) -> Result<SubmissionResult> {
            self.submitted.borrow_mut().push(envelope.clone());
            Ok(SubmissionResult::Accepted { ledger_sequence: 7 })
        }
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn payment_document() -> String {
        format!(
            r#"{{"from":"{}","to":"{}","token":"XYZ","amount":"1","issuer":"{}"}}"#,
            SEED, OTHER, OTHER
        )
    }

    #[test]
    fn public_key_path_appends_suffix() {
        assert_eq!(
            public_key_path(Path::new("/tmp/foo")),
            PathBuf::from("/tmp/foo.pub")
        );
    }

    #[test]
    fn payment_log_names_the_address_not_the_seed() {
        let ledger = StubLedger::new();
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();

        let ledger_seq = tracing::subscriber::with_default(subscriber, || {
            send_payment(&ledger, &payment_document(), &[])
        })
        .unwrap();

        assert_eq!(ledger_seq, 7);
        let logs = logs.contents();
        assert!(logs.contains(&format!("sending 1 XYZ from {}", ADDRESS)));
        assert!(!logs.contains(SEED));
    }

    #[test]
    fn options_join_the_payment_transaction() {
        let ledger = StubLedger::new();
        let options = parse::parse_options(r#"{"home-domain": "example.com", "master-weight": 2}"#)
            .unwrap();

        send_payment(&ledger, &payment_document(), &options).unwrap();

        let envelope = ledger.last();
        envelope.verify().unwrap();
        let ops = &envelope.draft().transaction().operations;
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0].body, OperationBody::Payment { .. }));
        match &ops[1].body {
            OperationBody::SetOptions(set) => {
                assert_eq!(set.home_domain.as_deref(), Some("example.com"));
                assert_eq!(set.master_weight, Some(2));
            }
            other => panic!("expected set options, got {:?}", other),
        }
        assert_eq!(envelope.draft().transaction().fee, 200);
    }

    #[test]
    fn new_transaction_defaults_to_the_top_level_seed() {
        let ledger = StubLedger::new();
        let doc = format!(
            r#"{{
                "source-account": "{}",
                "operations": {{
                    "source-account": "{}",
                    "trust": {{"code": "XYZ", "issuer-address": "{}"}}
                }}
            }}"#,
            SEED, OTHER, OTHER
        );

        assert_eq!(new_transaction(&ledger, &doc, &[]).unwrap(), 7);

        let envelope = ledger.last();
        assert_eq!(envelope.draft().source().address(), ADDRESS);
        assert_eq!(envelope.signatures().len(), 1);
        envelope.verify().unwrap();
    }

    #[test]
    fn new_transaction_from_an_address_needs_signers() {
        let ledger = StubLedger::new();
        let doc = format!(r#"{{"source-account": "{}"}}"#, ADDRESS);
        let err = new_transaction(&ledger, &doc, &[]).unwrap_err();
        assert!(matches!(err, McError::Signing(_)));
        assert!(ledger.submitted.borrow().is_empty());

        let doc = format!(r#"{{"source-account": "{}", "signers": ["{}"]}}"#, ADDRESS, SEED);
        new_transaction(&ledger, &doc, &[]).unwrap();
        ledger.last().verify().unwrap();
    }

    #[test]
    fn change_trust_parse_failure_submits_nothing() {
        let ledger = StubLedger::new();
        let doc = format!(r#"{{"source-account": "{}"}}"#, SEED);
        let err = change_trust(&ledger, &doc, &[]).unwrap_err();
        assert!(matches!(
            err,
            McError::Parse(ParseError::MissingField { .. })
        ));
        assert!(ledger.submitted.borrow().is_empty());
    }

    #[test]
    fn account_details_are_indented_json() {
        let rendered = account_details(&StubLedger::new(), OTHER).unwrap();
        assert!(rendered.starts_with("{\n  \"id\""));
        assert!(rendered.contains("\"sequence\": \"100\""));
    }
}
