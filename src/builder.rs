//! Assembles mutators into a draft transaction against a live sequence number.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::client::AccountReader;
use crate::constant::{BASE_FEE, MAX_HOME_DOMAIN_LEN, MAX_OPERATIONS, STROOP_SCALE};
use crate::error::{McError, Result};
use crate::keypair::{decode_address, Keypair};
use crate::mutator::{Merge, Mutator, Payment, TrustLimit, TrustlineChange};
use crate::types::NetworkContext;
use crate::xdr::{AccountId, Asset, Operation, OperationBody, SetOptions, Transaction};

const MAX_MASTER_WEIGHT: u32 = 255;

/// A fully assembled, unsigned transaction.
///
/// Fields are private: once `build` returns, the mutators and the
/// transaction they produced can only be read.
#[derive(Debug, Clone)]
pub struct DraftTransaction {
    source: Keypair,
    network: NetworkContext,
    sequence: i64,
    mutators: Vec<Mutator>,
    tx: Transaction,
}

impl DraftTransaction {
    /// The effective source account, with its seed when one was supplied
    pub fn source(&self) -> &Keypair {
        &self.source
    }

    pub fn network(&self) -> &NetworkContext {
        &self.network
    }

    pub fn sequence_number(&self) -> i64 {
        self.sequence
    }

    pub fn mutators(&self) -> &[Mutator] {
        &self.mutators
    }

    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }
}

/// Build a draft sourced from `source_account` (seed or address).
///
/// A `SourceAccount` mutator in `mutators` overrides the argument; the last
/// one wins. The source's current sequence is read once per call and the
/// draft uses the next value.
pub fn build(
    source_account: &str,
    network: &NetworkContext,
    mutators: Vec<Mutator>,
    accounts: &impl AccountReader,
) -> Result<DraftTransaction> {
    let effective = mutators
        .iter()
        .rev()
        .find_map(|m| match m {
            Mutator::SourceAccount(account) => Some(account.as_str()),
            _ => None,
        })
        .unwrap_or(source_account);
    let source = Keypair::parse(effective)
        .map_err(|e| McError::Build(format!("source account: {}", e)))?;

    let operations = lower_operations(&mutators)?;
    if operations.len() > MAX_OPERATIONS {
        return Err(McError::Build(format!(
            "{} operations, a transaction holds at most {}",
            operations.len(),
            MAX_OPERATIONS
        )));
    }

    let address = source.address();
    let current = accounts.current_sequence(&address)?;
    let sequence = current
        .checked_add(1)
        .ok_or_else(|| McError::Build(format!("sequence of {} is exhausted", address)))?;
    info!("building transaction for {} at sequence {}", address, sequence);

    let fee = BASE_FEE * operations.len().max(1) as u32;
    debug!("{} operations, fee {} stroops", operations.len(), fee);

    let tx = Transaction {
        source_account: *source.public_key(),
        fee,
        seq_num: sequence,
        operations,
    };

    Ok(DraftTransaction {
        source,
        network: network.clone(),
        sequence,
        mutators,
        tx,
    })
}

/// Turn mutators into operations, in order. Option mutators share one
/// `SET_OPTIONS` placed where the first of them appeared.
pub fn lower_operations(mutators: &[Mutator]) -> Result<Vec<Operation>> {
    let mut operations: Vec<Operation> = Vec::new();
    let mut options_at: Option<usize> = None;

    for mutator in mutators {
        match mutator.kind().merge() {
            Merge::Transaction => {}
            Merge::Operation => operations.push(operation(mutator)?),
            Merge::SetOptions => {
                let index = *options_at.get_or_insert_with(|| {
                    operations.push(Operation {
                        source_account: None,
                        body: OperationBody::SetOptions(SetOptions::default()),
                    });
                    operations.len() - 1
                });
                if let OperationBody::SetOptions(options) = &mut operations[index].body {
                    apply_option(options, mutator)?;
                }
            }
        }
    }
    Ok(operations)
}

fn operation(mutator: &Mutator) -> Result<Operation> {
    match mutator {
        Mutator::Payment(payment) => payment_operation(payment),
        Mutator::ChangeTrust(change) => change_trust_operation(change),
        other => Err(McError::Build(format!("{:?} is not an operation", other.kind()))),
    }
}

fn apply_option(options: &mut SetOptions, mutator: &Mutator) -> Result<()> {
    match mutator {
        Mutator::SetHomeDomain(domain) => {
            if domain.len() > MAX_HOME_DOMAIN_LEN {
                return Err(McError::Build(format!(
                    "home domain \"{}\" is longer than {} bytes",
                    domain, MAX_HOME_DOMAIN_LEN
                )));
            }
            options.home_domain = Some(domain.clone());
        }
        Mutator::SetMasterWeight(weight) => {
            if *weight > MAX_MASTER_WEIGHT {
                return Err(McError::Build(format!(
                    "master weight {} is above {}",
                    weight, MAX_MASTER_WEIGHT
                )));
            }
            options.master_weight = Some(*weight);
        }
        Mutator::SetInflationDestination(address) => {
            options.inflation_dest = Some(account_id("inflation destination", address)?);
        }
        _ => {}
    }
    Ok(())
}

fn payment_operation(payment: &Payment) -> Result<Operation> {
    let amount = to_stroops(&payment.amount)?;
    if amount <= 0 {
        return Err(McError::Build(format!(
            "payment amount must be positive, got {}",
            payment.amount
        )));
    }
    Ok(Operation {
        source_account: None,
        body: OperationBody::Payment {
            destination: account_id("destination", &payment.destination)?,
            asset: credit_asset(&payment.asset_code, &payment.issuer)?,
            amount,
        },
    })
}

fn change_trust_operation(change: &TrustlineChange) -> Result<Operation> {
    let limit = match &change.limit {
        TrustLimit::Unlimited => i64::MAX,
        TrustLimit::Remove => 0,
        TrustLimit::Amount(amount) => {
            let limit = to_stroops(amount)?;
            if limit < 0 {
                return Err(McError::Build(format!("negative trust limit {}", amount)));
            }
            limit
        }
    };
    Ok(Operation {
        source_account: None,
        body: OperationBody::ChangeTrust {
            line: credit_asset(&change.asset_code, &change.issuer)?,
            limit,
        },
    })
}

fn account_id(role: &str, address: &str) -> Result<AccountId> {
    decode_address(address).map_err(|e| McError::Build(format!("{}: {}", role, e)))
}

/// 1-4 characters become an alphanum4 asset, 5-12 an alphanum12 asset.
pub fn credit_asset(code: &str, issuer: &str) -> Result<Asset> {
    if code.is_empty() || code.len() > 12 || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(McError::Build(format!("invalid asset code \"{}\"", code)));
    }
    let issuer = account_id("issuer", issuer)?;
    if code.len() <= 4 {
        let mut padded = [0u8; 4];
        padded[..code.len()].copy_from_slice(code.as_bytes());
        Ok(Asset::CreditAlphanum4 {
            code: padded,
            issuer,
        })
    } else {
        let mut padded = [0u8; 12];
        padded[..code.len()].copy_from_slice(code.as_bytes());
        Ok(Asset::CreditAlphanum12 {
            code: padded,
            issuer,
        })
    }
}

/// Exact decimal to stroops conversion; more than seven places is an error.
pub fn to_stroops(amount: &str) -> Result<i64> {
    let value = amount
        .parse::<Decimal>()
        .map_err(|_| McError::Build(format!("\"{}\" is not a decimal amount", amount)))?
        .normalize();
    if value.scale() > STROOP_SCALE {
        return Err(McError::Build(format!(
            "amount {} has more than {} decimal places",
            amount, STROOP_SCALE
        )));
    }
    value
        .checked_mul(Decimal::from(10i64.pow(STROOP_SCALE)))
        .and_then(|stroops| stroops.to_i64())
        .ok_or_else(|| McError::Build(format!("amount {} is out of range", amount)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountRecord;
    use std::cell::Cell;

    const SEED: &str = "SAAACAQDAQCQMBYIBEFAWDANBYHRAEISCMKBKFQXDAMRUGY4DUPB6NKI";
    const ADDRESS: &str = "GAB2CB576PHBBPQ5ODORRZ2LYCMWPZGWGCN2KDK7DXOIMZASKUY3QZ6Q";
    const ISSUER: &str = "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF";

    struct CountingReader {
        sequence: Cell<i64>,
        reads: Cell<usize>,
    }

    impl CountingReader {
        fn new(sequence: i64) -> Self {
            Self {
                sequence: Cell::new(sequence),
                reads: Cell::new(0),
            }
        }
    }

    impl AccountReader for CountingReader {
        fn current_sequence(&self, _address: &str) -> Result<i64> {
            self.reads.set(self.reads.get() + 1);
            let seq = self.sequence.get();
            self.sequence.set(seq + 1);
            Ok(seq)
        }

        fn details(&self, address: &str) -> Result<AccountRecord> {
            Err(McError::AccountNotFound(address.to_string()))
        }
    }

    fn network() -> NetworkContext {
        NetworkContext::from(crate::types::Network::Test)
    }

    fn payment(amount: &str) -> Mutator {
        Mutator::Payment(Payment {
            destination: ISSUER.into(),
            asset_code: "XYZ".into(),
            issuer: ISSUER.into(),
            amount: amount.into(),
        })
    }

    #[test]
    fn stroop_conversion_is_exact() {
        assert_eq!(to_stroops("42.0").unwrap(), 420_000_000);
        assert_eq!(to_stroops("0.0000001").unwrap(), 1);
        assert_eq!(to_stroops("922337203685.4775807").unwrap(), i64::MAX);
        assert!(to_stroops("0.00000001").is_err());
        assert!(to_stroops("922337203685.4775808").is_err());
        assert!(to_stroops("abc").is_err());
    }

    #[test]
    fn asset_codes() {
        assert!(matches!(
            credit_asset("XYZ", ISSUER).unwrap(),
            Asset::CreditAlphanum4 { code, .. } if &code == b"XYZ\0"
        ));
        assert!(matches!(
            credit_asset("LONGCODE", ISSUER).unwrap(),
            Asset::CreditAlphanum12 { .. }
        ));
        assert!(matches!(credit_asset("", ISSUER), Err(McError::Build(_))));
        assert!(matches!(credit_asset("X-Y", ISSUER), Err(McError::Build(_))));
        assert!(matches!(
            credit_asset("THIRTEENCHARS", ISSUER),
            Err(McError::Build(_))
        ));
        assert!(matches!(credit_asset("XYZ", "nope"), Err(McError::Build(_))));
    }

    #[test]
    fn operation_limit_is_a_build_error() {
        let reader = CountingReader::new(1);
        let full: Vec<Mutator> = (0..MAX_OPERATIONS).map(|_| payment("1")).collect();
        let draft = build(SEED, &network(), full.clone(), &reader).unwrap();
        assert_eq!(draft.transaction().fee, BASE_FEE * MAX_OPERATIONS as u32);

        let mut over = full;
        over.push(payment("1"));
        assert!(matches!(
            build(SEED, &network(), over, &reader),
            Err(McError::Build(_))
        ));
    }

    #[test]
    fn sequence_is_incremented_and_read_every_time() {
        let reader = CountingReader::new(100);
        let first = build(SEED, &network(), vec![payment("1")], &reader).unwrap();
        let second = build(SEED, &network(), vec![payment("1")], &reader).unwrap();
        assert_eq!(reader.reads.get(), 2);
        assert_eq!(first.sequence_number(), 101);
        assert_eq!(second.sequence_number(), 102);
        assert_eq!(first.transaction().seq_num, 101);
    }

    #[test]
    fn source_designation_overrides_argument() {
        let reader = CountingReader::new(1);
        let draft = build(
            "ignored",
            &network(),
            vec![Mutator::SourceAccount(ADDRESS.into()), payment("5")],
            &reader,
        )
        .unwrap();
        assert_eq!(draft.source().address(), ADDRESS);
        assert!(!draft.source().can_sign());
        assert_eq!(draft.transaction().fee, BASE_FEE);
    }

    #[test]
    fn options_fold_into_one_operation_and_later_values_win() {
        let ops = lower_operations(&[
            Mutator::SetHomeDomain("a.org".into()),
            payment("1"),
            Mutator::SetMasterWeight(3),
            Mutator::SetHomeDomain("b.org".into()),
        ])
        .unwrap();
        assert_eq!(ops.len(), 2);
        match &ops[0].body {
            OperationBody::SetOptions(options) => {
                assert_eq!(options.home_domain.as_deref(), Some("b.org"));
                assert_eq!(options.master_weight, Some(3));
            }
            other => panic!("expected set options, got {:?}", other),
        }
        assert!(matches!(ops[1].body, OperationBody::Payment { .. }));
    }

    #[test]
    fn trust_limits() {
        let lower = |limit| {
            let ops = lower_operations(&[Mutator::ChangeTrust(TrustlineChange {
                asset_code: "XYZ".into(),
                issuer: ISSUER.into(),
                limit,
            })])
            .unwrap();
            match ops[0].body {
                OperationBody::ChangeTrust { limit, .. } => limit,
                _ => unreachable!(),
            }
        };
        assert_eq!(lower(TrustLimit::Unlimited), i64::MAX);
        assert_eq!(lower(TrustLimit::Remove), 0);
        assert_eq!(lower(TrustLimit::Amount("42.5".into())), 425_000_000);
    }

    #[test]
    fn bad_mutators_fail_before_any_read() {
        let reader = CountingReader::new(1);
        let err = build(SEED, &network(), vec![payment("-1")], &reader).unwrap_err();
        assert!(matches!(err, McError::Build(_)));
        let err = build(
            SEED,
            &network(),
            vec![Mutator::SetMasterWeight(256)],
            &reader,
        )
        .unwrap_err();
        assert!(matches!(err, McError::Build(_)));
        assert_eq!(reader.reads.get(), 0);
    }

    #[test]
    fn unknown_account_surfaces_reader_error() {
        struct Missing;
        impl AccountReader for Missing {
            fn current_sequence(&self, address: &str) -> Result<i64> {
                Err(McError::AccountNotFound(address.to_string()))
            }
            fn details(&self, address: &str) -> Result<AccountRecord> {
                Err(McError::AccountNotFound(address.to_string()))
            }
        }
        let err = build(SEED, &network(), vec![payment("1")], &Missing).unwrap_err();
        assert!(matches!(err, McError::AccountNotFound(a) if a == ADDRESS));
    }
}
