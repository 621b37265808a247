//! The closed catalog of changes a request can make to a transaction.
//!
//! Every mutator either appends an operation, feeds a field of the single
//! `SET_OPTIONS` operation, or sets a transaction-level value. Adding a new
//! kind means adding a variant here and teaching `builder` how to merge it.

/// One typed change to apply to a draft transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutator {
    /// Account the transaction is sourced from (seed or address)
    SourceAccount(String),
    Payment(Payment),
    ChangeTrust(TrustlineChange),
    SetHomeDomain(String),
    SetMasterWeight(u32),
    SetInflationDestination(String),
}

/// Credit payment. `amount` is kept as the decimal string the caller wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub destination: String,
    pub asset_code: String,
    pub issuer: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustlineChange {
    pub asset_code: String,
    pub issuer: String,
    pub limit: TrustLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustLimit {
    /// No ceiling; the largest amount the ledger can represent
    Unlimited,
    /// Limit of zero deletes the trustline
    Remove,
    Amount(String),
}

impl TrustLimit {
    /// `None` and `""` mean unlimited, any spelling of zero removes.
    pub fn from_limit(limit: Option<&str>) -> Self {
        match limit {
            None | Some("") => TrustLimit::Unlimited,
            Some(value) => match value.parse::<rust_decimal::Decimal>() {
                Ok(d) if d.is_zero() => TrustLimit::Remove,
                _ => TrustLimit::Amount(value.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutatorKind {
    SourceAccount,
    Payment,
    ChangeTrust,
    SetHomeDomain,
    SetMasterWeight,
    SetInflationDestination,
}

/// Where a mutator lands in the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// Transaction header field
    Transaction,
    /// A new operation of its own
    Operation,
    /// A field of the shared `SET_OPTIONS` operation
    SetOptions,
}

impl MutatorKind {
    pub fn merge(&self) -> Merge {
        match self {
            MutatorKind::SourceAccount => Merge::Transaction,
            MutatorKind::Payment | MutatorKind::ChangeTrust => Merge::Operation,
            MutatorKind::SetHomeDomain
            | MutatorKind::SetMasterWeight
            | MutatorKind::SetInflationDestination => Merge::SetOptions,
        }
    }

    /// Whether one document may declare this kind more than once
    pub fn repeatable(&self) -> bool {
        matches!(self, MutatorKind::Payment)
    }
}

impl Mutator {
    pub fn kind(&self) -> MutatorKind {
        match self {
            Mutator::SourceAccount(_) => MutatorKind::SourceAccount,
            Mutator::Payment(_) => MutatorKind::Payment,
            Mutator::ChangeTrust(_) => MutatorKind::ChangeTrust,
            Mutator::SetHomeDomain(_) => MutatorKind::SetHomeDomain,
            Mutator::SetMasterWeight(_) => MutatorKind::SetMasterWeight,
            Mutator::SetInflationDestination(_) => MutatorKind::SetInflationDestination,
        }
    }
}
