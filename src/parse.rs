//! Structured request documents to mutator sequences.
//!
//! Each schema is a static table of entries. An entry is either a single key
//! that produces mutators on its own or a group of keys that together form
//! one mutator. Entries are visited in table order, so the resulting
//! sequence follows the schema rather than the text of the document.

use std::fmt;

use rust_decimal::Decimal;
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::value::RawValue;

use crate::error::ParseError;
use crate::mutator::{Mutator, MutatorKind, Payment, TrustLimit, TrustlineChange};

type ParseResult<T> = std::result::Result<T, ParseError>;
type FieldBuilder = fn(&'static str, &RawValue) -> ParseResult<Vec<Mutator>>;
type GroupBuilder = for<'a> fn(&Fields<'a>) -> ParseResult<Mutator>;

pub struct Schema {
    pub name: &'static str,
    entries: &'static [Entry],
    /// Reject keys the schema does not know instead of ignoring them
    strict: bool,
}

enum Entry {
    Field {
        name: &'static str,
        kind: Option<MutatorKind>,
        build: FieldBuilder,
    },
    Group {
        names: &'static [&'static str],
        build: GroupBuilder,
    },
}

impl Schema {
    fn knows(&self, key: &str) -> bool {
        self.entries.iter().any(|entry| match entry {
            Entry::Field { name, .. } => *name == key,
            Entry::Group { names, .. } => names.iter().any(|name| *name == key),
        })
    }
}

/// `{"from", "to", "token", "amount", "issuer"}`
pub static PAYMENT: Schema = Schema {
    name: "payment",
    entries: &[
        Entry::Field {
            name: "from",
            kind: Some(MutatorKind::SourceAccount),
            build: source_account,
        },
        Entry::Group {
            names: &["to", "token", "amount", "issuer"],
            build: payment,
        },
    ],
    strict: false,
};

/// `{"source-account", "code", "issuer-address", "limit"}`
pub static CHANGE_TRUST: Schema = Schema {
    name: "change-trust",
    entries: &[
        Entry::Field {
            name: "source-account",
            kind: Some(MutatorKind::SourceAccount),
            build: source_account,
        },
        Entry::Group {
            names: &["code", "issuer-address", "limit"],
            build: change_trust,
        },
    ],
    strict: false,
};

/// `{"home-domain", "master-weight", "inflation-destination"}`
pub static OPTIONS: Schema = Schema {
    name: "options",
    entries: &[
        Entry::Field {
            name: "home-domain",
            kind: Some(MutatorKind::SetHomeDomain),
            build: home_domain,
        },
        Entry::Field {
            name: "master-weight",
            kind: Some(MutatorKind::SetMasterWeight),
            build: master_weight,
        },
        Entry::Field {
            name: "inflation-destination",
            kind: Some(MutatorKind::SetInflationDestination),
            build: inflation_destination,
        },
    ],
    strict: false,
};

/// The `operations` object of a generic transaction. Every key must name an
/// operation.
pub static OPERATIONS: Schema = Schema {
    name: "operations",
    entries: &[
        Entry::Field {
            name: "source-account",
            kind: Some(MutatorKind::SourceAccount),
            build: source_account,
        },
        Entry::Field {
            name: "payments",
            kind: Some(MutatorKind::Payment),
            build: payments,
        },
        Entry::Field {
            name: "trust",
            kind: Some(MutatorKind::ChangeTrust),
            build: trust,
        },
        Entry::Field {
            name: "options",
            kind: None,
            build: nested_options,
        },
    ],
    strict: true,
};

/// `{"source-account", "operations", "signers"}`
pub static TRANSACTION: Schema = Schema {
    name: "transaction",
    entries: &[
        Entry::Field {
            name: "source-account",
            kind: Some(MutatorKind::SourceAccount),
            build: source_account,
        },
        Entry::Field {
            name: "operations",
            kind: None,
            build: operations,
        },
    ],
    strict: false,
};

/// A parsed top-level request: who pays, what changes, who signs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub source_account: String,
    pub mutators: Vec<Mutator>,
    /// Empty means "sign with the source account"
    pub signers: Vec<String>,
}

/// Parse `text` against `schema`. Absent and null keys produce nothing.
pub fn parse_document(text: &str, schema: &Schema) -> ParseResult<Vec<Mutator>> {
    let doc = Document::from_text(text)?;
    parse_entries(&doc, schema)
}

pub fn parse_options(text: &str) -> ParseResult<Vec<Mutator>> {
    parse_document(text, &OPTIONS)
}

pub fn parse_payment(text: &str) -> ParseResult<Request> {
    let mutators = parse_document(text, &PAYMENT)?;
    require_kind(&mutators, MutatorKind::Payment, "to")?;
    into_request(mutators, "from", Vec::new())
}

pub fn parse_change_trust(text: &str) -> ParseResult<Request> {
    let mutators = parse_document(text, &CHANGE_TRUST)?;
    require_kind(&mutators, MutatorKind::ChangeTrust, "code")?;
    into_request(mutators, "source-account", Vec::new())
}

pub fn parse_transaction(text: &str) -> ParseResult<Request> {
    let doc = Document::from_text(text)?;
    let mutators = parse_entries(&doc, &TRANSACTION)?;
    let signers = match Fields(&doc).get("signers")? {
        Some(raw) => serde_json::from_str::<Vec<String>>(raw.get()).map_err(|_| {
            ParseError::Field {
                field: "signers".to_string(),
                reason: "expected a list of seeds".to_string(),
            }
        })?,
        None => Vec::new(),
    };
    into_request(mutators, "source-account", signers)
}

fn parse_entries(doc: &Document<'_>, schema: &Schema) -> ParseResult<Vec<Mutator>> {
    if schema.strict {
        if let Some((key, _)) = doc
            .0
            .iter()
            .find(|(key, raw)| !is_null(raw) && !schema.knows(key))
        {
            return Err(ParseError::UnknownOperation(key.clone()));
        }
    }

    let fields = Fields(doc);
    let mut mutators = Vec::new();
    for entry in schema.entries {
        match entry {
            Entry::Field { name, kind, build } => {
                let values = fields.all(name);
                if values.len() > 1 && !kind.is_some_and(|k| k.repeatable()) {
                    return Err(ParseError::Duplicate(name.to_string()));
                }
                for raw in values {
                    mutators.extend(build(*name, raw)?);
                }
            }
            Entry::Group { names, build } => {
                if names.iter().any(|name| !fields.all(name).is_empty()) {
                    mutators.push(build(&fields)?);
                }
            }
        }
    }
    Ok(mutators)
}

fn require_kind(mutators: &[Mutator], kind: MutatorKind, field: &str) -> ParseResult<()> {
    if mutators.iter().any(|m| m.kind() == kind) {
        Ok(())
    } else {
        Err(ParseError::MissingField {
            field: field.to_string(),
        })
    }
}

/// The first source designation is the outermost one. It overrides any
/// nested designation, which is dropped so the builder and the default
/// signer agree on the source.
fn into_request(mut mutators: Vec<Mutator>, source_field: &str, signers: Vec<String>) -> ParseResult<Request> {
    let source_account = mutators
        .iter()
        .find_map(|m| match m {
            Mutator::SourceAccount(account) => Some(account.clone()),
            _ => None,
        })
        .ok_or_else(|| ParseError::MissingField {
            field: source_field.to_string(),
        })?;
    let mut seen = false;
    mutators.retain(|m| match m {
        Mutator::SourceAccount(_) => !std::mem::replace(&mut seen, true),
        _ => true,
    });
    Ok(Request {
        source_account,
        mutators,
        signers,
    })
}

/// A JSON object with its entries in document order. Duplicate keys are
/// kept so the schema can decide whether they are allowed.
struct Document<'a>(Vec<(String, &'a RawValue)>);

impl<'a> Document<'a> {
    fn from_text(text: &'a str) -> ParseResult<Self> {
        serde_json::from_str(text).map_err(|e| ParseError::Syntax(e.to_string()))
    }

    fn from_field(field: &str, raw: &'a RawValue) -> ParseResult<Self> {
        serde_json::from_str(raw.get()).map_err(|_| ParseError::Field {
            field: field.to_string(),
            reason: "expected an object".to_string(),
        })
    }
}

impl<'de> Deserialize<'de> for Document<'de> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = Document<'de>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry::<String, &'de RawValue>()? {
                    entries.push(entry);
                }
                Ok(Document(entries))
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

/// Typed access to the entries of one document
struct Fields<'d>(&'d Document<'d>);

impl<'d> Fields<'d> {
    /// Every non-null value stored under `name`
    fn all(&self, name: &str) -> Vec<&'d RawValue> {
        self.0
            .0
            .iter()
            .filter(|(key, raw)| key == name && !is_null(raw))
            .map(|(_, raw)| *raw)
            .collect()
    }

    fn get(&self, name: &str) -> ParseResult<Option<&'d RawValue>> {
        let mut values = self.all(name);
        if values.len() > 1 {
            return Err(ParseError::Duplicate(name.to_string()));
        }
        Ok(values.pop())
    }

    fn string(&self, name: &'static str) -> ParseResult<Option<String>> {
        self.get(name)?.map(|raw| string(name, raw)).transpose()
    }

    fn required(&self, name: &'static str) -> ParseResult<String> {
        self.string(name)?.ok_or_else(|| ParseError::MissingField {
            field: name.to_string(),
        })
    }
}

fn is_null(raw: &RawValue) -> bool {
    raw.get().trim() == "null"
}

fn string(field: &str, raw: &RawValue) -> ParseResult<String> {
    let value: String = serde_json::from_str(raw.get()).map_err(|_| ParseError::Field {
        field: field.to_string(),
        reason: "expected a string".to_string(),
    })?;
    if value.is_empty() {
        return Err(ParseError::Field {
            field: field.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    Ok(value)
}

fn decimal(field: &str, value: String) -> ParseResult<String> {
    match value.parse::<Decimal>() {
        Ok(_) => Ok(value),
        Err(_) => Err(ParseError::Field {
            field: field.to_string(),
            reason: format!("\"{}\" is not a decimal amount", value),
        }),
    }
}

fn source_account(field: &'static str, raw: &RawValue) -> ParseResult<Vec<Mutator>> {
    Ok(vec![Mutator::SourceAccount(string(field, raw)?)])
}

fn home_domain(field: &'static str, raw: &RawValue) -> ParseResult<Vec<Mutator>> {
    Ok(vec![Mutator::SetHomeDomain(string(field, raw)?)])
}

fn inflation_destination(field: &'static str, raw: &RawValue) -> ParseResult<Vec<Mutator>> {
    Ok(vec![Mutator::SetInflationDestination(string(field, raw)?)])
}

fn master_weight(field: &'static str, raw: &RawValue) -> ParseResult<Vec<Mutator>> {
    let weight: u32 = serde_json::from_str(raw.get()).map_err(|_| ParseError::Field {
        field: field.to_string(),
        reason: "expected a non-negative integer weight".to_string(),
    })?;
    Ok(vec![Mutator::SetMasterWeight(weight)])
}

fn payment(fields: &Fields<'_>) -> ParseResult<Mutator> {
    Ok(Mutator::Payment(Payment {
        destination: fields.required("to")?,
        asset_code: fields.required("token")?,
        issuer: fields.required("issuer")?,
        amount: decimal("amount", fields.required("amount")?)?,
    }))
}

fn change_trust(fields: &Fields<'_>) -> ParseResult<Mutator> {
    let limit = match fields.get("limit")? {
        // an empty limit is the same as no limit
        Some(raw) if raw.get() == "\"\"" => None,
        Some(raw) => Some(decimal("limit", string("limit", raw)?)?),
        None => None,
    };
    Ok(Mutator::ChangeTrust(TrustlineChange {
        asset_code: fields.required("code")?,
        issuer: fields.required("issuer-address")?,
        limit: TrustLimit::from_limit(limit.as_deref()),
    }))
}

fn payments(field: &'static str, raw: &RawValue) -> ParseResult<Vec<Mutator>> {
    let items: Vec<&RawValue> = serde_json::from_str(raw.get()).map_err(|_| ParseError::Field {
        field: field.to_string(),
        reason: "expected a list of payments".to_string(),
    })?;
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let path = format!("{}[{}]", field, i);
            let doc = Document::from_field(&path, item)?;
            payment(&Fields(&doc)).map_err(|e| e.within(&path))
        })
        .collect()
}

fn trust(field: &'static str, raw: &RawValue) -> ParseResult<Vec<Mutator>> {
    let doc = Document::from_field(field, raw)?;
    Ok(vec![change_trust(&Fields(&doc)).map_err(|e| e.within(field))?])
}

fn nested_options(field: &'static str, raw: &RawValue) -> ParseResult<Vec<Mutator>> {
    let doc = Document::from_field(field, raw)?;
    parse_entries(&doc, &OPTIONS).map_err(|e| e.within(field))
}

fn operations(field: &'static str, raw: &RawValue) -> ParseResult<Vec<Mutator>> {
    let doc = Document::from_field(field, raw)?;
    parse_entries(&doc, &OPERATIONS).map_err(|e| e.within(field))
}

impl ParseError {
    /// Qualify the offending field with the path of the enclosing document
    fn within(self, path: &str) -> Self {
        let qualify = |field: String| format!("{}.{}", path, field);
        match self {
            ParseError::MissingField { field } => ParseError::MissingField {
                field: qualify(field),
            },
            ParseError::Field { field, reason } => ParseError::Field {
                field: qualify(field),
                reason,
            },
            ParseError::Duplicate(field) => ParseError::Duplicate(qualify(field)),
            other => other,
        }
    }
}
