//! XDR encoding of transaction envelopes, the network's transport format.
//!
//! Only the subset of the ledger's types this crate builds is modelled:
//! v1 envelopes with plain ed25519 accounts, no preconditions, no memo and
//! `PAYMENT`, `SET_OPTIONS` and `CHANGE_TRUST` operations.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use ring::digest::{digest, SHA256};

use crate::constant::{MAX_HOME_DOMAIN_LEN, MAX_OPERATIONS, MAX_SIGNATURES};
use crate::error::{McError, Result};

const ENVELOPE_TYPE_TX: u32 = 2;
const KEY_TYPE_ED25519: u32 = 0;
const PUBLIC_KEY_TYPE_ED25519: u32 = 0;
const PRECOND_NONE: u32 = 0;
const MEMO_NONE: u32 = 0;

const ASSET_TYPE_NATIVE: u32 = 0;
const ASSET_TYPE_CREDIT_ALPHANUM4: u32 = 1;
const ASSET_TYPE_CREDIT_ALPHANUM12: u32 = 2;

const OP_PAYMENT: u32 = 1;
const OP_SET_OPTIONS: u32 = 5;
const OP_CHANGE_TRUST: u32 = 6;

pub type AccountId = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionEnvelope {
    pub tx: Transaction,
    pub signatures: Vec<DecoratedSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub source_account: AccountId,
    pub fee: u32,
    pub seq_num: i64,
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub source_account: Option<AccountId>,
    pub body: OperationBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationBody {
    Payment {
        destination: AccountId,
        asset: Asset,
        amount: i64,
    },
    SetOptions(SetOptions),
    ChangeTrust {
        line: Asset,
        limit: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    Native,
    CreditAlphanum4 { code: [u8; 4], issuer: AccountId },
    CreditAlphanum12 { code: [u8; 12], issuer: AccountId },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub inflation_dest: Option<AccountId>,
    pub clear_flags: Option<u32>,
    pub set_flags: Option<u32>,
    pub master_weight: Option<u32>,
    pub low_threshold: Option<u32>,
    pub med_threshold: Option<u32>,
    pub high_threshold: Option<u32>,
    pub home_domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratedSignature {
    pub hint: [u8; 4],
    pub signature: Vec<u8>,
}

/// Values with a canonical XDR form
pub trait Xdr: Sized {
    fn write_xdr(&self, out: &mut Vec<u8>) -> Result<()>;
    fn read_xdr(reader: &mut XdrReader<'_>) -> Result<Self>;

    fn to_xdr(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_xdr(&mut out)?;
        Ok(out)
    }

    /// Decode, requiring every input byte to be consumed
    fn from_xdr(bytes: &[u8]) -> Result<Self> {
        let mut reader = XdrReader::new(bytes);
        let value = Self::read_xdr(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(McError::Encoding(format!(
                "{} trailing bytes after value",
                reader.remaining()
            )));
        }
        Ok(value)
    }
}

impl TransactionEnvelope {
    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_xdr()?))
    }

    pub fn from_base64(blob: &str) -> Result<Self> {
        Self::from_xdr(&STANDARD.decode(blob.trim())?)
    }
}

impl Transaction {
    /// Bytes covered by signatures: network id, envelope type, transaction
    pub fn signature_base(&self, network_id: &[u8; 32]) -> Result<Vec<u8>> {
        let mut out = network_id.to_vec();
        out.write_u32::<BigEndian>(ENVELOPE_TYPE_TX)?;
        self.write_xdr(&mut out)?;
        Ok(out)
    }

    pub fn hash(&self, network_id: &[u8; 32]) -> Result<[u8; 32]> {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(digest(&SHA256, &self.signature_base(network_id)?).as_ref());
        Ok(hash)
    }
}

pub struct XdrReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> XdrReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(McError::Encoding("unexpected end of input".to_string()));
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.take(4)?))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(BigEndian::read_i64(self.take(8)?))
    }

    fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        self.take(padding(N))?;
        Ok(out)
    }

    fn read_var(&mut self, max: usize) -> Result<Vec<u8>> {
        let len = self.read_u32()? as usize;
        if len > max {
            return Err(McError::Encoding(format!(
                "length {} exceeds limit {}",
                len, max
            )));
        }
        let bytes = self.take(len)?.to_vec();
        self.take(padding(len))?;
        Ok(bytes)
    }

    fn read_bool(&mut self) -> Result<bool> {
        match self.read_u32()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(McError::Encoding(format!("invalid bool {}", other))),
        }
    }

    fn read_optional<T>(&mut self, read: impl FnOnce(&mut Self) -> Result<T>) -> Result<Option<T>> {
        if self.read_bool()? {
            Ok(Some(read(self)?))
        } else {
            Ok(None)
        }
    }

    fn read_len(&mut self, max: usize) -> Result<usize> {
        let len = self.read_u32()? as usize;
        if len > max {
            return Err(McError::Encoding(format!(
                "array length {} exceeds limit {}",
                len, max
            )));
        }
        Ok(len)
    }
}

fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

fn write_fixed(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes);
    out.extend(std::iter::repeat(0u8).take(padding(bytes.len())));
}

fn write_var(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    out.write_u32::<BigEndian>(bytes.len() as u32)?;
    write_fixed(out, bytes);
    Ok(())
}

fn write_optional<T>(
    out: &mut Vec<u8>,
    value: &Option<T>,
    write: impl FnOnce(&mut Vec<u8>, &T) -> Result<()>,
) -> Result<()> {
    match value {
        Some(v) => {
            out.write_u32::<BigEndian>(1)?;
            write(out, v)
        }
        None => Ok(out.write_u32::<BigEndian>(0)?),
    }
}

fn write_u32(out: &mut Vec<u8>, value: &u32) -> Result<()> {
    Ok(out.write_u32::<BigEndian>(*value)?)
}

fn write_account_id(out: &mut Vec<u8>, key: &AccountId) -> Result<()> {
    out.write_u32::<BigEndian>(PUBLIC_KEY_TYPE_ED25519)?;
    write_fixed(out, key);
    Ok(())
}

fn read_account_id(reader: &mut XdrReader<'_>) -> Result<AccountId> {
    match reader.read_u32()? {
        PUBLIC_KEY_TYPE_ED25519 => reader.read_fixed::<32>(),
        other => Err(McError::Encoding(format!("unsupported public key type {}", other))),
    }
}

fn write_muxed_account(out: &mut Vec<u8>, key: &AccountId) -> Result<()> {
    out.write_u32::<BigEndian>(KEY_TYPE_ED25519)?;
    write_fixed(out, key);
    Ok(())
}

fn read_muxed_account(reader: &mut XdrReader<'_>) -> Result<AccountId> {
    match reader.read_u32()? {
        KEY_TYPE_ED25519 => reader.read_fixed::<32>(),
        other => Err(McError::Encoding(format!("unsupported account type {}", other))),
    }
}

impl Xdr for TransactionEnvelope {
    fn write_xdr(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.signatures.len() > MAX_SIGNATURES {
            return Err(McError::Encoding("too many signatures".to_string()));
        }
        out.write_u32::<BigEndian>(ENVELOPE_TYPE_TX)?;
        self.tx.write_xdr(out)?;
        out.write_u32::<BigEndian>(self.signatures.len() as u32)?;
        for sig in &self.signatures {
            sig.write_xdr(out)?;
        }
        Ok(())
    }

    fn read_xdr(reader: &mut XdrReader<'_>) -> Result<Self> {
        let envelope_type = reader.read_u32()?;
        if envelope_type != ENVELOPE_TYPE_TX {
            return Err(McError::Encoding(format!(
                "unsupported envelope type {}",
                envelope_type
            )));
        }
        let tx = Transaction::read_xdr(reader)?;
        let count = reader.read_len(MAX_SIGNATURES)?;
        let signatures = (0..count)
            .map(|_| DecoratedSignature::read_xdr(reader))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { tx, signatures })
    }
}

impl Xdr for Transaction {
    fn write_xdr(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.operations.len() > MAX_OPERATIONS {
            return Err(McError::Encoding("too many operations".to_string()));
        }
        write_muxed_account(out, &self.source_account)?;
        out.write_u32::<BigEndian>(self.fee)?;
        out.write_i64::<BigEndian>(self.seq_num)?;
        out.write_u32::<BigEndian>(PRECOND_NONE)?;
        out.write_u32::<BigEndian>(MEMO_NONE)?;
        out.write_u32::<BigEndian>(self.operations.len() as u32)?;
        for op in &self.operations {
            op.write_xdr(out)?;
        }
        // ext
        out.write_u32::<BigEndian>(0)?;
        Ok(())
    }

    fn read_xdr(reader: &mut XdrReader<'_>) -> Result<Self> {
        let source_account = read_muxed_account(reader)?;
        let fee = reader.read_u32()?;
        let seq_num = reader.read_i64()?;
        if reader.read_u32()? != PRECOND_NONE {
            return Err(McError::Encoding("preconditions are not supported".to_string()));
        }
        if reader.read_u32()? != MEMO_NONE {
            return Err(McError::Encoding("memos are not supported".to_string()));
        }
        let count = reader.read_len(MAX_OPERATIONS)?;
        let operations = (0..count)
            .map(|_| Operation::read_xdr(reader))
            .collect::<Result<Vec<_>>>()?;
        if reader.read_u32()? != 0 {
            return Err(McError::Encoding("unsupported transaction extension".to_string()));
        }
        Ok(Self {
            source_account,
            fee,
            seq_num,
            operations,
        })
    }
}

impl Xdr for Operation {
    fn write_xdr(&self, out: &mut Vec<u8>) -> Result<()> {
        write_optional(out, &self.source_account, write_muxed_account)?;
        match &self.body {
            OperationBody::Payment {
                destination,
                asset,
                amount,
            } => {
                out.write_u32::<BigEndian>(OP_PAYMENT)?;
                write_muxed_account(out, destination)?;
                asset.write_xdr(out)?;
                out.write_i64::<BigEndian>(*amount)?;
            }
            OperationBody::SetOptions(options) => {
                out.write_u32::<BigEndian>(OP_SET_OPTIONS)?;
                options.write_xdr(out)?;
            }
            OperationBody::ChangeTrust { line, limit } => {
                out.write_u32::<BigEndian>(OP_CHANGE_TRUST)?;
                line.write_xdr(out)?;
                out.write_i64::<BigEndian>(*limit)?;
            }
        }
        Ok(())
    }

    fn read_xdr(reader: &mut XdrReader<'_>) -> Result<Self> {
        let source_account = reader.read_optional(read_muxed_account)?;
        let body = match reader.read_u32()? {
            OP_PAYMENT => OperationBody::Payment {
                destination: read_muxed_account(reader)?,
                asset: Asset::read_xdr(reader)?,
                amount: reader.read_i64()?,
            },
            OP_SET_OPTIONS => OperationBody::SetOptions(SetOptions::read_xdr(reader)?),
            OP_CHANGE_TRUST => OperationBody::ChangeTrust {
                line: Asset::read_xdr(reader)?,
                limit: reader.read_i64()?,
            },
            other => {
                return Err(McError::Encoding(format!(
                    "unsupported operation type {}",
                    other
                )))
            }
        };
        Ok(Self {
            source_account,
            body,
        })
    }
}

impl Xdr for Asset {
    fn write_xdr(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Asset::Native => out.write_u32::<BigEndian>(ASSET_TYPE_NATIVE)?,
            Asset::CreditAlphanum4 { code, issuer } => {
                out.write_u32::<BigEndian>(ASSET_TYPE_CREDIT_ALPHANUM4)?;
                write_fixed(out, code);
                write_account_id(out, issuer)?;
            }
            Asset::CreditAlphanum12 { code, issuer } => {
                out.write_u32::<BigEndian>(ASSET_TYPE_CREDIT_ALPHANUM12)?;
                write_fixed(out, code);
                write_account_id(out, issuer)?;
            }
        }
        Ok(())
    }

    fn read_xdr(reader: &mut XdrReader<'_>) -> Result<Self> {
        match reader.read_u32()? {
            ASSET_TYPE_NATIVE => Ok(Asset::Native),
            ASSET_TYPE_CREDIT_ALPHANUM4 => Ok(Asset::CreditAlphanum4 {
                code: reader.read_fixed::<4>()?,
                issuer: read_account_id(reader)?,
            }),
            ASSET_TYPE_CREDIT_ALPHANUM12 => Ok(Asset::CreditAlphanum12 {
                code: reader.read_fixed::<12>()?,
                issuer: read_account_id(reader)?,
            }),
            other => Err(McError::Encoding(format!("unsupported asset type {}", other))),
        }
    }
}

impl Xdr for SetOptions {
    fn write_xdr(&self, out: &mut Vec<u8>) -> Result<()> {
        write_optional(out, &self.inflation_dest, write_account_id)?;
        write_optional(out, &self.clear_flags, write_u32)?;
        write_optional(out, &self.set_flags, write_u32)?;
        write_optional(out, &self.master_weight, write_u32)?;
        write_optional(out, &self.low_threshold, write_u32)?;
        write_optional(out, &self.med_threshold, write_u32)?;
        write_optional(out, &self.high_threshold, write_u32)?;
        write_optional(out, &self.home_domain, |out, domain| {
            if domain.len() > MAX_HOME_DOMAIN_LEN {
                return Err(McError::Encoding(format!(
                    "home domain longer than {} bytes",
                    MAX_HOME_DOMAIN_LEN
                )));
            }
            write_var(out, domain.as_bytes())
        })?;
        // signer
        out.write_u32::<BigEndian>(0)?;
        Ok(())
    }

    fn read_xdr(reader: &mut XdrReader<'_>) -> Result<Self> {
        let options = SetOptions {
            inflation_dest: reader.read_optional(read_account_id)?,
            clear_flags: reader.read_optional(XdrReader::read_u32)?,
            set_flags: reader.read_optional(XdrReader::read_u32)?,
            master_weight: reader.read_optional(XdrReader::read_u32)?,
            low_threshold: reader.read_optional(XdrReader::read_u32)?,
            med_threshold: reader.read_optional(XdrReader::read_u32)?,
            high_threshold: reader.read_optional(XdrReader::read_u32)?,
            home_domain: reader.read_optional(|r| {
                let bytes = r.read_var(MAX_HOME_DOMAIN_LEN)?;
                String::from_utf8(bytes).map_err(|e| McError::Encoding(e.to_string()))
            })?,
        };
        if reader.read_bool()? {
            return Err(McError::Encoding("signer updates are not supported".to_string()));
        }
        Ok(options)
    }
}

impl Xdr for DecoratedSignature {
    fn write_xdr(&self, out: &mut Vec<u8>) -> Result<()> {
        if self.signature.len() > 64 {
            return Err(McError::Encoding("signature longer than 64 bytes".to_string()));
        }
        write_fixed(out, &self.hint);
        write_var(out, &self.signature)
    }

    fn read_xdr(reader: &mut XdrReader<'_>) -> Result<Self> {
        Ok(Self {
            hint: reader.read_fixed::<4>()?,
            signature: reader.read_var(64)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_envelope() -> TransactionEnvelope {
        TransactionEnvelope {
            tx: Transaction {
                source_account: [1u8; 32],
                fee: 300,
                seq_num: 4_294_967_297,
                operations: vec![
                    Operation {
                        source_account: None,
                        body: OperationBody::Payment {
                            destination: [2u8; 32],
                            asset: Asset::CreditAlphanum4 {
                                code: *b"XYZ\0",
                                issuer: [3u8; 32],
                            },
                            amount: 420_000_000,
                        },
                    },
                    Operation {
                        source_account: Some([4u8; 32]),
                        body: OperationBody::ChangeTrust {
                            line: Asset::CreditAlphanum12 {
                                code: *b"LONGCODE\0\0\0\0",
                                issuer: [3u8; 32],
                            },
                            limit: i64::MAX,
                        },
                    },
                    Operation {
                        source_account: None,
                        body: OperationBody::SetOptions(SetOptions {
                            master_weight: Some(1),
                            home_domain: Some("stellar.org".to_string()),
                            ..Default::default()
                        }),
                    },
                ],
            },
            signatures: vec![DecoratedSignature {
                hint: [9, 9, 9, 9],
                signature: vec![7u8; 64],
            }],
        }
    }

    #[test]
    fn envelope_round_trips_through_base64() {
        let envelope = sample_envelope();
        let blob = envelope.to_base64().unwrap();
        assert_eq!(TransactionEnvelope::from_base64(&blob).unwrap(), envelope);
    }

    #[test]
    fn asset_layout() {
        let asset = Asset::CreditAlphanum4 {
            code: *b"XYZ\0",
            issuer: [0xAA; 32],
        };
        let bytes = asset.to_xdr().unwrap();
        assert_eq!(&bytes[..4], &[0, 0, 0, 1]);
        assert_eq!(&bytes[4..8], b"XYZ\0");
        assert_eq!(&bytes[8..12], &[0, 0, 0, 0]);
        assert_eq!(bytes.len(), 4 + 4 + 4 + 32);
    }

    #[test]
    fn home_domain_is_padded() {
        let options = SetOptions {
            home_domain: Some("abcde".to_string()),
            ..Default::default()
        };
        let bytes = options.to_xdr().unwrap();
        // seven absent optionals, present flag, length, 5 bytes + 3 pad, absent signer
        assert_eq!(bytes.len(), 7 * 4 + 4 + 4 + 8 + 4);
        assert_eq!(SetOptions::from_xdr(&bytes).unwrap(), options);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = sample_envelope().to_xdr().unwrap();
        assert!(TransactionEnvelope::from_xdr(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = sample_envelope().to_xdr().unwrap();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        assert!(TransactionEnvelope::from_xdr(&bytes).is_err());
    }

    #[test]
    fn hash_depends_on_network() {
        let tx = sample_envelope().tx;
        let a = tx.hash(&[0u8; 32]).unwrap();
        let b = tx.hash(&[1u8; 32]).unwrap();
        assert_ne!(a, b);
    }
}
