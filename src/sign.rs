//! Signing of draft transactions.

use tracing::info;

use crate::builder::DraftTransaction;
use crate::error::{McError, Result};
use crate::keypair::Keypair;
use crate::xdr::{DecoratedSignature, TransactionEnvelope};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub public_key: [u8; 32],
    pub signature: Vec<u8>,
}

/// A draft plus at least one signature over its hash. Only `sign` makes these.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    draft: DraftTransaction,
    signatures: Vec<Signature>,
}

impl SignedEnvelope {
    pub fn draft(&self) -> &DraftTransaction {
        &self.draft
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Wire form of the envelope
    pub fn envelope(&self) -> TransactionEnvelope {
        TransactionEnvelope {
            tx: self.draft.transaction().clone(),
            signatures: self
                .signatures
                .iter()
                .map(|sig| DecoratedSignature {
                    hint: Keypair::from_public_key(sig.public_key).hint(),
                    signature: sig.signature.clone(),
                })
                .collect(),
        }
    }

    pub fn to_base64(&self) -> Result<String> {
        self.envelope().to_base64()
    }

    /// Check every signature against the transaction hash
    pub fn verify(&self) -> Result<()> {
        let network_id = self.draft.network().network_id();
        let hash = self.draft.transaction().hash(&network_id)?;
        for sig in &self.signatures {
            Keypair::from_public_key(sig.public_key).verify(&hash, &sig.signature)?;
        }
        Ok(())
    }
}

/// Sign `draft` with every seed in `signer_seeds`, in order.
///
/// With no seeds the draft's own source account signs, which requires it to
/// have been given as a seed. Every seed is parsed before anything is signed.
pub fn sign(draft: DraftTransaction, signer_seeds: &[String]) -> Result<SignedEnvelope> {
    let signers: Vec<Keypair> = if signer_seeds.is_empty() {
        if !draft.source().can_sign() {
            return Err(McError::Signing(format!(
                "can't find a seed to sign this transaction: source account {} was given as an \
                 address, and external / hardware signers are not supported",
                draft.source().address()
            )));
        }
        vec![draft.source().clone()]
    } else {
        signer_seeds
            .iter()
            .enumerate()
            .map(|(i, seed)| {
                Keypair::from_seed(seed)
                    .map_err(|e| McError::Signing(format!("signer #{}: {}", i + 1, e)))
            })
            .collect::<Result<Vec<_>>>()?
    };

    let network_id = draft.network().network_id();
    let hash = draft.transaction().hash(&network_id)?;

    let signatures = signers
        .iter()
        .map(|signer| {
            Ok(Signature {
                public_key: *signer.public_key(),
                signature: signer.sign(&hash)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    info!(
        "signed transaction {} with {} key(s)",
        hex::encode(hash),
        signatures.len()
    );

    Ok(SignedEnvelope { draft, signatures })
}
