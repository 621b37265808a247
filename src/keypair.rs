use crc::{Crc, CRC_16_XMODEM};
use data_encoding::BASE32_NOPAD;
use ring::{
    rand::{SecureRandom, SystemRandom},
    signature::{self, Ed25519KeyPair, KeyPair, UnparsedPublicKey},
};

use crate::constant::{VERSION_BYTE_ACCOUNT_ID, VERSION_BYTE_SEED};
use crate::error::{McError, Result};

const STRKEY_CHECKSUM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);
const PAYLOAD_LEN: usize = 32;
const CHECKSUM_LENGTH: usize = 2;
const STRKEY_DECODED_LEN: usize = 1 + PAYLOAD_LEN + CHECKSUM_LENGTH;

/// Ed25519 keypair for Stellar accounts.
///
/// Built either from a secret seed (`S...`, can sign) or from a public
/// address (`G...`, verify only).
#[derive(Clone)]
pub struct Keypair {
    public_key: [u8; 32],
    seed: Option<[u8; 32]>,
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .field("can_sign", &self.can_sign())
            .finish()
    }
}

impl Keypair {
    /// Generate a fresh keypair from the system RNG
    pub fn random() -> Result<Self> {
        let mut seed = [0u8; 32];
        SystemRandom::new()
            .fill(&mut seed)
            .map_err(|_| McError::InvalidKey("system randomness unavailable".to_string()))?;
        Self::from_raw_seed(seed)
    }

    /// Create a keypair from a secret seed string
    pub fn from_seed(seed_str: &str) -> Result<Self> {
        let seed = decode_strkey(seed_str, VERSION_BYTE_SEED)?;
        Self::from_raw_seed(seed)
    }

    /// Create a verify-only keypair from an account address
    pub fn from_address(address: &str) -> Result<Self> {
        Ok(Self::from_public_key(decode_strkey(
            address,
            VERSION_BYTE_ACCOUNT_ID,
        )?))
    }

    pub fn from_public_key(public_key: [u8; 32]) -> Self {
        Self {
            public_key,
            seed: None,
        }
    }

    /// Accept either a seed or an address
    pub fn parse(key: &str) -> Result<Self> {
        match key.as_bytes().first() {
            Some(b'S') => Self::from_seed(key),
            Some(b'G') => Self::from_address(key),
            _ => Err(McError::InvalidKey(format!(
                "\"{}\" is neither a seed nor an address",
                key
            ))),
        }
    }

    fn from_raw_seed(seed: [u8; 32]) -> Result<Self> {
        let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed)
            .map_err(|e| McError::InvalidKey(e.to_string()))?;
        let mut public_key = [0u8; 32];
        public_key.copy_from_slice(key_pair.public_key().as_ref());
        Ok(Self {
            public_key,
            seed: Some(seed),
        })
    }

    pub fn public_key(&self) -> &[u8; 32] {
        &self.public_key
    }

    pub fn address(&self) -> String {
        encode_strkey(VERSION_BYTE_ACCOUNT_ID, &self.public_key)
    }

    pub fn seed(&self) -> Option<String> {
        self.seed
            .as_ref()
            .map(|seed| encode_strkey(VERSION_BYTE_SEED, seed))
    }

    pub fn can_sign(&self) -> bool {
        self.seed.is_some()
    }

    /// Last four bytes of the public key, used to match signatures to signers
    pub fn hint(&self) -> [u8; 4] {
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&self.public_key[28..]);
        hint
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let seed = self.seed.as_ref().ok_or_else(|| {
            McError::Signing(format!("{} has no secret seed", self.address()))
        })?;
        let key_pair = Ed25519KeyPair::from_seed_unchecked(seed)
            .map_err(|e| McError::InvalidKey(e.to_string()))?;
        Ok(key_pair.sign(message).as_ref().to_vec())
    }

    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        UnparsedPublicKey::new(&signature::ED25519, &self.public_key)
            .verify(message, signature)
            .map_err(|_| McError::Signing(format!("bad signature for {}", self.address())))
    }
}

/// Decode an `address` into its raw 32-byte public key
pub fn decode_address(address: &str) -> Result<[u8; 32]> {
    decode_strkey(address, VERSION_BYTE_ACCOUNT_ID)
}

pub fn encode_address(public_key: &[u8; 32]) -> String {
    encode_strkey(VERSION_BYTE_ACCOUNT_ID, public_key)
}

fn encode_strkey(version: u8, payload: &[u8; 32]) -> String {
    let mut bytes = Vec::with_capacity(STRKEY_DECODED_LEN);
    bytes.push(version);
    bytes.extend_from_slice(payload);
    let checksum = STRKEY_CHECKSUM.checksum(&bytes);
    bytes.extend_from_slice(&checksum.to_le_bytes());
    BASE32_NOPAD.encode(&bytes)
}

fn decode_strkey(key: &str, version: u8) -> Result<[u8; 32]> {
    let invalid = |reason: &str| McError::InvalidKey(format!("\"{}\": {}", key, reason));

    let decoded = BASE32_NOPAD
        .decode(key.as_bytes())
        .map_err(|_| invalid("not base32"))?;
    if decoded.len() != STRKEY_DECODED_LEN {
        return Err(invalid("invalid length"));
    }
    if decoded[0] != version {
        return Err(invalid("invalid version byte"));
    }

    let (body, checksum) = decoded.split_at(decoded.len() - CHECKSUM_LENGTH);
    if STRKEY_CHECKSUM.checksum(body).to_le_bytes() != checksum {
        return Err(invalid("invalid checksum"));
    }

    let mut payload = [0u8; 32];
    payload.copy_from_slice(&body[1..]);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "SAAACAQDAQCQMBYIBEFAWDANBYHRAEISCMKBKFQXDAMRUGY4DUPB6NKI";
    const ADDRESS: &str = "GAB2CB576PHBBPQ5ODORRZ2LYCMWPZGWGCN2KDK7DXOIMZASKUY3QZ6Q";

    #[test]
    fn zero_key_encodes_to_well_known_address() {
        assert_eq!(
            encode_address(&[0u8; 32]),
            "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF"
        );
    }

    #[test]
    fn seed_derives_expected_address() {
        let kp = Keypair::from_seed(SEED).unwrap();
        assert_eq!(kp.address(), ADDRESS);
        assert_eq!(kp.seed().as_deref(), Some(SEED));
        let expected: Vec<u8> = (0u8..32).collect();
        assert_eq!(&kp.seed.unwrap()[..], &expected[..]);
    }

    #[test]
    fn parse_dispatches_on_prefix() {
        assert!(Keypair::parse(SEED).unwrap().can_sign());
        assert!(!Keypair::parse(ADDRESS).unwrap().can_sign());
        assert!(Keypair::parse("XYZ").is_err());
    }

    #[test]
    fn address_is_rejected_as_seed() {
        assert!(Keypair::from_seed(ADDRESS).is_err());
    }

    #[test]
    fn checksum_is_crc16_xmodem() {
        assert_eq!(STRKEY_CHECKSUM.checksum(b"123456789"), 0x31c3);
    }

    #[test]
    fn non_base32_text_is_rejected() {
        let lower = ADDRESS.to_lowercase();
        assert!(matches!(decode_address(&lower), Err(McError::InvalidKey(_))));
        assert!(matches!(decode_address("G1"), Err(McError::InvalidKey(_))));
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let mut chars: Vec<char> = ADDRESS.chars().collect();
        chars[10] = if chars[10] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        assert!(Keypair::from_address(&tampered).is_err());
    }

    #[test]
    fn signature_verifies_against_address() {
        let signer = Keypair::random().unwrap();
        let verifier = Keypair::from_address(&signer.address()).unwrap();
        let sig = signer.sign(b"payload").unwrap();
        assert!(verifier.verify(b"payload", &sig).is_ok());
        assert!(verifier.verify(b"other", &sig).is_err());
    }

    #[test]
    fn address_only_keypair_cannot_sign() {
        let kp = Keypair::from_address(ADDRESS).unwrap();
        assert!(matches!(kp.sign(b"x"), Err(McError::Signing(_))));
    }
}
