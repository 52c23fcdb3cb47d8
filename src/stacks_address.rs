//! Stacks address parsing and the 32-byte recipient encoding.
//!
//! Stacks addresses are c32check strings: a leading `S`, one alphabet
//! character carrying the version byte, then the c32 encoding of the
//! 20-byte hash160 followed by a 4-byte double-SHA-256 checksum.
//!
//! xReserve's `depositToRemote` takes the recipient as `bytes32` with the
//! layout below. The version byte sits at offset 11 so the hash160
//! occupies the trailing 20 bytes:
//!
//! - Bytes 0-10: zero padding (11 bytes)
//! - Byte 11: address version
//! - Bytes 12-31: hash160 (20 bytes)

use alloy::primitives::FixedBytes;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Crockford-style alphabet used by c32; excludes I, L, O and U.
const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Address versions minted by Stacks networks.
const VERSION_MAINNET_P2PKH: u8 = 22;
const VERSION_MAINNET_P2SH: u8 = 20;
const VERSION_TESTNET_P2PKH: u8 = 26;
const VERSION_TESTNET_P2SH: u8 = 21;

const HASH160_LEN: usize = 20;
const CHECKSUM_LEN: usize = 4;

/// Offset of the version byte within the bytes32 recipient encoding.
const VERSION_OFFSET: usize = 11;
const HASH_OFFSET: usize = VERSION_OFFSET + 1;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Stacks address must start with 'S'")]
    MissingPrefix,
    #[error("Stacks address too short")]
    TooShort,
    #[error("invalid c32 character: {0:?}")]
    InvalidCharacter(char),
    #[error("unknown address version byte: {0}")]
    UnknownVersion(u8),
    #[error("expected 20-byte hash160, decoded {0} bytes")]
    InvalidPayloadLength(usize),
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("recipient bytes32 has non-zero padding")]
    NonZeroPadding,
}

/// A validated Stacks address. Construction goes through [`FromStr`] or
/// [`StacksAddress::decode`]; the stored text is the canonical c32check
/// rendering, so equality and round-trips are well defined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StacksAddress {
    text: String,
    version: u8,
    hash160: [u8; HASH160_LEN],
}

impl StacksAddress {
    /// Canonical c32check text, e.g. for API path segments.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn hash160(&self) -> &[u8; HASH160_LEN] {
        &self.hash160
    }

    /// True for testnet versions (`ST...`/`SN...` prefixes).
    pub fn is_testnet(&self) -> bool {
        matches!(self.version, VERSION_TESTNET_P2PKH | VERSION_TESTNET_P2SH)
    }

    /// Encodes the address into the bytes32 recipient layout consumed by
    /// xReserve.
    pub fn encode(&self) -> FixedBytes<32> {
        let mut out = [0u8; 32];
        out[VERSION_OFFSET] = self.version;
        out[HASH_OFFSET..].copy_from_slice(&self.hash160);
        FixedBytes::from(out)
    }

    /// Recovers an address from the bytes32 recipient layout. Rejects
    /// non-zero padding and unknown version bytes.
    pub fn decode(bytes: FixedBytes<32>) -> Result<Self, CodecError> {
        if bytes[..VERSION_OFFSET].iter().any(|byte| *byte != 0) {
            return Err(CodecError::NonZeroPadding);
        }

        let version = bytes[VERSION_OFFSET];
        validate_version(version)?;

        let mut hash160 = [0u8; HASH160_LEN];
        hash160.copy_from_slice(&bytes[HASH_OFFSET..]);

        Ok(Self {
            text: c32_address(version, &hash160),
            version,
            hash160,
        })
    }
}

impl FromStr for StacksAddress {
    type Err = CodecError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bytes = text.as_bytes();
        if bytes.len() < 2 + CHECKSUM_LEN {
            return Err(CodecError::TooShort);
        }
        if !bytes[0].eq_ignore_ascii_case(&b'S') {
            return Err(CodecError::MissingPrefix);
        }

        let version = c32_value(bytes[1])?;
        validate_version(version)?;

        let payload = c32_decode(&text[2..])?;
        if payload.len() != HASH160_LEN + CHECKSUM_LEN {
            return Err(CodecError::InvalidPayloadLength(
                payload.len().saturating_sub(CHECKSUM_LEN),
            ));
        }

        let (hash_bytes, sum) = payload.split_at(HASH160_LEN);
        if sum != checksum(version, hash_bytes) {
            return Err(CodecError::ChecksumMismatch);
        }

        let mut hash160 = [0u8; HASH160_LEN];
        hash160.copy_from_slice(hash_bytes);

        Ok(Self {
            text: c32_address(version, &hash160),
            version,
            hash160,
        })
    }
}

impl fmt::Display for StacksAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

fn validate_version(version: u8) -> Result<(), CodecError> {
    match version {
        VERSION_MAINNET_P2PKH | VERSION_MAINNET_P2SH | VERSION_TESTNET_P2PKH
        | VERSION_TESTNET_P2SH => Ok(()),
        other => Err(CodecError::UnknownVersion(other)),
    }
}

/// First four bytes of SHA-256(SHA-256(version ‖ data)).
fn checksum(version: u8, data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let inner = Sha256::new_with_prefix([version])
        .chain_update(data)
        .finalize();
    let outer = Sha256::digest(inner);

    let mut sum = [0u8; CHECKSUM_LEN];
    sum.copy_from_slice(&outer[..CHECKSUM_LEN]);
    sum
}

/// Maps one character to its c32 value, folding the usual confusables
/// (`O` reads as zero, `L` and `I` as one) and ignoring case.
fn c32_value(byte: u8) -> Result<u8, CodecError> {
    let normalized = match byte.to_ascii_uppercase() {
        b'O' => b'0',
        b'L' | b'I' => b'1',
        other => other,
    };

    C32_ALPHABET
        .iter()
        .position(|candidate| *candidate == normalized)
        .map(|position| position as u8)
        .ok_or(CodecError::InvalidCharacter(byte as char))
}

/// Decodes a c32 string into bytes, preserving leading zero bytes the way
/// the reference implementation does: strip the zero bytes produced by the
/// final partial group, then restore one per leading `0` digit.
fn c32_decode(input: &str) -> Result<Vec<u8>, CodecError> {
    let mut result: Vec<u8> = Vec::with_capacity(input.len() * 5 / 8 + 1);
    let mut carry: u16 = 0;
    let mut carry_bits: u32 = 0;

    for byte in input.bytes().rev() {
        carry |= u16::from(c32_value(byte)?) << carry_bits;
        carry_bits += 5;
        while carry_bits >= 8 {
            result.push((carry & 0xff) as u8);
            carry >>= 8;
            carry_bits -= 8;
        }
    }
    if carry_bits > 0 {
        result.push(carry as u8);
    }

    while result.last() == Some(&0) {
        result.pop();
    }
    for byte in input.bytes() {
        match c32_value(byte)? {
            0 => result.push(0),
            _ => break,
        }
    }

    result.reverse();
    Ok(result)
}

/// Encodes bytes as c32, the inverse of [`c32_decode`].
fn c32_encode(input: &[u8]) -> String {
    let mut result: Vec<u8> = Vec::with_capacity(input.len() * 8 / 5 + 1);
    let mut carry: u16 = 0;
    let mut carry_bits: u32 = 0;

    for byte in input.iter().rev() {
        carry |= u16::from(*byte) << carry_bits;
        carry_bits += 8;
        while carry_bits >= 5 {
            result.push(C32_ALPHABET[(carry & 0x1f) as usize]);
            carry >>= 5;
            carry_bits -= 5;
        }
    }
    if carry_bits > 0 {
        result.push(C32_ALPHABET[(carry & 0x1f) as usize]);
    }

    while result.last() == Some(&b'0') {
        result.pop();
    }
    for byte in input {
        match byte {
            0 => result.push(b'0'),
            _ => break,
        }
    }

    result.reverse();
    String::from_utf8(result).expect("c32 alphabet is ASCII")
}

/// Canonical c32check rendering of a version byte and hash160.
fn c32_address(version: u8, hash160: &[u8; HASH160_LEN]) -> String {
    let mut payload = Vec::with_capacity(HASH160_LEN + CHECKSUM_LEN);
    payload.extend_from_slice(hash160);
    payload.extend_from_slice(&checksum(version, hash160));

    format!(
        "S{}{}",
        C32_ALPHABET[version as usize] as char,
        c32_encode(&payload)
    )
}
