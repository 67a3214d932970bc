//! Contract ABI encoding for the handful of argument shapes the property
//! contract uses.

use crate::error::{LedgerError, Result};
use sha3::{Digest, Keccak256};

const WORD: usize = 32;

pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    Keccak256::digest(bytes).into()
}

/// First four bytes of the keccak hash of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Topic hash identifying an event signature.
pub fn event_topic(signature: &str) -> [u8; 32] {
    keccak256(signature.as_bytes())
}

/// A single call argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Uint(u128),
    String(&'a str),
}

/// Selector followed by the encoded arguments.
pub fn encode_call(signature: &str, tokens: &[Token<'_>]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend(encode(tokens));
    out
}

/// Head/tail encoding of a flat argument tuple.
pub fn encode(tokens: &[Token<'_>]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        match token {
            Token::Uint(value) => head.extend(uint_word(*value)),
            Token::String(text) => {
                head.extend(uint_word((head_len + tail.len()) as u128));
                tail.extend(uint_word(text.len() as u128));
                tail.extend_from_slice(text.as_bytes());
                let padding = (WORD - text.len() % WORD) % WORD;
                tail.extend(std::iter::repeat(0u8).take(padding));
            }
        }
    }

    head.extend(tail);
    head
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Read a 32-byte word as a `u64`, rejecting values that do not fit.
pub fn word_to_u64(word: &[u8]) -> Result<u64> {
    if word.len() != WORD {
        return Err(LedgerError::decode(format!(
            "expected a {WORD}-byte word, got {} bytes",
            word.len()
        )));
    }
    if word[..24].iter().any(|b| *b != 0) {
        return Err(LedgerError::decode("integer does not fit in 64 bits"));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(bytes))
}

/// Decode the first return word as an unsigned integer.
pub fn decode_uint(data: &[u8]) -> Result<u64> {
    let word = data
        .get(..WORD)
        .ok_or_else(|| LedgerError::decode(format!("return data too short: {} bytes", data.len())))?;
    word_to_u64(word)
}

/// Decode the first return word as a boolean.
pub fn decode_bool(data: &[u8]) -> Result<bool> {
    match decode_uint(data)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(LedgerError::decode(format!("invalid boolean word: {other}"))),
    }
}
