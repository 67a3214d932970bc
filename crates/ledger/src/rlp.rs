//! Recursive-length-prefix encoding, limited to what transaction signing needs.

const SHORT_STRING: u8 = 0x80;
const SHORT_LIST: u8 = 0xc0;
const SHORT_LIMIT: usize = 55;

/// Encode a byte string.
pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() == 1 && bytes[0] < SHORT_STRING {
        return vec![bytes[0]];
    }
    let mut out = encode_length(bytes.len(), SHORT_STRING);
    out.extend_from_slice(bytes);
    out
}

/// Encode an unsigned integer as its minimal big-endian byte string.
pub fn encode_uint(value: u128) -> Vec<u8> {
    encode_bytes(&trim_leading_zeros(&value.to_be_bytes()))
}

/// Encode a big-endian integer given as raw bytes (e.g. a signature scalar).
pub fn encode_uint_bytes(be: &[u8]) -> Vec<u8> {
    encode_bytes(&trim_leading_zeros(be))
}

/// Wrap already-encoded items into a list.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_len = items.iter().map(Vec::len).sum();
    let mut out = encode_length(payload_len, SHORT_LIST);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

fn encode_length(len: usize, offset: u8) -> Vec<u8> {
    if len <= SHORT_LIMIT {
        return vec![offset + len as u8];
    }
    let len_bytes = trim_leading_zeros(&(len as u64).to_be_bytes());
    let mut out = Vec::with_capacity(1 + len_bytes.len() + len);
    out.push(offset + SHORT_LIMIT as u8 + len_bytes.len() as u8);
    out.extend_from_slice(&len_bytes);
    out
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}
