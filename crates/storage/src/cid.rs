//! Local content identifier derivation.

use deedchain_types::ContentId;
use sha2::{Digest, Sha256};

/// Multihash code for sha2-256.
const SHA2_256: u8 = 0x12;
/// Digest length in bytes.
const SHA2_256_LEN: u8 = 0x20;

/// CIDv0-style identifier (`Qm...`): base58btc of the sha2-256 multihash of
/// `bytes`.
pub fn content_id_for(bytes: &[u8]) -> ContentId {
    let digest = Sha256::digest(bytes);
    let mut multihash = Vec::with_capacity(34);
    multihash.push(SHA2_256);
    multihash.push(SHA2_256_LEN);
    multihash.extend_from_slice(&digest);
    ContentId::new(bs58::encode(multihash).into_string())
        .expect("base58 output is never empty")
}
