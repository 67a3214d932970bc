//! Funding account key and legacy (EIP-155) transaction signing.

use crate::abi::keccak256;
use crate::error::{LedgerError, Result};
use crate::rlp;
use deedchain_types::{Address, Wei};
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use std::fmt;

/// Unsigned legacy transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: Wei,
    pub gas_limit: u64,
    pub to: Address,
    pub value: Wei,
    pub data: Vec<u8>,
}

impl LegacyTransaction {
    fn base_fields(&self) -> Vec<Vec<u8>> {
        vec![
            rlp::encode_uint(self.nonce as u128),
            rlp::encode_uint(self.gas_price.wei()),
            rlp::encode_uint(self.gas_limit as u128),
            rlp::encode_bytes(self.to.as_bytes()),
            rlp::encode_uint(self.value.wei()),
            rlp::encode_bytes(&self.data),
        ]
    }

    /// RLP of the nine-field pre-image `[..fields, chainId, 0, 0]`.
    pub fn signing_payload(&self, chain_id: u64) -> Vec<u8> {
        let mut fields = self.base_fields();
        fields.push(rlp::encode_uint(chain_id as u128));
        fields.push(rlp::encode_uint(0));
        fields.push(rlp::encode_uint(0));
        rlp::encode_list(&fields)
    }

    pub fn signing_hash(&self, chain_id: u64) -> [u8; 32] {
        keccak256(&self.signing_payload(chain_id))
    }
}

/// Local secp256k1 key for the funding account.
pub struct LocalSigner {
    secp: Secp256k1<All>,
    secret: SecretKey,
    address: Address,
}

impl LocalSigner {
    /// Parse a hex private key, with or without the `0x` prefix.
    pub fn from_hex(key: &str) -> Result<Self> {
        let digits = key.trim().trim_start_matches("0x");
        let bytes = hex::decode(digits)
            .map_err(|_| LedgerError::Signer("private key is not valid hex".to_string()))?;
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|err| LedgerError::Signer(format!("invalid private key: {err}")))?;
        Ok(Self::from_secret(secret))
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public = PublicKey::from_secret_key(&secp, &secret);
        let uncompressed = public.serialize_uncompressed();
        let hash = keccak256(&uncompressed[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..]);
        Self {
            secp,
            secret,
            address: Address(address),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign `tx` for `chain_id` and return the raw transaction bytes.
    pub fn sign_legacy(&self, tx: &LegacyTransaction, chain_id: u64) -> Result<Vec<u8>> {
        let hash = tx.signing_hash(chain_id);
        let message = Message::from_digest_slice(&hash)
            .map_err(|err| LedgerError::Signer(format!("invalid signing digest: {err}")))?;
        let signature = self.secp.sign_ecdsa_recoverable(&message, &self.secret);
        let (recovery_id, compact) = signature.serialize_compact();

        let v = chain_id
            .checked_mul(2)
            .and_then(|doubled| doubled.checked_add(35 + recovery_id.to_i32() as u64))
            .ok_or_else(|| LedgerError::Signer(format!("chain id {chain_id} is out of range")))?;

        let mut fields = tx.base_fields();
        fields.push(rlp::encode_uint(v as u128));
        fields.push(rlp::encode_uint_bytes(&compact[..32]));
        fields.push(rlp::encode_uint_bytes(&compact[32..]));
        Ok(rlp::encode_list(&fields))
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .field("secret", &"<redacted>")
            .finish()
    }
}
