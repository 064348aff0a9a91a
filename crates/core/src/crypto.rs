//! Hashing and signatures
//!
//! Messages are hashed with Keccak-256 and signed with ECDSA over secp256k1.
//! Public keys travel as 64-byte hex (x then y), signatures as 64-byte hex
//! (r then s).

use k256::{
    ecdsa::{
        signature::hazmat::{PrehashSigner, PrehashVerifier},
        Signature, SigningKey, VerifyingKey,
    },
    elliptic_curve::sec1::ToEncodedPoint,
};
use l2state_smt::Keccak256Hasher;

use crate::{constants::FIELD_SIZE, error::EncodingError, types::Hash};

/// Keccak-256 of `data`
pub fn keccak256(data: &[u8]) -> Hash {
    Keccak256Hasher::hash(data)
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

/// Account public key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey {
    key: VerifyingKey,
}

impl PublicKey {
    /// Parse the hex form, optionally `0x`-prefixed
    pub fn from_hex(s: &str) -> Result<Self, EncodingError> {
        let raw = hex::decode(strip_hex_prefix(s)).map_err(|_| EncodingError::InvalidPublicKey)?;
        if raw.len() != 2 * FIELD_SIZE {
            return Err(EncodingError::InvalidPublicKey);
        }
        let mut sec1 = Vec::with_capacity(1 + raw.len());
        sec1.push(0x04);
        sec1.extend_from_slice(&raw);
        let key = VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| EncodingError::InvalidPublicKey)?;
        Ok(Self { key })
    }

    /// Affine coordinates, each a big-endian field element
    pub fn coordinates(&self) -> ([u8; FIELD_SIZE], [u8; FIELD_SIZE]) {
        let point = self.key.as_affine().to_encoded_point(false);
        let mut x = [0u8; FIELD_SIZE];
        let mut y = [0u8; FIELD_SIZE];
        if let (Some(px), Some(py)) = (point.x(), point.y()) {
            x.copy_from_slice(px);
            y.copy_from_slice(py);
        }
        (x, y)
    }

    /// Hex form without prefix
    pub fn to_hex(&self) -> String {
        let (x, y) = self.coordinates();
        format!("{}{}", hex::encode(x), hex::encode(y))
    }

    /// Check `signature` over an already hashed message
    pub fn verify(&self, msg_hash: &Hash, signature: &str) -> bool {
        let Ok(raw) = hex::decode(strip_hex_prefix(signature)) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&raw) else {
            return false;
        };
        self.key.verify_prehash(msg_hash, &signature).is_ok()
    }
}

/// Client-side signer producing signatures [`PublicKey::verify`] accepts
#[derive(Clone, Debug)]
pub struct TxSigner {
    key: SigningKey,
}

impl TxSigner {
    /// Signer from a 32-byte secret scalar
    pub fn from_bytes(secret: [u8; 32]) -> Result<Self, EncodingError> {
        let key = SigningKey::from_bytes((&secret).into()).map_err(|_| EncodingError::InvalidPublicKey)?;
        Ok(Self { key })
    }

    /// Matching public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey { key: *self.key.verifying_key() }
    }

    /// Sign a message hash, returning `0x`-prefixed hex
    pub fn sign(&self, msg_hash: &Hash) -> Result<String, EncodingError> {
        let signature: Signature =
            self.key.sign_prehash(msg_hash).map_err(|_| EncodingError::InvalidPublicKey)?;
        Ok(format!("0x{}", hex::encode(signature.to_bytes())))
    }
}
