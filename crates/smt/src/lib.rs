//! Sparse Merkle Tree (SMT) implementation for l2state
//!
//! This crate provides a fixed-height, versioned SMT for account and asset
//! state commitment.
//! Key features:
//! - Fixed height: leaf key is the account index or asset id
//! - Versioned nodes: historical roots and leaves stay queryable
//! - Bounded history: superseded nodes are garbage collected past a threshold

mod error;
mod hasher;
mod proof;
mod store;
mod tree;

pub use error::SmtError;
pub use hasher::Keccak256Hasher;
pub use proof::SmtProof;
pub use store::{MemoryNodeStore, NamespacedNodeStore, NodeKey, NodeStore, SharedMemoryNodeStore};
pub use tree::{SparseMerkleTree, TreeOptions};

/// 32-byte hash type
pub type Hash = [u8; 32];

/// Committed tree version
pub type Version = u64;

/// Nil leaf hash (keccak256 of empty bytes)
pub const EMPTY_HASH: Hash = [
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c,
    0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b,
    0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
];

/// Format a hash as `0x`-prefixed hex
pub fn format_hash_hex(hash: &Hash) -> String {
    format!("0x{}", hex::encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tree() {
        let tree = SparseMerkleTree::new(16).unwrap();
        assert_eq!(tree.root().unwrap(), tree.nil_root());
        assert_eq!(tree.nil_leaf(), EMPTY_HASH);
        assert_eq!(tree.version(), 0);
    }

    #[test]
    fn test_insert_and_proof() {
        let mut tree = SparseMerkleTree::new(32).unwrap();

        let key = 1u64;
        let value = [2u8; 32];

        tree.set(key, value).unwrap();

        let proof = tree.prove(key).unwrap();
        assert!(proof.verify(&tree.root().unwrap()));
    }

    #[test]
    fn test_format_hash_hex() {
        assert_eq!(format_hash_hex(&[0u8; 32]), format!("0x{}", "00".repeat(32)));
    }
}
