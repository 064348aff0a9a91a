//! Keccak256 hasher for SMT nodes

use tiny_keccak::{Hasher, Keccak};

use crate::Hash;

/// Keccak256 hasher
#[derive(Debug, Clone, Copy, Default)]
pub struct Keccak256Hasher;

impl Keccak256Hasher {
    /// Hash two child nodes into their parent
    pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
        let mut hasher = Keccak::v256();
        hasher.update(left);
        hasher.update(right);
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output
    }

    /// Hash a single value
    pub fn hash(data: &[u8]) -> Hash {
        let mut hasher = Keccak::v256();
        hasher.update(data);
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output
    }

    /// Hash the concatenation of several byte slices
    pub fn hash_parts(parts: &[&[u8]]) -> Hash {
        let mut hasher = Keccak::v256();
        for part in parts {
            hasher.update(part);
        }
        let mut output = [0u8; 32];
        hasher.finalize(&mut output);
        output
    }

    /// Nil hashes for every depth of a tree of `height`, indexed by depth
    /// (`0` is the root, `height` is the leaf level).
    pub fn nil_hashes(height: u8, nil_leaf: Hash) -> Vec<Hash> {
        let mut hashes = vec![nil_leaf; height as usize + 1];
        for depth in (0..height as usize).rev() {
            hashes[depth] = Self::hash_pair(&hashes[depth + 1], &hashes[depth + 1]);
        }
        hashes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EMPTY_HASH;

    #[test]
    fn test_hash_pair() {
        let left = [1u8; 32];
        let right = [2u8; 32];
        let hash = Keccak256Hasher::hash_pair(&left, &right);
        assert_ne!(hash, [0u8; 32]);
        assert_ne!(hash, Keccak256Hasher::hash_pair(&right, &left));
    }

    #[test]
    fn test_empty_input_matches_nil_leaf() {
        assert_eq!(Keccak256Hasher::hash(&[]), EMPTY_HASH);
        assert_eq!(Keccak256Hasher::hash_parts(&[]), EMPTY_HASH);
    }

    #[test]
    fn test_hash_parts_is_concatenation() {
        let joined = Keccak256Hasher::hash(b"abcdef");
        assert_eq!(Keccak256Hasher::hash_parts(&[b"ab".as_slice(), b"cd".as_slice(), b"ef".as_slice()]), joined);
    }

    #[test]
    fn test_nil_hashes_chain() {
        let nil = Keccak256Hasher::nil_hashes(3, EMPTY_HASH);
        assert_eq!(nil.len(), 4);
        assert_eq!(nil[3], EMPTY_HASH);
        assert_eq!(nil[2], Keccak256Hasher::hash_pair(&EMPTY_HASH, &EMPTY_HASH));
        assert_eq!(nil[0], Keccak256Hasher::hash_pair(&nil[1], &nil[1]));
    }
}
