//! SMT proof generation and verification

use serde::{Deserialize, Serialize};

use crate::{hasher::Keccak256Hasher, Hash};

/// SMT inclusion proof
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtProof {
    /// The key being proven
    pub key: u64,
    /// The leaf hash at the key (nil leaf for absent keys)
    pub leaf: Hash,
    /// Sibling hashes from leaf to root, one per level
    pub siblings: Vec<Hash>,
}

impl SmtProof {
    /// Verify this proof against a root hash
    pub fn verify(&self, root: &Hash) -> bool {
        if self.siblings.is_empty() || self.siblings.len() > 64 {
            return false;
        }
        if self.siblings.len() < 64 && self.key >> self.siblings.len() != 0 {
            return false;
        }
        self.compute_root() == *root
    }

    /// Compute root from proof
    pub fn compute_root(&self) -> Hash {
        let mut current = self.leaf;
        let mut index = self.key;

        for sibling in &self.siblings {
            current = if index & 1 == 1 {
                Keccak256Hasher::hash_pair(sibling, &current)
            } else {
                Keccak256Hasher::hash_pair(&current, sibling)
            };
            index >>= 1;
        }

        current
    }
}
