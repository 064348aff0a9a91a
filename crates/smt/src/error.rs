//! SMT error types

use thiserror::Error;

use crate::Version;

/// Errors raised by the tree and its node store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SmtError {
    /// Tree height outside `1..=64`
    #[error("invalid tree height {0}")]
    InvalidHeight(u8),

    /// Leaf key does not fit in the tree
    #[error("key {key} out of range for height {height}")]
    KeyOutOfRange {
        /// Offending key
        key: u64,
        /// Tree height
        height: u8,
    },

    /// Version was never committed
    #[error("version {0} not found")]
    VersionNotFound(u64),

    /// Version fell out of the retained window and was garbage collected
    #[error("version {requested} pruned, oldest retained is {oldest}")]
    VersionPruned {
        /// Requested version
        requested: Version,
        /// Oldest version still queryable
        oldest: Version,
    },

    /// A node write went back in time
    #[error("node write at version {attempted} after version {latest}")]
    VersionConflict {
        /// Version of the rejected write
        attempted: Version,
        /// Latest version already recorded for the node
        latest: Version,
    },

    /// Backing store failure
    #[error("node store error: {0}")]
    Store(String),
}
