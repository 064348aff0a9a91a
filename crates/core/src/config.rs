//! Configuration

use serde::{Deserialize, Serialize};
use std::env;

use l2state_smt::TreeOptions;

use crate::types::AccountIndex;

/// Core configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoreConfig {
    /// Asset trees kept in memory at once
    pub asset_tree_cache_size: usize,
    /// Superseded tree nodes tolerated before garbage collection
    pub tree_gc_threshold: usize,
    /// Committed tree versions kept queryable
    pub tree_retained_versions: u64,
    /// Account collecting gas fees
    pub gas_account_index: AccountIndex,
    /// Highest account index the asset tree cache accepts
    pub max_account_index: AccountIndex,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            asset_tree_cache_size: 2048,
            tree_gc_threshold: 1024 * 10,
            tree_retained_versions: 128,
            gas_account_index: 1,
            max_account_index: i64::from(u32::MAX),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl CoreConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            asset_tree_cache_size: parse_env("ASSET_TREE_CACHE_SIZE", defaults.asset_tree_cache_size),
            tree_gc_threshold: parse_env("TREE_GC_THRESHOLD", defaults.tree_gc_threshold),
            tree_retained_versions: parse_env(
                "TREE_RETAINED_VERSIONS",
                defaults.tree_retained_versions,
            ),
            gas_account_index: parse_env("GAS_ACCOUNT_INDEX", defaults.gas_account_index),
            max_account_index: parse_env("MAX_ACCOUNT_INDEX", defaults.max_account_index),
        }
    }

    /// Tree options for asset and account trees
    pub fn tree_options(&self) -> TreeOptions {
        TreeOptions {
            gc_threshold: self.tree_gc_threshold,
            retained_versions: self.tree_retained_versions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.tree_options(), TreeOptions::default());
        assert_eq!(config.max_account_index, 4_294_967_295);
    }

    #[test]
    fn test_from_env() {
        // SAFETY: no other test reads or writes these variables
        unsafe {
            env::set_var("ASSET_TREE_CACHE_SIZE", "16");
            env::set_var("TREE_RETAINED_VERSIONS", "not a number");
        }
        let config = CoreConfig::from_env();
        unsafe {
            env::remove_var("ASSET_TREE_CACHE_SIZE");
            env::remove_var("TREE_RETAINED_VERSIONS");
        }

        assert_eq!(config.asset_tree_cache_size, 16);
        assert_eq!(config.tree_retained_versions, 128);
    }

    #[test]
    fn test_json_round_trip() {
        let config = CoreConfig { gas_account_index: 3, ..CoreConfig::default() };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(serde_json::from_str::<CoreConfig>(&json).unwrap(), config);
    }
}
