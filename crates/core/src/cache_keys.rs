//! Keys of the shared read cache
//!
//! Every key lives in one [`CacheRegion`]; the rendered form is
//! `<region>:<id>`, so keys of different regions never collide.

use std::fmt;

use crate::types::{AccountIndex, AssetId};

/// Namespace of a cache key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheRegion {
    AccountByIndex,
    AccountByName,
    AssetById,
    AssetBySymbol,
    AssetList,
}

impl CacheRegion {
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::AccountByIndex => "cache:account_index",
            Self::AccountByName => "cache:account_name",
            Self::AssetById => "cache:asset_id",
            Self::AssetBySymbol => "cache:asset_symbol",
            Self::AssetList => "cache:asset_list",
        }
    }
}

/// Typed cache key
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    region: CacheRegion,
    id: String,
}

impl CacheKey {
    pub fn account(index: AccountIndex) -> Self {
        Self { region: CacheRegion::AccountByIndex, id: index.to_string() }
    }

    pub fn account_by_name(name: &str) -> Self {
        Self { region: CacheRegion::AccountByName, id: name.to_string() }
    }

    pub fn asset_by_id(asset_id: AssetId) -> Self {
        Self { region: CacheRegion::AssetById, id: asset_id.to_string() }
    }

    pub fn asset_by_symbol(symbol: &str) -> Self {
        Self { region: CacheRegion::AssetBySymbol, id: symbol.to_string() }
    }

    /// The single key holding the full asset list
    pub fn asset_list() -> Self {
        Self { region: CacheRegion::AssetList, id: String::new() }
    }

    pub fn region(&self) -> CacheRegion {
        self.region
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id.is_empty() {
            f.write_str(self.region.prefix())
        } else {
            write!(f, "{}:{}", self.region.prefix(), self.id)
        }
    }
}
