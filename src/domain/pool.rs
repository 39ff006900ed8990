use serde::{Deserialize, Serialize};

use super::entry::Entry;

/// Denomination-specific mixing cohort
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pool {
    pub pool_id: String,
    pub denomination_sats: u64,
    /// Smallest input value the pool accepts (denomination + fees)
    pub min_input_sats: u64,
    pub max_input_sats: u64,
}

impl Pool {
    pub fn new(
        pool_id: impl Into<String>,
        denomination_sats: u64,
        min_input_sats: u64,
        max_input_sats: u64,
    ) -> Self {
        Self {
            pool_id: pool_id.into(),
            denomination_sats,
            min_input_sats,
            max_input_sats,
        }
    }

    pub fn accepts(&self, value_sats: u64) -> bool {
        value_sats >= self.min_input_sats && value_sats <= self.max_input_sats
    }
}

/// Source of pools an entry may join
#[cfg_attr(test, mockall::automock)]
pub trait PoolCatalog: Send + Sync {
    /// Eligible pools for the entry, largest denomination first
    fn find_eligible_pools(&self, entry: &Entry) -> Vec<Pool>;
}

/// Fixed in-memory pool list
#[derive(Debug, Clone, Default)]
pub struct StaticPoolCatalog {
    pools: Vec<Pool>,
}

impl StaticPoolCatalog {
    pub fn new(mut pools: Vec<Pool>) -> Self {
        pools.sort_by(|a, b| {
            b.denomination_sats
                .cmp(&a.denomination_sats)
                .then_with(|| a.pool_id.cmp(&b.pool_id))
        });
        Self { pools }
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }
}

impl PoolCatalog for StaticPoolCatalog {
    fn find_eligible_pools(&self, entry: &Entry) -> Vec<Pool> {
        self.pools
            .iter()
            .filter(|p| p.accepts(entry.value_sats()))
            .cloned()
            .collect()
    }
}
