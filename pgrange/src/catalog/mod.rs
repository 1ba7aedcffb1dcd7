//! In-memory catalog of shards, sharding rules and key ranges.

pub mod disk;
pub mod error;
pub mod key_range;
pub mod memory;
pub mod store;

pub use disk::DiskStore;
pub use error::Error;
pub use key_range::{cmp_bounds, KeyRange, LockState};
pub use memory::MemoryStore;
pub use store::{KeyRangeEvent, KeyRangeStore};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use std::collections::{HashMap, HashSet};

use crate::config::Shard;

/// Columns forming the sharding key. Exactly one column
/// per rule is supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingRule {
    columns: Vec<String>,
}

impl ShardingRule {
    pub fn new(column: impl ToString) -> Self {
        Self {
            columns: vec![column.to_string()],
        }
    }

    pub fn with_columns(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The single sharding column. Valid only after the catalog
    /// accepted the rule.
    pub fn column(&self) -> &str {
        &self.columns[0]
    }
}

#[derive(Default)]
struct Inner {
    data_shards: HashMap<String, Shard>,
    world_shards: HashMap<String, Shard>,
    rules: Vec<ShardingRule>,
    column_mapping: HashSet<String>,
    local_tables: HashSet<String>,
    ranges: HashMap<String, KeyRange>,
}

/// Read-mostly view of the sharding layout. Mutators are admin
/// commands, readers are router lookups; each call observes a
/// consistent view behind the lock.
#[derive(Default)]
pub struct Catalog {
    inner: RwLock<Inner>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a data shard. Registering the same name again
    /// updates the endpoint config.
    pub fn add_data_shard(&self, name: &str, config: Shard) {
        info!("adding data shard {}", name);
        self.inner.write().data_shards.insert(name.into(), config);
    }

    /// Register a world shard, used as routing fallback.
    pub fn add_world_shard(&self, name: &str, config: Shard) {
        info!("adding world shard {}", name);
        self.inner.write().world_shards.insert(name.into(), config);
    }

    /// Record a sharding rule and index its column.
    pub fn add_sharding_rule(&self, rule: ShardingRule) -> Result<(), Error> {
        if rule.columns().len() != 1 {
            return Err(Error::InvalidRule);
        }

        let mut inner = self.inner.write();
        inner.column_mapping.insert(rule.column().into());
        inner.rules.push(rule);

        Ok(())
    }

    /// Mark a table as local: statements over it bypass routing.
    pub fn add_local_table(&self, table: &str) {
        self.inner.write().local_tables.insert(table.into());
    }

    /// Insert a key range.
    pub fn add_key_range(&self, kr: KeyRange) -> Result<(), Error> {
        let mut inner = self.inner.write();

        if inner.ranges.contains_key(&kr.id) {
            return Err(Error::AlreadyExists(kr.id));
        }

        if !inner.data_shards.contains_key(&kr.shard) {
            return Err(Error::UnknownShard(kr.shard));
        }

        if let Some(other) = inner.ranges.values().find(|other| other.overlaps(&kr)) {
            return Err(Error::Overlap(kr.id, other.id.clone()));
        }

        inner.ranges.insert(kr.id.clone(), kr);
        Ok(())
    }

    /// Insert or replace a key range. Used by split and unite,
    /// which maintain the disjointness invariant themselves.
    pub fn upsert_range(&self, kr: KeyRange) {
        self.inner.write().ranges.insert(kr.id.clone(), kr);
    }

    /// Remove a key range.
    pub fn remove_range(&self, id: &str) {
        self.inner.write().ranges.remove(id);
    }

    /// Key range by id.
    pub fn range(&self, id: &str) -> Option<KeyRange> {
        self.inner.read().ranges.get(id).cloned()
    }

    /// Snapshot of all key ranges.
    pub fn key_ranges(&self) -> Vec<KeyRange> {
        self.inner.read().ranges.values().cloned().collect()
    }

    /// Key range containing the sharding key value. Locked
    /// ranges still match; the caller downgrades them to
    /// read-only via the store.
    pub fn match_range(&self, key: &[u8]) -> Option<KeyRange> {
        self.inner
            .read()
            .ranges
            .values()
            .find(|kr| kr.contains(key))
            .cloned()
    }

    /// The column is part of a sharding rule.
    pub fn has_sharding_column(&self, column: &str) -> bool {
        self.inner.read().column_mapping.contains(column)
    }

    /// Position of the first sharding column in the list, if any.
    pub fn sharding_column_position(&self, columns: &[String]) -> Option<usize> {
        let inner = self.inner.read();
        columns
            .iter()
            .position(|column| inner.column_mapping.contains(column))
    }

    pub fn is_local_table(&self, table: &str) -> bool {
        self.inner.read().local_tables.contains(table)
    }

    pub fn rules(&self) -> Vec<ShardingRule> {
        self.inner.read().rules.clone()
    }

    /// Registered data shard names, in stable order.
    pub fn data_shard_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.read().data_shards.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered world shard names, in stable order.
    pub fn world_shard_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.read().world_shards.keys().cloned().collect();
        names.sort();
        names
    }

    /// Endpoint config of a shard, data or world.
    pub fn shard_config(&self, name: &str) -> Option<Shard> {
        let inner = self.inner.read();
        inner
            .data_shards
            .get(name)
            .or_else(|| inner.world_shards.get(name))
            .cloned()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::ShardRole;

    fn shard(name: &str) -> Shard {
        Shard {
            name: name.into(),
            host: "127.0.0.1".into(),
            port: 5432,
            user: "postgres".into(),
            password: String::new(),
            database: "postgres".into(),
            role: ShardRole::Data,
        }
    }

    #[test]
    fn test_add_data_shard_idempotent() {
        let catalog = Catalog::new();
        catalog.add_data_shard("shard1", shard("shard1"));

        let mut updated = shard("shard1");
        updated.port = 5433;
        catalog.add_data_shard("shard1", updated);

        assert_eq!(catalog.data_shard_names(), vec!["shard1".to_string()]);
        assert_eq!(catalog.shard_config("shard1").unwrap().port, 5433);
    }

    #[test]
    fn test_rule_validation() {
        let catalog = Catalog::new();

        catalog
            .add_sharding_rule(ShardingRule::new("user_id"))
            .unwrap();
        assert!(catalog.has_sharding_column("user_id"));

        let err = catalog
            .add_sharding_rule(ShardingRule::with_columns(vec![
                "a".into(),
                "b".into(),
            ]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRule));

        let err = catalog
            .add_sharding_rule(ShardingRule::with_columns(vec![]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRule));
    }

    #[test]
    fn test_key_range_invariants() {
        let catalog = Catalog::new();
        catalog.add_data_shard("shard1", shard("shard1"));

        catalog
            .add_key_range(KeyRange::new("k1", "00", "50", "shard1"))
            .unwrap();

        let err = catalog
            .add_key_range(KeyRange::new("k1", "50", "99", "shard1"))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        let err = catalog
            .add_key_range(KeyRange::new("k2", "50", "99", "nope"))
            .unwrap_err();
        assert!(matches!(err, Error::UnknownShard(_)));

        let err = catalog
            .add_key_range(KeyRange::new("k2", "40", "99", "shard1"))
            .unwrap_err();
        assert!(matches!(err, Error::Overlap(_, _)));

        catalog
            .add_key_range(KeyRange::new("k2", "50", "99", "shard1"))
            .unwrap();
        assert_eq!(catalog.key_ranges().len(), 2);
    }

    #[test]
    fn test_match_range() {
        let catalog = Catalog::new();
        catalog.add_data_shard("shard1", shard("shard1"));
        catalog
            .add_key_range(KeyRange::new("k1", "00", "50", "shard1"))
            .unwrap();

        assert_eq!(catalog.match_range(b"10").unwrap().id, "k1");
        assert!(catalog.match_range(b"99").is_none());
    }
}
