//! Disk-backed key range store.
//!
//! State is persisted as a JSON snapshot rewritten after every
//! committed mutation, so the catalog survives a process restart.
//! Advisory lock state is process-local and not persisted.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use std::fs;
use std::path::{Path, PathBuf};

use super::memory::MemoryStore;
use super::store::{KeyRangeEvent, KeyRangeStore};
use super::{Error, KeyRange, LockState, ShardingRule};

#[derive(Debug, Serialize, Deserialize, Default)]
struct Snapshot {
    key_ranges: Vec<KeyRange>,
    rules: Vec<ShardingRule>,
}

/// Store with JSON snapshot persistence. Mutations between
/// `begin` and `commit` are persisted once, at commit.
pub struct DiskStore {
    memory: MemoryStore,
    path: PathBuf,
    batching: Mutex<bool>,
}

impl DiskStore {
    /// Open the store, loading the snapshot if one exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_owned();
        let memory = MemoryStore::new();

        if path.exists() {
            let data = fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&data)?;
            debug!(
                "loaded {} key ranges, {} rules from {}",
                snapshot.key_ranges.len(),
                snapshot.rules.len(),
                path.display()
            );
            memory.restore(snapshot.key_ranges, snapshot.rules);
        }

        Ok(Self {
            memory,
            path,
            batching: Mutex::new(false),
        })
    }

    fn persist(&self) -> Result<(), Error> {
        if *self.batching.lock() {
            return Ok(());
        }
        self.flush()
    }

    fn flush(&self) -> Result<(), Error> {
        let (key_ranges, rules) = self.memory.persistable();
        let snapshot = Snapshot { key_ranges, rules };
        let data = serde_json::to_string_pretty(&snapshot)?;

        // Write-then-rename keeps the snapshot whole if we crash
        // mid-write.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

impl KeyRangeStore for DiskStore {
    fn add_key_range(&self, kr: KeyRange) -> Result<(), Error> {
        self.memory.add_key_range(kr)?;
        self.persist()
    }

    fn update_key_range(&self, kr: KeyRange) -> Result<(), Error> {
        self.memory.update_key_range(kr)?;
        self.persist()
    }

    fn drop_key_range(&self, id: &str) -> Result<(), Error> {
        self.memory.drop_key_range(id)?;
        self.persist()
    }

    fn key_ranges(&self) -> Result<Vec<KeyRange>, Error> {
        self.memory.key_ranges()
    }

    fn lock(&self, id: &str) -> Result<KeyRange, Error> {
        self.memory.lock(id)
    }

    fn unlock(&self, id: &str) -> Result<(), Error> {
        self.memory.unlock(id)
    }

    fn check(&self, kr: &KeyRange) -> bool {
        self.memory.check(kr)
    }

    fn begin(&self) -> Result<(), Error> {
        *self.batching.lock() = true;
        Ok(())
    }

    fn commit(&self) -> Result<(), Error> {
        *self.batching.lock() = false;
        self.flush()
    }

    fn rollback(&self) -> Result<(), Error> {
        // Mutations are already visible in memory; the envelope
        // only batches persistence. Flush what we have.
        *self.batching.lock() = false;
        self.flush()
    }

    fn watch(
        &self,
        id: &str,
        state: LockState,
        sink: UnboundedSender<KeyRangeEvent>,
    ) -> Result<(), Error> {
        self.memory.watch(id, state, sink)
    }

    fn add_sharding_rule(&self, rule: ShardingRule) -> Result<(), Error> {
        self.memory.add_sharding_rule(rule)?;
        self.persist()
    }

    fn sharding_rules(&self) -> Result<Vec<ShardingRule>, Error> {
        self.memory.sharding_rules()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reload() {
        let dir = std::env::temp_dir().join("pgrange_disk_store_test");
        let _ = fs::create_dir_all(&dir);
        let path = dir.join("catalog.json");
        let _ = fs::remove_file(&path);

        {
            let store = DiskStore::open(&path).unwrap();
            store
                .add_key_range(KeyRange::new("k1", "00", "50", "shard1"))
                .unwrap();
            store
                .add_sharding_rule(ShardingRule::new("user_id"))
                .unwrap();
        }

        let store = DiskStore::open(&path).unwrap();
        let ranges = store.key_ranges().unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].id, "k1");
        assert_eq!(store.sharding_rules().unwrap().len(), 1);

        // Locks are process-local and never persisted.
        assert!(store.check(&ranges[0]));

        let _ = fs::remove_file(&path);
    }
}
