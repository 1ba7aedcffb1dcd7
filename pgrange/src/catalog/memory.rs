//! In-memory key range store.

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use std::collections::HashMap;

use super::store::{KeyRangeEvent, KeyRangeStore};
use super::{Error, KeyRange, LockState, ShardingRule};

#[derive(Debug, Clone)]
struct Entry {
    kr: KeyRange,
    locked: bool,
}

#[derive(Default)]
struct Inner {
    ranges: HashMap<String, Entry>,
    rules: Vec<ShardingRule>,
    watchers: Vec<(String, LockState, UnboundedSender<KeyRangeEvent>)>,
}

impl Inner {
    /// Deliver one-shot notifications matching the transition.
    /// Called with the mutation already applied, so readers
    /// observing after the notification see the new state.
    fn notify(&mut self, id: &str, state: LockState) {
        let mut kept = Vec::with_capacity(self.watchers.len());

        for (watch_id, watch_state, sink) in self.watchers.drain(..) {
            if watch_id == id && watch_state == state {
                let _ = sink.send(KeyRangeEvent {
                    id: watch_id,
                    state,
                });
            } else {
                kept.push((watch_id, watch_state, sink));
            }
        }

        self.watchers = kept;
    }
}

/// In-memory store. Durable enough for tests; the disk store
/// wraps it with snapshot persistence.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load previously persisted state.
    pub(super) fn restore(&self, ranges: Vec<KeyRange>, rules: Vec<ShardingRule>) {
        let mut inner = self.inner.lock();
        inner.ranges = ranges
            .into_iter()
            .map(|kr| {
                (
                    kr.id.clone(),
                    Entry {
                        kr,
                        locked: false,
                    },
                )
            })
            .collect();
        inner.rules = rules;
    }

    /// Snapshot of persistable state. Lock state is advisory
    /// and process-local; it is not part of the snapshot.
    pub(super) fn persistable(&self) -> (Vec<KeyRange>, Vec<ShardingRule>) {
        let inner = self.inner.lock();
        let mut ranges: Vec<_> = inner.ranges.values().map(|e| e.kr.clone()).collect();
        ranges.sort_by(|a, b| a.id.cmp(&b.id));
        (ranges, inner.rules.clone())
    }
}

impl KeyRangeStore for MemoryStore {
    fn add_key_range(&self, kr: KeyRange) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        if inner.ranges.contains_key(&kr.id) {
            return Err(Error::AlreadyExists(kr.id));
        }
        inner.ranges.insert(
            kr.id.clone(),
            Entry {
                kr,
                locked: false,
            },
        );
        Ok(())
    }

    fn update_key_range(&self, kr: KeyRange) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        match inner.ranges.get_mut(&kr.id) {
            Some(entry) => {
                entry.kr = kr;
                Ok(())
            }
            None => Err(Error::NotFound(kr.id)),
        }
    }

    fn drop_key_range(&self, id: &str) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        inner
            .ranges
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(id.into()))
    }

    fn key_ranges(&self) -> Result<Vec<KeyRange>, Error> {
        let inner = self.inner.lock();
        Ok(inner.ranges.values().map(|e| e.kr.clone()).collect())
    }

    fn lock(&self, id: &str) -> Result<KeyRange, Error> {
        let mut inner = self.inner.lock();
        let entry = inner
            .ranges
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.into()))?;

        if entry.locked {
            return Err(Error::Locked(id.into()));
        }

        entry.locked = true;
        let snapshot = entry.kr.clone();
        inner.notify(id, LockState::Locked);

        Ok(snapshot)
    }

    fn unlock(&self, id: &str) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        let entry = inner
            .ranges
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.into()))?;

        if !entry.locked {
            return Err(Error::NotLocked(id.into()));
        }

        entry.locked = false;
        inner.notify(id, LockState::Unlocked);

        Ok(())
    }

    fn check(&self, kr: &KeyRange) -> bool {
        let inner = self.inner.lock();
        inner
            .ranges
            .get(&kr.id)
            .map(|entry| !entry.locked)
            .unwrap_or(true)
    }

    fn begin(&self) -> Result<(), Error> {
        Ok(())
    }

    fn commit(&self) -> Result<(), Error> {
        Ok(())
    }

    fn rollback(&self) -> Result<(), Error> {
        Ok(())
    }

    fn watch(
        &self,
        id: &str,
        state: LockState,
        sink: UnboundedSender<KeyRangeEvent>,
    ) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        if !inner.ranges.contains_key(id) {
            return Err(Error::NotFound(id.into()));
        }
        inner.watchers.push((id.into(), state, sink));
        Ok(())
    }

    fn add_sharding_rule(&self, rule: ShardingRule) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        inner.rules.push(rule);
        Ok(())
    }

    fn sharding_rules(&self) -> Result<Vec<ShardingRule>, Error> {
        let inner = self.inner.lock();
        Ok(inner.rules.clone())
    }
}
