//! Durable catalog of key ranges and sharding rules.

use tokio::sync::mpsc::UnboundedSender;

use super::{Error, KeyRange, LockState, ShardingRule};

/// Lock state transition of a key range.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRangeEvent {
    pub id: String,
    pub state: LockState,
}

/// Durable store of key ranges and sharding rules with advisory
/// locking and change notification.
///
/// The in-process implementations never suspend, so the trait is
/// synchronous; routing calls `check` inline and must not block.
/// `lock` and `unlock` for the same id are totally ordered across
/// all callers.
pub trait KeyRangeStore: Send + Sync {
    /// Insert a key range. Fails if the id is taken.
    fn add_key_range(&self, kr: KeyRange) -> Result<(), Error>;

    /// Overwrite a key range by id.
    fn update_key_range(&self, kr: KeyRange) -> Result<(), Error>;

    /// Remove a key range, releasing its lock if held.
    fn drop_key_range(&self, id: &str) -> Result<(), Error>;

    /// All stored key ranges.
    fn key_ranges(&self) -> Result<Vec<KeyRange>, Error>;

    /// Take the advisory lock on a key range and return its
    /// snapshot. Fails fast with `Locked` when already held.
    fn lock(&self, id: &str) -> Result<KeyRange, Error>;

    /// Release the advisory lock.
    fn unlock(&self, id: &str) -> Result<(), Error>;

    /// The range is currently unlocked, i.e. safe to write through.
    fn check(&self, kr: &KeyRange) -> bool;

    /// Open a batching envelope. No-op for in-memory stores.
    fn begin(&self) -> Result<(), Error>;

    /// Commit the batching envelope.
    fn commit(&self) -> Result<(), Error>;

    /// Abandon the batching envelope.
    fn rollback(&self) -> Result<(), Error>;

    /// Register a one-shot notification for a transition of the
    /// key range to the given lock state. Delivered after the
    /// mutation is visible to readers.
    fn watch(
        &self,
        id: &str,
        state: LockState,
        sink: UnboundedSender<KeyRangeEvent>,
    ) -> Result<(), Error>;

    /// Record a sharding rule.
    fn add_sharding_rule(&self, rule: ShardingRule) -> Result<(), Error>;

    /// All stored sharding rules.
    fn sharding_rules(&self) -> Result<Vec<ShardingRule>, Error>;
}
