//! pgrange: horizontally sharded PostgreSQL proxy.
//!
//! Clients speak the Postgres wire protocol to the proxy; each
//! statement is routed to the data shard(s) owning its key range
//! and the protocol is relayed in both directions, preserving
//! transactional semantics as seen by the client.

pub mod backend;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod frontend;
pub mod net;

use tracing_subscriber::EnvFilter;

use std::sync::Arc;

use catalog::{Catalog, DiskStore, KeyRange, KeyRangeStore, MemoryStore, ShardingRule};
use config::{Config, ShardRole};
use frontend::QueryRouter;

/// Set up logging.
pub fn logger() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Build the query router from config: open the key-range store,
/// register shards, rules, local tables and key ranges.
pub fn build_router(config: &Config) -> Result<Arc<QueryRouter>, frontend::router::Error> {
    let store: Arc<dyn KeyRangeStore> = match &config.general.store_path {
        Some(path) => Arc::new(DiskStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };

    let catalog = Arc::new(Catalog::new());
    let router = Arc::new(QueryRouter::new(catalog, store.clone()));

    for shard in &config.shards {
        match shard.role {
            ShardRole::Data => router.add_data_shard(&shard.name, shard.clone()),
            ShardRole::World => router.add_world_shard(&shard.name, shard.clone()),
        }
    }

    for rule in &config.rules {
        router.add_sharding_rule(ShardingRule::with_columns(rule.columns.clone()))?;
    }

    for table in &config.local_tables {
        router.add_local_table(table);
    }

    // Ranges reloaded from the store win over config seeds.
    let known: Vec<_> = store.key_ranges()?;
    for kr in &known {
        router.catalog().add_key_range(kr.clone())?;
    }

    for kr in &config.key_ranges {
        if known.iter().any(|existing| existing.id == kr.id) {
            continue;
        }
        router.add_key_range(KeyRange::new(
            &kr.id,
            kr.lower.as_bytes(),
            kr.upper.as_bytes(),
            &kr.shard,
        ))?;
    }

    Ok(router)
}
