//! Query router.
//!
//! Maps a parsed statement to a routing decision against the
//! catalog, and owns the online administration of the key-range
//! layout: split, unite, lock, unlock, subscribe.

pub mod error;
pub mod parser;

pub use error::Error;
pub use parser::{Expr, QueryParser, Statement};

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};
use uuid::Uuid;

use std::sync::Arc;

use crate::catalog::{
    cmp_bounds, Catalog, Error as CatalogError, KeyRange, KeyRangeEvent, KeyRangeStore, LockState,
    ShardingRule,
};
use crate::config::Shard;

/// Shard referenced by a routing decision. `rw` is false when
/// the matched key range is locked: the shard may be observed
/// but not written through this route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardKey {
    pub name: String,
    pub rw: bool,
}

impl ShardKey {
    pub fn new(name: impl ToString, rw: bool) -> Self {
        Self {
            name: name.to_string(),
            rw,
        }
    }
}

/// One shard a statement should execute on. The matched key
/// range, when present, is a snapshot copy, not a live
/// catalog reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardRoute {
    pub key: ShardKey,
    pub matched_range: Option<KeyRange>,
}

impl ShardRoute {
    pub fn new(name: impl ToString, rw: bool) -> Self {
        Self {
            key: ShardKey::new(name, rw),
            matched_range: None,
        }
    }
}

/// The router's verdict for one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RoutingDecision {
    /// No routing action: empty statement, local table,
    /// or nothing to route by.
    Skip,
    /// Execute on exactly these shards.
    Shard(Vec<ShardRoute>),
    /// Fan out to every data shard (DDL).
    Multi,
    /// Fall back to a world shard.
    World,
}

/// Routing decisions against the catalog. Pure reads; admin
/// mutations drive the catalog and the key-range store together.
pub struct QueryRouter {
    catalog: Arc<Catalog>,
    store: Arc<dyn KeyRangeStore>,
}

impl QueryRouter {
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn KeyRangeStore>) -> Self {
        Self { catalog, store }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Route a parsed statement.
    pub fn route(&self, statement: &Statement) -> Result<RoutingDecision, Error> {
        let decision = match statement {
            Statement::Ddl => RoutingDecision::Multi,

            Statement::Select(select) => {
                if select
                    .tables
                    .iter()
                    .any(|table| self.catalog.is_local_table(table))
                {
                    RoutingDecision::Skip
                } else {
                    self.route_where(select.where_clause.as_ref())
                }
            }

            Statement::Insert(insert) => {
                match self.catalog.sharding_column_position(&insert.columns) {
                    Some(position) => match insert.first_row_value(position) {
                        Some(value) => match self.route_by_expr(value) {
                            Some(route) => RoutingDecision::Shard(vec![route]),
                            None => RoutingDecision::Skip,
                        },
                        None => RoutingDecision::Skip,
                    },
                    None => RoutingDecision::Skip,
                }
            }

            Statement::Update(update) => self.route_where(update.where_clause.as_ref()),

            Statement::Other => RoutingDecision::Skip,
        };

        debug!("routing decision: {:?}", decision);
        Ok(decision)
    }

    fn route_where(&self, where_clause: Option<&Expr>) -> RoutingDecision {
        match where_clause {
            None => RoutingDecision::Skip,
            Some(expr) => match self.route_by_expr(expr) {
                Some(route) => RoutingDecision::Shard(vec![route]),
                None => RoutingDecision::Skip,
            },
        }
    }

    /// Recursive descent over the comparison subtree. Returns
    /// `None` when no key range matched.
    fn route_by_expr(&self, expr: &Expr) -> Option<ShardRoute> {
        match expr {
            // Left-biased: the first conjunct that routes wins.
            Expr::And(children) => children.iter().find_map(|child| self.route_by_expr(child)),

            Expr::Comparison(left, right) => {
                if self.match_sharding_key(left) {
                    self.route_by_expr(right)
                } else {
                    self.route_by_expr(left)
                }
            }

            Expr::Value(value) => {
                let kr = self.catalog.match_range(value)?;
                let rw = self.store.check(&kr);
                Some(ShardRoute {
                    key: ShardKey::new(&kr.shard, rw),
                    matched_range: Some(kr),
                })
            }

            Expr::Tuple(children) => children.iter().find_map(|child| self.route_by_expr(child)),

            Expr::Column(_) | Expr::Other => None,
        }
    }

    /// The expression references a sharding column.
    fn match_sharding_key(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Column(name) => self.catalog.has_sharding_column(name),
            Expr::Tuple(children) => children.iter().any(|child| self.match_sharding_key(child)),
            _ => false,
        }
    }

    /// Routes to every registered data shard.
    pub fn data_shards_routes(&self) -> Vec<ShardRoute> {
        self.catalog
            .data_shard_names()
            .into_iter()
            .map(|name| ShardRoute::new(name, true))
            .collect()
    }

    /// Routes to world shards, shuffled for a crude round-robin.
    pub fn world_shards_routes(&self) -> Vec<ShardRoute> {
        let mut routes: Vec<_> = self
            .catalog
            .world_shard_names()
            .into_iter()
            .map(|name| ShardRoute::new(name, true))
            .collect();

        routes.shuffle(&mut rand::rng());
        routes
    }

    /// Register a data shard.
    pub fn add_data_shard(&self, name: &str, config: Shard) {
        self.catalog.add_data_shard(name, config);
    }

    /// Register a world shard.
    pub fn add_world_shard(&self, name: &str, config: Shard) {
        self.catalog.add_world_shard(name, config);
    }

    /// Record a sharding rule in the catalog and the store.
    pub fn add_sharding_rule(&self, rule: ShardingRule) -> Result<(), Error> {
        self.catalog.add_sharding_rule(rule.clone())?;
        self.store.add_sharding_rule(rule)?;
        Ok(())
    }

    /// Mark a table as local.
    pub fn add_local_table(&self, table: &str) {
        self.catalog.add_local_table(table);
    }

    /// Add a key range to the catalog and the store.
    pub fn add_key_range(&self, kr: KeyRange) -> Result<(), Error> {
        self.catalog.add_key_range(kr.clone())?;
        self.store.add_key_range(kr)?;
        Ok(())
    }

    /// Split a key range at the bound. The source keeps its id
    /// and is truncated to `[lower, bound)`; the remainder
    /// `[bound, upper)` gets a fresh id on the same shard.
    pub fn split(&self, source_id: &str, bound: Vec<u8>) -> Result<KeyRange, Error> {
        let source = self
            .catalog
            .range(source_id)
            .ok_or_else(|| CatalogError::NotFound(source_id.into()))?;

        let above_lower = source.lower.is_empty()
            || cmp_bounds(&source.lower, &bound) == std::cmp::Ordering::Less;
        let below_upper = source.upper.is_empty()
            || cmp_bounds(&bound, &source.upper) == std::cmp::Ordering::Less;
        if !above_lower || !below_upper {
            return Err(CatalogError::InvalidBound(source_id.into()).into());
        }

        self.store.begin()?;

        let remainder = KeyRange::new(
            Uuid::new_v4().to_string(),
            bound.clone(),
            source.upper.clone(),
            source.shard.clone(),
        );
        let mut truncated = source;
        truncated.upper = bound;

        let result: Result<(), CatalogError> = (|| {
            self.store.add_key_range(remainder.clone())?;
            self.store.update_key_range(truncated.clone())?;
            Ok(())
        })();

        if let Err(err) = result {
            self.store.rollback()?;
            return Err(Error::Catalog(err));
        }

        self.store.commit()?;

        self.catalog.upsert_range(truncated.clone());
        self.catalog.upsert_range(remainder.clone());

        info!("split {} at {:?} -> {}", source_id, remainder.lower, remainder.id);
        Ok(remainder)
    }

    /// Merge two adjacent key ranges. The left range is dropped
    /// and the right range absorbs its lower bound. Locks are
    /// taken left then right to avoid deadlock with concurrent
    /// unites.
    pub fn unite(&self, left_id: &str, right_id: &str) -> Result<KeyRange, Error> {
        let left = self.store.lock(left_id)?;

        let right = match self.store.lock(right_id) {
            Ok(right) => right,
            Err(err) => {
                let _ = self.store.unlock(left_id);
                return Err(err.into());
            }
        };

        let result: Result<KeyRange, CatalogError> = (|| {
            // Dropping the left range releases its lock with it.
            self.store.drop_key_range(left_id)?;

            let mut merged = right.clone();
            merged.lower = left.lower.clone();
            self.store.update_key_range(merged.clone())?;

            Ok(merged)
        })();

        let unlock = self.store.unlock(right_id);

        match result {
            Ok(merged) => {
                unlock?;
                self.catalog.remove_range(left_id);
                self.catalog.upsert_range(merged.clone());
                info!("united {} into {}", left_id, right_id);
                Ok(merged)
            }
            Err(err) => {
                let _ = self.store.unlock(left_id);
                Err(Error::Catalog(err))
            }
        }
    }

    /// Take the advisory lock on a key range, hiding it from
    /// writes until unlocked.
    pub fn lock_key_range(&self, id: &str) -> Result<KeyRange, Error> {
        self.catalog
            .range(id)
            .ok_or_else(|| CatalogError::NotFound(id.into()))?;
        Ok(self.store.lock(id)?)
    }

    /// Release the advisory lock.
    pub fn unlock_key_range(&self, id: &str) -> Result<(), Error> {
        self.catalog
            .range(id)
            .ok_or_else(|| CatalogError::NotFound(id.into()))?;
        Ok(self.store.unlock(id)?)
    }

    /// One-shot subscription to a lock state transition.
    pub fn subscribe(
        &self,
        id: &str,
        state: LockState,
        sink: UnboundedSender<KeyRangeEvent>,
    ) -> Result<(), Error> {
        Ok(self.store.watch(id, state, sink)?)
    }
}
