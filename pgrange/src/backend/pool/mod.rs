//! Pool manager interface consumed by the relay.
//!
//! The relay never opens or closes server connections itself: it
//! asks the pool manager to bind and release shards around every
//! routing boundary and signals transaction edges for
//! bookkeeping.

use async_trait::async_trait;
use tracing::{debug, warn};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{Error, MultiShard, Server};
use crate::catalog::Catalog;
use crate::frontend::client::{Binding, Client};
use crate::frontend::router::ShardKey;
use crate::frontend::TxStatus;
use crate::net::messages::ErrorResponse;

/// Route/unroute callbacks and transaction hooks.
#[async_trait]
pub trait PoolManager: Send + Sync {
    /// Associate the client with backend connections for these
    /// shards, opening as needed.
    async fn route(&self, client: &mut Client, shards: &[ShardKey]) -> Result<(), Error>;

    /// Release the client's shard associations.
    async fn unroute(&self, client: &mut Client, shards: &[ShardKey]) -> Result<(), Error>;

    /// Release associations and surface a server-side error to
    /// the client.
    async fn unroute_with_error(
        &self,
        client: &mut Client,
        shards: &[ShardKey],
        message: &str,
    ) -> Result<(), Error>;

    /// A transaction is about to start on the bound server(s).
    fn tx_begin(&self) -> Result<(), Error>;

    /// A transaction finished with an idle status.
    fn tx_end(&self) -> Result<(), Error>;

    /// The relay must consult the router before flushing.
    fn validate_reroute(&self, tx_status: TxStatus, active_shards: &[ShardKey]) -> bool;

    /// A server connection is currently bound.
    fn connection_active(&self, client: &Client) -> bool;
}

/// Direct-connect pool manager: one fresh server connection per
/// shard on route, dropped on unroute. No pooling.
pub struct SessionPool {
    catalog: Arc<Catalog>,
    tx_begun: AtomicUsize,
    tx_ended: AtomicUsize,
}

impl SessionPool {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            tx_begun: AtomicUsize::new(0),
            tx_ended: AtomicUsize::new(0),
        }
    }

    /// Transaction hooks seen so far, begin and end.
    pub fn tx_counts(&self) -> (usize, usize) {
        (
            self.tx_begun.load(Ordering::Relaxed),
            self.tx_ended.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl PoolManager for SessionPool {
    async fn route(&self, client: &mut Client, shards: &[ShardKey]) -> Result<(), Error> {
        let mut servers = vec![];

        for key in shards {
            let config = self
                .catalog
                .shard_config(&key.name)
                .ok_or_else(|| Error::UnknownShard(key.name.clone()))?;
            servers.push(Server::connect(&key.name, &config).await?);
        }

        match servers.len() {
            0 => (),
            1 => {
                let server = servers.remove(0);
                debug!("client routed to {}", server.name());
                client.assign_server(Binding::Server(Box::new(server)));
            }
            _ => {
                let multi = MultiShard::new(servers);
                debug!("client routed to {:?}", multi.names());
                client.assign_server(Binding::MultiShard(multi));
            }
        }

        Ok(())
    }

    async fn unroute(&self, client: &mut Client, shards: &[ShardKey]) -> Result<(), Error> {
        if client.take_server().is_some() {
            debug!("client unrouted from {:?}", shards);
        }
        Ok(())
    }

    async fn unroute_with_error(
        &self,
        client: &mut Client,
        shards: &[ShardKey],
        message: &str,
    ) -> Result<(), Error> {
        warn!("unrouting with error: {}", message);
        let _ = client
            .send_flush(&ErrorResponse::routing(message))
            .await;
        self.unroute(client, shards).await
    }

    fn tx_begin(&self) -> Result<(), Error> {
        self.tx_begun.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn tx_end(&self) -> Result<(), Error> {
        self.tx_ended.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn validate_reroute(&self, tx_status: TxStatus, active_shards: &[ShardKey]) -> bool {
        tx_status == TxStatus::Idle || active_shards.is_empty()
    }

    fn connection_active(&self, client: &Client) -> bool {
        client.has_server()
    }
}
