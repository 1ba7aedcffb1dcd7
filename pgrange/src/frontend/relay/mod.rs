//! Relay state machine.
//!
//! Per-client driver: buffers frontend messages, asks the router
//! for a decision at routing boundaries, binds and releases
//! backend shards through the pool manager, and drives the wire
//! protocol across one or many shards while keeping the
//! transaction status the client observes coherent.

#[cfg(test)]
mod test;

use tracing::{debug, error};

use std::collections::VecDeque;
use std::sync::Arc;

use super::client::Client;
use super::router::{parser, QueryParser, QueryRouter, RoutingDecision, ShardKey, Statement};
use super::{Error, TxStatus};
use crate::backend::PoolManager;
use crate::net::messages::{Parse, Sync};
use crate::net::{Message, Protocol};

/// Name and text of a statement prepared on behalf of the
/// client.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementDesc {
    pub name: String,
    pub query: String,
}

/// Relay state machine, one per client connection. Not shared
/// across tasks; its entry points are invoked serially.
pub struct RelayState {
    client: Client,
    router: Arc<QueryRouter>,
    pool: Arc<dyn PoolManager>,
    parser: QueryParser,

    tx_status: TxStatus,
    tx_hooked: bool,
    copy_active: bool,
    world_shard_fallback: bool,

    routing_state: Option<RoutingDecision>,
    active_shards: Vec<ShardKey>,

    msg_buf: VecDeque<Message>,
    silent_buf: VecDeque<Message>,
}

impl RelayState {
    pub fn new(
        client: Client,
        router: Arc<QueryRouter>,
        pool: Arc<dyn PoolManager>,
        world_shard_fallback: bool,
    ) -> Self {
        Self {
            client,
            router,
            pool,
            parser: QueryParser::new(),
            tx_status: TxStatus::Idle,
            tx_hooked: false,
            copy_active: false,
            world_shard_fallback,
            routing_state: None,
            active_shards: Vec::new(),
            msg_buf: VecDeque::new(),
            silent_buf: VecDeque::new(),
        }
    }

    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    pub fn tx_status(&self) -> TxStatus {
        self.tx_status
    }

    pub fn tx_active(&self) -> bool {
        self.tx_status.active()
    }

    pub fn copy_active(&self) -> bool {
        self.copy_active
    }

    pub fn active_shards(&self) -> &[ShardKey] {
        &self.active_shards
    }

    /// Parse a query, storing the statement for the next
    /// routing boundary.
    pub fn parse(&mut self, query: &str) -> Result<(), parser::Error> {
        self.parser.parse(query)?;
        Ok(())
    }

    /// Last parsed statement, if any.
    pub fn statement(&self) -> Option<&Statement> {
        self.parser.statement()
    }

    /// Buffer a frontend message. No I/O.
    pub fn add_query(&mut self, message: Message) {
        debug!("buffering '{}'", message.code());
        self.msg_buf.push_back(message);
    }

    /// Buffer a message whose replies the client never sees.
    /// Silent messages are flushed ahead of the regular buffer.
    pub fn add_silent_query(&mut self, message: Message) {
        debug!("buffering silent '{}'", message.code());
        self.silent_buf.push_back(message);
    }

    /// Single-message relay: prepare, one step, complete.
    pub async fn process_message(
        &mut self,
        message: &Message,
        wait_for_resp: bool,
        reply_cl: bool,
    ) -> Result<(), Error> {
        self.prepare_relay_step().await?;

        match self.relay_step(message, wait_for_resp, reply_cl).await {
            Ok(_) => self.complete_relay(reply_cl).await,
            Err(err) => {
                self.complete_relay(reply_cl).await?;
                Err(err)
            }
        }
    }

    /// Flush both buffers through the bound shards. Returns
    /// whether every statement completed without error frames.
    pub async fn process_message_buf(
        &mut self,
        wait_for_resp: bool,
        reply_cl: bool,
    ) -> Result<bool, Error> {
        self.prepare_relay_step().await?;
        self.relay_flush(wait_for_resp, reply_cl).await
    }

    /// Extended-protocol Sync. With no server bound there is
    /// nothing to sync: reply ReadyForQuery and move on.
    pub async fn sync(&mut self, wait_for_resp: bool, reply_cl: bool) -> Result<(), Error> {
        if !self.pool.connection_active(&self.client) {
            return self.client.reply_rfq(TxStatus::Idle).await;
        }

        self.prepare_relay_step().await?;

        // Buffered extended messages produce no response until
        // the Sync lands; flushing must not wait on them.
        self.relay_flush_buffers(false, reply_cl).await?;

        self.relay_step(&Sync.message()?, wait_for_resp, reply_cl)
            .await?;
        self.complete_relay(reply_cl).await
    }

    /// Clear relay state and release the bound shards. Calling
    /// this twice is the same as calling it once.
    pub async fn reset(&mut self) -> Result<(), Error> {
        let shards = std::mem::take(&mut self.active_shards);
        self.tx_status = TxStatus::Idle;
        self.tx_hooked = false;
        self.copy_active = false;
        self.routing_state = None;
        self.msg_buf.clear();
        self.silent_buf.clear();

        self.pool.unroute(&mut self.client, &shards).await?;
        Ok(())
    }

    /// Release shards and close the client connection.
    pub async fn close(&mut self) -> Result<(), Error> {
        let shards = std::mem::take(&mut self.active_shards);
        self.pool.unroute(&mut self.client, &shards).await?;
        self.client.close().await
    }

    /// Consult the router if the pool manager requires it.
    /// Recoverable routing failures are surfaced to the client
    /// here and collapse into `SkipQuery`.
    pub async fn prepare_relay_step(&mut self) -> Result<(), Error> {
        if !self
            .pool
            .validate_reroute(self.tx_status, &self.active_shards)
        {
            return Ok(());
        }

        use super::router::Error as RouterError;

        match self.reroute().await {
            Ok(()) => Ok(()),
            Err(Error::SkipQuery) => {
                self.discard_buffers();
                self.client
                    .reply_err_msg("wait for a next query", self.tx_status)
                    .await?;
                Err(Error::SkipQuery)
            }
            Err(Error::Router(RouterError::NoDataShard)) => {
                self.discard_buffers();
                self.client
                    .reply_err_msg("failed to match any datashard", self.tx_status)
                    .await?;
                Err(Error::SkipQuery)
            }
            Err(Error::Router(RouterError::Parser(_))) => {
                self.discard_buffers();
                self.client
                    .reply_err_msg("skip executing this query, wait for next", self.tx_status)
                    .await?;
                Err(Error::SkipQuery)
            }
            Err(err) => {
                self.discard_buffers();
                self.unroute_with_error(&err).await?;
                Err(err)
            }
        }
    }

    /// Ask the router for a decision on the last parsed
    /// statement and bind shards accordingly.
    pub async fn reroute(&mut self) -> Result<(), Error> {
        let statement = self
            .parser
            .statement()
            .ok_or(parser::Error::NoStatement)
            .map_err(super::router::Error::Parser)?;

        let decision = self.router.route(statement)?;
        debug!("rerouting: {:?}", decision);

        self.dispatch(decision).await
    }

    /// Bind shards according to a routing decision.
    async fn dispatch(&mut self, decision: RoutingDecision) -> Result<(), Error> {
        self.routing_state = Some(decision.clone());

        match decision {
            RoutingDecision::Multi => {
                if self.tx_active() {
                    return Err(Error::DdlInTransaction);
                }
                let routes = self.router.data_shards_routes();
                self.proc_routes(routes.iter().map(|r| r.key.clone()).collect())
                    .await
            }

            RoutingDecision::Shard(routes) => {
                self.proc_routes(routes.iter().map(|r| r.key.clone()).collect())
                    .await
            }

            RoutingDecision::Skip => Err(Error::SkipQuery),

            RoutingDecision::World => {
                if !self.world_shard_fallback {
                    return Err(super::router::Error::NoDataShard.into());
                }

                let routes = self.router.world_shards_routes();
                let keys: Vec<_> = routes.iter().map(|r| r.key.clone()).collect();

                if let Err(err) = self.proc_routes(keys).await {
                    self.unroute_with_error(&err).await?;
                    return Err(err);
                }
                Ok(())
            }
        }
    }

    /// Release the current shards and bind the new set.
    async fn proc_routes(&mut self, shards: Vec<ShardKey>) -> Result<(), Error> {
        if shards.is_empty() {
            return Err(super::router::Error::NoDataShard.into());
        }

        let old = std::mem::take(&mut self.active_shards);
        self.pool.unroute(&mut self.client, &old).await?;

        self.active_shards = shards;

        if let Err(err) = self
            .pool
            .route(&mut self.client, &self.active_shards)
            .await
        {
            error!("failed to open server connection: {}", err);
            self.reset().await?;
            return Err(err.into());
        }

        // New connections start with defaults; replay what the
        // client set at startup.
        if let Some(params) = self.client.construct_client_params() {
            self.client.proc_command(&params.message()?, false).await?;
        }

        Ok(())
    }

    /// Relay one message to the bound shards. Signals the
    /// transaction begin hook on the first server-bound message
    /// of a transaction.
    pub async fn relay_step(
        &mut self,
        message: &Message,
        wait_for_resp: bool,
        reply_cl: bool,
    ) -> Result<(TxStatus, bool), Error> {
        if !self.tx_active() && !self.tx_hooked {
            self.pool.tx_begin()?;
            self.tx_hooked = true;
        }

        match self
            .client
            .proc_query(message, wait_for_resp, reply_cl)
            .await
        {
            Ok(result) => {
                self.tx_status = result.status;
                if result.copy {
                    self.copy_active = true;
                } else if result.status != TxStatus::Intermediate {
                    self.copy_active = false;
                }
                Ok((self.tx_status, result.ok))
            }
            Err(err) => {
                self.tx_status = TxStatus::Error;
                Err(err)
            }
        }
    }

    /// Drain the silent buffer, then the message buffer, then
    /// complete the relay.
    pub async fn relay_flush(
        &mut self,
        wait_for_resp: bool,
        reply_cl: bool,
    ) -> Result<bool, Error> {
        let ok = self.relay_flush_buffers(wait_for_resp, reply_cl).await?;
        self.complete_relay(reply_cl).await?;
        Ok(ok)
    }

    async fn relay_flush_buffers(
        &mut self,
        wait_for_resp: bool,
        reply_cl: bool,
    ) -> Result<bool, Error> {
        let mut ok = true;

        // Silent messages never produce client-visible frames.
        while let Some(message) = self.silent_buf.pop_front() {
            self.relay_step(&message, true, false).await?;
        }

        while let Some(message) = self.msg_buf.pop_front() {
            let (_, step_ok) = self.relay_step(&message, wait_for_resp, reply_cl).await?;
            ok = ok && step_ok;
        }

        Ok(ok)
    }

    /// Finish a relay cycle: emit the single ReadyForQuery the
    /// client observes and settle the transaction hooks.
    pub async fn complete_relay(&mut self, reply_cl: bool) -> Result<(), Error> {
        // COPY frames its own protocol; nothing to complete.
        if self.copy_active {
            return Ok(());
        }

        debug!("complete relay with {:?}", self.tx_status);

        if matches!(self.routing_state, Some(RoutingDecision::Multi)) {
            if reply_cl {
                self.client.reply_rfq(TxStatus::Idle).await?;
            }
            return self.tx_end();
        }

        match self.tx_status {
            TxStatus::Idle => {
                if reply_cl {
                    self.client.reply_rfq(TxStatus::Idle).await?;
                }
                self.tx_end()
            }
            TxStatus::InTransaction | TxStatus::Error => {
                if reply_cl {
                    self.client.reply_rfq(self.tx_status).await?;
                }
                Ok(())
            }
            // Mid extended-query cycle; the ReadyForQuery comes
            // with the Sync.
            TxStatus::Intermediate => Ok(()),
        }
    }

    /// Prepare a statement on the bound server(s) unless it is
    /// already there. The transaction status is unchanged, so no
    /// complete-relay runs.
    pub async fn prepare_statement(
        &mut self,
        hash: u64,
        desc: &StatementDesc,
    ) -> Result<(), Error> {
        if self.client.server_has_prepared(hash) {
            return Ok(());
        }

        if !self.client.has_server() {
            self.prepare_relay_step().await?;
        }

        let parse = Parse::named(&desc.name, &desc.query);
        if let Err(err) = self.client.proc_parse(&parse.message()?, false, false).await {
            if self.should_retry(&err) {
                return Err(Error::RetryNotImplemented);
            }
            return Err(err);
        }

        if let Err(err) = self.relay_step(&Sync.message()?, true, false).await {
            if self.should_retry(&err) {
                return Err(Error::RetryNotImplemented);
            }
            return Err(err);
        }

        self.client.server_set_prepared(hash);
        Ok(())
    }

    /// Retry policy hook. No errors are retried in this version.
    pub fn should_retry(&self, _err: &Error) -> bool {
        false
    }

    /// Unroute with a server-side error surfaced to the client,
    /// then reset.
    async fn unroute_with_error(&mut self, err: &Error) -> Result<(), Error> {
        let shards = std::mem::take(&mut self.active_shards);
        self.pool
            .unroute_with_error(&mut self.client, &shards, &err.to_string())
            .await?;
        self.reset().await
    }

    fn discard_buffers(&mut self) {
        self.msg_buf.clear();
        self.silent_buf.clear();
    }

    fn tx_end(&mut self) -> Result<(), Error> {
        if self.tx_hooked {
            self.pool.tx_end()?;
            self.tx_hooked = false;
        }
        Ok(())
    }
}
