//! Client listener: accepts frontend connections, runs the
//! trust-only startup handshake, and drives the relay state
//! machine with the client's message stream.

use fnv::FnvHasher;
use tokio::net::TcpListener;
use tokio::spawn;
use tracing::{debug, error, info};

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::client::Client;
use super::relay::{RelayState, StatementDesc};
use super::router::QueryRouter;
use super::{Error, TxStatus};
use crate::backend::PoolManager;
use crate::net::messages::{Authentication, FromBytes, Parse, Query, Startup};
use crate::net::{Parameters, Protocol, Stream};

/// Frontend listener.
pub struct Listener {
    addr: String,
    router: Arc<QueryRouter>,
    pool: Arc<dyn PoolManager>,
    world_shard_fallback: bool,
}

impl Listener {
    pub fn new(
        addr: impl ToString,
        router: Arc<QueryRouter>,
        pool: Arc<dyn PoolManager>,
        world_shard_fallback: bool,
    ) -> Self {
        Self {
            addr: addr.to_string(),
            router,
            pool,
            world_shard_fallback,
        }
    }

    /// Accept clients until the process shuts down.
    pub async fn listen(&self) -> Result<(), Error> {
        let listener = TcpListener::bind(&self.addr).await.map_err(|err| {
            error!("failed to bind {}: {}", self.addr, err);
            crate::net::Error::Io(err)
        })?;

        info!("🐘 listening on {}", self.addr);

        loop {
            let (socket, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    error!("accept failed: {}", err);
                    continue;
                }
            };

            debug!("client connected from {}", addr);

            let router = self.router.clone();
            let pool = self.pool.clone();
            let world_shard_fallback = self.world_shard_fallback;

            spawn(async move {
                match handle_client(socket, router, pool, world_shard_fallback).await {
                    Ok(()) => debug!("client {} disconnected", addr),
                    Err(err) if err.disconnect() => debug!("client {} disconnected", addr),
                    Err(err) => error!("client {} error: {}", addr, err),
                }
            });
        }
    }
}

async fn handle_client(
    socket: tokio::net::TcpStream,
    router: Arc<QueryRouter>,
    pool: Arc<dyn PoolManager>,
    world_shard_fallback: bool,
) -> Result<(), Error> {
    let mut stream = Stream::plain(socket);

    // Startup: refuse TLS, ignore cancellation, trust everyone.
    let params = loop {
        match stream.read_startup().await? {
            Startup::Ssl => {
                stream
                    .write_all(&bytes::Bytes::from_static(b"N"))
                    .await?;
                stream.flush().await?;
            }
            Startup::Cancel { .. } => return Ok(()),
            Startup::Startup { params } => break Parameters::new(params),
        }
    };

    stream.send(&Authentication::Ok).await?;
    stream.send_flush(&crate::net::ReadyForQuery::idle()).await?;

    let client = Client::new(stream, params);
    let mut relay = RelayState::new(client, router, pool, world_shard_fallback);

    let result = relay_loop(&mut relay).await;
    let _ = relay.close().await;
    result
}

/// One iteration per frontend message; the relay decides what
/// reaches the servers and when.
async fn relay_loop(relay: &mut RelayState) -> Result<(), Error> {
    loop {
        let message = relay.client_mut().read().await?;

        let result = match message.code() {
            // Simple query: parse, buffer, flush.
            'Q' => {
                let query = Query::from_bytes(message.payload())?;
                if let Err(err) = relay.parse(query.query()) {
                    debug!("parse failed: {}", err);
                }
                relay.add_query(message);
                relay.process_message_buf(true, true).await.map(|_| ())
            }

            // Extended protocol: named Parse goes through the
            // prepared-statement path, everything else buffers
            // until the Sync.
            'P' => {
                let parse = Parse::from_bytes(message.payload())?;
                if let Err(err) = relay.parse(parse.query()) {
                    debug!("parse failed: {}", err);
                }

                if parse.anonymous() {
                    relay.add_query(message);
                    Ok(())
                } else {
                    let desc = StatementDesc {
                        name: parse.name().to_string(),
                        query: parse.query().to_string(),
                    };
                    relay.prepare_statement(statement_hash(&parse), &desc).await
                }
            }

            'B' | 'D' | 'E' | 'C' => {
                relay.add_query(message);
                Ok(())
            }

            'S' => relay.sync(true, true).await,

            // COPY subprotocol: data flows without response
            // cycles until done or failed.
            'd' => relay.process_message(&message, false, true).await,
            'c' | 'f' => relay.process_message(&message, true, true).await,

            'X' => return Ok(()),

            code => {
                debug!("ignoring unexpected message '{}'", code);
                Ok(())
            }
        };

        match result {
            Ok(()) => (),
            // Routing declined; the client was already told.
            Err(Error::SkipQuery) => (),
            Err(err) if err.recoverable() => {
                let status = relay.tx_status();
                relay
                    .client_mut()
                    .reply_err_msg(&err.to_string(), status)
                    .await?;
            }
            Err(err) if err.disconnect() => return Err(err),
            // Server-side failure: release the binding, surface
            // the error, keep the session.
            Err(err) => {
                error!("relay error: {}", err);
                relay.reset().await?;
                relay
                    .client_mut()
                    .reply_err_msg(&err.to_string(), TxStatus::Idle)
                    .await?;
            }
        }
    }
}

/// Statement cache key: fnv over the statement text.
fn statement_hash(parse: &Parse) -> u64 {
    let mut hasher = FnvHasher::default();
    parse.query().hash(&mut hasher);
    hasher.finish()
}
