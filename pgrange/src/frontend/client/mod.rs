//! Client connection: the frontend socket plus whatever server
//! connection(s) the pool manager bound to it.

use tracing::trace;

use super::{Error, TxStatus};
use crate::backend::{MultiShard, Server};
use crate::net::messages::{ErrorResponse, FromBytes, ReadyForQuery};
use crate::net::{Message, Parameters, Protocol, Query, Stream};

/// Bound server connection(s).
#[derive(Debug)]
pub enum Binding {
    Server(Box<Server>),
    MultiShard(MultiShard),
}

/// Result of one request/response round trip with the bound
/// server(s).
#[derive(Debug, Clone, Copy)]
pub struct ProcResult {
    /// Transaction status from the server's ReadyForQuery.
    pub status: TxStatus,
    /// No error frames were seen.
    pub ok: bool,
    /// The server switched into COPY mode.
    pub copy: bool,
}

impl ProcResult {
    /// The server still owes a response.
    fn intermediate() -> Self {
        Self {
            status: TxStatus::Intermediate,
            ok: true,
            copy: false,
        }
    }
}

/// Per-client connection state.
#[derive(Debug)]
pub struct Client {
    stream: Stream,
    params: Parameters,
    server: Option<Binding>,
}

impl Client {
    pub fn new(stream: Stream, params: Parameters) -> Self {
        Self {
            stream,
            params,
            server: None,
        }
    }

    /// Startup parameters the client connected with.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Read one frontend message.
    pub async fn read(&mut self) -> Result<Message, Error> {
        Ok(self.stream.read().await?)
    }

    /// Send a message to the client and flush.
    pub async fn send_flush(&mut self, message: &impl Protocol) -> Result<(), Error> {
        Ok(self.stream.send_flush(message).await?)
    }

    pub fn assign_server(&mut self, binding: Binding) {
        self.server = Some(binding);
    }

    pub fn take_server(&mut self) -> Option<Binding> {
        self.server.take()
    }

    pub fn has_server(&self) -> bool {
        self.server.is_some()
    }

    /// The statement hash is prepared on every bound server.
    pub fn server_has_prepared(&self, hash: u64) -> bool {
        match &self.server {
            Some(Binding::Server(server)) => server.has_prepared(hash),
            Some(Binding::MultiShard(multi)) => {
                multi.servers().iter().all(|server| server.has_prepared(hash))
            }
            None => false,
        }
    }

    /// Record the statement hash as prepared on the bound
    /// server(s).
    pub fn server_set_prepared(&mut self, hash: u64) {
        match &mut self.server {
            Some(Binding::Server(server)) => server.set_prepared(hash),
            Some(Binding::MultiShard(multi)) => {
                for server in multi.servers_mut() {
                    server.set_prepared(hash);
                }
            }
            None => (),
        }
    }

    /// Round-trip a message with the bound server(s). Forwards
    /// every server frame to the client except ReadyForQuery,
    /// which the relay emits itself at complete time.
    pub async fn proc_query(
        &mut self,
        message: &Message,
        wait_for_resp: bool,
        reply_cl: bool,
    ) -> Result<ProcResult, Error> {
        let binding = self.server.as_mut().ok_or(Error::NotRouted)?;

        match binding {
            Binding::Server(server) => {
                server.send(message).await?;
                server.flush().await?;

                if !wait_for_resp {
                    return Ok(ProcResult::intermediate());
                }

                let mut ok = true;
                let mut copy = false;

                let result = loop {
                    let message = server.read().await?;

                    match message.code() {
                        'Z' => {
                            let rfq = ReadyForQuery::from_bytes(message.payload())?;
                            break ProcResult {
                                status: TxStatus::from_code(rfq.status())?,
                                ok,
                                copy,
                            };
                        }
                        'E' => {
                            ok = false;
                            if reply_cl {
                                self.stream.send(&message).await?;
                            }
                        }
                        // Server switched into COPY mode; the cycle
                        // continues with CopyData frames.
                        'G' | 'H' | 'W' => {
                            copy = true;
                            if reply_cl {
                                self.stream.send(&message).await?;
                            }
                            break ProcResult {
                                status: TxStatus::Intermediate,
                                ok,
                                copy,
                            };
                        }
                        _ => {
                            if reply_cl {
                                self.stream.send(&message).await?;
                            }
                        }
                    }
                };

                if reply_cl {
                    self.stream.flush().await?;
                }

                Ok(result)
            }

            Binding::MultiShard(multi) => {
                multi.send(message).await?;

                if !wait_for_resp {
                    return Ok(ProcResult::intermediate());
                }

                let mut status = TxStatus::Idle;
                let mut ok = true;

                // Results are serialized per shard and concatenated.
                for server in multi.servers_mut() {
                    loop {
                        let message = server.read().await?;

                        match message.code() {
                            'Z' => {
                                let rfq = ReadyForQuery::from_bytes(message.payload())?;
                                status = status.worst(TxStatus::from_code(rfq.status())?);
                                break;
                            }
                            'E' => {
                                ok = false;
                                if reply_cl {
                                    self.stream.send(&message).await?;
                                }
                            }
                            _ => {
                                if reply_cl {
                                    self.stream.send(&message).await?;
                                }
                            }
                        }
                    }
                }

                if reply_cl {
                    self.stream.flush().await?;
                }

                Ok(ProcResult {
                    status,
                    ok,
                    copy: false,
                })
            }
        }
    }

    /// Forward a Parse without driving the response cycle.
    pub async fn proc_parse(
        &mut self,
        message: &Message,
        wait_for_resp: bool,
        reply_cl: bool,
    ) -> Result<(), Error> {
        if wait_for_resp {
            self.proc_query(message, true, reply_cl).await?;
            return Ok(());
        }

        match self.server.as_mut().ok_or(Error::NotRouted)? {
            Binding::Server(server) => {
                server.send(message).await?;
                server.flush().await?;
            }
            Binding::MultiShard(multi) => {
                multi.send(message).await?;
            }
        }

        Ok(())
    }

    /// Run a command on the bound server(s), always driving the
    /// cycle to its ReadyForQuery.
    pub async fn proc_command(
        &mut self,
        message: &Message,
        reply_cl: bool,
    ) -> Result<ProcResult, Error> {
        self.proc_query(message, true, reply_cl).await
    }

    /// Surface an error to the client, followed by ReadyForQuery
    /// so the session stays usable.
    pub async fn reply_err_msg(&mut self, message: &str, status: TxStatus) -> Result<(), Error> {
        trace!("error to client: {}", message);
        self.stream
            .send(&ErrorResponse::routing(message))
            .await?;
        self.reply_rfq(status).await
    }

    /// Send ReadyForQuery with the given status.
    pub async fn reply_rfq(&mut self, status: TxStatus) -> Result<(), Error> {
        let rfq = match status {
            TxStatus::Idle | TxStatus::Intermediate => ReadyForQuery::idle(),
            TxStatus::InTransaction => ReadyForQuery::in_transaction(),
            TxStatus::Error => ReadyForQuery::error(),
        };
        Ok(self.stream.send_flush(&rfq).await?)
    }

    /// Replay of the client's startup parameters, to run against
    /// freshly bound server connections.
    pub fn construct_client_params(&self) -> Option<Query> {
        let mut query = String::new();

        for param in self.params.replayable() {
            query.push_str(&format!(
                "SET {} = '{}';",
                param.name,
                param.value.replace('\'', "''")
            ));
        }

        if query.is_empty() {
            None
        } else {
            Some(Query::new(query))
        }
    }

    /// Close the client connection.
    pub async fn close(&mut self) -> Result<(), Error> {
        self.server = None;
        Ok(self.stream.shutdown().await?)
    }
}
