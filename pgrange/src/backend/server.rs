//! PostgreSQL server connection to one shard.

use fnv::FnvHashSet;
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::Error;
use crate::config::Shard;
use crate::net::messages::{Authentication, ErrorResponse, FromBytes, ParameterStatus, Startup};
use crate::net::{Message, Parameters, Protocol, Stream, ToBytes};

/// One server connection, exclusively bound to a client for the
/// duration of a transaction.
#[derive(Debug)]
pub struct Server {
    name: String,
    stream: Stream,
    params: Parameters,
    prepared: FnvHashSet<u64>,
}

impl Server {
    /// Connect to a shard and complete the startup handshake.
    /// Only trust auth is supported.
    pub async fn connect(name: &str, config: &Shard) -> Result<Self, Error> {
        let addr = format!("{}:{}", config.host, config.port);
        debug!("=> {} [{}]", addr, name);

        let stream = TcpStream::connect(&addr).await?;
        let mut stream = Stream::plain(stream);

        stream
            .write_all(&Startup::new(&config.user, &config.database).to_bytes()?)
            .await?;
        stream.flush().await?;

        let mut params = vec![];

        loop {
            let message = stream.read().await?;

            match message.code() {
                'R' => {
                    Authentication::from_bytes(message.payload())?;
                }
                'S' => {
                    let status = ParameterStatus::from_bytes(message.payload())?;
                    params.push(crate::net::Parameter {
                        name: status.name,
                        value: status.value,
                    });
                }
                // BackendKeyData; query cancellation isn't relayed.
                'K' => (),
                'N' => (),
                'E' => {
                    let error = ErrorResponse::from_bytes(message.payload())?;
                    return Err(Error::ConnectionError(Box::new(error)));
                }
                'Z' => break,
                code => return Err(Error::UnexpectedMessage(code)),
            }
        }

        Ok(Self {
            name: name.to_string(),
            stream,
            params: Parameters::new(params),
            prepared: FnvHashSet::default(),
        })
    }

    /// Shard this connection belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters the server announced at startup.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Send a message without flushing.
    pub async fn send(&mut self, message: &Message) -> Result<(), Error> {
        trace!("[{}] => {}", self.name, message.code());
        Ok(self.stream.send(message).await?)
    }

    pub async fn flush(&mut self) -> Result<(), Error> {
        Ok(self.stream.flush().await?)
    }

    /// Read one message from the server.
    pub async fn read(&mut self) -> Result<Message, Error> {
        let message = self.stream.read().await?;
        trace!("[{}] <= {}", self.name, message.code());
        Ok(message)
    }

    /// The statement hash is already prepared on this connection.
    pub fn has_prepared(&self, hash: u64) -> bool {
        self.prepared.contains(&hash)
    }

    /// Record the statement hash as prepared.
    pub fn set_prepared(&mut self, hash: u64) {
        self.prepared.insert(hash);
    }
}

