//! Network socket wrapper framing Postgres messages.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tracing::trace;

use std::net::SocketAddr;

use super::messages::{Message, Protocol, Startup, ToBytes};
use super::Error;

/// A buffered network socket.
#[derive(Debug)]
pub struct Stream {
    inner: BufStream<TcpStream>,
}

impl Stream {
    /// Wrap a TCP stream.
    pub fn plain(stream: TcpStream) -> Self {
        Self {
            inner: BufStream::with_capacity(9126, 9126, stream),
        }
    }

    /// Get peer address, if any.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.inner.get_ref().peer_addr().ok()
    }

    /// Read one message off the stream.
    pub async fn read(&mut self) -> Result<Message, Error> {
        let code = self.inner.read_u8().await.map_err(eof)?;
        let len = self.inner.read_i32().await.map_err(eof)?;

        let mut payload = BytesMut::with_capacity(len as usize + 1);
        payload.extend_from_slice(&[code]);
        payload.extend_from_slice(&len.to_be_bytes());
        payload.resize(len as usize + 1, 0);

        self.inner
            .read_exact(&mut payload[5..])
            .await
            .map_err(eof)?;

        let message = Message::new(payload.freeze());
        trace!("📡 <= {}", message.code());

        Ok(message)
    }

    /// Read the startup packet, which carries no message code.
    pub async fn read_startup(&mut self) -> Result<Startup, Error> {
        let len = self.inner.read_i32().await.map_err(eof)?;

        let mut body = BytesMut::new();
        body.resize(len as usize - 4, 0);
        self.inner.read_exact(&mut body).await.map_err(eof)?;

        Startup::from_body(body.freeze())
    }

    /// Send a message without flushing the buffer.
    pub async fn send(&mut self, message: &impl Protocol) -> Result<(), Error> {
        trace!("📡 => {}", message.code());
        self.write_all(&message.to_bytes()?).await
    }

    /// Send a message and flush the buffer.
    pub async fn send_flush(&mut self, message: &impl Protocol) -> Result<(), Error> {
        self.send(message).await?;
        self.flush().await
    }

    /// Send multiple messages and flush the buffer.
    pub async fn send_many(&mut self, messages: &[Message]) -> Result<(), Error> {
        for message in messages {
            self.send(message).await?;
        }
        self.flush().await
    }

    pub async fn write_all(&mut self, bytes: &Bytes) -> Result<(), Error> {
        self.inner.write_all(bytes).await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), Error> {
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut the connection down.
    pub async fn shutdown(&mut self) -> Result<(), Error> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// Remap clean EOF to its own error kind so
/// disconnects are distinguishable from I/O faults.
fn eof(err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::UnexpectedEof
    } else {
        Error::Io(err)
    }
}
