//! Backend errors.

use thiserror::Error;

use crate::net::messages::ErrorResponse;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Net(#[from] crate::net::Error),

    #[error("server error: {0}")]
    ConnectionError(Box<ErrorResponse>),

    #[error("shard \"{0}\" is not configured")]
    UnknownShard(String),

    #[error("unexpected message from server: '{0}'")]
    UnexpectedMessage(char),

    #[error("no server connection is bound")]
    NotConnected,
}
