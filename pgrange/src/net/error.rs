//! Network errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("connection unexpectedly closed")]
    UnexpectedEof,

    #[error("expected '{expected}' message, got '{got}'")]
    UnexpectedMessage { expected: char, got: char },

    #[error("unsupported authentication method ({0})")]
    UnsupportedAuthentication(i32),

    #[error("unsupported protocol version ({0})")]
    UnsupportedProtocolVersion(i32),

    #[error("unknown transaction status '{0}'")]
    UnknownTransactionStatus(char),
}
