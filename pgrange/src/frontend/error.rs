//! Frontend errors.

use thiserror::Error;

/// Frontend error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("wait for a next query")]
    SkipQuery,

    #[error("{0}")]
    Net(#[from] crate::net::Error),

    #[error("{0}")]
    Backend(#[from] crate::backend::Error),

    #[error("{0}")]
    Router(#[from] super::router::Error),

    #[error("ddl is forbidden inside multi-shard transaction")]
    DdlInTransaction,

    #[error("client connection is not routed to any shard")]
    NotRouted,

    #[error("retry logic for prepared statements is not implemented")]
    RetryNotImplemented,
}

impl Error {
    /// The client disconnected; the relay is done.
    pub fn disconnect(&self) -> bool {
        matches!(self, Error::Net(crate::net::Error::UnexpectedEof))
    }

    /// Recoverable routing error: surfaced as an ErrorResponse,
    /// the session stays open.
    pub fn recoverable(&self) -> bool {
        use super::router::parser::Error as ParserError;
        use super::router::Error as RouterError;

        matches!(
            self,
            Error::SkipQuery
                | Error::DdlInTransaction
                | Error::Router(RouterError::NoDataShard)
                | Error::Router(RouterError::Parser(
                    ParserError::PgQuery(_) | ParserError::NoStatement
                ))
        )
    }
}
