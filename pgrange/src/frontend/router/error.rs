//! Router errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Parser(#[from] super::parser::Error),

    #[error("failed to match any datashard")]
    NoDataShard,

    #[error("{0}")]
    Catalog(#[from] crate::catalog::Error),
}
