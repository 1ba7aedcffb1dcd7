//! Parser errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("parsing stmt error: {0}")]
    PgQuery(pg_query::Error),

    #[error("no statement was parsed")]
    NoStatement,
}
