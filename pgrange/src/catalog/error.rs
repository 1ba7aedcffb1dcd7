//! Catalog and key-range store errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("key range \"{0}\" not found")]
    NotFound(String),

    #[error("key range \"{0}\" already exists")]
    AlreadyExists(String),

    #[error("key range \"{0}\" is locked")]
    Locked(String),

    #[error("key range \"{0}\" is not locked")]
    NotLocked(String),

    #[error("key ranges \"{0}\" and \"{1}\" overlap")]
    Overlap(String, String),

    #[error("split bound is outside of key range \"{0}\"")]
    InvalidBound(String),

    #[error("only single column sharding rules are supported")]
    InvalidRule,

    #[error("shard \"{0}\" is not a registered data shard")]
    UnknownShard(String),

    #[error("store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}
