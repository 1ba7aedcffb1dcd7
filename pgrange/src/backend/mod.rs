//! Backend manages connections to PostgreSQL shards.

pub mod error;
pub mod multi_shard;
pub mod pool;
pub mod server;

pub use error::Error;
pub use multi_shard::MultiShard;
pub use pool::{PoolManager, SessionPool};
pub use server::Server;
