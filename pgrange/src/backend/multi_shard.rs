//! Multi-shard server aggregate.
//!
//! Broadcasts the same message set to every bound shard. Results
//! are drained per shard, in shard order, and concatenated;
//! cross-shard result merging is out of scope.

use super::{Error, Server};

/// Server connections to several shards, driven as one.
#[derive(Debug)]
pub struct MultiShard {
    servers: Vec<Server>,
}

impl MultiShard {
    pub fn new(servers: Vec<Server>) -> Self {
        Self { servers }
    }

    /// Broadcast a message to all shards and flush.
    pub async fn send(&mut self, message: &crate::net::Message) -> Result<(), Error> {
        for server in &mut self.servers {
            server.send(message).await?;
        }
        self.flush().await
    }

    pub async fn flush(&mut self) -> Result<(), Error> {
        for server in &mut self.servers {
            server.flush().await?;
        }
        Ok(())
    }

    pub fn servers_mut(&mut self) -> &mut [Server] {
        &mut self.servers
    }

    pub fn servers(&self) -> &[Server] {
        &self.servers
    }

    pub fn names(&self) -> Vec<&str> {
        self.servers.iter().map(|server| server.name()).collect()
    }
}
