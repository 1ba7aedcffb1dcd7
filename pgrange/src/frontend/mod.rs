//! Frontend manages connections to clients.

pub mod client;
pub mod error;
pub mod listener;
pub mod relay;
pub mod router;
pub mod tx_status;

pub use client::Client;
pub use error::Error;
pub use listener::Listener;
pub use relay::RelayState;
pub use router::{QueryRouter, RoutingDecision};
pub use tx_status::TxStatus;
