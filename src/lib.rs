//! A minimal proof-of-work ledger node: signed transfers, a transaction pool,
//! mining, and best-effort gossip with peer nodes over HTTP.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod network;
pub mod node;
pub mod storage;
pub mod transaction;
pub mod wallet;
