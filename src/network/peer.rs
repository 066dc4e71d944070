//! Best-effort gossip of new transactions and blocks to known peers.

use std::time::Duration;

use log::{debug, info, warn};
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::blockchain::Block;
use crate::transaction::Transaction;

/// Default per-request timeout for a single peer.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(1);

/// Outcome of delivering one message to one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerReply {
    Accepted,
    /// The peer answered 400 or 500: it refused the message.
    Declined(StatusCode),
    /// Connection failure or timeout.
    Unreachable,
    Other(StatusCode),
}

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("peer {peer} declined the broadcast ({status})")]
    Declined { peer: String, status: StatusCode },
}

#[derive(Debug, Clone)]
pub struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub async fn broadcast_transaction(&self, peer: &str, tx: &Transaction) -> PeerReply {
        self.post(peer, "broadcast-transaction", tx).await
    }

    pub async fn broadcast_block(&self, peer: &str, block: &Block) -> PeerReply {
        let body = serde_json::json!({ "block": block });
        self.post(peer, "broadcast-block", &body).await
    }

    /// Send `tx` to every peer in order, stopping at the first refusal.
    pub async fn broadcast_transaction_to_all(
        &self,
        peers: &[String],
        tx: &Transaction,
    ) -> Result<(), BroadcastError> {
        for peer in peers {
            let reply = self.broadcast_transaction(peer, tx).await;
            settle(peer, "transaction", reply)?;
        }
        Ok(())
    }

    /// Send `block` to every peer in order, stopping at the first refusal.
    pub async fn broadcast_block_to_all(
        &self,
        peers: &[String],
        block: &Block,
    ) -> Result<(), BroadcastError> {
        for peer in peers {
            let reply = self.broadcast_block(peer, block).await;
            settle(peer, "block", reply)?;
        }
        Ok(())
    }

    async fn post<T: Serialize + ?Sized>(&self, peer: &str, route: &str, body: &T) -> PeerReply {
        let url = format!("http://{peer}/api/v1/{route}/");
        match self.http.post(&url).json(body).send().await {
            Ok(resp) => classify(resp.status()),
            Err(e) => {
                debug!("PEER - POST {url} failed: {e}");
                PeerReply::Unreachable
            }
        }
    }
}

fn classify(status: StatusCode) -> PeerReply {
    match status {
        s if s.is_success() => PeerReply::Accepted,
        StatusCode::BAD_REQUEST | StatusCode::INTERNAL_SERVER_ERROR => PeerReply::Declined(status),
        s => PeerReply::Other(s),
    }
}

fn settle(peer: &str, what: &str, reply: PeerReply) -> Result<(), BroadcastError> {
    match reply {
        PeerReply::Accepted => {
            debug!("PEER - {peer} accepted {what}");
            Ok(())
        }
        PeerReply::Unreachable => {
            warn!("PEER - {peer} unreachable, skipping {what} broadcast");
            Ok(())
        }
        PeerReply::Other(status) => {
            info!("PEER - {peer} answered {status} to {what} broadcast");
            Ok(())
        }
        PeerReply::Declined(status) => {
            warn!("PEER - {peer} declined {what} ({status}), aborting broadcast");
            Err(BroadcastError::Declined {
                peer: peer.to_string(),
                status,
            })
        }
    }
}
