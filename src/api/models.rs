use serde::{Deserialize, Serialize};

use crate::blockchain::Block;
use crate::transaction::Transaction;

/* ---------- Generic ---------- */

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure body for operations that need a wallet.
#[derive(Debug, Serialize, Deserialize)]
pub struct WalletStatusResponse {
    pub message: String,
    pub wallet_set_up: bool,
}

/* ---------- Wallet API Models ---------- */

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletResponse {
    pub public_key: String,
    pub private_key: String,
    pub funds: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct BalanceQuery {
    pub participant: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub message: String,
    pub funds: f64,
}

/* ---------- TX API Models ---------- */

#[derive(Debug, Deserialize)]
pub struct NewTxRequest {
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewTxResponse {
    pub message: String,
    pub transaction: Transaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funds: Option<f64>,
}

/* ---------- Chain API Models ---------- */

#[derive(Debug, Serialize, Deserialize)]
pub struct MineResponse {
    pub message: String,
    pub block: Block,
    pub funds: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid_chain: bool,
    pub valid_transactions: bool,
    pub length: usize,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastBlockRequest {
    pub block: Option<Block>,
}

/* ---------- Peer API Models ---------- */

#[derive(Debug, Deserialize)]
pub struct AddNodeRequest {
    #[serde(default)]
    pub node: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub all_nodes: Vec<String>,
}
