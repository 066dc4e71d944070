use serde::{Deserialize, Serialize};

/// Sender used by block reward transactions. Rewards carry no signature.
pub const MINING_SENDER: &str = "MINING";

/// A transfer of `amount` from `sender` to `recipient`.
///
/// Field order is part of the canonical serialization used for block hashes
/// and proof-of-work guesses, so it must not change. Equality is structural:
/// a pooled transaction is recognised inside a confirmed block by comparing
/// all four fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
    /// Base64 DER ECDSA signature; empty for rewards.
    #[serde(default)]
    pub signature: String,
}

impl Transaction {
    pub fn new(sender: String, recipient: String, amount: f64, signature: String) -> Self {
        Self {
            sender,
            recipient,
            amount,
            signature,
        }
    }

    /// Build the reward paid to `miner` for sealing a block.
    pub fn reward(miner: &str, amount: f64) -> Self {
        Self::new(MINING_SENDER.to_string(), miner.to_string(), amount, String::new())
    }

    pub fn is_reward(&self) -> bool {
        self.sender == MINING_SENDER
    }

    /// Bytes covered by the sender's signature.
    ///
    /// The amount is rendered in its shortest round-trip form, so two
    /// different amounts never share a payload.
    pub fn signing_payload(sender: &str, recipient: &str, amount: f64) -> String {
        format!("{sender}{recipient}{amount:?}")
    }
}
