use serde::{Deserialize, Serialize};

use super::hash::hash_block;
use crate::transaction::Transaction;

/// A single block in the chain.
///
/// Field order is fixed: the block hash is taken over the serialized form,
/// and peers recompute it independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub previous_hash: String,
    pub index: u64,
    /// Pooled transactions in admission order, reward last.
    pub transactions: Vec<Transaction>,
    /// Proof-of-Work nonce
    pub proof: u64,
}

impl Block {
    /// The genesis block: an all-default placeholder, identical on every node.
    pub fn genesis() -> Self {
        Self::default()
    }

    pub fn new(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        proof: u64,
    ) -> Self {
        Self {
            previous_hash,
            index,
            transactions,
            proof,
        }
    }

    pub fn hash(&self) -> String {
        hash_block(self)
    }

    /// Transactions covered by the proof, i.e. all but the trailing reward.
    ///
    /// `None` for a block with no transactions at all, which only the
    /// genesis block may be.
    pub fn proven_transactions(&self) -> Option<&[Transaction]> {
        self.transactions.split_last().map(|(_reward, rest)| rest)
    }
}
