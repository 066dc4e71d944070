use log::{debug, error, info, warn};
use thiserror::Error;

use super::verification::{self, Rejection};
use super::{Block, MINING_REWARD};
use crate::storage::{SnapshotFile, SnapshotRef, StorageError};
use crate::transaction::Transaction;
use crate::wallet;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("no wallet configured on this node")]
    NoWallet,
    #[error("transaction rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("block proof of work is invalid")]
    InvalidProof,
    #[error("block does not extend the current chain tip")]
    NotChainTip,
    #[error("block index {got} does not follow the tip (expected {expected})")]
    UnexpectedIndex { expected: u64, got: u64 },
    #[error("chain tip or open transactions changed while mining")]
    StaleJob,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Everything a proof-of-work search needs, detached from the ledger so the
/// search can run without holding it.
#[derive(Debug, Clone)]
pub struct MiningJob {
    pub index: u64,
    pub previous_hash: String,
    pub transactions: Vec<Transaction>,
    pub miner: String,
}

/// Chain, open transactions and peers of one node.
///
/// Every mutation is written to the snapshot file before it becomes visible
/// in memory; a failed save leaves the ledger unchanged.
#[derive(Debug)]
pub struct Ledger {
    chain: Vec<Block>,
    open_transactions: Vec<Transaction>,
    peer_nodes: Vec<String>,
    public_key: Option<String>,
    store: SnapshotFile,
}

impl Ledger {
    /// Resume from `store`, or start at genesis when it holds nothing yet.
    pub fn open(store: SnapshotFile) -> Result<Self, StorageError> {
        let (chain, open_transactions, peer_nodes) = match store.load()? {
            Some(snap) if !snap.chain.is_empty() => {
                info!(
                    "LEDGER - resumed at height {} with {} open txs, {} peers",
                    snap.chain.len(),
                    snap.open_transactions.len(),
                    snap.peer_nodes.len()
                );
                (snap.chain, snap.open_transactions, snap.peer_nodes)
            }
            _ => {
                info!(
                    "LEDGER - no snapshot at {}, starting from genesis",
                    store.path().display()
                );
                (vec![Block::genesis()], Vec::new(), Vec::new())
            }
        };

        Ok(Self {
            chain,
            open_transactions,
            peer_nodes,
            public_key: None,
            store,
        })
    }

    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    pub fn set_public_key(&mut self, public_key: Option<String>) {
        self.public_key = public_key;
    }

    pub fn chain(&self) -> Vec<Block> {
        self.chain.clone()
    }

    pub fn open_transactions(&self) -> Vec<Transaction> {
        self.open_transactions.clone()
    }

    pub fn peers(&self) -> Vec<String> {
        self.peer_nodes.clone()
    }

    pub fn height(&self) -> usize {
        self.chain.len()
    }

    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("ledger always holds at least the genesis block")
    }

    /// Received minus sent, where "sent" includes spends still in the pool.
    pub fn balance_of(&self, participant: &str) -> f64 {
        let (mut received, mut sent) = (0.0, 0.0);
        for tx in self.chain.iter().flat_map(|b| &b.transactions) {
            if tx.sender == participant {
                sent += tx.amount;
            }
            if tx.recipient == participant {
                received += tx.amount;
            }
        }
        let pending: f64 = self
            .open_transactions
            .iter()
            .filter(|tx| tx.sender == participant)
            .map(|tx| tx.amount)
            .sum();
        received - (sent + pending)
    }

    /// Balance of `participant`, or of this node's own identity.
    ///
    /// `None` when asked for the own balance while no wallet is configured.
    pub fn get_balance(&self, participant: Option<&str>) -> Option<f64> {
        participant
            .or(self.public_key())
            .map(|p| self.balance_of(p))
    }

    /// Admit a signed transaction to the pool.
    pub fn add_transaction(
        &mut self,
        recipient: &str,
        sender: &str,
        signature: &str,
        amount: f64,
    ) -> Result<Transaction, LedgerError> {
        if self.public_key.is_none() {
            return Err(LedgerError::NoWallet);
        }

        let tx = Transaction::new(
            sender.to_string(),
            recipient.to_string(),
            amount,
            signature.to_string(),
        );
        if tx.is_reward() {
            warn!("LEDGER - transaction to {recipient} uses the reward sender, rejected");
            return Err(Rejection::ReservedSender.into());
        }
        if let Err(reason) = verification::check_transaction(&tx, |p| self.balance_of(p)) {
            warn!("LEDGER - transaction of {amount} to {recipient} rejected: {reason}");
            return Err(reason.into());
        }

        let mut pool = self.open_transactions.clone();
        pool.push(tx.clone());
        self.persist(&self.chain, &pool, &self.peer_nodes)?;
        self.open_transactions = pool;

        debug!(
            "LEDGER - transaction admitted (pool size {})",
            self.open_transactions.len()
        );
        Ok(tx)
    }

    /// Snapshot the pool and tip for a proof-of-work search.
    pub fn mining_job(&self) -> Result<MiningJob, LedgerError> {
        let miner = self.public_key.clone().ok_or(LedgerError::NoWallet)?;
        Ok(MiningJob {
            index: self.chain.len() as u64,
            previous_hash: self.last_block().hash(),
            transactions: self.open_transactions.clone(),
            miner,
        })
    }

    /// Seal `job` with `proof` and append the resulting block.
    ///
    /// Fails with [`LedgerError::StaleJob`] when the tip moved or the pool no
    /// longer starts with the job's transactions. Transactions admitted while
    /// the search ran stay pooled.
    pub fn commit_mined_block(
        &mut self,
        job: MiningJob,
        proof: u64,
    ) -> Result<Block, LedgerError> {
        if job.previous_hash != self.last_block().hash()
            || !self.open_transactions.starts_with(&job.transactions)
        {
            return Err(LedgerError::StaleJob);
        }
        if !verification::valid_proof(&job.transactions, &job.previous_hash, proof) {
            return Err(LedgerError::InvalidProof);
        }
        if let Some(bad) = job
            .transactions
            .iter()
            .find(|tx| !tx.is_reward() && !wallet::verify_transaction(tx))
        {
            warn!(
                "LEDGER - refusing to mine: pooled transaction to {} has an invalid signature",
                bad.recipient
            );
            return Err(Rejection::InvalidSignature.into());
        }

        let mined = job.transactions.len();
        let mut transactions = job.transactions;
        transactions.push(Transaction::reward(&job.miner, MINING_REWARD));
        let block = Block::new(job.index, job.previous_hash, transactions, proof);

        let mut chain = self.chain.clone();
        chain.push(block.clone());
        let pool = self.open_transactions[mined..].to_vec();
        self.persist(&chain, &pool, &self.peer_nodes)?;
        self.chain = chain;
        self.open_transactions = pool;

        info!(
            "LEDGER - mined block #{} with {} txs (proof={})",
            block.index, mined, block.proof
        );
        Ok(block)
    }

    /// Mine the whole pool into a new block, searching on this thread.
    pub fn mine_block(&mut self) -> Result<Block, LedgerError> {
        let job = self.mining_job()?;
        let proof = verification::proof_of_work(&job.transactions, &job.previous_hash);
        self.commit_mined_block(job, proof)
    }

    /// Append a block received from a peer.
    ///
    /// Only a block that extends the exact current tip is accepted; there is
    /// no fork handling. Pooled transactions confirmed by the block leave the
    /// pool.
    pub fn add_block(&mut self, block: Block) -> Result<(), LedgerError> {
        let proven = block.proven_transactions().ok_or(LedgerError::InvalidProof)?;
        if !verification::valid_proof(proven, &block.previous_hash, block.proof) {
            warn!("LEDGER - peer block #{} has an invalid proof", block.index);
            return Err(LedgerError::InvalidProof);
        }
        if block.previous_hash != self.last_block().hash() {
            warn!("LEDGER - peer block #{} does not extend our tip", block.index);
            return Err(LedgerError::NotChainTip);
        }
        let expected = self.chain.len() as u64;
        if block.index != expected {
            warn!("LEDGER - peer block claims index {}, expected {expected}", block.index);
            return Err(LedgerError::UnexpectedIndex {
                expected,
                got: block.index,
            });
        }

        let pool: Vec<Transaction> = self
            .open_transactions
            .iter()
            .filter(|tx| !block.transactions.contains(tx))
            .cloned()
            .collect();
        let confirmed = self.open_transactions.len() - pool.len();

        let mut chain = self.chain.clone();
        chain.push(block);
        self.persist(&chain, &pool, &self.peer_nodes)?;
        self.chain = chain;
        self.open_transactions = pool;

        info!(
            "LEDGER - accepted peer block #{} ({} pooled txs confirmed)",
            self.last_block().index,
            confirmed
        );
        Ok(())
    }

    pub fn add_peer(&mut self, node: &str) -> Result<(), LedgerError> {
        let mut peers = self.peer_nodes.clone();
        peers.push(node.to_string());
        self.persist(&self.chain, &self.open_transactions, &peers)?;
        self.peer_nodes = peers;
        info!("LEDGER - peer {node} added");
        Ok(())
    }

    /// Drop every entry equal to `node`.
    pub fn remove_peer(&mut self, node: &str) -> Result<(), LedgerError> {
        let peers: Vec<String> = self
            .peer_nodes
            .iter()
            .filter(|p| p.as_str() != node)
            .cloned()
            .collect();
        self.persist(&self.chain, &self.open_transactions, &peers)?;
        self.peer_nodes = peers;
        info!("LEDGER - peer {node} removed");
        Ok(())
    }

    pub fn verify_chain(&self) -> bool {
        verification::verify_chain(&self.chain)
    }

    pub fn verify_open_transactions(&self) -> bool {
        verification::verify_transactions(&self.open_transactions, |p| self.balance_of(p))
    }

    fn persist(
        &self,
        chain: &[Block],
        open_transactions: &[Transaction],
        peer_nodes: &[String],
    ) -> Result<(), StorageError> {
        self.store
            .save(SnapshotRef {
                chain,
                open_transactions,
                peer_nodes,
            })
            .inspect_err(|e| error!("LEDGER - snapshot save failed: {e}"))
    }
}
