//! The shared node: ledger and wallet behind locks, plus peer gossip.
//!
//! Mutations hold the ledger write lock for their whole validate, persist and
//! swap sequence. Proof-of-work and peer broadcasts run with no lock held.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use actix_web::web;
use log::{info, warn};
use thiserror::Error;

use crate::blockchain::verification::proof_of_work_until;
use crate::blockchain::{Block, Ledger, LedgerError, MiningJob};
use crate::network::{BroadcastError, PeerClient};
use crate::transaction::Transaction;
use crate::wallet::{Wallet, WalletError};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    /// Local state is committed, but a peer refused it.
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
    #[error("a block is already being mined")]
    MiningInProgress,
    #[error("mining interrupted by a block from a peer")]
    Interrupted,
    #[error("proof-of-work worker failed")]
    Worker,
}

impl NodeError {
    /// True when the failure only means "set up a wallet first".
    pub fn is_no_wallet(&self) -> bool {
        matches!(self, NodeError::Ledger(LedgerError::NoWallet))
    }
}

/// Base64 keys handed back to the wallet owner.
#[derive(Debug, Clone)]
pub struct WalletKeys {
    pub public_key: String,
    pub private_key: String,
}

pub struct Node {
    ledger: RwLock<Ledger>,
    wallet: RwLock<Wallet>,
    peers: PeerClient,
    mining: AtomicBool,
    cancel_mining: Arc<AtomicBool>,
}

/// Clears the mining flag when the attempt ends, however it ends.
struct MiningGuard<'a>(&'a AtomicBool);

impl Drop for MiningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Node {
    /// Wire a ledger and wallet together. A wallet that already holds keys
    /// becomes the ledger's identity.
    pub fn new(mut ledger: Ledger, wallet: Wallet, peers: PeerClient) -> Self {
        ledger.set_public_key(wallet.public_key().map(String::from));
        Self {
            ledger: RwLock::new(ledger),
            wallet: RwLock::new(wallet),
            peers,
            mining: AtomicBool::new(false),
            cancel_mining: Arc::new(AtomicBool::new(false)),
        }
    }

    fn ledger(&self) -> RwLockReadGuard<'_, Ledger> {
        self.ledger.read().expect("ledger lock poisoned")
    }

    fn ledger_mut(&self) -> RwLockWriteGuard<'_, Ledger> {
        self.ledger.write().expect("ledger lock poisoned")
    }

    fn wallet(&self) -> RwLockReadGuard<'_, Wallet> {
        self.wallet.read().expect("wallet lock poisoned")
    }

    /* -------------------- Reads -------------------- */

    pub fn chain(&self) -> Vec<Block> {
        self.ledger().chain()
    }

    pub fn open_transactions(&self) -> Vec<Transaction> {
        self.ledger().open_transactions()
    }

    pub fn peers(&self) -> Vec<String> {
        self.ledger().peers()
    }

    pub fn get_balance(&self, participant: Option<&str>) -> Option<f64> {
        self.ledger().get_balance(participant)
    }

    pub fn public_key(&self) -> Option<String> {
        self.ledger().public_key().map(String::from)
    }

    /// Number of blocks, genesis included.
    pub fn height(&self) -> usize {
        self.ledger().height()
    }

    pub fn tip_index(&self) -> u64 {
        self.ledger().last_block().index
    }

    /// (chain valid, open transactions valid)
    pub fn verify(&self) -> (bool, bool) {
        let ledger = self.ledger();
        (ledger.verify_chain(), ledger.verify_open_transactions())
    }

    /* -------------------- Wallet -------------------- */

    /// Create and save a fresh keypair and make it this node's identity.
    pub fn create_wallet(&self) -> Result<WalletKeys, NodeError> {
        let mut wallet = self.wallet.write().expect("wallet lock poisoned");
        let mut fresh = wallet.clone();
        fresh.create_keys();
        fresh.save_keys()?;
        *wallet = fresh;
        self.adopt_identity(&wallet)
    }

    /// Load the keypair from disk and make it this node's identity.
    pub fn load_wallet(&self) -> Result<WalletKeys, NodeError> {
        let mut wallet = self.wallet.write().expect("wallet lock poisoned");
        let mut loaded = wallet.clone();
        if !loaded.load_keys()? {
            return Err(LedgerError::NoWallet.into());
        }
        *wallet = loaded;
        self.adopt_identity(&wallet)
    }

    fn adopt_identity(&self, wallet: &Wallet) -> Result<WalletKeys, NodeError> {
        let (Some(public_key), Some(private_key)) = (wallet.public_key(), wallet.private_key())
        else {
            return Err(WalletError::NoKeys.into());
        };
        self.ledger_mut().set_public_key(Some(public_key.to_string()));
        info!("NODE - wallet identity set");
        Ok(WalletKeys {
            public_key: public_key.to_string(),
            private_key: private_key.to_string(),
        })
    }

    /* -------------------- Transactions -------------------- */

    /// Sign a transfer from this node's wallet, admit it and gossip it.
    pub async fn submit_transaction(
        &self,
        recipient: &str,
        amount: f64,
    ) -> Result<Transaction, NodeError> {
        let (sender, signature) = {
            let wallet = self.wallet();
            let sender = wallet
                .public_key()
                .ok_or(LedgerError::NoWallet)?
                .to_string();
            let signature = wallet.sign_transaction(&sender, recipient, amount)?;
            (sender, signature)
        };
        self.add_transaction_and_broadcast(recipient, &sender, &signature, amount)
            .await
    }

    /// Admit a transaction locally, then send it to every peer.
    ///
    /// A peer refusal is reported as an error even though the transaction
    /// has already been committed to the local pool.
    pub async fn add_transaction_and_broadcast(
        &self,
        recipient: &str,
        sender: &str,
        signature: &str,
        amount: f64,
    ) -> Result<Transaction, NodeError> {
        let (tx, peers) = {
            let mut ledger = self.ledger_mut();
            let tx = ledger.add_transaction(recipient, sender, signature, amount)?;
            (tx, ledger.peers())
        };
        self.peers.broadcast_transaction_to_all(&peers, &tx).await?;
        Ok(tx)
    }

    /// Admit a transaction gossiped by a peer. It is not re-broadcast.
    pub fn receive_transaction(
        &self,
        recipient: &str,
        sender: &str,
        signature: &str,
        amount: f64,
    ) -> Result<Transaction, NodeError> {
        Ok(self
            .ledger_mut()
            .add_transaction(recipient, sender, signature, amount)?)
    }

    /* -------------------- Blocks -------------------- */

    fn try_start_mining(&self) -> Option<MiningGuard<'_>> {
        self.mining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| MiningGuard(&self.mining))
    }

    /// Mine the open transactions into a block and gossip it.
    ///
    /// The proof search runs on the blocking pool and is abandoned when a
    /// peer block lands first. A peer refusal after the local commit is
    /// reported as an error, as for transactions.
    pub async fn mine_block(&self) -> Result<Block, NodeError> {
        let _guard = self.try_start_mining().ok_or(NodeError::MiningInProgress)?;
        // Cleared under the ledger lock: only blocks added after the job was
        // taken can make it stale.
        let job = {
            let ledger = self.ledger();
            self.cancel_mining.store(false, Ordering::Release);
            ledger.mining_job()?
        };
        self.seal(job).await
    }

    /// Search a proof for `job`, commit the block and gossip it.
    async fn seal(&self, job: MiningJob) -> Result<Block, NodeError> {
        let cancel = Arc::clone(&self.cancel_mining);
        let (transactions, previous_hash) = (job.transactions.clone(), job.previous_hash.clone());
        let proof = web::block(move || proof_of_work_until(&transactions, &previous_hash, &cancel))
            .await
            .map_err(|_| NodeError::Worker)?
            .ok_or(NodeError::Interrupted)?;

        let (block, peers) = {
            let mut ledger = self.ledger_mut();
            let block = ledger.commit_mined_block(job, proof)?;
            (block, ledger.peers())
        };
        self.peers.broadcast_block_to_all(&peers, &block).await?;
        Ok(block)
    }

    /// Append a block gossiped by a peer and abandon any local search that
    /// it made stale. It is not re-broadcast.
    pub fn receive_block(&self, block: Block) -> Result<(), NodeError> {
        let mut ledger = self.ledger_mut();
        ledger.add_block(block)?;
        if self.mining.load(Ordering::Acquire) {
            warn!("NODE - peer block arrived mid-search, cancelling local mining");
        }
        self.cancel_mining.store(true, Ordering::Release);
        Ok(())
    }

    /* -------------------- Peers -------------------- */

    pub fn add_peer(&self, node: &str) -> Result<Vec<String>, NodeError> {
        let mut ledger = self.ledger_mut();
        ledger.add_peer(node)?;
        Ok(ledger.peers())
    }

    pub fn remove_peer(&self, node: &str) -> Result<Vec<String>, NodeError> {
        let mut ledger = self.ledger_mut();
        ledger.remove_peer(node)?;
        Ok(ledger.peers())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::MINING_REWARD;
    use crate::network::peer::DEFAULT_PEER_TIMEOUT;
    use crate::storage::SnapshotFile;
    use actix_web::{App, HttpResponse, HttpServer};
    use tempfile::TempDir;

    fn node_in(dir: &TempDir, port: u16) -> Node {
        let ledger = Ledger::open(SnapshotFile::new(
            dir.path().join(format!("blockchain-{port}.txt")),
        ))
        .unwrap();
        let wallet = Wallet::new(dir.path().join(format!("wallet-{port}.txt")));
        Node::new(ledger, wallet, PeerClient::new(DEFAULT_PEER_TIMEOUT).unwrap())
    }

    async fn declining_peer() -> (String, actix_web::dev::ServerHandle) {
        let server = HttpServer::new(|| {
            App::new().default_service(web::to(|| async { HttpResponse::BadRequest().finish() }))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0].to_string();
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);
        (addr, handle)
    }

    #[actix_web::test]
    async fn no_wallet_means_no_mining_or_spending() {
        let dir = TempDir::new().unwrap();
        let node = node_in(&dir, 5000);
        assert!(node.mine_block().await.unwrap_err().is_no_wallet());
        assert!(node.submit_transaction("bob", 1.0).await.unwrap_err().is_no_wallet());
        assert!(node.load_wallet().unwrap_err().is_no_wallet());
        assert_eq!(node.get_balance(None), None);
    }

    #[actix_web::test]
    async fn mine_then_spend_with_unreachable_peer() {
        let dir = TempDir::new().unwrap();
        let node = node_in(&dir, 5000);
        node.create_wallet().unwrap();
        node.add_peer("127.0.0.1:1").unwrap();

        let block = node.mine_block().await.unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(node.get_balance(None), Some(MINING_REWARD));

        let tx = node.submit_transaction("bob", 4.0).await.unwrap();
        assert_eq!(node.open_transactions(), vec![tx]);
        assert_eq!(node.get_balance(None), Some(6.0));
        assert_eq!(node.verify(), (true, true));
    }

    #[actix_web::test]
    async fn declined_broadcast_still_commits_locally() {
        // Inherited behavior: the caller is told the broadcast failed, yet
        // the local pool already holds the transaction.
        let dir = TempDir::new().unwrap();
        let node = node_in(&dir, 5000);
        node.create_wallet().unwrap();
        node.mine_block().await.unwrap();

        let (peer, handle) = declining_peer().await;
        node.add_peer(&peer).unwrap();

        let err = node.submit_transaction("bob", 2.0).await.unwrap_err();
        assert!(matches!(err, NodeError::Broadcast(BroadcastError::Declined { .. })));
        assert_eq!(node.open_transactions().len(), 1);

        let err = node.mine_block().await.unwrap_err();
        assert!(matches!(err, NodeError::Broadcast(_)));
        assert_eq!(node.chain().len(), 3);
        handle.stop(false).await;
    }

    #[actix_web::test]
    async fn one_miner_at_a_time() {
        let dir = TempDir::new().unwrap();
        let node = node_in(&dir, 5000);
        node.create_wallet().unwrap();

        let guard = node.try_start_mining().unwrap();
        assert!(matches!(node.mine_block().await, Err(NodeError::MiningInProgress)));
        drop(guard);
        assert!(node.mine_block().await.is_ok());
    }

    #[actix_web::test]
    async fn peer_block_reconciles_pool_and_flags_miner() {
        let dir = TempDir::new().unwrap();
        let alice = node_in(&dir, 5000);
        let bob = node_in(&dir, 5001);
        alice.create_wallet().unwrap();
        bob.create_wallet().unwrap();

        let first = alice.mine_block().await.unwrap();
        bob.receive_block(first).unwrap();

        let tx = alice.submit_transaction("carol", 3.0).await.unwrap();
        bob.receive_transaction(&tx.recipient, &tx.sender, &tx.signature, tx.amount)
            .unwrap();
        assert_eq!(bob.open_transactions(), vec![tx]);

        let second = alice.mine_block().await.unwrap();
        bob.receive_block(second).unwrap();
        assert!(bob.open_transactions().is_empty());
        assert_eq!(bob.chain(), alice.chain());
        assert_eq!(bob.get_balance(Some("carol")), Some(3.0));
        assert!(bob.cancel_mining.load(Ordering::Acquire));
    }

    #[actix_web::test]
    async fn search_abandoned_by_peer_block_commits_nothing() {
        let dir = TempDir::new().unwrap();
        let alice = node_in(&dir, 5000);
        let bob = node_in(&dir, 5001);
        alice.create_wallet().unwrap();
        bob.create_wallet().unwrap();

        let job = alice.ledger().mining_job().unwrap();
        let _guard = alice.try_start_mining().unwrap();
        let peer_block = bob.mine_block().await.unwrap();
        alice.receive_block(peer_block.clone()).unwrap();

        assert!(matches!(alice.seal(job).await, Err(NodeError::Interrupted)));
        assert_eq!(alice.chain(), vec![Block::genesis(), peer_block]);
        assert_eq!(alice.get_balance(None), Some(0.0));
    }

    #[actix_web::test]
    async fn next_mining_round_clears_cancellation() {
        let dir = TempDir::new().unwrap();
        let node = node_in(&dir, 5000);
        node.create_wallet().unwrap();

        node.cancel_mining.store(true, Ordering::Release);
        let block = node.mine_block().await.unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(node.height(), 2);
    }

    #[test]
    fn wallet_reloads_after_restart() {
        let dir = TempDir::new().unwrap();
        let keys = node_in(&dir, 5000).create_wallet().unwrap();

        let restarted = node_in(&dir, 5000);
        assert_eq!(restarted.public_key(), None);
        let loaded = restarted.load_wallet().unwrap();
        assert_eq!(loaded.public_key, keys.public_key);
        assert_eq!(restarted.public_key(), Some(keys.public_key));
    }
}
