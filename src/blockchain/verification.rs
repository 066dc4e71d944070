//! Stateless validation of proofs, transactions and whole chains.
//!
//! Nothing here touches ledger state directly: balance lookups are passed in
//! as a closure so the same checks serve the local ledger and tests alike.

use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use thiserror::Error;

use super::POW_PREFIX;
use super::block::Block;
use super::hash::{canonical_json, hash_string};
use crate::transaction::Transaction;
use crate::wallet;

/// How often the interruptible search looks at its cancel flag.
const CANCEL_POLL_INTERVAL: u64 = 1024;

/// Why a transaction was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("amount must be a finite, non-negative number")]
    InvalidAmount,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("sender is reserved for block rewards")]
    ReservedSender,
}

/// Does `proof` seal `transactions` on top of the block hashed `last_hash`?
pub fn valid_proof(transactions: &[Transaction], last_hash: &str, proof: u64) -> bool {
    let guess = format!("{}{}{}", canonical_json(transactions), last_hash, proof);
    hash_string(&guess).starts_with(POW_PREFIX)
}

/// Search nonces from 0 upwards until one satisfies [`valid_proof`].
pub fn proof_of_work(transactions: &[Transaction], last_hash: &str) -> u64 {
    let never = AtomicBool::new(false);
    proof_of_work_until(transactions, last_hash, &never)
        .expect("search without a cancel signal always finds a proof")
}

/// Same search as [`proof_of_work`], abandoned once `cancel` is raised.
pub fn proof_of_work_until(
    transactions: &[Transaction],
    last_hash: &str,
    cancel: &AtomicBool,
) -> Option<u64> {
    // The transaction list is fixed for the whole search, serialize it once.
    let prefix = format!("{}{}", canonical_json(transactions), last_hash);
    let mut proof: u64 = 0;
    loop {
        if proof % CANCEL_POLL_INTERVAL == 0 && cancel.load(Ordering::Relaxed) {
            debug!("POW - search cancelled after {proof} attempts");
            return None;
        }
        if hash_string(&format!("{prefix}{proof}")).starts_with(POW_PREFIX) {
            debug!("POW - found proof {proof} for {} txs", transactions.len());
            return Some(proof);
        }
        proof = proof.wrapping_add(1);
    }
}

/// Check funds and authenticity of a single transaction.
///
/// `balance` must already account for pending pool debits, so a spend that
/// only fits the confirmed balance is refused as a double spend. Rewards skip
/// the signature check.
pub fn check_transaction<F>(tx: &Transaction, balance: F) -> Result<(), Rejection>
where
    F: Fn(&str) -> f64,
{
    if !tx.amount.is_finite() || tx.amount < 0.0 {
        return Err(Rejection::InvalidAmount);
    }
    if balance(&tx.sender) < tx.amount {
        return Err(Rejection::InsufficientFunds);
    }
    if !tx.is_reward() && !wallet::verify_transaction(tx) {
        return Err(Rejection::InvalidSignature);
    }
    Ok(())
}

pub fn verify_transaction<F>(tx: &Transaction, balance: F) -> bool
where
    F: Fn(&str) -> f64,
{
    check_transaction(tx, balance).is_ok()
}

/// All-or-nothing check of a transaction list.
///
/// Every entry is judged against the same balance function, evaluated as the
/// ledger stands now. Earlier entries in the list are not deducted before
/// later ones are checked.
pub fn verify_transactions<F>(transactions: &[Transaction], balance: F) -> bool
where
    F: Fn(&str) -> f64,
{
    transactions.iter().all(|tx| verify_transaction(tx, &balance))
}

/// Position, linkage and proof-of-work of every block after genesis.
pub fn verify_chain(chain: &[Block]) -> bool {
    for (i, pair) in chain.windows(2).enumerate() {
        let (prev, block) = (&pair[0], &pair[1]);
        if block.index != (i + 1) as u64 {
            warn!("CHAIN - block at height {} claims index {}", i + 1, block.index);
            return false;
        }
        if block.previous_hash != prev.hash() {
            warn!("CHAIN - block #{} does not link to its predecessor", i + 1);
            return false;
        }
        let Some(proven) = block.proven_transactions() else {
            warn!("CHAIN - block #{} carries no reward transaction", i + 1);
            return false;
        };
        if !valid_proof(proven, &block.previous_hash, block.proof) {
            warn!("CHAIN - proof of work of block #{} is invalid", i + 1);
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::MINING_REWARD;
    use crate::wallet::Wallet;

    fn spend(sender: &str, amount: f64) -> Transaction {
        Transaction::new(sender.into(), "bob".into(), amount, "sig".into())
    }

    /// Seal `txs` on top of `chain` the way the miner does.
    fn mine_onto(chain: &mut Vec<Block>, txs: Vec<Transaction>) {
        let last = chain.last().unwrap();
        let prev = last.hash();
        let proof = proof_of_work(&txs, &prev);
        let mut all = txs;
        all.push(Transaction::reward("miner", MINING_REWARD));
        chain.push(Block::new(last.index + 1, prev, all, proof));
    }

    #[test]
    fn valid_proof_matches_digest_prefix() {
        let txs = vec![spend("alice", 1.0)];
        for proof in 0..64 {
            let guess = format!("{}{}{}", canonical_json(&txs), "h", proof);
            assert_eq!(
                valid_proof(&txs, "h", proof),
                hash_string(&guess).starts_with("00")
            );
        }
    }

    #[test]
    fn proof_of_work_finds_valid_proof() {
        let txs = vec![spend("alice", 1.0), spend("carol", 2.0)];
        let proof = proof_of_work(&txs, "abc");
        assert!(valid_proof(&txs, "abc", proof));
        assert!((0..proof).all(|p| !valid_proof(&txs, "abc", p)));
    }

    #[test]
    fn cancelled_search_returns_none() {
        let cancel = AtomicBool::new(true);
        assert_eq!(proof_of_work_until(&[], "abc", &cancel), None);
    }

    #[test]
    fn insufficient_balance_rejected() {
        let tx = spend("alice", 5.0);
        assert_eq!(
            check_transaction(&tx, |_| 4.99),
            Err(Rejection::InsufficientFunds)
        );
    }

    #[test]
    fn negative_or_nan_amount_rejected() {
        assert_eq!(
            check_transaction(&spend("alice", -1.0), |_| 100.0),
            Err(Rejection::InvalidAmount)
        );
        assert_eq!(
            check_transaction(&spend("alice", f64::NAN), |_| 100.0),
            Err(Rejection::InvalidAmount)
        );
    }

    #[test]
    fn bad_signature_rejected_even_with_funds() {
        assert_eq!(
            check_transaction(&spend("alice", 1.0), |_| 100.0),
            Err(Rejection::InvalidSignature)
        );
    }

    #[test]
    fn signed_transaction_with_funds_accepted() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut w = Wallet::new(dir.path().join("w.txt"));
        w.create_keys();
        let sender = w.public_key().unwrap().to_string();
        let sig = w.sign_transaction(&sender, "bob", 3.0).unwrap();
        let tx = Transaction::new(sender, "bob".into(), 3.0, sig);
        assert!(verify_transaction(&tx, |_| 3.0));
    }

    #[test]
    fn reward_skips_signature() {
        let reward = Transaction::reward("miner", MINING_REWARD);
        assert!(verify_transaction(&reward, |_| MINING_REWARD));
    }

    #[test]
    fn verify_transactions_uses_balance_as_of_now() {
        // Two spends of 6 against a balance of 10 pass: the batch is not
        // re-evaluated after the first entry.
        let txs = vec![
            Transaction::reward("miner", 6.0),
            Transaction::reward("miner", 6.0),
        ];
        assert!(verify_transactions(&txs, |_| 10.0));
        assert!(!verify_transactions(&txs, |_| 5.0));
    }

    #[test]
    fn freshly_mined_chain_verifies() {
        let mut chain = vec![Block::genesis()];
        mine_onto(&mut chain, vec![]);
        mine_onto(&mut chain, vec![spend("alice", 1.0)]);
        mine_onto(&mut chain, vec![spend("bob", 2.0), spend("carol", 3.0)]);
        assert!(verify_chain(&chain));
    }

    #[test]
    fn altered_previous_hash_breaks_chain() {
        let mut chain = vec![Block::genesis()];
        mine_onto(&mut chain, vec![spend("alice", 1.0)]);
        mine_onto(&mut chain, vec![]);
        chain[1].previous_hash = "forged".into();
        assert!(!verify_chain(&chain));
    }

    #[test]
    fn mutated_transactions_break_chain() {
        let mut chain = vec![Block::genesis()];
        mine_onto(&mut chain, vec![spend("alice", 1.0)]);
        mine_onto(&mut chain, vec![]);
        chain[1].transactions[0].amount = 1000.0;
        assert!(!verify_chain(&chain));
    }

    #[test]
    fn mutated_tip_fails_its_own_proof() {
        let mut chain = vec![Block::genesis()];
        mine_onto(&mut chain, vec![spend("alice", 1.0)]);

        // Nothing links to the tip, so the edit must be caught by the proof.
        // Pick an edit the old proof does not happen to satisfy.
        let tip = chain[1].clone();
        let forged = (2..)
            .map(|n| spend("alice", n as f64))
            .find(|tx| !valid_proof(std::slice::from_ref(tx), &tip.previous_hash, tip.proof))
            .unwrap();
        chain[1].transactions[0] = forged;
        assert!(!verify_chain(&chain));
    }

    #[test]
    fn tampered_genesis_breaks_link() {
        let mut chain = vec![Block::genesis()];
        mine_onto(&mut chain, vec![]);
        chain[0].transactions.push(spend("chris", 100.0));
        assert!(!verify_chain(&chain));
    }

    #[test]
    fn index_must_match_position() {
        let mut chain = vec![Block::genesis()];
        mine_onto(&mut chain, vec![spend("alice", 1.0)]);
        assert!(verify_chain(&chain));

        // Index is not covered by the proof, only by the next block's link.
        chain[1].index = 1000;
        assert!(!verify_chain(&chain));
    }

    #[test]
    fn non_genesis_block_without_reward_is_invalid() {
        let genesis = Block::genesis();
        let empty = Block::new(1, genesis.hash(), vec![], 0);
        assert!(!verify_chain(&[genesis, empty]));
    }
}
