pub mod block;
pub mod hash;
pub mod ledger;
pub mod verification;

pub use block::Block;
pub use ledger::{Ledger, LedgerError, MiningJob};
pub use verification::Rejection;

/// Required hex prefix of a proof-of-work digest (top 8 bits zero).
pub const POW_PREFIX: &str = "00";

/// Amount credited to the miner of each block.
pub const MINING_REWARD: f64 = 10.0;
