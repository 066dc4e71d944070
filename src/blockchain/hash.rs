use serde::Serialize;
use sha2::{Digest, Sha256};

use super::Block;

/// Lowercase hex SHA-256 of `s`.
pub fn hash_string(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compact JSON of `value`, in struct field declaration order.
///
/// This is the canonical form fed to every hash in the ledger.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).expect("ledger types always serialize")
}

/// Hash of a whole block, including its transactions and proof.
pub fn hash_block(block: &Block) -> String {
    hash_string(&canonical_json(block))
}
