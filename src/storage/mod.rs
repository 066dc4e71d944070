//! Snapshot persistence for the ledger: chain, open transactions and peers,
//! one JSON document per line.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::blockchain::Block;
use crate::transaction::Transaction;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot line {line} is unreadable: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot is truncated: missing line {0}")]
    Truncated(usize),
}

/// Everything the ledger needs to resume after a restart.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub chain: Vec<Block>,
    pub open_transactions: Vec<Transaction>,
    pub peer_nodes: Vec<String>,
}

/// Borrowed view written by [`SnapshotFile::save`], so callers can persist a
/// staged state without cloning what did not change.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotRef<'a> {
    pub chain: &'a [Block],
    pub open_transactions: &'a [Transaction],
    pub peer_nodes: &'a [String],
}

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot, or `None` if this node never saved one.
    pub fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut lines = contents.lines();
        let chain = decode_line(lines.next(), 1)?;
        let open_transactions = decode_line(lines.next(), 2)?;
        let peer_nodes = decode_line(lines.next(), 3)?;
        debug!("STORAGE - loaded snapshot from {}", self.path.display());

        Ok(Some(Snapshot {
            chain,
            open_transactions,
            peer_nodes,
        }))
    }

    /// Replace the snapshot on disk.
    ///
    /// The new content goes to a sibling temp file first and is renamed into
    /// place, so readers never see a half-written snapshot.
    pub fn save(&self, snapshot: SnapshotRef<'_>) -> Result<(), StorageError> {
        let mut out = String::new();
        push_line(&mut out, snapshot.chain);
        push_line(&mut out, snapshot.open_transactions);
        push_line(&mut out, snapshot.peer_nodes);

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, out)?;
        fs::rename(&tmp, &self.path)?;
        debug!(
            "STORAGE - saved snapshot ({} blocks, {} open txs, {} peers)",
            snapshot.chain.len(),
            snapshot.open_transactions.len(),
            snapshot.peer_nodes.len()
        );
        Ok(())
    }
}

fn push_line<T: Serialize + ?Sized>(out: &mut String, value: &T) {
    out.push_str(&crate::blockchain::hash::canonical_json(value));
    out.push('\n');
}

fn decode_line<T: serde::de::DeserializeOwned>(
    line: Option<&str>,
    number: usize,
) -> Result<T, StorageError> {
    let line = line.ok_or(StorageError::Truncated(number))?;
    serde_json::from_str(line).map_err(|source| StorageError::Decode {
        line: number,
        source,
    })
}
