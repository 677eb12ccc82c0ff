//! Disk persistence for sealed blocks (one JSON file per block).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ledger_core::{Block, Ledger};
use parking_lot::Mutex;
use tracing::{debug, info};

/// Ensure that the given directory exists (create recursively if needed).
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory: {}", dir.display()))?;
    }
    Ok(())
}

/// Compute the JSON filename for a block index.
pub fn block_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("block_{index}.json"))
}

/// Write a block as `block_<index>.json` (pretty-printed), via a temp file and rename.
pub fn save_block(dir: &Path, block: &Block) -> Result<()> {
    ensure_dir(dir)?;
    let path = block_path(dir, block.index);
    let tmp = path.with_extension("json.tmp");
    let json = block
        .to_json()
        .with_context(|| format!("failed to encode block {}", block.index))?;
    fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}

/// Load every `*.json` block in the directory, sorted by index.
///
/// Unreadable or undecodable files are errors: skipping one would hide a gap from the
/// integrity check that follows.
pub fn load_blocks(dir: &Path) -> Result<Vec<Block>> {
    ensure_dir(dir)?;
    let mut out = vec![];
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let p = entry?.path();
        if p.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let buf = fs::read_to_string(&p).with_context(|| format!("failed to read {}", p.display()))?;
        let block = Block::from_json(&buf).with_context(|| format!("failed to decode {}", p.display()))?;
        out.push(block);
    }
    out.sort_by_key(|b| b.index);
    Ok(out)
}

/// Tracks which blocks of a ledger are already on disk.
#[derive(Debug)]
pub struct BlockStore {
    dir: PathBuf,
    next_index: Mutex<u64>,
}

impl BlockStore {
    /// `persisted` is the number of leading blocks already present in `dir`.
    pub fn new(dir: PathBuf, persisted: u64) -> Self {
        Self {
            dir,
            next_index: Mutex::new(persisted),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write every block of `ledger` not yet on disk. Returns how many were written.
    pub fn flush(&self, ledger: &Ledger) -> Result<usize> {
        let mut next = self.next_index.lock();
        let pending = ledger.blocks_since(*next);
        for block in &pending {
            save_block(&self.dir, block)?;
            debug!(index = block.index, "block persisted");
            *next = block.index + 1;
        }
        Ok(pending.len())
    }
}

/// Read the chain directory and rebuild a ledger from it, or start from genesis when empty.
pub fn open_ledger(dir: &Path, difficulty: usize) -> Result<(Ledger, BlockStore)> {
    let blocks = load_blocks(dir)?;
    let persisted = blocks.len() as u64;
    let ledger = if blocks.is_empty() {
        Ledger::new(difficulty)
    } else {
        Ledger::from_blocks(blocks, difficulty)
            .with_context(|| format!("refusing to load untrusted chain from {}", dir.display()))?
    };
    info!(height = ledger.height(), dir = %dir.display(), "ledger opened");

    let store = BlockStore::new(dir.to_path_buf(), persisted);
    Ok((ledger, store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{
        generate_keypair, CancelToken, LedgerError, TicketPayload, Timestamp, Transaction,
        TransactionType,
    };

    fn ledger_with_one_block() -> Ledger {
        let ledger = Ledger::new(1);
        let (_, sk) = generate_keypair();
        let tx = Transaction::signed(TransactionType::Mint, TicketPayload::new(Timestamp::now()), &sk).unwrap();
        ledger.submit_transaction(tx).unwrap();
        ledger.seal_pending_transactions(&CancelToken::new()).unwrap();
        ledger
    }

    #[test]
    fn fresh_directory_starts_at_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let (ledger, store) = open_ledger(dir.path(), 1).unwrap();
        assert_eq!(ledger.height(), 1);
        assert_eq!(store.flush(&ledger).unwrap(), 1);
        assert!(block_path(dir.path(), 0).exists());
    }

    #[test]
    fn flush_is_incremental_and_reload_matches() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_with_one_block();
        let store = BlockStore::new(dir.path().to_path_buf(), 0);

        assert_eq!(store.flush(&ledger).unwrap(), 2);
        assert_eq!(store.flush(&ledger).unwrap(), 0);

        let (reloaded, _) = open_ledger(dir.path(), 1).unwrap();
        assert_eq!(reloaded.height(), 2);
        assert_eq!(
            reloaded.get_chain_snapshot().blocks,
            ledger.get_chain_snapshot().blocks
        );
    }

    #[test]
    fn tampered_file_refuses_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger_with_one_block();
        BlockStore::new(dir.path().to_path_buf(), 0).flush(&ledger).unwrap();

        let path = block_path(dir.path(), 1);
        let mut block = Block::from_json(&fs::read_to_string(&path).unwrap()).unwrap();
        block.timestamp = Timestamp(block.timestamp.value() + 1);
        fs::write(&path, block.to_json().unwrap()).unwrap();

        let err = open_ledger(dir.path(), 1).unwrap_err();
        let integrity = err
            .chain()
            .find_map(|e| e.downcast_ref::<LedgerError>())
            .cloned();
        assert!(matches!(integrity, Some(LedgerError::Integrity { index: 1, .. })));
    }

    #[test]
    fn undecodable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("block_0.json"), "{ not json").unwrap();
        assert!(load_blocks(dir.path()).is_err());
    }
}
