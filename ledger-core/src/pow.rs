//! Proof-of-work sealing: a linear nonce search until the block hash carries
//! `difficulty` leading zero hex digits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::block::Block;
use crate::types::LedgerError;

const PROGRESS_INTERVAL: u64 = 10_000;

/// True when the first `difficulty` characters of `hash` are all `'0'`.
pub fn hash_meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Shared abort switch for a running seal.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Search nonces from 0 upwards and return the block with the first satisfying hash.
///
/// Returns `SealCancelled` as soon as `cancel` trips; the input block is consumed either way.
pub fn seal(mut block: Block, difficulty: usize, cancel: &CancelToken) -> Result<Block, LedgerError> {
    block.nonce = 0;
    block.hash = block.calculate_hash()?;

    while !hash_meets_difficulty(&block.hash, difficulty) {
        if cancel.is_cancelled() {
            debug!(index = block.index, nonce = block.nonce, "seal cancelled");
            return Err(LedgerError::SealCancelled);
        }
        block.nonce = block.nonce.wrapping_add(1);
        block.hash = block.calculate_hash()?;

        if block.nonce % PROGRESS_INTERVAL == 0 {
            trace!(index = block.index, nonce = block.nonce, "mining");
        }
    }

    debug!(index = block.index, nonce = block.nonce, hash = %block.hash, "block sealed");
    Ok(block)
}
