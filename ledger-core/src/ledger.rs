//! Serialized owner of the chain and mempool.
//!
//! Every read and write of the block list or mempool goes through one
//! `parking_lot::Mutex`. Sealing holds a separate lock so that only one nonce
//! search runs at a time, and the search itself runs on a frozen candidate
//! with the chain lock released: submissions keep being admitted (and checked
//! against the still-pending transactions) while a block is being mined.

use parking_lot::Mutex;
use tracing::info;

use crate::block::Block;
use crate::chain::{Blockchain, ChainSnapshot};
use crate::pow::{seal, CancelToken};
use crate::ticket::TicketState;
use crate::transaction::Transaction;
use crate::types::{LedgerError, TicketStatus, Timestamp};

#[derive(Debug)]
pub struct Ledger {
    chain: Mutex<Blockchain>,
    seal_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(difficulty: usize) -> Self {
        Self::from_chain(Blockchain::new(difficulty))
    }

    pub fn from_chain(chain: Blockchain) -> Self {
        Self {
            chain: Mutex::new(chain),
            seal_lock: Mutex::new(()),
        }
    }

    /// Rebuild from persisted blocks, failing with `Integrity` on the first untrusted block.
    pub fn from_blocks(blocks: Vec<Block>, difficulty: usize) -> Result<Self, LedgerError> {
        Ok(Self::from_chain(Blockchain::from_blocks(blocks, difficulty)?))
    }

    pub fn submit_transaction(&self, tx: Transaction) -> Result<(), LedgerError> {
        self.submit_transaction_at(tx, Timestamp::now())
    }

    pub fn submit_transaction_at(&self, tx: Transaction, now: Timestamp) -> Result<(), LedgerError> {
        self.chain.lock().add_transaction(tx, now)
    }

    /// Seal every transaction pending at call time into the next block.
    ///
    /// On cancellation nothing is appended and the mempool is left as it was.
    pub fn seal_pending_transactions(&self, cancel: &CancelToken) -> Result<Block, LedgerError> {
        let _sealing = self.seal_lock.lock();
        self.seal_locked(cancel)
    }

    /// Make sure `tx_id` ends up sealed and return its block.
    ///
    /// If a concurrent seal already picked the transaction up, that block is returned and no
    /// new block is mined.
    pub fn seal_transaction(&self, tx_id: &str, cancel: &CancelToken) -> Result<Block, LedgerError> {
        let _sealing = self.seal_lock.lock();
        if let Some(block) = self.chain.lock().block_containing(tx_id) {
            return Ok(block.clone());
        }
        self.seal_locked(cancel)
    }

    fn seal_locked(&self, cancel: &CancelToken) -> Result<Block, LedgerError> {
        let (candidate, difficulty) = {
            let chain = self.chain.lock();
            (chain.prepare_candidate(Timestamp::now())?, chain.difficulty)
        };
        info!(index = candidate.index, txs = candidate.transactions.len(), difficulty, "sealing block");

        let sealed = seal(candidate, difficulty, cancel)?;
        self.chain.lock().commit_sealed(sealed.clone())?;
        Ok(sealed)
    }

    pub fn get_status(&self, ticket_id: &str) -> TicketStatus {
        self.get_status_at(ticket_id, Timestamp::now())
    }

    pub fn get_status_at(&self, ticket_id: &str, now: Timestamp) -> TicketStatus {
        self.chain.lock().ticket_status(ticket_id, now)
    }

    pub fn ticket_state(&self, ticket_id: &str) -> TicketState {
        self.chain.lock().ticket_state(ticket_id)
    }

    pub fn get_chain_snapshot(&self) -> ChainSnapshot {
        self.chain.lock().snapshot()
    }

    /// Sealed blocks with `index >= from`, for incremental persistence.
    pub fn blocks_since(&self, from: u64) -> Vec<Block> {
        self.chain
            .lock()
            .blocks
            .iter()
            .filter(|b| b.index >= from)
            .cloned()
            .collect()
    }

    pub fn height(&self) -> usize {
        self.chain.lock().height()
    }

    pub fn pending_len(&self) -> usize {
        self.chain.lock().pending_transactions.len()
    }

    pub fn difficulty(&self) -> usize {
        self.chain.lock().difficulty
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        self.chain.lock().validate_chain()
    }
}
