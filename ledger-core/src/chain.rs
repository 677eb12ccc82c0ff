use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::block::Block;
use crate::pow::{seal, CancelToken};
use crate::ticket::{check_admission, derive_status, TicketState};
use crate::transaction::{Transaction, TransactionPool};
use crate::types::{LedgerError, TicketStatus, Timestamp, DEFAULT_DIFFICULTY};

/// Read-only view handed to the HTTP layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSnapshot {
    pub blocks: Vec<Block>,
    pub pending: Vec<Transaction>,
    pub difficulty: usize,
    pub height: usize,
}

#[derive(Debug)]
pub struct Blockchain {
    pub blocks: Vec<Block>,
    pub pending_transactions: TransactionPool,
    pub difficulty: usize,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY)
    }
}

impl Blockchain {
    pub fn new(difficulty: usize) -> Self {
        Blockchain {
            blocks: vec![Block::genesis()],
            pending_transactions: TransactionPool::new(),
            difficulty,
        }
    }

    /// Hydrate from persisted blocks. The whole sequence must pass `validate_blocks`.
    pub fn from_blocks(blocks: Vec<Block>, difficulty: usize) -> Result<Self, LedgerError> {
        if blocks.is_empty() {
            return Ok(Self::new(difficulty));
        }
        validate_blocks(&blocks, difficulty)?;
        info!(height = blocks.len(), difficulty, "chain hydrated");
        Ok(Blockchain {
            blocks,
            pending_transactions: TransactionPool::new(),
            difficulty,
        })
    }

    pub fn latest_block(&self) -> &Block {
        // `blocks` always holds at least genesis.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn height(&self) -> usize {
        self.blocks.len()
    }

    /// Every transaction naming `ticket_id`: sealed blocks in index order, then the mempool.
    pub fn ticket_history<'a>(&'a self, ticket_id: &'a str) -> impl Iterator<Item = &'a Transaction> + 'a {
        self.blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .chain(self.pending_transactions.iter())
            .filter(move |tx| tx.ticket_id == ticket_id)
    }

    /// The sealed block holding transaction `tx_id`, searching from the tip.
    pub fn block_containing(&self, tx_id: &str) -> Option<&Block> {
        self.blocks
            .iter()
            .rev()
            .find(|b| b.transactions.iter().any(|t| t.id == tx_id))
    }

    pub fn ticket_state(&self, ticket_id: &str) -> TicketState {
        crate::ticket::replay(self.ticket_history(ticket_id))
    }

    pub fn ticket_status(&self, ticket_id: &str, now: Timestamp) -> TicketStatus {
        derive_status(self.ticket_history(ticket_id), now)
    }

    /// Admit `tx` into the mempool: signature first, then the lifecycle gate.
    pub fn add_transaction(&mut self, tx: Transaction, now: Timestamp) -> Result<(), LedgerError> {
        if let Err(e) = tx.verify_or_reject() {
            warn!(tx_id = %tx.id, ticket_id = %tx.ticket_id, "signature rejected");
            return Err(e);
        }

        let current = self.ticket_status(&tx.ticket_id, now);
        if let Err(e) = check_admission(current, tx.tx_type) {
            debug!(tx_id = %tx.id, ticket_id = %tx.ticket_id, status = %current, action = %tx.tx_type, "transition rejected");
            return Err(e);
        }

        debug!(tx_id = %tx.id, ticket_id = %tx.ticket_id, action = %tx.tx_type, "transaction admitted");
        self.pending_transactions.push(tx);
        Ok(())
    }

    /// Candidate block over a frozen copy of the mempool, linked to the current tip.
    pub fn prepare_candidate(&self, timestamp: Timestamp) -> Result<Block, LedgerError> {
        let tip = self.latest_block();
        Block::candidate(
            tip.index + 1,
            timestamp,
            self.pending_transactions.snapshot(),
            tip.hash.clone(),
        )
    }

    /// Append a block sealed from `prepare_candidate` and drop its transactions from the mempool.
    pub fn commit_sealed(&mut self, block: Block) -> Result<(), LedgerError> {
        let tip = self.latest_block();
        if block.index != tip.index + 1 || block.previous_hash != tip.hash {
            return Err(LedgerError::integrity(block.index, "sealed block does not extend the tip"));
        }
        if !block.has_valid_hash() {
            return Err(LedgerError::integrity(block.index, "hash does not match contents"));
        }
        if !block.meets_difficulty(self.difficulty) {
            return Err(LedgerError::integrity(block.index, "hash misses difficulty target"));
        }
        if !self.pending_transactions.drain_prefix(&block.transactions) {
            return Err(LedgerError::integrity(block.index, "sealed transactions are not the pending prefix"));
        }

        info!(index = block.index, txs = block.transactions.len(), hash = %block.hash, "block appended");
        self.blocks.push(block);
        Ok(())
    }

    /// Seal the whole mempool into the next block while holding `&mut self`.
    pub fn mine(&mut self, timestamp: Timestamp, cancel: &CancelToken) -> Result<Block, LedgerError> {
        let candidate = self.prepare_candidate(timestamp)?;
        let sealed = seal(candidate, self.difficulty, cancel)?;
        self.commit_sealed(sealed.clone())?;
        Ok(sealed)
    }

    pub fn validate_chain(&self) -> Result<(), LedgerError> {
        validate_blocks(&self.blocks, self.difficulty)
    }

    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            blocks: self.blocks.clone(),
            pending: self.pending_transactions.snapshot(),
            difficulty: self.difficulty,
            height: self.blocks.len(),
        }
    }
}

/// Full verification pass over an externally supplied block sequence.
///
/// Reports the first failing index; everything from there on is untrusted.
pub fn validate_blocks(blocks: &[Block], difficulty: usize) -> Result<(), LedgerError> {
    let genesis = blocks
        .first()
        .ok_or_else(|| LedgerError::integrity(0, "chain is empty"))?;
    if !genesis.is_genesis_form() {
        return Err(LedgerError::integrity(0, "genesis block is malformed"));
    }

    // Replay legality against the sealed prefix only; expiry does not affect any gate.
    let mut tickets: HashMap<&str, TicketState> = HashMap::new();

    for (pos, pair) in blocks.windows(2).enumerate() {
        let (prev, block) = (&pair[0], &pair[1]);
        let idx = pos as u64 + 1;

        if block.index != idx {
            return Err(LedgerError::integrity(idx, format!("stored index {} out of sequence", block.index)));
        }
        if block.previous_hash != prev.hash {
            return Err(LedgerError::integrity(idx, "previousHash does not match prior block"));
        }
        if !block.has_valid_hash() {
            return Err(LedgerError::integrity(idx, "hash does not match contents"));
        }
        if !block.meets_difficulty(difficulty) {
            return Err(LedgerError::integrity(idx, "hash misses difficulty target"));
        }

        for tx in &block.transactions {
            if !tx.verify() {
                return Err(LedgerError::integrity(idx, format!("transaction {} has a bad signature", tx.id)));
            }
            let state = tickets.entry(tx.ticket_id.as_str()).or_default();
            if let Err(e) = check_admission(state.status, tx.tx_type) {
                return Err(LedgerError::integrity(idx, format!("transaction {}: {e}", tx.id)));
            }
            state.apply(tx);
        }
    }

    Ok(())
}
