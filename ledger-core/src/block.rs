use crate::crypto::hash_hex;
use crate::pow::hash_meets_difficulty;
use crate::transaction::Transaction;
use crate::types::{LedgerError, Timestamp, GENESIS_PREVIOUS_HASH};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    /// Sealing time.
    pub timestamp: Timestamp,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub hash: String,
    pub nonce: u64,
}

impl Block {
    /// Unsealed block at nonce 0 with its hash filled in.
    pub fn candidate(
        index: u64,
        timestamp: Timestamp,
        transactions: Vec<Transaction>,
        previous_hash: String,
    ) -> Result<Self, LedgerError> {
        let mut block = Block {
            index,
            timestamp,
            transactions,
            previous_hash,
            hash: String::new(),
            nonce: 0,
        };
        block.hash = block.calculate_hash()?;
        Ok(block)
    }

    /// The fixed genesis block shared by every ledger. It is not mined.
    pub fn genesis() -> Self {
        let mut block = Block {
            index: 0,
            timestamp: Timestamp::ZERO,
            transactions: Vec::new(),
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            hash: String::new(),
            nonce: 0,
        };
        // An empty transaction list always encodes as "[]".
        block.hash = block.hash_with_encoded_transactions("[]");
        block
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// True only for the one fixed genesis block; a self-consistent block 0 with any other
    /// timestamp is a foreign chain.
    pub fn is_genesis_form(&self) -> bool {
        *self == Block::genesis()
    }

    /// SHA-256 over `index ‖ previousHash ‖ timestamp ‖ json(transactions) ‖ nonce`.
    pub fn calculate_hash(&self) -> Result<String, LedgerError> {
        let encoded = serde_json::to_string(&self.transactions)?;
        Ok(self.hash_with_encoded_transactions(&encoded))
    }

    fn hash_with_encoded_transactions(&self, encoded: &str) -> String {
        let material = format!(
            "{}{}{}{}{}",
            self.index, self.previous_hash, self.timestamp, encoded, self.nonce
        );
        hash_hex(material.as_bytes())
    }

    pub fn has_valid_hash(&self) -> bool {
        self.calculate_hash()
            .map(|h| h == self.hash)
            .unwrap_or(false)
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        hash_meets_difficulty(&self.hash, difficulty)
    }

    pub fn to_json(&self) -> Result<String, LedgerError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, LedgerError> {
        Ok(serde_json::from_str(json)?)
    }
}
