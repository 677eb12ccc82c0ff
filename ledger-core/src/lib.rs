//! Single-authority ticket ledger: signed lifecycle events sealed into a hash-chained block sequence.

pub mod block;
pub mod chain;
pub mod crypto;
pub mod ledger;
pub mod pow;
pub mod ticket;
pub mod transaction;
pub mod types;

pub use crate::block::Block;
pub use crate::chain::{validate_blocks, Blockchain, ChainSnapshot};
pub use crate::crypto::{
    generate_keypair, hash_data, hash_hex, public_key_hex, secret_key_hex, sign_payload, PublicKey, SecretKey,
    signing_key_from_hex, verify_signature,
};
pub use crate::ledger::Ledger;
pub use crate::pow::{hash_meets_difficulty, seal, CancelToken};
pub use crate::ticket::{check_admission, derive_status, replay, TicketState};
pub use crate::transaction::{TicketPayload, Transaction, TransactionPool};
pub use crate::types::{
    LedgerError, TicketId, TicketStatus, Timestamp, TransactionType, DEFAULT_DIFFICULTY,
    DEFAULT_TICKET_DURATION_MS, GENESIS_PREVIOUS_HASH,
};
