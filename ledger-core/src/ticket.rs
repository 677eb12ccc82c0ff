//! Ticket lifecycle derived by replaying transactions.
//!
//! Status is never stored. It is folded from every transaction naming the
//! ticket (sealed blocks first, then the mempool) and expiry is applied at
//! read time against an explicit `now`.

use crate::transaction::Transaction;
use crate::types::{LedgerError, TicketStatus, Timestamp, TransactionType, DEFAULT_TICKET_DURATION_MS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TicketState {
    pub status: TicketStatus,
    /// Validity window captured at MINT, or at ACTIVATE when MINT carried none.
    pub duration_ms: Option<u64>,
    pub activated_at: Option<Timestamp>,
}

impl Default for TicketState {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketState {
    pub fn new() -> Self {
        Self {
            status: TicketStatus::Invalid,
            duration_ms: None,
            activated_at: None,
        }
    }

    /// One step of the transition table. Unmatched actions leave the state as is.
    pub fn apply(&mut self, tx: &Transaction) {
        match (self.status, tx.tx_type) {
            (TicketStatus::Invalid, TransactionType::Mint) => {
                self.status = TicketStatus::Issued;
                self.duration_ms = tx.payload.duration;
            }
            (TicketStatus::Issued, TransactionType::Activate) => {
                self.status = TicketStatus::Active;
                self.activated_at = Some(tx.payload.timestamp);
                if self.duration_ms.is_none() {
                    self.duration_ms = Some(tx.payload.duration.unwrap_or(DEFAULT_TICKET_DURATION_MS));
                }
            }
            // INSPECT is audit-only.
            _ => {}
        }
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        let activated = self.activated_at?;
        let duration = self.duration_ms.unwrap_or(DEFAULT_TICKET_DURATION_MS);
        Some(activated.saturating_add_millis(duration))
    }

    /// Reported status at `now`: an ACTIVE ticket past its window reads as EXPIRED.
    pub fn status_at(&self, now: Timestamp) -> TicketStatus {
        match (self.status, self.expires_at()) {
            (TicketStatus::Active, Some(deadline)) if now > deadline => TicketStatus::Expired,
            (status, _) => status,
        }
    }
}

/// Fold `txs` (already filtered to one ticket and in ledger order) into a state.
pub fn replay<'a, I>(txs: I) -> TicketState
where
    I: IntoIterator<Item = &'a Transaction>,
{
    txs.into_iter().fold(TicketState::new(), |mut state, tx| {
        state.apply(tx);
        state
    })
}

pub fn derive_status<'a, I>(txs: I, now: Timestamp) -> TicketStatus
where
    I: IntoIterator<Item = &'a Transaction>,
{
    replay(txs).status_at(now)
}

/// Admission gate: may `action` be appended to a ticket currently in `current`?
pub fn check_admission(current: TicketStatus, action: TransactionType) -> Result<(), LedgerError> {
    let allowed = match action {
        TransactionType::Mint => current == TicketStatus::Invalid,
        TransactionType::Activate => current == TicketStatus::Issued,
        TransactionType::Inspect => current != TicketStatus::Invalid,
    };
    if allowed {
        Ok(())
    } else {
        Err(LedgerError::State { current, action })
    }
}
