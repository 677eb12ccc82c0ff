// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Totem ticket ledger project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Leading zero hex digits required of a sealed block hash unless configured otherwise.
pub const DEFAULT_DIFFICULTY: usize = 2;

/// Validity window applied when neither MINT nor ACTIVATE carried a duration.
pub const DEFAULT_TICKET_DURATION_MS: u64 = 2 * 60 * 60 * 1000;

/// `previousHash` sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Public key of a ticket, lowercase hex.
pub type TicketId = String;

/// Unix time in milliseconds.
///
/// Rendered as a plain decimal integer, which is also the form committed to by block hashes.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn now() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        Timestamp(u64::try_from(millis).unwrap_or(0))
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn saturating_add_millis(self, millis: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(v: u64) -> Self {
        Timestamp(v)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Mint,
    Activate,
    Inspect,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Mint => "MINT",
            TransactionType::Activate => "ACTIVATE",
            TransactionType::Inspect => "INSPECT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MINT" => Ok(TransactionType::Mint),
            "ACTIVATE" => Ok(TransactionType::Activate),
            "INSPECT" => Ok(TransactionType::Inspect),
            other => Err(LedgerError::Serialization(format!(
                "unknown transaction type: {other}"
            ))),
        }
    }
}

/// Lifecycle status of a ticket. Derived by replay, never stored.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketStatus {
    /// No MINT has been recorded for this id.
    Invalid,
    Issued,
    Active,
    Expired,
    /// Wire vocabulary only; the timer model never reaches it.
    Used,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Invalid => "INVALID",
            TicketStatus::Issued => "ISSUED",
            TicketStatus::Active => "ACTIVE",
            TicketStatus::Expired => "EXPIRED",
            TicketStatus::Used => "USED",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerError {
    #[error("signature does not match ticket {ticket_id}")]
    Authentication { ticket_id: TicketId },
    #[error("{action} rejected: ticket is {current}")]
    State {
        current: TicketStatus,
        action: TransactionType,
    },
    #[error("chain integrity violated at block {index}: {reason}")]
    Integrity { index: u64, reason: String },
    #[error("sealing cancelled")]
    SealCancelled,
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    pub fn integrity(index: u64, reason: impl Into<String>) -> Self {
        LedgerError::Integrity {
            index,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}
