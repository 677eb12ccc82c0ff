// Copyright (c) 2025-present Cesar Saguier Antebi
// All Rights Reserved.
//
// This file is part of the Totem ticket ledger project.
// Licensed under the Business Source License 1.1 (BUSL-1.1).
// See LICENSE file in the project root for full license information.
//
// Commercial use requires express written consent and royalty agreements.
// Contact: Cesar Saguier Antebi

use crate::crypto::{public_key_hex, sign_payload, verify_signature, SecretKey};
use crate::types::{LedgerError, TicketId, Timestamp, TransactionType};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Event data carried by a transaction and covered by its signature.
///
/// Field order is fixed: the signature and the block hash both commit to this serde encoding.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TicketPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub timestamp: Timestamp,
    /// Validity window in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl TicketPayload {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    /// The exact bytes a ticket holder signs.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub ticket_id: TicketId,
    pub payload: TicketPayload,
    /// Ed25519 signature over `payload`, hex.
    pub signature: String,
}

impl Transaction {
    /// Wrap an already signed payload under a fresh id.
    pub fn new(
        tx_type: TransactionType,
        ticket_id: TicketId,
        payload: TicketPayload,
        signature: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tx_type,
            ticket_id,
            payload,
            signature,
        }
    }

    /// Build and sign a transaction for the ticket owned by `secret_key`.
    pub fn signed(
        tx_type: TransactionType,
        payload: TicketPayload,
        secret_key: &SecretKey,
    ) -> Result<Self, LedgerError> {
        let ticket_id = public_key_hex(&secret_key.verifying_key());
        let signature = sign_payload(&payload, secret_key)?;
        Ok(Self::new(tx_type, ticket_id, payload, signature))
    }

    pub fn verify(&self) -> bool {
        verify_signature(&self.payload, &self.signature, &self.ticket_id)
    }

    pub fn verify_or_reject(&self) -> Result<(), LedgerError> {
        if !self.verify() {
            return Err(LedgerError::Authentication {
                ticket_id: self.ticket_id.clone(),
            });
        }
        Ok(())
    }
}

/// Admitted, not yet sealed transactions in admission order.
#[derive(Clone, Default, Debug)]
pub struct TransactionPool {
    pending: VecDeque<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    pub fn push(&mut self, tx: Transaction) {
        self.pending.push_back(tx);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.pending.iter()
    }

    pub fn snapshot(&self) -> Vec<Transaction> {
        self.pending.iter().cloned().collect()
    }

    /// Remove the leading transactions whose ids match `sealed`, in order.
    ///
    /// Returns false and leaves the pool untouched if the front of the pool is not exactly `sealed`.
    pub fn drain_prefix(&mut self, sealed: &[Transaction]) -> bool {
        if sealed.len() > self.pending.len() {
            return false;
        }
        let matches = self
            .pending
            .iter()
            .zip(sealed.iter())
            .all(|(p, s)| p.id == s.id);
        if !matches {
            return false;
        }
        self.pending.drain(..sealed.len());
        true
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
