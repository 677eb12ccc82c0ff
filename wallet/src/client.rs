//! Thin HTTP client for a totem node.

use anyhow::{anyhow, Context, Result};
use ledger_core::{sign_payload, SecretKey, TicketPayload, TransactionType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl Envelope {
    fn into_data(self) -> Result<Value> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(anyhow!(self.error.unwrap_or_else(|| "request failed".to_string())))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBody<'a> {
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub ticket_id: &'a str,
    pub payload: &'a TicketPayload,
    pub signature: String,
}

impl<'a> SubmitBody<'a> {
    pub fn signed(
        tx_type: TransactionType,
        ticket_id: &'a str,
        payload: &'a TicketPayload,
        key: &SecretKey,
    ) -> Result<Self> {
        let signature = sign_payload(payload, key).context("failed to sign payload")?;
        Ok(Self {
            tx_type,
            ticket_id,
            payload,
            signature,
        })
    }
}

/// What the node reported for an accepted submission.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub status: String,
    pub tx_id: String,
    #[serde(default)]
    pub block_index: Option<u64>,
    #[serde(default)]
    pub block_hash: Option<String>,
}

pub struct NodeClient {
    base: String,
    http: reqwest::Client,
}

impl NodeClient {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub async fn submit(&self, body: &SubmitBody<'_>) -> Result<SubmitReceipt> {
        let url = format!("{}/submit", self.base);
        debug!(url = %url, action = %body.tx_type, "submitting");
        let envelope: Envelope = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("{} unreachable", self.base))?
            .json()
            .await
            .context("node returned an unreadable response")?;
        let data = envelope.into_data()?;
        serde_json::from_value(data).context("unexpected submit response")
    }

    pub async fn status(&self, ticket_id: &str) -> Result<String> {
        let url = format!("{}/status/{}", self.base, ticket_id);
        let envelope: Envelope = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("{} unreachable", self.base))?
            .json()
            .await
            .context("node returned an unreadable response")?;
        let data = envelope.into_data()?;
        data.get("status")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("status missing from response"))
    }
}
