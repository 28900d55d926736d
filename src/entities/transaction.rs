//! Transaction log entities - the balance history of one envelope.
//!
//! A `TransactionLog` always holds its entries newest first. Sorting happens
//! at construction, so callers never observe server order.

use super::{EnvelopeId, fields::Fields};
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Reverse;

/// Who initiated a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionTrigger {
    /// Deposit, withdrawal or transfer made by the user
    Manual,
    /// Booked by the automated savings distribution
    Automatic,
}

/// How the money moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// A direct deposit, withdrawal or transfer
    Direct,
    /// Part of an automated distribution run
    Distribution,
}

/// One balance-affecting event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLogEntry {
    /// Server-assigned identifier
    pub id: i64,
    /// Envelope whose balance changed
    #[serde(rename = "moneyboxId")]
    pub envelope_id: EnvelopeId,
    /// Other side of a transfer, `None` for deposits and withdrawals
    #[serde(rename = "counterpartyMoneyboxId")]
    pub counterparty_envelope_id: Option<EnvelopeId>,
    /// Signed amount in minor units; negative is an outflow
    pub amount: i64,
    /// Balance after the transaction
    pub balance: i64,
    /// Free-text note
    pub description: String,
    /// Who initiated it
    #[serde(rename = "transactionTrigger")]
    pub trigger: TransactionTrigger,
    /// How it was booked
    #[serde(rename = "transactionType")]
    pub kind: TransactionKind,
    /// Name of the counterparty envelope at the time of the transfer
    #[serde(rename = "counterpartyMoneyboxName")]
    pub counterparty_name: Option<String>,
    /// When the transaction was booked
    pub created_at: DateTime<Utc>,
}

impl TransactionLogEntry {
    /// Builds an entry from a raw payload, validating every field.
    pub fn from_json(value: &Value) -> Result<Self> {
        let fields = Fields::new(value, "transactionLog")?;
        let entry = Self {
            id: fields.int(&["id"])?,
            envelope_id: fields.int(&["moneyboxId", "envelopeId"])?,
            counterparty_envelope_id: fields
                .opt_int(&["counterpartyMoneyboxId", "counterpartyEnvelopeId"])?,
            amount: fields.int(&["amount"])?,
            balance: fields.int(&["balance"])?,
            description: fields.opt_string(&["description"])?.unwrap_or_default(),
            trigger: fields.variant(&["transactionTrigger", "trigger"])?,
            kind: fields.variant(&["transactionType", "type"])?,
            counterparty_name: fields
                .opt_string(&["counterpartyMoneyboxName", "counterpartyName"])?,
            created_at: fields.timestamp(&["createdAt"])?,
        };
        entry.validate()?;
        Ok(entry)
    }

    fn validate(&self) -> Result<()> {
        if self.id <= 0 {
            return Err(Error::validation("id", "must be a positive integer"));
        }
        if self.envelope_id <= 0 {
            return Err(Error::validation("moneyboxId", "must be a positive integer"));
        }
        if self.counterparty_envelope_id.is_some_and(|id| id <= 0) {
            return Err(Error::validation(
                "counterpartyMoneyboxId",
                "must be a positive integer",
            ));
        }
        if self.counterparty_envelope_id == Some(self.envelope_id) {
            return Err(Error::validation(
                "counterpartyMoneyboxId",
                "must differ from moneyboxId",
            ));
        }
        if self.counterparty_name.is_some() && self.counterparty_envelope_id.is_none() {
            return Err(Error::validation(
                "counterpartyMoneyboxName",
                "requires counterpartyMoneyboxId",
            ));
        }
        if self.amount == 0 {
            return Err(Error::validation("amount", "must not be zero"));
        }
        if self.balance < 0 {
            return Err(Error::validation("balance", "must be >= 0"));
        }
        Ok(())
    }

    /// Whether this entry records a transfer between two envelopes.
    #[must_use]
    pub const fn is_transfer(&self) -> bool {
        self.counterparty_envelope_id.is_some()
    }
}

/// Newest-first transaction history of one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLog {
    #[serde(rename = "moneyboxId")]
    envelope_id: EnvelopeId,
    #[serde(rename = "transactionLogs")]
    entries: Vec<TransactionLogEntry>,
}

impl TransactionLog {
    /// Builds a log for `envelope_id`, re-sorting entries newest first.
    ///
    /// Equal timestamps fall back to the higher id first so the order is total.
    pub fn new(envelope_id: EnvelopeId, mut entries: Vec<TransactionLogEntry>) -> Result<Self> {
        if envelope_id <= 0 {
            return Err(Error::validation("moneyboxId", "must be a positive integer"));
        }
        if let Some(stray) = entries.iter().find(|e| e.envelope_id != envelope_id) {
            return Err(Error::validation(
                "transactionLogs",
                format!(
                    "entry {} belongs to envelope {} instead of {envelope_id}",
                    stray.id, stray.envelope_id
                ),
            ));
        }
        entries.sort_by_key(|entry| Reverse((entry.created_at, entry.id)));
        Ok(Self {
            envelope_id,
            entries,
        })
    }

    /// An empty log, used when the server reports no transactions yet.
    #[must_use]
    pub const fn empty(envelope_id: EnvelopeId) -> Self {
        Self {
            envelope_id,
            entries: Vec::new(),
        }
    }

    /// Parses `{"transactionLogs": [...]}` for the given envelope.
    ///
    /// A `moneyboxId` in the payload, when present, must match `envelope_id`.
    pub fn from_json(envelope_id: EnvelopeId, value: &Value) -> Result<Self> {
        let fields = Fields::new(value, "transactionLogs")?;
        if let Some(declared) = fields.opt_int(&["moneyboxId", "envelopeId"])?
            && declared != envelope_id
        {
            return Err(Error::validation(
                "moneyboxId",
                format!("log for {declared} returned for envelope {envelope_id}"),
            ));
        }
        let entries = fields
            .array(&["transactionLogs", "entries"])?
            .iter()
            .map(TransactionLogEntry::from_json)
            .collect::<Result<Vec<_>>>()?;
        Self::new(envelope_id, entries)
    }

    #[must_use]
    pub const fn envelope_id(&self) -> EnvelopeId {
        self.envelope_id
    }

    /// Entries, newest first.
    #[must_use]
    pub fn entries(&self) -> &[TransactionLogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
