//! Envelope entity - a named savings container with a balance and a target.
//!
//! Envelopes are only built through [`Envelope::from_json`], and only changed
//! through [`Envelope::update`]. Both run the same `validate` check, so a value
//! of this type always satisfies the field invariants.

use super::{EnvelopeId, TransactionLog, fields::Fields};
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Envelope domain model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    id: EnvelopeId,
    name: String,
    description: String,
    balance: i64,
    created_at: DateTime<Utc>,
    modified_at: Option<DateTime<Utc>>,
    priority: i64,
    savings_amount: i64,
    savings_target: Option<i64>,
    is_overflow: bool,
    #[serde(skip)]
    transaction_logs: Option<TransactionLog>,
}

/// A single-field change applied through [`Envelope::update`].
///
/// `id`, `createdAt` and `isOverflow` are fixed at creation and have no variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeChange {
    /// Rename the envelope
    Name(String),
    /// Replace the description
    Description(String),
    /// Replace the balance with an authoritative value
    Balance(i64),
    /// Replace the distribution priority
    Priority(i64),
    /// Replace the automated contribution per cycle
    SavingsAmount(i64),
    /// Replace the target; `None` means unlimited
    SavingsTarget(Option<i64>),
    /// Record a server-side modification time
    ModifiedAt(Option<DateTime<Utc>>),
}

impl Envelope {
    /// Builds an envelope from a raw server payload.
    ///
    /// # Errors
    /// Returns `Error::Validation` naming the first field that is missing,
    /// mistyped or out of range.
    pub fn from_json(value: &Value) -> Result<Self> {
        let fields = Fields::new(value, "moneybox")?;
        let envelope = Self {
            id: fields.int(&["id"])?,
            name: fields.string(&["name"])?,
            description: fields.opt_string(&["description"])?.unwrap_or_default(),
            balance: fields.int(&["balance"])?,
            created_at: fields.timestamp(&["createdAt"])?,
            modified_at: fields.opt_timestamp(&["modifiedAt"])?,
            priority: fields.int(&["priority"])?,
            savings_amount: fields.int(&["savingsAmount"])?,
            savings_target: fields.opt_int(&["savingsTarget"])?,
            is_overflow: fields.bool(&["isOverflow"])?,
            transaction_logs: None,
        };
        envelope.validate()?;
        Ok(envelope)
    }

    /// Serializes the wire fields back to JSON. Transaction logs are not included.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn validate(&self) -> Result<()> {
        if self.id <= 0 {
            return Err(Error::validation("id", "must be a positive integer"));
        }
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "must not be empty"));
        }
        if self.balance < 0 {
            return Err(Error::validation("balance", "must be >= 0"));
        }
        if self.priority < 0 {
            return Err(Error::validation("priority", "must be >= 0"));
        }
        if self.savings_amount < 0 {
            return Err(Error::validation("savingsAmount", "must be >= 0"));
        }
        if self.savings_target.is_some_and(|target| target < 0) {
            return Err(Error::validation("savingsTarget", "must be >= 0 or null"));
        }
        if self
            .modified_at
            .is_some_and(|modified| modified < self.created_at)
        {
            return Err(Error::validation("modifiedAt", "must not precede createdAt"));
        }
        Ok(())
    }

    /// Applies a change, re-running construction validation.
    ///
    /// On error the envelope is left exactly as it was.
    pub fn update(&mut self, change: EnvelopeChange) -> Result<()> {
        let mut candidate = self.clone();
        match change {
            EnvelopeChange::Name(name) => candidate.name = name,
            EnvelopeChange::Description(description) => candidate.description = description,
            EnvelopeChange::Balance(balance) => candidate.balance = balance,
            EnvelopeChange::Priority(priority) => candidate.priority = priority,
            EnvelopeChange::SavingsAmount(amount) => candidate.savings_amount = amount,
            EnvelopeChange::SavingsTarget(target) => candidate.savings_target = target,
            EnvelopeChange::ModifiedAt(modified) => candidate.modified_at = modified,
        }
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    /// Attaches a fetched transaction log. The log must belong to this envelope.
    pub fn attach_transaction_log(&mut self, log: TransactionLog) -> Result<()> {
        if log.envelope_id() != self.id {
            return Err(Error::validation(
                "transactionLogs",
                format!(
                    "log for envelope {} cannot attach to envelope {}",
                    log.envelope_id(),
                    self.id
                ),
            ));
        }
        self.transaction_logs = Some(log);
        Ok(())
    }

    #[must_use]
    pub const fn id(&self) -> EnvelopeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Current balance in minor units
    #[must_use]
    pub const fn balance(&self) -> i64 {
        self.balance
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub const fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.modified_at
    }

    #[must_use]
    pub const fn priority(&self) -> i64 {
        self.priority
    }

    #[must_use]
    pub const fn savings_amount(&self) -> i64 {
        self.savings_amount
    }

    /// Savings target, `None` when unlimited
    #[must_use]
    pub const fn savings_target(&self) -> Option<i64> {
        self.savings_target
    }

    #[must_use]
    pub const fn is_overflow(&self) -> bool {
        self.is_overflow
    }

    /// The attached transaction log, `None` until it has been fetched
    #[must_use]
    pub const fn transaction_logs(&self) -> Option<&TransactionLog> {
        self.transaction_logs.as_ref()
    }

    /// Whether the savings target has been reached. Unlimited envelopes never are.
    #[must_use]
    pub fn target_reached(&self) -> bool {
        self.savings_target
            .is_some_and(|target| self.balance >= target)
    }
}
