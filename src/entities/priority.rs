//! Priority list entities.
//!
//! The position of an entry in the list decides distribution order; `rank`
//! mirrors what the server last stored.

use super::{EnvelopeId, fields::Fields};
use crate::errors::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

/// One envelope's place in the automated distribution order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityEntry {
    /// Envelope this entry refers to
    #[serde(rename = "moneyboxId")]
    pub envelope_id: EnvelopeId,
    /// Envelope name at the time the list was fetched
    pub name: String,
    /// Stored rank; informational only
    #[serde(rename = "priority")]
    pub rank: i64,
}

impl PriorityEntry {
    /// Builds an entry from a raw payload.
    pub fn from_json(value: &Value) -> Result<Self> {
        let fields = Fields::new(value, "prioritylist")?;
        let entry = Self {
            envelope_id: fields.int(&["moneyboxId", "envelopeId"])?,
            name: fields.opt_string(&["name"])?.unwrap_or_default(),
            rank: fields.int(&["priority", "rank"])?,
        };
        entry.validate()?;
        Ok(entry)
    }

    fn validate(&self) -> Result<()> {
        if self.envelope_id <= 0 {
            return Err(Error::validation("moneyboxId", "must be a positive integer"));
        }
        if self.rank < 0 {
            return Err(Error::validation("priority", "must be >= 0"));
        }
        Ok(())
    }
}

/// Parses a list of entries and rejects duplicate envelope ids.
pub fn priority_list_from_json(values: &[Value]) -> Result<Vec<PriorityEntry>> {
    let entries = values
        .iter()
        .map(PriorityEntry::from_json)
        .collect::<Result<Vec<_>>>()?;
    ensure_unique(&entries)?;
    Ok(entries)
}

pub(crate) fn ensure_unique(entries: &[PriorityEntry]) -> Result<()> {
    let mut seen = HashSet::with_capacity(entries.len());
    match entries.iter().find(|entry| !seen.insert(entry.envelope_id)) {
        Some(duplicate) => Err(Error::validation(
            "prioritylist",
            format!("envelope {} appears more than once", duplicate.envelope_id),
        )),
        None => Ok(()),
    }
}

/// Renumbers ranks from list position, starting at 1.
#[must_use]
pub fn renumbered(order: &[PriorityEntry]) -> Vec<PriorityEntry> {
    order
        .iter()
        .zip(1..)
        .map(|(entry, rank)| PriorityEntry {
            rank,
            ..entry.clone()
        })
        .collect()
}
