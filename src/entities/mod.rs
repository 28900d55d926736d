//! Entity module - Contains the validated domain model.
//! Every entity is built from a raw JSON payload by a `from_json` smart constructor
//! and carries only values that satisfy its field invariants.

pub mod app_metadata;
pub mod envelope;
pub(crate) mod fields;
pub mod forecast;
pub mod priority;
pub mod settings;
pub mod transaction;

/// Server-assigned envelope identifier
pub type EnvelopeId = i64;

pub use app_metadata::AppMetadata;
pub use envelope::{Envelope, EnvelopeChange};
pub use forecast::SavingsForecast;
pub use priority::PriorityEntry;
pub use settings::{OverflowDistributionMode, Settings, SettingsChange, SettingsSlot};
pub use transaction::{TransactionKind, TransactionLog, TransactionLogEntry, TransactionTrigger};
