//! Settings entity and its owned singleton slot.
//!
//! A `Settings` value only becomes live through [`SettingsSlot::initialize`].
//! Initializing an occupied slot fails with `Error::SettingsAlreadyInitialized`
//! because a second construction means two code paths disagree about who
//! owns the session's settings.

use super::fields::Fields;
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What automated distribution does with surplus once targets are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowDistributionMode {
    /// Keep surplus in the overflow envelope
    #[serde(rename = "collect")]
    Collect,
    /// Add surplus to the next cycle's savings amount
    #[serde(rename = "add_to_automated_savings_amount")]
    AddToAutomatedSavingsAmount,
    /// Top up envelopes that have a target
    #[serde(
        rename = "fill_up_limited_moneyboxes",
        alias = "fill_up_limited_envelopes"
    )]
    FillUpLimitedEnvelopes,
}

/// User-level automation and reporting settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    created_at: DateTime<Utc>,
    modified_at: Option<DateTime<Utc>>,
    is_automated_saving_active: bool,
    #[serde(rename = "overflowMoneyboxAutomatedSavingsMode")]
    overflow_distribution_mode: OverflowDistributionMode,
    savings_amount: i64,
    send_reports_via_email: bool,
    user_email_address: Option<String>,
}

/// A single-field change applied through [`SettingsSlot::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsChange {
    AutomatedSavingActive(bool),
    OverflowDistributionMode(OverflowDistributionMode),
    SavingsAmount(i64),
    SendReportsViaEmail(bool),
    UserEmailAddress(Option<String>),
    ModifiedAt(Option<DateTime<Utc>>),
}

impl Settings {
    pub(crate) fn from_json(value: &Value) -> Result<Self> {
        let fields = Fields::new(value, "settings")?;
        let settings = Self {
            created_at: fields.timestamp(&["createdAt"])?,
            modified_at: fields.opt_timestamp(&["modifiedAt"])?,
            is_automated_saving_active: fields.bool(&["isAutomatedSavingActive"])?,
            overflow_distribution_mode: fields.variant(&[
                "overflowMoneyboxAutomatedSavingsMode",
                "overflowDistributionMode",
            ])?,
            savings_amount: fields.int(&["savingsAmount"])?,
            send_reports_via_email: fields.bool(&["sendReportsViaEmail"])?,
            user_email_address: fields.opt_string(&["userEmailAddress"])?,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.savings_amount < 0 {
            return Err(Error::validation("savingsAmount", "must be >= 0"));
        }
        if let Some(address) = &self.user_email_address
            && !is_plausible_email(address)
        {
            return Err(Error::validation(
                "userEmailAddress",
                format!("'{address}' is not an email address"),
            ));
        }
        if self.send_reports_via_email && self.user_email_address.is_none() {
            return Err(Error::validation(
                "sendReportsViaEmail",
                "requires userEmailAddress",
            ));
        }
        if self
            .modified_at
            .is_some_and(|modified| modified < self.created_at)
        {
            return Err(Error::validation("modifiedAt", "must not precede createdAt"));
        }
        Ok(())
    }

    /// Returns a copy with every change applied, validated as a whole.
    ///
    /// `self` is never touched, so this can vet a patch before it is sent.
    pub fn with_changes(
        &self,
        changes: impl IntoIterator<Item = SettingsChange>,
    ) -> Result<Self> {
        let mut candidate = self.clone();
        for change in changes {
            candidate.assign(change);
        }
        candidate.validate()?;
        Ok(candidate)
    }

    fn assign(&mut self, change: SettingsChange) {
        match change {
            SettingsChange::AutomatedSavingActive(active) => {
                self.is_automated_saving_active = active;
            }
            SettingsChange::OverflowDistributionMode(mode) => {
                self.overflow_distribution_mode = mode;
            }
            SettingsChange::SavingsAmount(amount) => self.savings_amount = amount,
            SettingsChange::SendReportsViaEmail(send) => self.send_reports_via_email = send,
            SettingsChange::UserEmailAddress(address) => self.user_email_address = address,
            SettingsChange::ModifiedAt(modified) => self.modified_at = modified,
        }
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
    pub const fn is_automated_saving_active(&self) -> bool {
        self.is_automated_saving_active
    }

    #[must_use]
    pub const fn overflow_distribution_mode(&self) -> OverflowDistributionMode {
        self.overflow_distribution_mode
    }

    #[must_use]
    pub const fn savings_amount(&self) -> i64 {
        self.savings_amount
    }

    #[must_use]
    pub const fn send_reports_via_email(&self) -> bool {
        self.send_reports_via_email
    }

    #[must_use]
    pub fn user_email_address(&self) -> Option<&str> {
        self.user_email_address.as_deref()
    }
}

fn is_plausible_email(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !address.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Owned holder for the session's single live `Settings`.
#[derive(Debug, Default)]
pub struct SettingsSlot {
    active: Option<Settings>,
}

impl SettingsSlot {
    #[must_use]
    pub const fn new() -> Self {
        Self { active: None }
    }

    /// Validates `value` and installs it as the live settings.
    ///
    /// # Errors
    /// `Error::SettingsAlreadyInitialized` if settings are already live; the
    /// existing instance is kept. Validation errors from the payload.
    pub fn initialize(&mut self, value: &Value) -> Result<&Settings> {
        if self.active.is_some() {
            tracing::error!("Attempted to initialize settings twice");
            return Err(Error::SettingsAlreadyInitialized);
        }
        let settings = Settings::from_json(value)?;
        Ok(&*self.active.insert(settings))
    }

    /// Replaces every field of the live settings with a fresh server copy.
    pub fn refresh(&mut self, value: &Value) -> Result<&Settings> {
        let Some(active) = self.active.as_mut() else {
            return Err(Error::precondition("settings have not been initialized"));
        };
        *active = Settings::from_json(value)?;
        Ok(&*active)
    }

    /// Applies one change to the live settings.
    pub fn update(&mut self, change: SettingsChange) -> Result<&Settings> {
        self.update_all([change])
    }

    /// Applies several changes, all or nothing; validity is checked on the result.
    pub fn update_all(
        &mut self,
        changes: impl IntoIterator<Item = SettingsChange>,
    ) -> Result<&Settings> {
        let Some(active) = self.active.as_mut() else {
            return Err(Error::precondition("settings have not been initialized"));
        };
        *active = active.with_changes(changes)?;
        Ok(&*active)
    }

    #[must_use]
    pub const fn get(&self) -> Option<&Settings> {
        self.active.as_ref()
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.active.is_some()
    }
}
