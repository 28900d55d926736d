//! Savings forecast entity - projected growth of one envelope.

use super::{EnvelopeId, fields::Fields};
use crate::errors::{Error, Result};
use serde::Serialize;
use serde_json::Value;

/// Server-computed projection for one envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsForecast {
    /// Envelope the projection belongs to
    #[serde(rename = "moneyboxId")]
    pub envelope_id: EnvelopeId,
    /// Projected amount distributed into the envelope, month by month
    pub monthly_distributions: Vec<i64>,
    /// Months until the target is reached; `None` for unlimited or unreachable targets
    pub months_until_target: Option<i64>,
}

impl SavingsForecast {
    /// Builds a forecast from a raw payload.
    pub fn from_json(value: &Value) -> Result<Self> {
        let fields = Fields::new(value, "moneyboxForecast")?;
        let monthly_distributions = fields
            .array(&["monthlyDistributions"])?
            .iter()
            .map(|v| {
                v.as_i64()
                    .ok_or_else(|| Error::validation("monthlyDistributions", "must hold integers"))
            })
            .collect::<Result<Vec<_>>>()?;
        let forecast = Self {
            envelope_id: fields.int(&["moneyboxId", "envelopeId"])?,
            monthly_distributions,
            months_until_target: fields.opt_int(&["monthsUntilTarget"])?,
        };
        forecast.validate()?;
        Ok(forecast)
    }

    fn validate(&self) -> Result<()> {
        if self.envelope_id <= 0 {
            return Err(Error::validation("moneyboxId", "must be a positive integer"));
        }
        if self.monthly_distributions.iter().any(|v| *v < 0) {
            return Err(Error::validation("monthlyDistributions", "must be >= 0"));
        }
        if self.months_until_target.is_some_and(|m| m < 0) {
            return Err(Error::validation("monthsUntilTarget", "must be >= 0 or null"));
        }
        Ok(())
    }

    /// Total projected inflow across the forecast horizon.
    ///
    /// `None` when the sum does not fit in an `i64`.
    #[must_use]
    pub fn projected_total(&self) -> Option<i64> {
        self.monthly_distributions
            .iter()
            .try_fold(0_i64, |total, month| total.checked_add(*month))
    }
}
