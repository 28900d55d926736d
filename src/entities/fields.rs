//! Field extraction for raw JSON payloads.
//!
//! Every getter names the wire field it reads so a type mismatch surfaces as
//! `Error::Validation` for that exact field. Aliases let the envelope spelling
//! stand in for the server's moneybox spelling.

use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Read-only view over a JSON object that is being validated into a model.
pub(crate) struct Fields<'a> {
    object: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(value: &'a Value, entity: &'static str) -> Result<Self> {
        value
            .as_object()
            .map(|object| Self { object })
            .ok_or_else(|| Error::validation(entity, "expected a JSON object"))
    }

    /// First present key among `names`; `null` counts as present.
    fn lookup(&self, names: &[&'static str]) -> Option<&'a Value> {
        names.iter().find_map(|name| self.object.get(*name))
    }

    fn lookup_non_null(&self, names: &[&'static str]) -> Option<&'a Value> {
        self.lookup(names).filter(|value| !value.is_null())
    }

    pub(crate) fn int(&self, names: &[&'static str]) -> Result<i64> {
        self.opt_int(names)?
            .ok_or_else(|| Error::validation(names[0], "is required"))
    }

    pub(crate) fn opt_int(&self, names: &[&'static str]) -> Result<Option<i64>> {
        self.lookup_non_null(names)
            .map(|value| {
                value
                    .as_i64()
                    .ok_or_else(|| Error::validation(names[0], "must be an integer"))
            })
            .transpose()
    }

    pub(crate) fn string(&self, names: &[&'static str]) -> Result<String> {
        self.opt_string(names)?
            .ok_or_else(|| Error::validation(names[0], "is required"))
    }

    pub(crate) fn opt_string(&self, names: &[&'static str]) -> Result<Option<String>> {
        self.lookup_non_null(names)
            .map(|value| {
                value
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::validation(names[0], "must be a string"))
            })
            .transpose()
    }

    pub(crate) fn bool(&self, names: &[&'static str]) -> Result<bool> {
        self.lookup_non_null(names)
            .ok_or_else(|| Error::validation(names[0], "is required"))?
            .as_bool()
            .ok_or_else(|| Error::validation(names[0], "must be a boolean"))
    }

    pub(crate) fn timestamp(&self, names: &[&'static str]) -> Result<DateTime<Utc>> {
        self.opt_timestamp(names)?
            .ok_or_else(|| Error::validation(names[0], "is required"))
    }

    pub(crate) fn opt_timestamp(&self, names: &[&'static str]) -> Result<Option<DateTime<Utc>>> {
        self.opt_string(names)?
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|parsed| parsed.with_timezone(&Utc))
                    .map_err(|e| Error::validation(names[0], format!("must be an RFC 3339 timestamp ({e})")))
            })
            .transpose()
    }

    pub(crate) fn array(&self, names: &[&'static str]) -> Result<&'a Vec<Value>> {
        self.lookup_non_null(names)
            .ok_or_else(|| Error::validation(names[0], "is required"))?
            .as_array()
            .ok_or_else(|| Error::validation(names[0], "must be an array"))
    }

    /// Deserializes a string enum such as `"manual"` through its serde impl.
    pub(crate) fn variant<T: DeserializeOwned>(&self, names: &[&'static str]) -> Result<T> {
        let value = self
            .lookup_non_null(names)
            .ok_or_else(|| Error::validation(names[0], "is required"))?;
        serde_json::from_value(value.clone())
            .map_err(|_| Error::validation(names[0], format!("unknown variant {value}")))
    }
}
