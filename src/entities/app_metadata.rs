//! Application metadata reported by the remote service.

use super::fields::Fields;
use crate::errors::{Error, Result};
use serde::Serialize;
use serde_json::Value;

/// Name and version of the running backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppMetadata {
    pub app_name: String,
    pub app_version: String,
    pub app_description: Option<String>,
}

impl AppMetadata {
    pub fn from_json(value: &Value) -> Result<Self> {
        let fields = Fields::new(value, "appMetadata")?;
        let metadata = Self {
            app_name: fields.string(&["appName"])?,
            app_version: fields.string(&["appVersion"])?,
            app_description: fields.opt_string(&["appDescription"])?,
        };
        if metadata.app_name.trim().is_empty() {
            return Err(Error::validation("appName", "must not be empty"));
        }
        if metadata.app_version.trim().is_empty() {
            return Err(Error::validation("appVersion", "must not be empty"));
        }
        Ok(metadata)
    }
}
