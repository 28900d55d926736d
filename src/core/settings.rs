//! Settings and application metadata operations.
//!
//! The store owns the single live `Settings` value. The first successful fetch
//! or create initializes it; fetching or creating again is an error, and only
//! `reload_settings` overwrites it.

use super::{Fetched, Gateway, response::Classified};
use crate::entities::{AppMetadata, OverflowDistributionMode, Settings, SettingsChange};
use crate::errors::{Error, Result};
use crate::transport::{HttpRequest, Method};
use serde_json::{Map, Value, json};
use tracing::{error, info, instrument, warn};

const SETTINGS_PATH: &str = "/api/settings";

/// Partial settings update; only `Some` fields are sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingsPatch {
    pub is_automated_saving_active: Option<bool>,
    pub overflow_distribution_mode: Option<OverflowDistributionMode>,
    pub savings_amount: Option<i64>,
    pub send_reports_via_email: Option<bool>,
    /// `Some(None)` clears the address
    pub user_email_address: Option<Option<String>>,
}

impl SettingsPatch {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.is_automated_saving_active.is_none()
            && self.overflow_distribution_mode.is_none()
            && self.savings_amount.is_none()
            && self.send_reports_via_email.is_none()
            && self.user_email_address.is_none()
    }

    /// Wire payload with every unset field dropped.
    #[must_use]
    pub fn payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        if let Some(active) = self.is_automated_saving_active {
            payload.insert("isAutomatedSavingActive".to_string(), json!(active));
        }
        if let Some(mode) = self.overflow_distribution_mode {
            payload.insert("overflowMoneyboxAutomatedSavingsMode".to_string(), json!(mode));
        }
        if let Some(amount) = self.savings_amount {
            payload.insert("savingsAmount".to_string(), json!(amount));
        }
        if let Some(send) = self.send_reports_via_email {
            payload.insert("sendReportsViaEmail".to_string(), json!(send));
        }
        if let Some(address) = &self.user_email_address {
            payload.insert("userEmailAddress".to_string(), json!(address));
        }
        payload
    }

    fn changes(&self) -> Vec<SettingsChange> {
        let mut changes = Vec::new();
        if let Some(active) = self.is_automated_saving_active {
            changes.push(SettingsChange::AutomatedSavingActive(active));
        }
        if let Some(mode) = self.overflow_distribution_mode {
            changes.push(SettingsChange::OverflowDistributionMode(mode));
        }
        if let Some(amount) = self.savings_amount {
            changes.push(SettingsChange::SavingsAmount(amount));
        }
        if let Some(send) = self.send_reports_via_email {
            changes.push(SettingsChange::SendReportsViaEmail(send));
        }
        if let Some(address) = &self.user_email_address {
            changes.push(SettingsChange::UserEmailAddress(address.clone()));
        }
        changes
    }
}

/// Fetches the settings and installs them as the live instance.
///
/// # Errors
/// `Error::SettingsAlreadyInitialized` without a network call when settings
/// are already live; use [`reload_settings`] to overwrite them.
#[instrument(skip(api))]
pub async fn fetch_settings(api: &Gateway) -> Result<Fetched<Settings>> {
    if api.store.read().await.settings().is_some() {
        error!("Refusing to fetch settings over the live instance");
        return Err(Error::SettingsAlreadyInitialized);
    }

    let value = match api
        .call(HttpRequest::new(Method::Get, SETTINGS_PATH))
        .await?
    {
        Classified::NoContent => return Ok(Fetched::Empty),
        Classified::Json(value) => value,
    };
    let settings = api.store.write().await.initialize_settings(&value)?.clone();
    Ok(Fetched::Present(settings))
}

/// Re-reads the settings from the server and overwrites the live instance.
///
/// # Errors
/// `Error::LocalPrecondition` without a network call when no settings are live.
#[instrument(skip(api))]
pub async fn reload_settings(api: &Gateway) -> Result<Settings> {
    if api.store.read().await.settings().is_none() {
        return Err(Error::precondition("settings have not been initialized"));
    }

    let value = api
        .call_for_value(HttpRequest::new(Method::Get, SETTINGS_PATH), "settings")
        .await?;
    let settings = api.store.write().await.refresh_settings(&value)?.clone();
    warn!("Live settings replaced by a server reload");
    Ok(settings)
}

/// Creates the settings on the server with an initial savings amount.
///
/// # Errors
/// `Error::SettingsAlreadyInitialized` without a network call when settings
/// are already live.
#[instrument(skip(api))]
pub async fn create_settings(api: &Gateway, savings_amount: i64) -> Result<Settings> {
    if api.store.read().await.settings().is_some() {
        error!("Refusing to create settings while an instance is live");
        return Err(Error::SettingsAlreadyInitialized);
    }
    if savings_amount < 0 {
        return Err(Error::precondition("savings amount must be >= 0"));
    }

    let value = api
        .call_for_value(
            HttpRequest::with_json(
                Method::Post,
                SETTINGS_PATH,
                json!({ "savingsAmount": savings_amount }),
            ),
            "settings",
        )
        .await?;
    let settings = api.store.write().await.initialize_settings(&value)?.clone();
    info!("Settings created");
    Ok(settings)
}

/// Sends a partial settings update.
///
/// The patch is checked against the live settings first; a patch that would
/// leave them invalid is rejected before any network call. A full settings body in the response replaces the live instance; a 204
/// applies the patch locally.
#[instrument(skip(api, patch))]
pub async fn update_settings(api: &Gateway, patch: &SettingsPatch) -> Result<Settings> {
    if patch.is_empty() {
        return Err(Error::precondition(
            "empty update; provide at least one field",
        ));
    }
    match api.store.read().await.settings() {
        Some(live) => {
            live.with_changes(patch.changes())?;
        }
        None => return Err(Error::precondition("settings have not been initialized")),
    }

    let outcome = api
        .call(HttpRequest::with_json(
            Method::Patch,
            SETTINGS_PATH,
            Value::Object(patch.payload()),
        ))
        .await?;

    let mut store = api.store.write().await;
    let settings = match outcome {
        Classified::NoContent => store.update_settings(patch.changes())?,
        Classified::Json(value) => store.refresh_settings(&value)?,
    };
    Ok(settings.clone())
}

/// Fetches the backend's name and version.
#[instrument(skip(api))]
pub async fn fetch_app_metadata(api: &Gateway) -> Result<AppMetadata> {
    let value = api
        .call_for_value(HttpRequest::new(Method::Get, "/api/app/metadata"), "app metadata")
        .await?;
    AppMetadata::from_json(&value)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{TestHarness, json_response, no_content, raw_settings};

    #[tokio::test]
    async fn test_second_fetch_fails_and_keeps_live_settings() {
        let harness = TestHarness::new();
        harness
            .transport
            .respond(Method::Get, SETTINGS_PATH, json_response(200, raw_settings(100)));

        let first = fetch_settings(&harness.gateway).await.unwrap();
        assert_eq!(first.into_option().unwrap().savings_amount(), 100);

        harness
            .transport
            .respond(Method::Get, SETTINGS_PATH, json_response(200, raw_settings(7)));
        let err = fetch_settings(&harness.gateway).await.unwrap_err();

        assert!(matches!(err, Error::SettingsAlreadyInitialized));
        assert_eq!(harness.transport.calls_to(Method::Get, SETTINGS_PATH), 1);
        assert_eq!(
            harness.store.read().await.settings().unwrap().savings_amount(),
            100
        );
    }

    #[tokio::test]
    async fn test_reload_overwrites_live_settings() {
        let harness = TestHarness::new();
        harness
            .store
            .write()
            .await
            .initialize_settings(&raw_settings(100))
            .unwrap();
        harness
            .transport
            .respond(Method::Get, SETTINGS_PATH, json_response(200, raw_settings(250)));

        let reloaded = reload_settings(&harness.gateway).await.unwrap();

        assert_eq!(reloaded.savings_amount(), 250);
        assert_eq!(
            harness.store.read().await.settings().unwrap().savings_amount(),
            250
        );
    }

    #[tokio::test]
    async fn test_reload_without_live_settings_makes_no_call() {
        let harness = TestHarness::new();
        let err = reload_settings(&harness.gateway).await.unwrap_err();
        assert!(matches!(err, Error::LocalPrecondition { .. }));
        assert_eq!(harness.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_no_content_leaves_slot_empty() {
        let harness = TestHarness::new();
        harness
            .transport
            .respond(Method::Get, SETTINGS_PATH, no_content());

        assert!(fetch_settings(&harness.gateway).await.unwrap().is_empty());
        assert!(harness.store.read().await.settings().is_none());
    }

    #[tokio::test]
    async fn test_create_when_live_fails_without_network() {
        let harness = TestHarness::new();
        harness
            .store
            .write()
            .await
            .initialize_settings(&raw_settings(10))
            .unwrap();

        let err = create_settings(&harness.gateway, 50).await.unwrap_err();

        assert!(matches!(err, Error::SettingsAlreadyInitialized));
        assert_eq!(harness.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_initializes_slot() {
        let harness = TestHarness::new();
        harness
            .transport
            .respond(Method::Post, SETTINGS_PATH, json_response(201, raw_settings(50)));

        let created = create_settings(&harness.gateway, 50).await.unwrap();

        assert_eq!(created.savings_amount(), 50);
        assert_eq!(
            harness.transport.requests()[0].body,
            Some(json!({"savingsAmount": 50}))
        );
        assert!(harness.store.read().await.settings().is_some());
    }

    #[tokio::test]
    async fn test_empty_patch_makes_no_call() {
        let harness = TestHarness::new();
        let err = update_settings(&harness.gateway, &SettingsPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LocalPrecondition { .. }));
        assert_eq!(harness.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_update_applies_patch_on_no_content() {
        let harness = TestHarness::new();
        harness
            .store
            .write()
            .await
            .initialize_settings(&raw_settings(10))
            .unwrap();
        harness
            .transport
            .respond(Method::Patch, SETTINGS_PATH, no_content());

        let patch = SettingsPatch {
            overflow_distribution_mode: Some(OverflowDistributionMode::FillUpLimitedEnvelopes),
            savings_amount: Some(75),
            ..SettingsPatch::default()
        };
        let updated = update_settings(&harness.gateway, &patch).await.unwrap();

        assert_eq!(updated.savings_amount(), 75);
        assert_eq!(
            updated.overflow_distribution_mode(),
            OverflowDistributionMode::FillUpLimitedEnvelopes
        );
        assert_eq!(
            harness.transport.requests()[0].body,
            Some(json!({
                "overflowMoneyboxAutomatedSavingsMode": "fill_up_limited_moneyboxes",
                "savingsAmount": 75,
            }))
        );
    }

    #[tokio::test]
    async fn test_patch_invalid_against_live_settings_makes_no_call() {
        let harness = TestHarness::new();
        harness
            .store
            .write()
            .await
            .initialize_settings(&raw_settings(10))
            .unwrap();
        harness
            .transport
            .respond(Method::Patch, SETTINGS_PATH, no_content());

        // Reports need an address, and none is on file.
        let patch = SettingsPatch {
            send_reports_via_email: Some(true),
            ..SettingsPatch::default()
        };
        let err = update_settings(&harness.gateway, &patch).await.unwrap_err();

        assert!(matches!(err, Error::Validation { field: "sendReportsViaEmail", .. }));
        assert_eq!(harness.transport.call_count(), 0);
        assert!(!harness.store.read().await.settings().unwrap().send_reports_via_email());
    }

    #[tokio::test]
    async fn test_patch_with_address_and_reports_is_sent() {
        let harness = TestHarness::new();
        harness
            .store
            .write()
            .await
            .initialize_settings(&raw_settings(10))
            .unwrap();
        harness
            .transport
            .respond(Method::Patch, SETTINGS_PATH, no_content());

        let patch = SettingsPatch {
            send_reports_via_email: Some(true),
            user_email_address: Some(Some("me@example.com".to_string())),
            ..SettingsPatch::default()
        };
        let updated = update_settings(&harness.gateway, &patch).await.unwrap();

        assert!(updated.send_reports_via_email());
        assert_eq!(updated.user_email_address(), Some("me@example.com"));
        assert_eq!(harness.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_app_metadata() {
        let harness = TestHarness::new();
        harness.transport.respond(
            Method::Get,
            "/api/app/metadata",
            json_response(
                200,
                json!({"appName": "Budget", "appVersion": "1.2.0", "appDescription": null}),
            ),
        );

        let metadata = fetch_app_metadata(&harness.gateway).await.unwrap();

        assert_eq!(metadata.app_name, "Budget");
        assert_eq!(metadata.app_description, None);
    }
}
