//! Transaction log retrieval - Loads the history of one envelope.
//!
//! The server returns the log for a single envelope. Entries are validated against that
//! envelope, ordered newest first and attached to the cached envelope so that views can
//! read them from the store. A 204 answer means the envelope has no transactions yet and
//! is stored as an empty log rather than treated as a failure.

use super::{Gateway, response::Classified};
use crate::{
    entities::{Envelope, TransactionLog},
    errors::{Error, Result},
    transport::{HttpRequest, Method},
};
use tracing::{debug, instrument};

/// Keys the entry array may arrive under.
const LOG_KEYS: [&str; 2] = ["transactionLogs", "entries"];

/// Fetches the transaction log of `envelope` and attaches it in the store.
///
/// # Arguments
/// * `api` - Gateway used for the request and the store update
/// * `envelope` - The envelope whose history to load
///
/// # Errors
/// Session errors from the gateway, `Error::Validation` when an entry is invalid or
/// belongs to another envelope, and `Error::MalformedPayload` when neither
/// `transactionLogs` nor its `entries` alias is present.
#[instrument(skip(api, envelope), fields(id = envelope.id()))]
pub async fn fetch_transaction_log(api: &Gateway, envelope: &Envelope) -> Result<TransactionLog> {
    let path = format!("/api/moneybox/{}/transactions", envelope.id());
    let log = match api.call(HttpRequest::new(Method::Get, path)).await? {
        Classified::NoContent => TransactionLog::empty(envelope.id()),
        Classified::Json(value) => {
            if LOG_KEYS.iter().all(|key| value.get(*key).is_none()) {
                return Err(Error::malformed(
                    "response is missing the `transactionLogs` array",
                ));
            }
            TransactionLog::from_json(envelope.id(), &value)?
        }
    };

    debug!("Loaded {} transactions", log.len());
    api.store.write().await.attach_transaction_log(log.clone())?;
    Ok(log)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{TestHarness, envelope, json_response, no_content};
    use serde_json::json;

    fn entry(id: i64, envelope_id: i64, created_at: &str) -> serde_json::Value {
        json!({
            "id": id,
            "moneyboxId": envelope_id,
            "amount": 100,
            "balance": 100,
            "description": "",
            "transactionTrigger": "manual",
            "transactionType": "direct",
            "counterpartyMoneyboxId": null,
            "counterpartyMoneyboxName": null,
            "createdAt": created_at,
        })
    }

    #[tokio::test]
    async fn test_log_is_sorted_and_attached() {
        let harness = TestHarness::new();
        let car = envelope(3, "Car", 100);
        harness.store.write().await.add_envelope(car.clone()).unwrap();
        harness.transport.respond(
            Method::Get,
            "/api/moneybox/3/transactions",
            json_response(
                200,
                json!({"transactionLogs": [
                    entry(1, 3, "2024-01-01T00:00:00Z"),
                    entry(2, 3, "2024-03-01T00:00:00Z"),
                    entry(3, 3, "2024-02-01T00:00:00Z"),
                ]}),
            ),
        );

        let log = fetch_transaction_log(&harness.gateway, &car).await.unwrap();

        let ids: Vec<i64> = log.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        let store = harness.store.read().await;
        assert_eq!(store.find(3).unwrap().transaction_logs().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_no_content_attaches_empty_log() {
        let harness = TestHarness::new();
        let car = envelope(3, "Car", 100);
        harness.store.write().await.add_envelope(car.clone()).unwrap();
        harness
            .transport
            .respond(Method::Get, "/api/moneybox/3/transactions", no_content());

        let log = fetch_transaction_log(&harness.gateway, &car).await.unwrap();

        assert!(log.is_empty());
        let store = harness.store.read().await;
        assert!(store.find(3).unwrap().transaction_logs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entry_for_other_envelope_rejected() {
        let harness = TestHarness::new();
        let car = envelope(3, "Car", 100);
        harness.transport.respond(
            Method::Get,
            "/api/moneybox/3/transactions",
            json_response(
                200,
                json!({"transactionLogs": [entry(1, 4, "2024-01-01T00:00:00Z")]}),
            ),
        );

        let err = fetch_transaction_log(&harness.gateway, &car)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn test_entries_alias_is_accepted() {
        let harness = TestHarness::new();
        let car = envelope(3, "Car", 100);
        harness.store.write().await.add_envelope(car.clone()).unwrap();
        harness.transport.respond(
            Method::Get,
            "/api/moneybox/3/transactions",
            json_response(200, json!({"entries": [entry(1, 3, "2024-01-01T00:00:00Z")]})),
        );

        let log = fetch_transaction_log(&harness.gateway, &car).await.unwrap();

        assert_eq!(log.len(), 1);
        let store = harness.store.read().await;
        assert_eq!(store.find(3).unwrap().transaction_logs().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_key_is_malformed() {
        let harness = TestHarness::new();
        let car = envelope(3, "Car", 100);
        harness.transport.respond(
            Method::Get,
            "/api/moneybox/3/transactions",
            json_response(200, json!({})),
        );

        let err = fetch_transaction_log(&harness.gateway, &car)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedPayload { .. }));
    }
}
