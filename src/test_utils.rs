//! Shared test utilities for `envelope-sync`.
//!
//! Provides raw payload builders with sensible defaults, a scripted transport,
//! a navigator that records calls, and a harness wiring them to a gateway.
#![allow(clippy::unwrap_used)]

use crate::{
    cache::{EnvelopeStore, SharedStore},
    core::{Gateway, fallback::FallbackNavigator, fallback::Navigator},
    entities::{Envelope, EnvelopeId},
    errors::{Error, Result},
    transport::{HttpRequest, HttpResponse, HttpTransport, Method},
};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace")))
        .with_test_writer()
        .try_init();
}

/// Raw envelope payload.
///
/// # Defaults
/// * `savingsAmount`: 100
/// * `savingsTarget`: 10000
/// * `priority`: 1
/// * `createdAt`: 2024-01-01, never modified
pub fn raw_envelope(id: EnvelopeId, name: &str, balance: i64) -> Value {
    json!({
        "id": id,
        "name": name,
        "balance": balance,
        "createdAt": "2024-01-01T00:00:00Z",
        "modifiedAt": null,
        "priority": 1,
        "savingsAmount": 100,
        "savingsTarget": 10_000,
        "isOverflow": false,
    })
}

pub fn envelope(id: EnvelopeId, name: &str, balance: i64) -> Envelope {
    Envelope::from_json(&raw_envelope(id, name, balance)).unwrap()
}

/// The overflow envelope: priority 0, no savings amount, no target.
pub fn overflow_envelope(id: EnvelopeId) -> Envelope {
    let mut raw = raw_envelope(id, "Overflow", 0);
    raw["isOverflow"] = json!(true);
    raw["priority"] = json!(0);
    raw["savingsAmount"] = json!(0);
    raw["savingsTarget"] = Value::Null;
    Envelope::from_json(&raw).unwrap()
}

/// Raw settings payload with reports off and the `collect` overflow mode.
pub fn raw_settings(savings_amount: i64) -> Value {
    json!({
        "createdAt": "2024-01-01T00:00:00Z",
        "modifiedAt": null,
        "isAutomatedSavingActive": true,
        "overflowMoneyboxAutomatedSavingsMode": "collect",
        "savingsAmount": savings_amount,
        "sendReportsViaEmail": false,
        "userEmailAddress": null,
    })
}

pub fn json_response(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        content_type: Some("application/json".to_string()),
        body: body.to_string(),
    }
}

/// The SPA's index page, as served by a misrouted request.
pub fn html_response(status: u16) -> HttpResponse {
    HttpResponse {
        status,
        content_type: Some("text/html; charset=utf-8".to_string()),
        body: "<!DOCTYPE html><html><body><div id=\"app\"></div></body></html>".to_string(),
    }
}

pub fn no_content() -> HttpResponse {
    HttpResponse {
        status: 204,
        content_type: None,
        body: String::new(),
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(HttpResponse),
    Fail(String),
}

/// Transport answering from per-route scripts.
///
/// Scripted answers are consumed in order; the last one is repeated.
/// Unscripted routes answer 404.
#[derive(Debug, Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<(&'static str, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(&self, method: Method, path: &str, scripted: Scripted) {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts
            .entry((method.as_str(), path.to_string()))
            .or_default();
        // A fresh script replaces a sticky answer that was already consumed once.
        if queue.len() == 1 && self.calls_to(method, path) > 0 {
            queue.clear();
        }
        queue.push_back(scripted);
    }

    pub fn respond(&self, method: Method, path: &str, response: HttpResponse) {
        self.push(method, path, Scripted::Respond(response));
    }

    pub fn fail(&self, method: Method, path: &str, message: &str) {
        self.push(method, path, Scripted::Fail(message.to_string()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let key = (request.method.as_str(), request.path.clone());
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = {
            let mut scripts = self.scripts.lock().unwrap();
            scripts.get_mut(&key).and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
        };
        match scripted {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(Error::Network { message }),
            None => Ok(json_response(404, json!({"detail": "Not Found"}))),
        }
    }
}

/// Navigator that counts calls and can be told to fail soft navigation.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    soft: AtomicUsize,
    hard: AtomicUsize,
    fail_soft: bool,
    delay: Option<Duration>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_soft(mut self) -> Self {
        self.fail_soft = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn soft_calls(&self) -> usize {
        self.soft.load(Ordering::SeqCst)
    }

    pub fn hard_calls(&self) -> usize {
        self.hard.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn replace(&self, path: &str) -> Result<()> {
        self.soft.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_soft {
            return Err(Error::Navigation {
                message: format!("router refused {path}"),
            });
        }
        Ok(())
    }

    async fn hard_reload(&self, _path: &str) -> Result<()> {
        self.hard.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A gateway over a scripted transport, with every part exposed for assertions.
pub struct TestHarness {
    pub transport: Arc<MockTransport>,
    pub navigator: Arc<RecordingNavigator>,
    pub store: SharedStore,
    pub gateway: Gateway,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::build(MockTransport::new(), RecordingNavigator::new())
    }

    /// Soft navigation takes `delay`, keeping the fallback sequence in flight.
    pub fn with_navigation_delay(delay: Duration) -> Self {
        Self::build(MockTransport::new(), RecordingNavigator::new().with_delay(delay))
    }

    /// Every request takes `delay`, so activations can be cancelled mid-flight.
    pub fn with_transport_delay(delay: Duration) -> Self {
        Self::build(MockTransport::new().with_delay(delay), RecordingNavigator::new())
    }

    fn build(transport: MockTransport, navigator: RecordingNavigator) -> Self {
        init_test_tracing();
        let transport = Arc::new(transport);
        let navigator = Arc::new(navigator);
        let store = EnvelopeStore::shared();
        let fallback = Arc::new(FallbackNavigator::new(
            Arc::clone(&navigator) as Arc<dyn Navigator>,
            Arc::clone(&store),
        ));
        let gateway = Gateway::new(Arc::clone(&transport) as Arc<dyn HttpTransport>, Arc::clone(&store), fallback);
        Self {
            transport,
            navigator,
            store,
            gateway,
        }
    }
}
