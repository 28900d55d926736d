//! Core business logic - the remote gateway.
//!
//! Each submodule holds the operations for one resource. All of them go
//! through `Gateway::call`, which sends the request, classifies the response
//! and runs the fallback navigation on fatal failures. Validated results are
//! written into the shared store before they are returned.

pub mod envelope;
pub mod fallback;
pub mod priority;
pub mod response;
pub mod settings;
pub mod transaction;

use crate::cache::SharedStore;
use crate::errors::{Error, Result};
use crate::transport::{HttpRequest, HttpTransport};
use fallback::FallbackNavigator;
use response::{Classified, classify};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Result of an operation where "nothing there" is a legitimate answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    /// The server answered 204
    Empty,
    Present(T),
}

impl<T> Fetched<T> {
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Empty => None,
            Self::Present(value) => Some(value),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Shared context for all gateway operations.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn HttpTransport>,
    store: SharedStore,
    fallback: Arc<FallbackNavigator>,
}

impl Gateway {
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: SharedStore,
        fallback: Arc<FallbackNavigator>,
    ) -> Self {
        Self {
            transport,
            store,
            fallback,
        }
    }

    /// The store this gateway writes into.
    #[must_use]
    pub const fn store(&self) -> &SharedStore {
        &self.store
    }

    #[must_use]
    pub const fn fallback(&self) -> &Arc<FallbackNavigator> {
        &self.fallback
    }

    /// Sends `request` and classifies the response.
    ///
    /// Protocol confusion and transport-level failures run the fallback
    /// navigation before the error is returned.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub(crate) async fn call(&self, request: HttpRequest) -> Result<Classified> {
        let context = format!("{} {}", request.method, request.path);
        let path = request.path.clone();
        debug!("Sending request");

        let outcome = match self.transport.send(request).await {
            Ok(response) => classify(&path, response),
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome
            && e.is_fatal()
        {
            self.fallback.trigger(&context).await;
        }
        outcome
    }

    /// Like `Gateway::call`, but a 204 is an error because a value was required.
    pub(crate) async fn call_for_value(
        &self,
        request: HttpRequest,
        what: &'static str,
    ) -> Result<Value> {
        match self.call(request).await? {
            Classified::Json(value) => Ok(value),
            Classified::NoContent => Err(Error::EmptyResult { what }),
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

/// Reads `key` from a response object, which must hold an array there.
pub(crate) fn array_field<'a>(value: &'a Value, key: &str) -> Result<&'a Vec<Value>> {
    value
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::malformed(format!("response is missing the `{key}` array")))
}
