//! Navigation guard - makes sure a route's data is in the store before it renders.
//!
//! Every activation walks `Pending -> Fetching` and ends in exactly one of
//! `Ready`, `Failed` or `Cancelled`. While fetching it first checks the global
//! "loaded" flag and, when unset, loads the envelope list and forecasts under a
//! refresh lock so concurrent activations share one refresh. Entity routes then
//! make sure their envelope (and, for detail and log views, its transaction
//! log) is cached. A failed activation runs the fallback navigation; a
//! cancelled one does not.

pub mod cancellation;
pub mod route;

pub use cancellation::RouteToken;
pub use route::Route;

use crate::cache::{LoadState, SharedStore};
use crate::core::fallback::ROOT_PATH;
use crate::core::{
    Fetched, Gateway, envelope::get_envelope, envelope::list_envelopes,
    priority::fetch_forecast, priority::fetch_priority_list, settings::fetch_settings,
    transaction::fetch_transaction_log,
};
use crate::entities::{Envelope, EnvelopeId};
use crate::errors::{Error, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Where an activation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Pending,
    Fetching,
    Ready,
    Failed,
    Cancelled,
}

impl GuardState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::Cancelled)
    }
}

/// Record of one route activation.
#[derive(Debug)]
pub struct Activation {
    pub route: Route,
    /// Every state passed through, in order
    pub states: Vec<GuardState>,
    /// Set when the activation failed
    pub error: Option<Error>,
    /// The unrecognized path that was redirected to `/`
    pub redirected_from: Option<String>,
}

impl Activation {
    fn new(route: Route) -> Self {
        Self {
            route,
            states: vec![GuardState::Pending],
            error: None,
            redirected_from: None,
        }
    }

    fn enter(&mut self, state: GuardState) {
        debug!("Route {} -> {:?}", self.route, state);
        self.states.push(state);
    }

    /// The final state.
    #[must_use]
    pub fn state(&self) -> GuardState {
        self.states.last().copied().unwrap_or(GuardState::Pending)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == GuardState::Ready
    }
}

/// Puts the load state back to `NotLoaded` when a refresh is dropped mid-flight.
struct PendingLoad<'a> {
    store: &'a SharedStore,
    settled: bool,
}

impl Drop for PendingLoad<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        warn!("List refresh abandoned, resetting load state");
        if let Ok(mut store) = self.store.try_write() {
            store.set_load_state(LoadState::NotLoaded);
            return;
        }
        // The store is busy; reset it as soon as the lock frees up.
        let store = Arc::clone(self.store);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let mut store = store.write().await;
                if store.load_state() == LoadState::Loading {
                    store.set_load_state(LoadState::NotLoaded);
                }
            });
        }
    }
}

/// Runs route activations against one gateway.
#[derive(Debug)]
pub struct NavigationGuard {
    api: Gateway,
    refresh_lock: Mutex<()>,
    current: Mutex<Option<RouteToken>>,
}

impl NavigationGuard {
    #[must_use]
    pub fn new(api: Gateway) -> Self {
        Self {
            api,
            refresh_lock: Mutex::new(()),
            current: Mutex::new(None),
        }
    }

    #[must_use]
    pub const fn gateway(&self) -> &Gateway {
        &self.api
    }

    /// Navigates to `path`, cancelling the previous navigation if it is still running.
    ///
    /// Unknown paths activate `/` instead.
    pub async fn navigate(&self, path: &str) -> Activation {
        let (route, redirected_from) = match Route::parse(path) {
            Some(route) => (route, None),
            None => {
                warn!("Unknown route {}, redirecting to {}", path, ROOT_PATH);
                (Route::Home, Some(path.to_string()))
            }
        };

        let token = RouteToken::new();
        if let Some(previous) = self.current.lock().await.replace(token.clone()) {
            previous.cancel();
        }

        let mut activation = self.activate(route, &token).await;
        activation.redirected_from = redirected_from;
        activation
    }

    /// Runs one activation of `route` under `token`.
    #[instrument(skip(self, route, token), fields(route = %route))]
    pub async fn activate(&self, route: Route, token: &RouteToken) -> Activation {
        let mut activation = Activation::new(route);
        activation.enter(GuardState::Fetching);

        match token.run(self.prepare(route)).await {
            Ok(()) => activation.enter(GuardState::Ready),
            Err(Error::Cancelled) => {
                info!("Activation of {} cancelled", route);
                activation.enter(GuardState::Cancelled);
            }
            Err(e) => {
                error!("Activation of {} failed: {}", route, e);
                // Fatal errors already ran the fallback inside the gateway.
                if !e.is_fatal() {
                    self.api.fallback().trigger(&format!("route {route}")).await;
                }
                activation.error = Some(e);
                activation.enter(GuardState::Failed);
            }
        }
        activation
    }

    async fn prepare(&self, route: Route) -> Result<()> {
        self.ensure_loaded().await?;
        match route {
            Route::Home | Route::CreateEnvelope => Ok(()),
            Route::Envelope(id) | Route::Logs(id) => {
                let envelope = self.ensure_envelope(id).await?;
                self.ensure_transaction_log(&envelope).await
            }
            Route::EditEnvelope(id) => {
                let envelope = self.ensure_envelope(id).await?;
                if envelope.is_overflow() {
                    return Err(Error::precondition(
                        "the overflow envelope cannot be edited",
                    ));
                }
                Ok(())
            }
            Route::PriorityList => self.ensure_priority_list().await,
            Route::Settings => self.ensure_settings().await,
        }
    }

    /// Loads the envelope list and forecasts unless the store is already loaded.
    async fn ensure_loaded(&self) -> Result<()> {
        if self.api.store().read().await.is_loaded() {
            return Ok(());
        }
        let _refresh = self.refresh_lock.lock().await;
        // Another activation may have finished the refresh while we waited.
        if self.api.store().read().await.is_loaded() {
            return Ok(());
        }

        self.api.store().write().await.set_load_state(LoadState::Loading);
        let mut pending = PendingLoad {
            store: self.api.store(),
            settled: false,
        };
        let loaded = async {
            list_envelopes(&self.api).await?;
            fetch_forecast(&self.api).await?;
            Ok::<_, Error>(())
        }
        .await;

        let state = if loaded.is_ok() {
            LoadState::Loaded
        } else {
            LoadState::NotLoaded
        };
        self.api.store().write().await.set_load_state(state);
        pending.settled = true;
        loaded
    }

    async fn ensure_envelope(&self, id: EnvelopeId) -> Result<Envelope> {
        let cached = self.api.store().read().await.find(id).cloned();
        match cached {
            Some(envelope) => Ok(envelope),
            None => get_envelope(&self.api, id).await,
        }
    }

    async fn ensure_transaction_log(&self, envelope: &Envelope) -> Result<()> {
        let attached = self
            .api
            .store()
            .read()
            .await
            .find(envelope.id())
            .is_some_and(|cached| cached.transaction_logs().is_some());
        if !attached {
            fetch_transaction_log(&self.api, envelope).await?;
        }
        Ok(())
    }

    async fn ensure_priority_list(&self) -> Result<()> {
        if self.api.store().read().await.priority_list().is_none() {
            fetch_priority_list(&self.api).await?;
        }
        Ok(())
    }

    async fn ensure_settings(&self) -> Result<()> {
        if self.api.store().read().await.settings().is_some() {
            return Ok(());
        }
        if let Fetched::Empty = fetch_settings(&self.api).await? {
            debug!("No settings on the server yet");
        }
        Ok(())
    }
}
