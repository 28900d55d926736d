//! In-memory envelope store - the client's single source of truth.
//!
//! The store holds envelopes by identity (a map for lookup plus an ordered id
//! list for iteration), the owned settings slot, forecasts keyed by envelope id
//! and the priority list. Every mutation goes through a method on
//! [`EnvelopeStore`] and is published to subscribers as a [`StoreEvent`].
//!
//! The store is shared as `Arc<RwLock<EnvelopeStore>>`. Callers take the write
//! lock only around a mutation, never across a network call.

use crate::entities::{
    Envelope, EnvelopeChange, EnvelopeId, PriorityEntry, SavingsForecast, Settings,
    SettingsChange, SettingsSlot, TransactionLog,
};
use crate::errors::{Error, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, trace, warn};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Shared handle to the store.
pub type SharedStore = Arc<RwLock<EnvelopeStore>>;

/// Whether the full envelope list has been fetched for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    /// A list refresh is in flight
    Loading,
    Loaded,
}

/// Change notification emitted after each store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    EnvelopesMerged { added: Vec<EnvelopeId> },
    EnvelopeAdded(EnvelopeId),
    EnvelopeUpdated(EnvelopeId),
    EnvelopeDeleted(EnvelopeId),
    TransactionLogAttached(EnvelopeId),
    ForecastsReplaced,
    PriorityListReplaced,
    SettingsChanged,
    LoadStateChanged(LoadState),
}

/// Envelope cache with identity-preserving merge semantics.
#[derive(Debug)]
pub struct EnvelopeStore {
    order: Vec<EnvelopeId>,
    by_id: HashMap<EnvelopeId, Envelope>,
    settings: SettingsSlot,
    forecasts: HashMap<EnvelopeId, SavingsForecast>,
    priority_list: Option<Vec<PriorityEntry>>,
    load_state: LoadState,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for EnvelopeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeStore {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            order: Vec::new(),
            by_id: HashMap::new(),
            settings: SettingsSlot::new(),
            forecasts: HashMap::new(),
            priority_list: None,
            load_state: LoadState::NotLoaded,
            events,
        }
    }

    /// Creates an empty store wrapped for sharing.
    #[must_use]
    pub fn shared() -> SharedStore {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Receives every change made after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        trace!("Store event: {:?}", event);
        // No subscribers is fine.
        self.events.send(event).ok();
    }

    /// Rejects a second overflow envelope under a different id.
    fn check_overflow_unique<'a>(
        &self,
        incoming: impl IntoIterator<Item = &'a Envelope>,
    ) -> Result<()> {
        let mut overflow_ids: HashSet<EnvelopeId> = self
            .by_id
            .values()
            .filter(|e| e.is_overflow())
            .map(Envelope::id)
            .collect();
        for envelope in incoming {
            if envelope.is_overflow() && !self.by_id.contains_key(&envelope.id()) {
                overflow_ids.insert(envelope.id());
            }
        }
        if overflow_ids.len() > 1 {
            let mut ids: Vec<_> = overflow_ids.into_iter().collect();
            ids.sort_unstable();
            return Err(Error::validation(
                "isOverflow",
                format!("only one overflow envelope may exist, found {ids:?}"),
            ));
        }
        Ok(())
    }

    /// Merges server envelopes into the store.
    ///
    /// Unknown ids are appended in arrival order. Known ids are left untouched
    /// so lazily fetched sub-resources survive a list refresh. Returns the ids
    /// that were added.
    pub fn merge_envelopes(&mut self, incoming: Vec<Envelope>) -> Result<Vec<EnvelopeId>> {
        self.check_overflow_unique(&incoming)?;

        let mut added = Vec::new();
        for envelope in incoming {
            let id = envelope.id();
            if self.by_id.contains_key(&id) {
                trace!("Envelope {} already cached, keeping existing instance", id);
                continue;
            }
            self.order.push(id);
            self.by_id.insert(id, envelope);
            added.push(id);
        }
        info!(
            "Merged envelopes: {} new, {} cached in total",
            added.len(),
            self.order.len()
        );
        self.emit(StoreEvent::EnvelopesMerged {
            added: added.clone(),
        });
        Ok(added)
    }

    /// Inserts one envelope. Returns `false` if the id was already cached.
    pub fn add_envelope(&mut self, envelope: Envelope) -> Result<bool> {
        let id = envelope.id();
        if self.by_id.contains_key(&id) {
            debug!("Envelope {} already cached, add ignored", id);
            return Ok(false);
        }
        self.check_overflow_unique([&envelope])?;
        self.order.push(id);
        self.by_id.insert(id, envelope);
        self.emit(StoreEvent::EnvelopeAdded(id));
        Ok(true)
    }

    /// Removes an envelope and its forecast.
    ///
    /// # Errors
    /// `Error::LocalPrecondition` for the overflow envelope, which is never removed.
    pub fn delete_envelope(&mut self, id: EnvelopeId) -> Result<Option<Envelope>> {
        match self.by_id.get(&id) {
            None => return Ok(None),
            Some(envelope) if envelope.is_overflow() => {
                return Err(Error::precondition(
                    "the overflow envelope cannot be deleted",
                ));
            }
            Some(_) => {}
        }
        let removed = self.by_id.remove(&id);
        self.order.retain(|cached| *cached != id);
        self.forecasts.remove(&id);
        if let Some(list) = self.priority_list.as_mut() {
            list.retain(|entry| entry.envelope_id != id);
        }
        self.emit(StoreEvent::EnvelopeDeleted(id));
        Ok(removed)
    }

    /// Applies all `changes` to a cached envelope, or none of them.
    ///
    /// Returns the updated envelope, or `None` when the id is not cached.
    pub fn update_envelope(
        &mut self,
        id: EnvelopeId,
        changes: impl IntoIterator<Item = EnvelopeChange>,
    ) -> Result<Option<Envelope>> {
        let Some(cached) = self.by_id.get_mut(&id) else {
            return Ok(None);
        };
        let mut candidate = cached.clone();
        for change in changes {
            candidate.update(change)?;
        }
        *cached = candidate.clone();
        self.emit(StoreEvent::EnvelopeUpdated(id));
        Ok(Some(candidate))
    }

    /// Attaches a transaction log to its envelope. Returns `false` if the envelope is not cached.
    pub fn attach_transaction_log(&mut self, log: TransactionLog) -> Result<bool> {
        let id = log.envelope_id();
        let Some(cached) = self.by_id.get_mut(&id) else {
            warn!("Transaction log for uncached envelope {} dropped", id);
            return Ok(false);
        };
        cached.attach_transaction_log(log)?;
        self.emit(StoreEvent::TransactionLogAttached(id));
        Ok(true)
    }

    #[must_use]
    pub fn find(&self, id: EnvelopeId) -> Option<&Envelope> {
        self.by_id.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: EnvelopeId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// The overflow envelope, if it has been fetched.
    #[must_use]
    pub fn overflow(&self) -> Option<&Envelope> {
        self.by_id.values().find(|e| e.is_overflow())
    }

    /// Envelopes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Replaces all forecasts.
    pub fn set_forecasts(&mut self, forecasts: Vec<SavingsForecast>) {
        self.forecasts = forecasts
            .into_iter()
            .map(|forecast| (forecast.envelope_id, forecast))
            .collect();
        self.emit(StoreEvent::ForecastsReplaced);
    }

    #[must_use]
    pub fn forecast(&self, id: EnvelopeId) -> Option<&SavingsForecast> {
        self.forecasts.get(&id)
    }

    /// Replaces the priority list and copies each rank onto its cached envelope.
    pub fn set_priority_list(&mut self, list: Vec<PriorityEntry>) -> Result<()> {
        crate::entities::priority::ensure_unique(&list)?;
        for entry in &list {
            if let Some(cached) = self.by_id.get_mut(&entry.envelope_id) {
                cached.update(EnvelopeChange::Priority(entry.rank))?;
            }
        }
        self.priority_list = Some(list);
        self.emit(StoreEvent::PriorityListReplaced);
        Ok(())
    }

    #[must_use]
    pub fn priority_list(&self) -> Option<&[PriorityEntry]> {
        self.priority_list.as_deref()
    }

    /// Makes `value` the live settings. Fails if settings are already live.
    pub fn initialize_settings(&mut self, value: &Value) -> Result<&Settings> {
        self.settings.initialize(value)?;
        self.emit(StoreEvent::SettingsChanged);
        self.settings
            .get()
            .ok_or_else(|| Error::precondition("settings have not been initialized"))
    }

    /// Overwrites the live settings with a fresh server copy.
    pub fn refresh_settings(&mut self, value: &Value) -> Result<&Settings> {
        self.settings.refresh(value)?;
        self.emit(StoreEvent::SettingsChanged);
        self.settings
            .get()
            .ok_or_else(|| Error::precondition("settings have not been initialized"))
    }

    /// Applies several settings changes, all or nothing.
    pub fn update_settings(
        &mut self,
        changes: impl IntoIterator<Item = SettingsChange>,
    ) -> Result<&Settings> {
        self.settings.update_all(changes)?;
        self.emit(StoreEvent::SettingsChanged);
        self.settings
            .get()
            .ok_or_else(|| Error::precondition("settings have not been initialized"))
    }

    #[must_use]
    pub const fn settings(&self) -> Option<&Settings> {
        self.settings.get()
    }

    #[must_use]
    pub const fn load_state(&self) -> LoadState {
        self.load_state
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.load_state == LoadState::Loaded
    }

    pub fn set_load_state(&mut self, state: LoadState) {
        if self.load_state != state {
            debug!("Load state {:?} -> {:?}", self.load_state, state);
            self.load_state = state;
            self.emit(StoreEvent::LoadStateChanged(state));
        }
    }
}
