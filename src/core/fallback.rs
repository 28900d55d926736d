//! Fallback navigation - the safe exit after a fatal session failure.
//!
//! The sequence marks the store as not loaded, tries a soft navigation to the
//! application root and, if that fails, a hard reload of the root. An atomic
//! flag keeps at most one sequence running; triggers that arrive while one is
//! in flight are coalesced into it.

use crate::cache::{LoadState, SharedStore};
use crate::errors::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};

/// Application root every fallback returns to.
pub const ROOT_PATH: &str = "/";

/// Navigation primitives provided by the host shell.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Soft navigation that replaces the current history entry.
    async fn replace(&self, path: &str) -> Result<()>;

    /// Full reload of `path`, discarding in-memory view state.
    async fn hard_reload(&self, path: &str) -> Result<()>;
}

/// How a fallback trigger was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackOutcome {
    SoftNavigated,
    HardReloaded,
    /// Both navigation primitives failed
    Stranded,
    /// Another sequence was already running
    Coalesced,
}

/// Serializes fallback sequences for one session.
pub struct FallbackNavigator {
    navigator: Arc<dyn Navigator>,
    store: SharedStore,
    in_progress: AtomicBool,
}

/// Clears the in-progress flag even if the sequence future is dropped.
struct InProgress<'a>(&'a AtomicBool);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl FallbackNavigator {
    #[must_use]
    pub fn new(navigator: Arc<dyn Navigator>, store: SharedStore) -> Self {
        Self {
            navigator,
            store,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Whether a sequence is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Runs the fallback sequence unless one is already in flight.
    pub async fn trigger(&self, context: &str) -> FallbackOutcome {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Fallback already running, coalescing failure during {}", context);
            return FallbackOutcome::Coalesced;
        }
        let _running = InProgress(&self.in_progress);

        error!("Critical failure during {}, returning to {}", context, ROOT_PATH);
        self.store.write().await.set_load_state(LoadState::NotLoaded);

        match self.navigator.replace(ROOT_PATH).await {
            Ok(()) => {
                info!("Soft navigation to {} succeeded", ROOT_PATH);
                FallbackOutcome::SoftNavigated
            }
            Err(e) => {
                error!("Soft navigation failed, falling back to hard reload: {}", e);
                match self.navigator.hard_reload(ROOT_PATH).await {
                    Ok(()) => FallbackOutcome::HardReloaded,
                    Err(e) => {
                        error!("Hard reload of {} failed: {}", ROOT_PATH, e);
                        FallbackOutcome::Stranded
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for FallbackNavigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackNavigator")
            .field("in_progress", &self.is_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EnvelopeStore;
    use crate::test_utils::{RecordingNavigator, init_test_tracing};
    use std::time::Duration;

    #[tokio::test]
    async fn test_soft_navigation_resets_load_flag() {
        init_test_tracing();
        let store = EnvelopeStore::shared();
        store.write().await.set_load_state(LoadState::Loaded);
        let navigator = Arc::new(RecordingNavigator::new());
        let fallback = FallbackNavigator::new(Arc::clone(&navigator) as Arc<dyn Navigator>, Arc::clone(&store));

        let outcome = fallback.trigger("test").await;

        assert_eq!(outcome, FallbackOutcome::SoftNavigated);
        assert_eq!(navigator.soft_calls(), 1);
        assert_eq!(navigator.hard_calls(), 0);
        assert_eq!(store.read().await.load_state(), LoadState::NotLoaded);
        assert!(!fallback.is_running());
    }

    #[tokio::test]
    async fn test_hard_reload_when_soft_navigation_fails() {
        let store = EnvelopeStore::shared();
        let navigator = Arc::new(RecordingNavigator::new().failing_soft());
        let fallback = FallbackNavigator::new(Arc::clone(&navigator) as Arc<dyn Navigator>, store);

        assert_eq!(fallback.trigger("test").await, FallbackOutcome::HardReloaded);
        assert_eq!(navigator.soft_calls(), 1);
        assert_eq!(navigator.hard_calls(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_triggers_coalesce() {
        let store = EnvelopeStore::shared();
        let navigator = Arc::new(RecordingNavigator::new().with_delay(Duration::from_millis(20)));
        let fallback = FallbackNavigator::new(Arc::clone(&navigator) as Arc<dyn Navigator>, store);

        let (a, b, c) = tokio::join!(
            fallback.trigger("a"),
            fallback.trigger("b"),
            fallback.trigger("c")
        );
        let outcomes = [a, b, c];
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == FallbackOutcome::SoftNavigated)
                .count(),
            1
        );
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == FallbackOutcome::Coalesced)
                .count(),
            2
        );
        assert_eq!(navigator.soft_calls(), 1);

        // Once finished, a new failure runs a new sequence.
        assert_eq!(fallback.trigger("d").await, FallbackOutcome::SoftNavigated);
        assert_eq!(navigator.soft_calls(), 2);
    }
}
