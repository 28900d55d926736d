//! Route token - shared cancellation signal for one route activation.

use crate::errors::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Cancellation signal handed to a route activation.
///
/// Clones share the same signal. Once cancelled a token stays cancelled.
#[derive(Debug, Clone)]
pub struct RouteToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl RouteToken {
    /// Create a new non-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // The sender lives as long as any clone of the token.
            std::future::pending::<()>().await;
        }
    }

    /// Drives `operation` until it finishes or the token is cancelled.
    ///
    /// On cancellation the operation future is dropped where it stands, so
    /// any store mutation it had not reached yet never happens.
    pub async fn run<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            () = self.cancelled() => Err(Error::Cancelled),
            result = operation => result,
        }
    }
}

impl Default for RouteToken {
    fn default() -> Self {
        Self::new()
    }
}
