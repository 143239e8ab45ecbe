//! Online/offline tracking.
//!
//! The platform reports reachability; the monitor keeps the last known state
//! and broadcasts only real transitions, so duplicate "online" signals from
//! the platform trigger at most one reconciliation.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const EVENT_CAPACITY: usize = 16;

/// A change in connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityEvent {
    BecameOnline,
    BecameOffline,
}

/// Tracks whether the remote backend is believed reachable.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    online: AtomicBool,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    /// Create a monitor from the platform's current signal.
    ///
    /// Without a signal the monitor assumes it is online; remote failures are
    /// then handled by the reconciler.
    pub fn new(signal: Option<bool>) -> Self {
        let online = signal.unwrap_or_else(|| {
            tracing::debug!("no connectivity signal available, assuming online");
            true
        });
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { online: AtomicBool::new(online), events }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record a platform signal.
    ///
    /// Returns the transition it caused, or None when the state is unchanged.
    pub fn set_online(&self, online: bool) -> Option<ConnectivityEvent> {
        if self.online.swap(online, Ordering::SeqCst) == online {
            return None;
        }

        let event = if online { ConnectivityEvent::BecameOnline } else { ConnectivityEvent::BecameOffline };
        tracing::info!(?event, "connectivity changed");
        // no subscribers is fine
        let _ = self.events.send(event);
        Some(event)
    }

    /// Subscribe to connectivity transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }

    /// Run `callback` once for every transition to online.
    ///
    /// The task ends when the monitor is dropped.
    pub fn on_became_online<F, Fut>(&self, callback: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(ConnectivityEvent::BecameOnline) => callback().await,
                    Ok(ConnectivityEvent::BecameOffline) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "connectivity listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(None)
    }
}
