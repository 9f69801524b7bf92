//! Background sync coordinator
//!
//! While a session exists the backend is probed on a fixed interval, when the
//! network comes back online, and on demand. A successful probe marks cached
//! aggregates stale; a failed one only flips the connection flag until the
//! next attempt. Nothing here retries on its own.

use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    time::{interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    services::{BackendClient, QueryInvalidator, QueryKey, Session},
    state::{SyncOutcome, SyncStatus},
    utils::Clock,
};

/// Counts one probe as in flight until dropped
///
/// The decrement runs even when the probe future is dropped mid-request.
struct PendingProbe<'a> {
    status: &'a watch::Sender<SyncStatus>,
}

impl<'a> PendingProbe<'a> {
    fn begin(status: &'a watch::Sender<SyncStatus>) -> Self {
        status.send_modify(|status| status.pending_operations += 1);
        Self { status }
    }
}

impl Drop for PendingProbe<'_> {
    fn drop(&mut self) {
        self.status.send_modify(|status| {
            status.pending_operations = status.pending_operations.saturating_sub(1);
        });
    }
}

/// Decides when to probe the backend and when cached views go stale
pub struct SyncCoordinator {
    backend: Arc<dyn BackendClient>,
    cache: Arc<dyn QueryInvalidator>,
    sessions: watch::Receiver<Option<Session>>,
    clock: Arc<dyn Clock>,
    status: watch::Sender<SyncStatus>,
}

impl SyncCoordinator {
    pub fn new(
        backend: Arc<dyn BackendClient>,
        cache: Arc<dyn QueryInvalidator>,
        sessions: watch::Receiver<Option<Session>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::new());
        Self {
            backend,
            cache,
            sessions,
            clock,
            status,
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Record a network online/offline event
    pub fn set_online(&self, online: bool) {
        self.status.send_if_modified(|status| {
            if status.is_online == online {
                return false;
            }
            status.set_online(online);
            true
        });
    }

    /// Force an immediate probe
    pub async fn trigger_manual_sync(&self) -> SyncOutcome {
        info!("Manual sync triggered");
        self.probe("manual").await
    }

    /// Check backend connectivity and refresh cached aggregates on success
    ///
    /// Probe failures are folded into the status and never returned as errors.
    pub async fn probe(&self, reason: &str) -> SyncOutcome {
        if !self.status.borrow().is_online {
            debug!(reason, "Skipping sync probe while offline");
            return SyncOutcome::failed("offline");
        }

        let session = self.sessions.borrow().clone();
        let Some(session) = session else {
            debug!(reason, "Skipping sync probe without a session");
            return SyncOutcome::failed("no active session");
        };

        let pending = PendingProbe::begin(&self.status);
        let result = self.backend.fetch_profile(&session).await;
        drop(pending);
        let now = self.clock.now();

        match result {
            Ok(_) => {
                self.status.send_modify(|status| status.record_success(now));
                if self.is_signed_in_as(&session) {
                    for key in QueryKey::ALL {
                        self.cache.invalidate(key);
                    }
                } else {
                    debug!(reason, "Session changed during probe, cached queries left alone");
                }
                info!(reason, "Backend sync succeeded");
                SyncOutcome::ok("Sync completed")
            }
            Err(e) => {
                warn!(reason, "Backend sync probe failed: {}", e);
                let message = e.to_string();
                self.status.send_modify(|status| status.record_failure(message));
                SyncOutcome::failed(format!("Sync failed: {}", e))
            }
        }
    }

    fn is_signed_in_as(&self, session: &Session) -> bool {
        self.sessions
            .borrow()
            .as_ref()
            .is_some_and(|current| current.user_id == session.user_id)
    }

    /// Probe unless `cancel` fires first; returns false when cancelled
    async fn probe_until(&self, reason: &str, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = self.probe(reason) => true,
        }
    }
}

/// Background task that polls the backend while a session exists
///
/// Polling starts when a session appears and stops as soon as it clears. The
/// task exits when `cancel` fires or its input channels close.
pub async fn background_sync_task(
    coordinator: Arc<SyncCoordinator>,
    mut sessions: watch::Receiver<Option<Session>>,
    mut network: watch::Receiver<bool>,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    info!("Starting background sync task");

    'sync: loop {
        if sessions.borrow_and_update().is_none() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = sessions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = network.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    coordinator.set_online(*network.borrow_and_update());
                }
            }
            continue;
        }

        info!("Session available, background sync active every {:?}", poll_interval);
        // The first tick completes immediately and doubles as the activation probe
        let mut ticker = interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break 'sync,
                changed = sessions.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if sessions.borrow_and_update().is_none() {
                        info!("Session cleared, background sync paused");
                        break;
                    }
                    if !coordinator.probe_until("session-changed", &cancel).await {
                        break 'sync;
                    }
                    ticker.reset();
                }
                changed = network.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let online = *network.borrow_and_update();
                    coordinator.set_online(online);
                    if online && !coordinator.probe_until("network-online", &cancel).await {
                        break 'sync;
                    }
                }
                _ = ticker.tick() => {
                    if !coordinator.probe_until("interval", &cancel).await {
                        break 'sync;
                    }
                }
            }
        }
    }

    info!("Background sync task stopped");
}
