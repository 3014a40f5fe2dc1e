//! Connection supervisor implementation
//!
//! Tracks whether the configured repository is reachable and drives
//! reconnection with exponential backoff. Runs independently of the polling
//! cadence: a failed reconnect schedules the next attempt itself, forming a
//! retry chain that only ends on success, `force_reconnect`, or `shutdown`.

use super::backoff::BackoffPolicy;
use super::heartbeat::Heartbeat;
use crate::metrics;
use crate::sync::SyncEngine;
use crate::transport::AccessReport;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Reachability of the remote repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }

    /// Numeric code exported as a metric
    pub fn code(&self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Error => 3,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub last_error: Option<String>,
    pub healthy: bool,
    pub retry_pending: bool,
}

#[derive(Debug, Default)]
struct Inner {
    state: ConnectionState,
    reconnect_attempts: u32,
    last_error: Option<String>,
}

/// A scheduled reconnect, tagged so the task can tell whether it is still current
struct PendingRetry {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct ConnectionSupervisor {
    engine: Arc<SyncEngine>,
    backoff: BackoffPolicy,
    inner: Mutex<Inner>,
    retry: Mutex<Option<PendingRetry>>,
    generation: AtomicU64,
    /// Bumped by every reconnect, applied external signal and shutdown.
    /// Only the holder of the current epoch may commit a validation result.
    epoch: AtomicU64,
    heartbeat: Heartbeat,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionSupervisor {
    /// Create a supervisor for the engine's repository.
    ///
    /// `already_connected` reflects an external signal; when set the
    /// supervisor starts `Connected` with the heartbeat running, which
    /// requires a Tokio runtime.
    pub fn new(engine: Arc<SyncEngine>, already_connected: bool) -> Self {
        Self::with_parts(engine, already_connected, BackoffPolicy::default(), Heartbeat::default())
    }

    pub fn with_parts(
        engine: Arc<SyncEngine>,
        already_connected: bool,
        backoff: BackoffPolicy,
        heartbeat: Heartbeat,
    ) -> Self {
        let state = if already_connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        let (state_tx, _) = watch::channel(state);

        if already_connected {
            heartbeat.start();
        }
        metrics::set_connection_state(&engine.config().slug(), state.code());

        Self {
            engine,
            backoff,
            inner: Mutex::new(Inner {
                state,
                ..Default::default()
            }),
            retry: Mutex::new(None),
            generation: AtomicU64::new(0),
            epoch: AtomicU64::new(0),
            heartbeat,
            state_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.lock_inner().state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.lock_inner().reconnect_attempts
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock_inner().last_error.clone()
    }

    /// Whether the last heartbeat is inside the freshness window
    pub fn is_healthy(&self) -> bool {
        self.heartbeat.is_healthy()
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    pub fn has_pending_retry(&self) -> bool {
        self.lock_retry().is_some()
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    pub fn status(&self) -> ConnectionStatus {
        let inner = self.lock_inner();
        ConnectionStatus {
            state: inner.state,
            reconnect_attempts: inner.reconnect_attempts,
            last_error: inner.last_error.clone(),
            healthy: self.heartbeat.is_healthy(),
            retry_pending: self.has_pending_retry(),
        }
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Validate access and connect, scheduling a backoff retry on failure.
    ///
    /// On success the attempt counter resets, the heartbeat starts and one
    /// sync is triggered. A result that arrives after a newer reconnect,
    /// external signal or shutdown is discarded.
    pub async fn reconnect(self: &Arc<Self>) -> ConnectionState {
        self.cancel_retry();

        // Attempts before this one; drives the delay if it fails.
        let (epoch, previous_attempts) = {
            let mut inner = self.lock_inner();
            let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
            inner.state = ConnectionState::Connecting;
            let previous = inner.reconnect_attempts;
            inner.reconnect_attempts = previous.saturating_add(1);
            self.announce(ConnectionState::Connecting);
            (epoch, previous)
        };

        let config = self.engine.config();
        debug!(
            repository = %config,
            attempt = previous_attempts + 1,
            "Validating repository access"
        );

        let report = self
            .engine
            .transport()
            .validate_access(&config.owner, &config.name)
            .await;

        if report.is_usable() {
            {
                let mut inner = self.lock_inner();
                if self.is_stale(epoch) {
                    debug!(repository = %config, "Discarding superseded reconnect result");
                    return inner.state;
                }
                inner.state = ConnectionState::Connected;
                inner.reconnect_attempts = 0;
                inner.last_error = None;
                self.cancel_retry();
                self.announce(ConnectionState::Connected);
                self.heartbeat.start();
            }
            metrics::record_reconnect("success");
            info!(repository = %config, "Connected");

            match self.engine.sync_when_idle().await {
                Ok(_) => {}
                Err(e) if e.is_soft() => debug!(error = %e, "Post-connect sync skipped"),
                Err(e) => debug!(error = %e, "Post-connect sync failed"),
            }
            return ConnectionState::Connected;
        }

        let reason = failure_reason(&report);
        let delay = self.backoff.delay_for_attempt(previous_attempts);
        {
            let mut inner = self.lock_inner();
            if self.is_stale(epoch) {
                debug!(repository = %config, reason = %reason, "Discarding superseded reconnect failure");
                return inner.state;
            }
            inner.state = ConnectionState::Error;
            inner.last_error = Some(reason.clone());
            self.announce(ConnectionState::Error);
            self.heartbeat.stop();
            self.schedule_retry(delay);
        }
        metrics::record_reconnect("failure");

        warn!(
            repository = %config,
            attempt = previous_attempts + 1,
            retry_in_ms = delay.as_millis() as u64,
            reason = %reason,
            "Connection failed"
        );

        ConnectionState::Error
    }

    /// User-initiated recovery: drop the pending retry, reset the attempt
    /// counter, and reconnect immediately. Any validation still in flight
    /// loses to this one.
    pub async fn force_reconnect(self: &Arc<Self>) -> ConnectionState {
        self.cancel_retry();
        self.lock_inner().reconnect_attempts = 0;
        info!("Forcing reconnect");
        self.reconnect().await
    }

    /// Apply an external connectivity signal without validating.
    ///
    /// `true` moves to `Connected` and starts the heartbeat, unless a
    /// validation is in flight, in which case the signal is ignored. `false`
    /// moves to `Disconnected`, stops the heartbeat and discards any
    /// validation in flight.
    pub fn set_external_connected(&self, connected: bool) {
        let mut inner = self.lock_inner();
        if connected {
            if inner.state == ConnectionState::Connecting {
                debug!("Ignoring external connected signal while validating");
                return;
            }
            self.epoch.fetch_add(1, Ordering::AcqRel);
            inner.state = ConnectionState::Connected;
            inner.reconnect_attempts = 0;
            inner.last_error = None;
            self.cancel_retry();
            self.announce(ConnectionState::Connected);
            self.heartbeat.start();
        } else {
            self.epoch.fetch_add(1, Ordering::AcqRel);
            inner.state = ConnectionState::Disconnected;
            self.announce(ConnectionState::Disconnected);
            self.heartbeat.stop();
        }
    }

    /// Cancel the pending retry and the heartbeat
    pub fn shutdown(&self) {
        {
            let _inner = self.lock_inner();
            self.epoch.fetch_add(1, Ordering::AcqRel);
            self.cancel_retry();
            self.heartbeat.stop();
        }
        debug!("Connection supervisor shut down");
    }

    /// Cancel a scheduled reconnect, if any. Returns whether one was pending.
    pub fn cancel_retry(&self) -> bool {
        match self.lock_retry().take() {
            Some(pending) => {
                pending.handle.abort();
                debug!(generation = pending.generation, "Cancelled pending reconnect");
                true
            }
            None => false,
        }
    }

    fn schedule_retry(self: &Arc<Self>, delay: Duration) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let supervisor = Arc::downgrade(self);

        // Hold the slot while spawning so the task cannot claim it early.
        let mut slot = self.lock_retry();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(supervisor) = supervisor.upgrade() else {
                return;
            };
            if !supervisor.claim_retry(generation) {
                return;
            }
            supervisor.reconnect().await;
        });

        if let Some(previous) = slot.replace(PendingRetry { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Remove our own entry from the slot so `reconnect` does not abort the
    /// task that is running it.
    fn claim_retry(&self, generation: u64) -> bool {
        let mut slot = self.lock_retry();
        match slot.as_ref() {
            Some(pending) if pending.generation == generation => {
                slot.take();
                true
            }
            _ => false,
        }
    }

    fn is_stale(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::Acquire) != epoch
    }

    fn announce(&self, state: ConnectionState) {
        metrics::set_connection_state(&self.engine.config().slug(), state.code());
        self.state_tx.send_replace(state);
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_retry(&self) -> MutexGuard<'_, Option<PendingRetry>> {
        match self.retry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        if let Some(pending) = self.lock_retry().take() {
            pending.handle.abort();
        }
    }
}

fn failure_reason(report: &AccessReport) -> String {
    if let Some(ref error) = report.error {
        return error.clone();
    }
    if !report.accessible {
        "Repository is not accessible".to_string()
    } else if !report.can_read {
        "No read access to issues".to_string()
    } else {
        "No write access to issues".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::MessageRepository;
    use crate::config::RepositoryConfig;
    use crate::events::EventBus;
    use crate::transport::mock::MockTransport;

    fn failing() -> AccessReport {
        AccessReport::unreachable("GitHub API error: HTTP 503: unavailable")
    }

    fn supervisor_with(mock: &Arc<MockTransport>, connected: bool) -> Arc<ConnectionSupervisor> {
        let engine = Arc::new(SyncEngine::new(
            Arc::clone(mock) as Arc<dyn crate::transport::IssueTransport>,
            RepositoryConfig::new("octo", "chat"),
            Arc::new(MessageRepository::new()),
            EventBus::new(),
        ));
        Arc::new(ConnectionSupervisor::new(engine, connected))
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state() {
        let mock = Arc::new(MockTransport::default());

        let offline = supervisor_with(&mock, false);
        assert_eq!(offline.state(), ConnectionState::Disconnected);
        assert_eq!(offline.reconnect_attempts(), 0);
        assert!(!offline.heartbeat().is_running());

        let online = supervisor_with(&mock, true);
        assert_eq!(online.state(), ConnectionState::Connected);
        assert!(online.heartbeat().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_reconnect_triggers_sync() {
        let mock = Arc::new(MockTransport::default());
        let supervisor = supervisor_with(&mock, false);

        let state = supervisor.reconnect().await;

        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(supervisor.reconnect_attempts(), 0);
        assert_eq!(mock.validate_calls(), 1);
        assert_eq!(mock.list_calls(), 1);
        assert!(!supervisor.has_pending_retry());

        tokio::task::yield_now().await;
        assert!(supervisor.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sequence_until_success() {
        let mock = Arc::new(MockTransport::default());
        for _ in 0..7 {
            mock.queue_access(failing());
        }
        let supervisor = supervisor_with(&mock, false);

        assert_eq!(supervisor.reconnect().await, ConnectionState::Error);
        assert_eq!(supervisor.reconnect_attempts(), 1);
        assert!(supervisor.has_pending_retry());
        advance(1).await;

        let expected = [1000, 2000, 4000, 8000, 16000, 30000, 30000];
        for (i, delay) in expected.iter().enumerate() {
            advance(delay - 2).await;
            assert_eq!(mock.validate_calls(), i + 1, "fired early before retry {}", i);

            advance(2).await;
            assert_eq!(mock.validate_calls(), i + 2, "retry {} did not fire", i);

            if i + 1 < expected.len() {
                assert_eq!(supervisor.state(), ConnectionState::Error);
                assert_eq!(supervisor.reconnect_attempts() as usize, i + 2);
            }
        }

        assert_eq!(supervisor.state(), ConnectionState::Connected);
        assert_eq!(supervisor.reconnect_attempts(), 0);
        assert!(!supervisor.has_pending_retry());
        assert_eq!(mock.list_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_reconnect_cancels_pending_retry() {
        let mock = Arc::new(MockTransport::default());
        mock.queue_access(failing());
        mock.queue_access(failing());
        mock.queue_access(failing());
        let supervisor = supervisor_with(&mock, false);

        // Two failures: the pending retry is 2s out.
        supervisor.reconnect().await;
        advance(1001).await;
        assert_eq!(mock.validate_calls(), 2);
        assert_eq!(supervisor.reconnect_attempts(), 2);

        // Forced attempt fails again but restarts the backoff at 1s.
        advance(500).await;
        assert_eq!(supervisor.force_reconnect().await, ConnectionState::Error);
        assert_eq!(mock.validate_calls(), 3);
        assert_eq!(supervisor.reconnect_attempts(), 1);

        // The old retry (due 1.5s from now) was cancelled; the new one fires at 1s.
        advance(1001).await;
        assert_eq!(mock.validate_calls(), 4);
        assert_eq!(supervisor.state(), ConnectionState::Connected);

        advance(60_000).await;
        assert_eq!(mock.validate_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_reconnect_resets_attempts_before_success() {
        let mock = Arc::new(MockTransport::default());
        mock.queue_access(failing());
        let supervisor = supervisor_with(&mock, false);

        supervisor.reconnect().await;
        assert_eq!(supervisor.reconnect_attempts(), 1);

        assert_eq!(supervisor.force_reconnect().await, ConnectionState::Connected);
        assert_eq!(supervisor.reconnect_attempts(), 0);
        assert!(!supervisor.has_pending_retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_retry_cannot_undo_forced_reconnect() {
        let mock = Arc::new(MockTransport::default());
        mock.queue_access(failing());
        mock.queue_access_after(failing(), Duration::from_secs(5));
        let supervisor = supervisor_with(&mock, false);

        assert_eq!(supervisor.reconnect().await, ConnectionState::Error);

        // The retry fires at 1s and blocks in a slow validation until 6s.
        advance(1500).await;
        assert_eq!(mock.validate_calls(), 2);
        assert_eq!(supervisor.state(), ConnectionState::Connecting);

        assert_eq!(supervisor.force_reconnect().await, ConnectionState::Connected);
        assert_eq!(mock.validate_calls(), 3);

        // The slow validation fails after the forced one succeeded.
        advance(6000).await;
        assert_eq!(supervisor.state(), ConnectionState::Connected);
        assert_eq!(supervisor.reconnect_attempts(), 0);
        assert!(supervisor.last_error().is_none());
        assert!(!supervisor.has_pending_retry());
        assert!(supervisor.heartbeat().is_running());

        advance(60_000).await;
        assert_eq!(mock.validate_calls(), 3);
        supervisor.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_validation_in_flight() {
        let mock = Arc::new(MockTransport::default());
        mock.queue_access_after(failing(), Duration::from_secs(5));
        let supervisor = supervisor_with(&mock, false);

        let pending = {
            let supervisor = Arc::clone(&supervisor);
            tokio::spawn(async move { supervisor.reconnect().await })
        };
        advance(1000).await;
        supervisor.shutdown();

        assert_eq!(pending.await.unwrap(), ConnectionState::Connecting);
        assert!(!supervisor.has_pending_retry());
        advance(120_000).await;
        assert_eq!(mock.validate_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_connected_ignored_while_validating() {
        let mock = Arc::new(MockTransport::default());
        mock.queue_access_after(
            AccessReport {
                accessible: true,
                can_read: true,
                can_write: true,
                error: None,
            },
            Duration::from_secs(5),
        );
        let supervisor = supervisor_with(&mock, false);

        let pending = {
            let supervisor = Arc::clone(&supervisor);
            tokio::spawn(async move { supervisor.reconnect().await })
        };
        advance(1000).await;
        assert_eq!(supervisor.state(), ConnectionState::Connecting);

        supervisor.set_external_connected(true);
        assert_eq!(supervisor.state(), ConnectionState::Connecting);
        assert!(!supervisor.heartbeat().is_running());
        assert!(!supervisor.is_healthy());

        assert_eq!(pending.await.unwrap(), ConnectionState::Connected);
        assert_eq!(supervisor.state(), ConnectionState::Connected);
        assert!(supervisor.heartbeat().is_running());
        assert_eq!(mock.list_calls(), 1);
        supervisor.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_disconnect_discards_validation_in_flight() {
        let mock = Arc::new(MockTransport::default());
        mock.queue_access_after(failing(), Duration::from_secs(5));
        let supervisor = supervisor_with(&mock, false);

        let pending = {
            let supervisor = Arc::clone(&supervisor);
            tokio::spawn(async move { supervisor.reconnect().await })
        };
        advance(1000).await;
        supervisor.set_external_connected(false);

        assert_eq!(pending.await.unwrap(), ConnectionState::Disconnected);
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
        assert!(!supervisor.has_pending_retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_only_access_is_a_failure() {
        let mock = Arc::new(MockTransport::default());
        mock.queue_access(AccessReport {
            accessible: true,
            can_read: true,
            can_write: false,
            error: None,
        });
        let supervisor = supervisor_with(&mock, false);

        assert_eq!(supervisor.reconnect().await, ConnectionState::Error);
        assert_eq!(
            supervisor.last_error().as_deref(),
            Some("No write access to issues")
        );
        assert_eq!(mock.list_calls(), 0);
        supervisor.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_retry_chain() {
        let mock = Arc::new(MockTransport::default());
        mock.queue_access(failing());
        let supervisor = supervisor_with(&mock, false);

        supervisor.reconnect().await;
        supervisor.shutdown();
        assert!(!supervisor.has_pending_retry());

        advance(120_000).await;
        assert_eq!(mock.validate_calls(), 1);
        assert_eq!(supervisor.state(), ConnectionState::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_signal_short_circuits() {
        let mock = Arc::new(MockTransport::default());
        mock.queue_access(failing());
        let supervisor = supervisor_with(&mock, false);
        let mut states = supervisor.subscribe_state();

        supervisor.reconnect().await;
        assert!(supervisor.has_pending_retry());

        supervisor.set_external_connected(true);
        assert_eq!(supervisor.state(), ConnectionState::Connected);
        assert_eq!(supervisor.reconnect_attempts(), 0);
        assert!(!supervisor.has_pending_retry());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);
        tokio::task::yield_now().await;
        assert!(supervisor.is_healthy());

        supervisor.set_external_connected(false);
        assert_eq!(supervisor.state(), ConnectionState::Disconnected);
        assert!(!supervisor.is_healthy());
        assert!(!supervisor.heartbeat().is_running());

        advance(120_000).await;
        assert_eq!(mock.validate_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_snapshot() {
        let mock = Arc::new(MockTransport::default());
        mock.queue_access(failing());
        let supervisor = supervisor_with(&mock, false);

        supervisor.reconnect().await;
        let status = supervisor.status();
        assert_eq!(status.state, ConnectionState::Error);
        assert_eq!(status.reconnect_attempts, 1);
        assert!(status.retry_pending);
        assert!(!status.healthy);
        assert!(status.last_error.unwrap().contains("503"));
        supervisor.shutdown();
    }
}
