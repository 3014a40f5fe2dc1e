//! Sync engine implementation
//!
//! Pulls the recent issue window from the transport, replaces the repository
//! snapshot and notifies subscribers. At most one sync runs at a time; extra
//! triggers are rejected with [`SyncError::Busy`] rather than queued.

use super::SyncError;
use crate::chat::{Message, MessageRepository, Snapshot};
use crate::config::RepositoryConfig;
use crate::events::{ChatEvent, EventBus};
use crate::metrics;
use crate::transport::{IssueTransport, ListOptions, NewItem};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default poll interval (30 seconds)
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Message title length bounds, in characters after trimming
pub const MIN_TITLE_CHARS: usize = 3;
pub const MAX_TITLE_CHARS: usize = 100;

/// Minimum message content length, in characters after trimming
pub const MIN_CONTENT_CHARS: usize = 10;

/// Observable sync state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncState {
    pub is_syncing: bool,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Clears the in-flight flag when dropped, covering every exit path
/// (success, error, panic, or the future being cancelled), and wakes
/// callers waiting in `sync_when_idle`.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    idle: &'a Notify,
}

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool, idle: &'a Notify) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, idle })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.idle.notify_waiters();
    }
}

/// Orchestrates refreshes of the message repository
pub struct SyncEngine {
    transport: Arc<dyn IssueTransport>,
    repository: Arc<MessageRepository>,
    bus: EventBus,
    config: RwLock<RepositoryConfig>,
    list_options: ListOptions,

    /// Single-flight guard
    syncing: AtomicBool,
    idle: Notify,

    /// Bumped on reconfiguration; a sync started under an older value is discarded
    generation: AtomicU64,

    /// Timestamp of the last successful sync
    last_sync: RwLock<Option<DateTime<Utc>>>,

    /// Periodic sync task
    periodic: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    pub fn new(
        transport: Arc<dyn IssueTransport>,
        config: RepositoryConfig,
        repository: Arc<MessageRepository>,
        bus: EventBus,
    ) -> Self {
        Self {
            transport,
            repository,
            bus,
            config: RwLock::new(config),
            list_options: ListOptions::default(),
            syncing: AtomicBool::new(false),
            idle: Notify::new(),
            generation: AtomicU64::new(0),
            last_sync: RwLock::new(None),
            periodic: Mutex::new(None),
        }
    }

    /// Override the listing options used by each sync
    pub fn with_list_options(mut self, options: ListOptions) -> Self {
        self.list_options = options;
        self
    }

    pub fn transport(&self) -> &Arc<dyn IssueTransport> {
        &self.transport
    }

    pub fn repository(&self) -> &Arc<MessageRepository> {
        &self.repository
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> RepositoryConfig {
        self.read_config().clone()
    }

    /// Point the engine at a different repository. Callers are expected to
    /// follow up with a fresh sync; one already in flight is discarded.
    pub fn set_config(&self, config: RepositoryConfig) {
        info!(repository = %config, "Repository reconfigured");
        let mut guard = self.write_config();
        *guard = config;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Discard the result of any sync currently in flight, e.g. after the
    /// credentials changed.
    pub fn discard_in_flight(&self) {
        let _guard = self.write_config();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync.read().map(|t| *t).unwrap_or(None)
    }

    pub fn state(&self) -> SyncState {
        SyncState {
            is_syncing: self.is_syncing(),
            last_sync: self.last_sync(),
        }
    }

    fn set_last_sync(&self, at: Option<DateTime<Utc>>) {
        match self.last_sync.write() {
            Ok(mut guard) => *guard = at,
            Err(poisoned) => *poisoned.into_inner() = at,
        }
    }

    /// Forget the previous sync so the next one flags nothing as new.
    /// Used when switching repositories.
    pub fn reset_last_sync(&self) {
        self.set_last_sync(None);
    }

    /// Run one sync cycle.
    ///
    /// Transport and auth failures publish an `Error` event and leave the
    /// previous snapshot in place. `Busy` publishes nothing.
    pub async fn sync_once(&self) -> Result<Snapshot, SyncError> {
        let Some(_in_flight) = InFlight::acquire(&self.syncing, &self.idle) else {
            debug!("Sync already in progress");
            metrics::record_sync_cycle("busy");
            return Err(SyncError::Busy);
        };

        let (config, generation) = {
            let guard = self.read_config();
            (guard.clone(), self.generation.load(Ordering::Acquire))
        };
        let previous_sync = self.last_sync();
        let start = Instant::now();

        debug!(repository = %config, "Sync started");

        let records = match self
            .transport
            .list_items(&config.owner, &config.name, &self.list_options)
            .await
        {
            Ok(records) => records,
            Err(_) if self.is_superseded(generation) => {
                return Err(self.superseded(&config));
            }
            Err(e) => {
                metrics::record_transport_error(e.kind(), "list");
                metrics::record_sync_duration("error", start.elapsed().as_secs_f64());
                metrics::record_sync_cycle("error");

                let error = SyncError::from(e);
                warn!(repository = %config, error = %error, "Sync failed");
                self.bus
                    .publish(ChatEvent::error("Sync failed", error.to_string()));
                return Err(error);
            }
        };

        let snapshot: Snapshot = records
            .into_iter()
            .map(|record| Message::from_record(record, previous_sync))
            .collect();
        let synced_at = Utc::now();

        // Commit under the config lock: a reconfiguration lands either before
        // the check or after the swap. Swap before publishing so subscribers
        // reading the repository see new data.
        {
            let _config = self.read_config();
            if self.is_superseded(generation) {
                return Err(self.superseded(&config));
            }
            self.repository.replace(snapshot.clone());
            self.set_last_sync(Some(synced_at));
        }

        metrics::record_sync_duration("success", start.elapsed().as_secs_f64());
        metrics::record_sync_cycle("success");
        metrics::set_snapshot_size(&config.slug(), snapshot.len());

        info!(
            repository = %config,
            messages = snapshot.len(),
            new = snapshot.new_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sync completed"
        );

        self.bus
            .publish(ChatEvent::sync_completed(snapshot.clone(), synced_at));

        Ok(snapshot)
    }

    /// Run a sync, first waiting out one that is already in flight.
    ///
    /// Used after reconfiguration, where dropping the trigger as `Busy` would
    /// leave the snapshot stale until the next poll.
    pub async fn sync_when_idle(&self) -> Result<Snapshot, SyncError> {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            match self.sync_once().await {
                Err(SyncError::Busy) => {
                    debug!("Waiting for the in-flight sync to finish");
                    idle.await;
                }
                result => return result,
            }
        }
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) != generation
    }

    fn superseded(&self, config: &RepositoryConfig) -> SyncError {
        metrics::record_sync_cycle("superseded");
        debug!(repository = %config, "Discarding sync result for a previous configuration");
        SyncError::Superseded
    }

    /// Start syncing on a fixed-delay timer. Replaces any running timer.
    ///
    /// A failing cycle never stops the timer; the next tick simply tries again.
    pub fn start_periodic(self: &Arc<Self>, interval: Duration) {
        let engine = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let Some(engine) = engine.upgrade() else {
                    break;
                };

                match engine.sync_once().await {
                    Ok(_) => {}
                    Err(SyncError::Busy) => debug!("Skipping periodic sync: already in progress"),
                    Err(SyncError::Superseded) => debug!("Periodic sync superseded by reconfiguration"),
                    Err(e) => debug!(error = %e, "Periodic sync failed, retrying next tick"),
                }
            }
        });

        info!(interval_secs = interval.as_secs_f64(), "Periodic sync started");

        if let Some(previous) = self.lock_periodic().replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the periodic timer. Returns whether one was running.
    pub fn stop_periodic(&self) -> bool {
        match self.lock_periodic().take() {
            Some(handle) => {
                handle.abort();
                info!("Periodic sync stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_periodic_running(&self) -> bool {
        self.lock_periodic()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Create a message on the remote tracker.
    ///
    /// Title and content are trimmed and must satisfy the length bounds
    /// above. The configured chat label is appended when missing. On success a
    /// `MessageAdded` event is published immediately, independent of the next
    /// poll. Does not interact with the sync guard.
    pub async fn send_message(
        &self,
        title: &str,
        content: &str,
        tags: &[String],
    ) -> Result<Message, SyncError> {
        let title = title.trim();
        let content = content.trim();
        if let Err(e) = validate_message(title, content) {
            metrics::record_message_sent("invalid");
            return Err(e);
        }

        let config = self.config();
        let mut labels: Vec<String> = tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if !labels.contains(&config.labels.chat) {
            labels.push(config.labels.chat.clone());
        }

        let item = NewItem {
            title: title.to_string(),
            body: content.to_string(),
            labels,
        };

        let record = match self
            .transport
            .create_item(&config.owner, &config.name, &item)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                metrics::record_transport_error(e.kind(), "create");
                metrics::record_message_sent("error");
                let error = SyncError::from(e);
                warn!(repository = %config, error = %error, "Failed to send message");
                return Err(error);
            }
        };

        let message = Message::from_record(record, self.last_sync());
        metrics::record_message_sent("success");
        info!(repository = %config, id = message.id, "Message sent");

        self.bus.publish(ChatEvent::message_added(message.clone()));
        Ok(message)
    }

    fn read_config(&self) -> RwLockReadGuard<'_, RepositoryConfig> {
        match self.config.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_config(&self) -> RwLockWriteGuard<'_, RepositoryConfig> {
        match self.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_periodic(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.periodic.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Check trimmed message input against the length bounds
fn validate_message(title: &str, content: &str) -> Result<(), SyncError> {
    let title_len = title.chars().count();
    if title_len == 0 {
        return Err(SyncError::Validation(
            "Message title must not be empty".to_string(),
        ));
    }
    if title_len < MIN_TITLE_CHARS {
        return Err(SyncError::Validation(format!(
            "Message title must be at least {} characters",
            MIN_TITLE_CHARS
        )));
    }
    if title_len > MAX_TITLE_CHARS {
        return Err(SyncError::Validation(format!(
            "Message title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }

    let content_len = content.chars().count();
    if content_len == 0 {
        return Err(SyncError::Validation(
            "Message content must not be empty".to_string(),
        ));
    }
    if content_len < MIN_CONTENT_CHARS {
        return Err(SyncError::Validation(format!(
            "Message content must be at least {} characters",
            MIN_CONTENT_CHARS
        )));
    }
    Ok(())
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_periodic().take() {
            handle.abort();
        }
    }
}
