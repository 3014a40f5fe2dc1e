//! Connection heartbeat
//!
//! A fixed-interval liveness timestamp, independent of the polling cadence.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default beat interval (30 seconds)
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// A beat older than this marks the connection unhealthy
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(60);

pub struct Heartbeat {
    interval: Duration,
    freshness: Duration,
    last_beat: Arc<Mutex<Option<Instant>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Heartbeat {
    pub fn new(interval: Duration, freshness: Duration) -> Self {
        Self {
            interval,
            freshness,
            last_beat: Arc::new(Mutex::new(None)),
            task: Mutex::new(None),
        }
    }

    /// Start (or restart) beating. The first beat is recorded immediately.
    pub fn start(&self) {
        let last_beat = Arc::clone(&self.last_beat);
        let interval = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Ok(mut last) = last_beat.lock() {
                    *last = Some(Instant::now());
                }
                tracing::trace!("Heartbeat");
            }
        });

        if let Some(previous) = self.lock_task().replace(handle) {
            previous.abort();
        }
    }

    /// Stop beating and forget the last beat. Idempotent.
    pub fn stop(&self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
        }
        if let Ok(mut last) = self.last_beat.lock() {
            *last = None;
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock_task()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn last_beat(&self) -> Option<Instant> {
        self.last_beat.lock().map(|last| *last).unwrap_or(None)
    }

    /// Whether the last beat is inside the freshness window
    pub fn is_healthy(&self) -> bool {
        self.last_beat()
            .is_some_and(|beat| beat.elapsed() < self.freshness)
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.task.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_FRESHNESS_WINDOW)
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
        }
    }
}
