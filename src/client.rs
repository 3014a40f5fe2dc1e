//! Chat client
//!
//! Wires the event bus, message repository, sync engine and connection
//! supervisor together for one configured repository. Each client is an
//! explicitly constructed value; there is no process-wide instance.

use crate::chat::{Message, MessageRepository, Snapshot};
use crate::config::{ChatConfig, RepositoryConfig};
use crate::events::{ChatEvent, EventBus, Subscription};
use crate::supervisor::{ConnectionState, ConnectionStatus, ConnectionSupervisor};
use crate::sync::{SyncEngine, SyncState};
use crate::transport::{GitHubTransport, IssueTransport};
use crate::{IssueChatError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{info, warn};

/// Combined view of the client for status displays
#[derive(Debug, Clone)]
pub struct ClientStatus {
    pub repository: String,
    pub connection: ConnectionStatus,
    pub sync: SyncState,
    pub messages: usize,
    pub auto_sync: bool,
}

pub struct ChatClient {
    config: RwLock<ChatConfig>,
    config_path: Option<PathBuf>,
    bus: EventBus,
    repository: Arc<MessageRepository>,
    engine: Arc<SyncEngine>,
    supervisor: Arc<ConnectionSupervisor>,
}

impl ChatClient {
    /// Build a client over the given transport.
    ///
    /// Fails when the configuration names no (or a malformed) repository.
    pub fn new(config: ChatConfig, transport: Arc<dyn IssueTransport>) -> Result<Self> {
        let repo_config = config.repository_config()?;
        transport.set_api_key(config.resolved_api_key());

        let bus = EventBus::new();
        let repository = Arc::new(MessageRepository::new());
        let engine = Arc::new(SyncEngine::new(
            transport,
            repo_config,
            Arc::clone(&repository),
            bus.clone(),
        ));
        let supervisor = Arc::new(ConnectionSupervisor::new(Arc::clone(&engine), false));

        Ok(Self {
            config: RwLock::new(config),
            config_path: None,
            bus,
            repository,
            engine,
            supervisor,
        })
    }

    /// Build a client talking to the GitHub REST API named in the config
    pub fn from_config(config: ChatConfig) -> Result<Self> {
        let transport = GitHubTransport::with_base_url(config.api_url.clone())?;
        Self::new(config, Arc::new(transport))
    }

    /// Persist configuration changes to `path`
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn config(&self) -> ChatConfig {
        match self.config.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn repository(&self) -> &Arc<MessageRepository> {
        &self.repository
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn supervisor(&self) -> &Arc<ConnectionSupervisor> {
        &self.supervisor
    }

    /// Current snapshot
    pub fn messages(&self) -> Snapshot {
        self.repository.snapshot()
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(handler)
    }

    pub fn status(&self) -> ClientStatus {
        ClientStatus {
            repository: self.engine.config().slug(),
            connection: self.supervisor.status(),
            sync: self.engine.state(),
            messages: self.repository.len(),
            auto_sync: self.engine.is_periodic_running(),
        }
    }

    /// Initial sync, then background polling if `auto_sync` is enabled.
    ///
    /// A successful sync marks the connection live. A failed one hands over
    /// to the supervisor's retry chain and is returned to the caller.
    pub async fn start(&self) -> Result<Snapshot> {
        let config = self.config();
        let result = self.engine.sync_once().await;

        if config.auto_sync {
            self.engine.start_periodic(config.sync_interval());
        }

        match result {
            Ok(snapshot) => {
                self.supervisor.set_external_connected(true);
                info!(
                    repository = %self.engine.config(),
                    messages = snapshot.len(),
                    auto_sync = config.auto_sync,
                    "Chat client started"
                );
                Ok(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "Initial sync failed, reconnecting");
                self.supervisor.reconnect().await;
                Err(e.into())
            }
        }
    }

    /// Sync immediately. Returns `SyncError::Busy` (wrapped) if one is running.
    pub async fn sync_now(&self) -> Result<Snapshot> {
        Ok(self.engine.sync_once().await?)
    }

    pub async fn send_message(&self, title: &str, body: &str, tags: &[String]) -> Result<Message> {
        Ok(self.engine.send_message(title, body, tags).await?)
    }

    /// Point the client at another repository, then reconnect and resync.
    ///
    /// A sync still in flight for the old repository is discarded, and the
    /// post-connect sync waits for it rather than being dropped.
    pub async fn set_repository(&self, slug: &str) -> Result<ConnectionState> {
        let repo_config = {
            let mut config = self.write_config();
            let repo_config = RepositoryConfig::parse(slug)?.with_labels(config.labels.clone());
            config.repository = Some(repo_config.slug());
            repo_config
        };
        self.persist()?;

        self.engine.set_config(repo_config);
        self.engine.reset_last_sync();
        self.repository.replace(Snapshot::empty());

        Ok(self.supervisor.force_reconnect().await)
    }

    /// Replace the API key (`None` falls back to `GITHUB_TOKEN`), then reconnect and resync
    pub async fn set_api_key(&self, api_key: Option<String>) -> Result<ConnectionState> {
        let resolved = {
            let mut config = self.write_config();
            config.api_key = api_key.filter(|key| !key.trim().is_empty());
            config.resolved_api_key()
        };
        self.persist()?;

        self.engine.transport().set_api_key(resolved);
        self.engine.discard_in_flight();
        Ok(self.supervisor.force_reconnect().await)
    }

    /// Change the poll interval and toggle background polling
    pub fn update_sync_settings(&self, interval_seconds: u64, auto_sync: bool) -> Result<()> {
        if interval_seconds == 0 {
            return Err(IssueChatError::Config(
                "Sync interval must be greater than 0".to_string(),
            ));
        }

        {
            let mut config = self.write_config();
            config.sync_interval_seconds = interval_seconds;
            config.auto_sync = auto_sync;
        }
        self.persist()?;

        if auto_sync {
            self.engine
                .start_periodic(Duration::from_secs(interval_seconds));
        } else {
            self.engine.stop_periodic();
        }
        Ok(())
    }

    /// Cancel polling, the heartbeat and any pending reconnect
    pub fn shutdown(&self) {
        self.engine.stop_periodic();
        self.supervisor.shutdown();
    }

    fn persist(&self) -> Result<()> {
        if let Some(ref path) = self.config_path {
            self.config().save(path)?;
        }
        Ok(())
    }

    fn write_config(&self) -> std::sync::RwLockWriteGuard<'_, ChatConfig> {
        match self.config.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}
