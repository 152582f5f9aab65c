//! Vault session management.
//!
//! A session walks a fixed lifecycle: credentials are loaded, the provider
//! login is performed, the local vault server is started, and the vault is
//! unlocked for queries. Every operation checks its precondition before any
//! process or network call is made.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vaultserve_common::{Error, Result};
use vaultserve_items::QueryResult;

use crate::config::SessionConfig;
use crate::credentials::Credentials;
use crate::notify::{Notification, Notifier};
use crate::provider::{BwCli, LoginOutcome, ProviderCli};
use crate::state::SessionState;
use crate::supervisor::ProcessSupervisor;
use crate::transport::VaultTransport;

/// Mutable session data, guarded by the session's single lock.
struct SessionInner {
    state: SessionState,
    credentials: Option<Credentials>,
    supervisor: ProcessSupervisor,
}

/// A client session against the vault provider.
///
/// All state transitions and process start/stop run under one lock, so
/// concurrent callers never interleave two transitions. Queries and syncs
/// only hold the lock long enough to check the state.
pub struct Session {
    /// Identifier used in log output.
    id: Uuid,
    config: SessionConfig,
    cli: Arc<dyn ProviderCli>,
    transport: VaultTransport,
    inner: Mutex<SessionInner>,
}

impl Session {
    /// Create a session that drives `cli`.
    ///
    /// # Errors
    /// - `InvalidInput` if the server settings are invalid
    /// - `Network` if the HTTP client cannot be built
    pub fn new(
        config: SessionConfig,
        cli: Arc<dyn ProviderCli>,
        notifier: Notifier,
    ) -> Result<Self> {
        config.validate()?;

        let transport = VaultTransport::new(
            &config.host,
            config.port,
            config.request_timeout(),
            notifier,
        )?;

        let inner = SessionInner {
            state: SessionState::Unconfigured,
            credentials: None,
            supervisor: ProcessSupervisor::new(cli.clone()),
        };

        Ok(Self {
            id: Uuid::new_v4(),
            config,
            cli,
            transport,
            inner: Mutex::new(inner),
        })
    }

    /// Create a session using the provider binary named in `config`.
    pub fn with_provider_binary(config: SessionConfig, notifier: Notifier) -> Result<Self> {
        let cli = BwCli::new(config.provider_binary.clone(), config.request_timeout());
        Self::new(config, Arc::new(cli), notifier)
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Check whether queries are currently allowed.
    pub async fn is_unlocked(&self) -> bool {
        self.state().await == SessionState::Unlocked
    }

    /// OS process id of the local server, if one is running.
    pub async fn server_pid(&self) -> Option<u32> {
        self.inner.lock().await.supervisor.pid()
    }

    /// Load credentials from the paths in the session configuration.
    pub async fn configure_from_config(&self) -> Result<()> {
        self.configure(
            &self.config.client_id_path,
            &self.config.client_secret_path,
            &self.config.passphrase_path,
        )
        .await
    }

    /// Load credentials from three secret files.
    ///
    /// # Preconditions
    /// - State is `Unconfigured` or `Configured`
    ///
    /// # Postconditions
    /// - State is `Configured` and the credentials replace any earlier ones
    ///
    /// # Errors
    /// - `InvalidCredentials` naming the failing file; state is unchanged
    /// - `NotReady` once the session has authenticated
    pub async fn configure(
        &self,
        client_id_path: impl AsRef<Path>,
        client_secret_path: impl AsRef<Path>,
        passphrase_path: impl AsRef<Path>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state > SessionState::Configured {
            return Err(not_ready("configure", inner.state));
        }

        let credentials = Credentials::load(client_id_path, client_secret_path, passphrase_path)
            .map_err(|e| {
                warn!(session = %self.id, "Credential files rejected: {}", e);
                e
            })?;

        inner.credentials = Some(credentials);
        transition(&self.id, &mut inner, SessionState::Configured);
        Ok(())
    }

    /// Log in with the provider.
    ///
    /// An existing provider login counts as success.
    ///
    /// # Returns
    /// - `Ok(true)` once authenticated
    /// - `Ok(false)` if the provider rejected the credentials
    ///
    /// # Errors
    /// - `NotReady` before `configure`
    /// - `ProcessSpawnFailed` if the provider binary could not be run
    pub async fn authenticate(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let credentials = match (&inner.credentials, inner.state) {
            (Some(credentials), state) if state >= SessionState::Configured => credentials,
            _ => return Err(not_ready("authenticate", inner.state)),
        };

        let login = self.cli.login(credentials).await;

        match login {
            Ok(outcome) => {
                if outcome == LoginOutcome::AlreadyLoggedIn {
                    debug!(session = %self.id, "Reusing existing provider login");
                }
                if inner.state < SessionState::Authenticated {
                    transition(&self.id, &mut inner, SessionState::Authenticated);
                }
                Ok(true)
            }
            Err(Error::AuthenticationFailed(reason)) => {
                warn!(session = %self.id, "Authentication failed: {}", reason);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Start the local vault server, restarting it if already running.
    ///
    /// # Postconditions
    /// - State is `ServerRunning`; the vault starts locked
    ///
    /// # Errors
    /// - `NotReady` before authentication
    /// - `ProcessSpawnFailed` if the server could not be started; state
    ///   falls back to `Authenticated`
    pub async fn start_server(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state < SessionState::Authenticated {
            return Err(not_ready("start the server", inner.state));
        }

        match inner.supervisor.start(self.config.port).await {
            Ok(()) => {
                transition(&self.id, &mut inner, SessionState::ServerRunning);
                Ok(())
            }
            Err(e) => {
                transition(&self.id, &mut inner, SessionState::Authenticated);
                Err(e)
            }
        }
    }

    /// Stop the local vault server. Safe to call at any time.
    ///
    /// # Postconditions
    /// - No server process is running
    /// - State is `Authenticated` if a server had been started
    pub async fn stop_server(&self) {
        let mut inner = self.inner.lock().await;
        inner.supervisor.stop(&self.transport).await;

        if inner.state.has_server() {
            transition(&self.id, &mut inner, SessionState::Authenticated);
        }
    }

    /// Unlock the vault with the configured passphrase.
    ///
    /// # Returns
    /// - `Ok(true)` once unlocked; an `Unlocked` notification is sent
    /// - `Ok(false)` if the server rejected the passphrase or was unreachable
    ///
    /// # Errors
    /// - `NotReady` unless the server is running
    pub async fn unlock(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let passphrase = match (&inner.credentials, inner.state.has_server()) {
            (Some(credentials), true) => credentials.passphrase().clone(),
            _ => return Err(not_ready("unlock", inner.state)),
        };

        match self.transport.unlock(&passphrase).await {
            Ok(()) => {
                transition(&self.id, &mut inner, SessionState::Unlocked);
                Ok(true)
            }
            Err(e) => {
                warn!(session = %self.id, "Unlock failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Lock the vault.
    ///
    /// # Returns
    /// - `Ok(true)` once locked; a `Locked` notification is sent
    /// - `Ok(false)` if the server rejected the request or was unreachable
    ///
    /// # Errors
    /// - `NotReady` unless the vault is unlocked
    pub async fn lock(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if inner.state != SessionState::Unlocked {
            return Err(not_ready("lock", inner.state));
        }

        match self.transport.lock().await {
            Ok(()) => {
                transition(&self.id, &mut inner, SessionState::ServerRunning);
                Ok(true)
            }
            Err(e) => {
                warn!(session = %self.id, "Lock failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Ask the server to resynchronise the vault with the provider.
    ///
    /// # Errors
    /// - `NotReady` before authentication
    pub async fn sync(&self) -> Result<bool> {
        let state = self.state().await;
        if state < SessionState::Authenticated {
            return Err(not_ready("sync", state));
        }

        match self.transport.sync().await {
            Ok(synced) => {
                info!(session = %self.id, synced, "Vault sync requested");
                Ok(synced)
            }
            Err(e) => {
                warn!(session = %self.id, "Sync failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Search the unlocked vault.
    ///
    /// Never fails: if the vault is not unlocked a `NotReady` notification
    /// is sent and no request is made; transport and decode failures are
    /// logged. Both cases return an empty, unsuccessful result.
    pub async fn query(&self, search: &str) -> QueryResult {
        if !self.is_unlocked().await {
            debug!(session = %self.id, "Query refused, vault not unlocked");
            self.transport.notify(Notification::NotReady);
            return QueryResult::failed();
        }

        match self.transport.list_items(search).await {
            Ok(result) => {
                debug!(session = %self.id, count = result.len(), "Query complete");
                result
            }
            Err(e) => {
                warn!(session = %self.id, "Query failed: {}", e);
                QueryResult::failed()
            }
        }
    }
}

fn not_ready(operation: &str, state: SessionState) -> Error {
    Error::NotReady(format!("cannot {} while {}", operation, state))
}

fn transition(id: &Uuid, inner: &mut SessionInner, next: SessionState) {
    if inner.state != next {
        info!(session = %id, from = %inner.state, to = %next, "Session state changed");
        inner.state = next;
    }
}
