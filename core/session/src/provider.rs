//! Vault provider CLI.
//!
//! The provider binary is used for two things: logging in with API-key
//! credentials, and spawning the local vault server. Both go through the
//! [`ProviderCli`] trait so the session can be driven without a real binary.
//!
//! Commands are executed directly with `tokio::process::Command`, never
//! through a shell. Credentials travel in the environment, not in argv.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use vaultserve_common::{Error, Result};

use crate::credentials::Credentials;

/// Provider stderr text meaning a login session already exists.
pub const ALREADY_LOGGED_IN_PHRASE: &str = "You are already logged in as";

/// Environment variable carrying the API client id.
const CLIENT_ID_ENV: &str = "BW_CLIENTID";
/// Environment variable carrying the API client secret.
const CLIENT_SECRET_ENV: &str = "BW_CLIENTSECRET";

/// Successful login outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A new provider session was created.
    LoggedIn,
    /// The provider already had a session for this account.
    AlreadyLoggedIn,
}

/// Running local vault server.
#[async_trait]
pub trait ServerProcess: Send {
    /// OS process id, if still known.
    fn id(&self) -> Option<u32>;

    /// Check whether the process has not exited yet.
    fn is_running(&mut self) -> bool;

    /// Forcibly terminate the process and wait for it to exit.
    async fn kill(&mut self) -> Result<()>;
}

/// Vault provider command-line interface.
#[async_trait]
pub trait ProviderCli: Send + Sync {
    /// Log in with API-key credentials.
    ///
    /// # Errors
    /// - `AuthenticationFailed` if the provider rejected the login
    /// - `ProcessSpawnFailed` if the binary could not be run
    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome>;

    /// Spawn the local vault server bound to `port`.
    ///
    /// # Errors
    /// - `ProcessSpawnFailed` if the OS refused to start the process
    async fn serve(&self, port: u16) -> Result<Box<dyn ServerProcess>>;
}

/// Interpret the trimmed stderr of a login call.
///
/// Silence is success. Any other text is a failure unless it contains the
/// provider's already-logged-in phrase verbatim.
pub fn classify_login_stderr(stderr: &str) -> Result<LoginOutcome> {
    let stderr = stderr.trim();

    if stderr.is_empty() {
        Ok(LoginOutcome::LoggedIn)
    } else if stderr.contains(ALREADY_LOGGED_IN_PHRASE) {
        Ok(LoginOutcome::AlreadyLoggedIn)
    } else {
        Err(Error::AuthenticationFailed(stderr.to_string()))
    }
}

/// The real provider CLI.
#[derive(Debug, Clone)]
pub struct BwCli {
    /// Path to the provider binary.
    binary: PathBuf,
    /// Bound on the login call.
    timeout: Duration,
}

impl BwCli {
    /// Create a CLI wrapper for the given binary.
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ProviderCli for BwCli {
    async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome> {
        let mut cmd = self.command();
        cmd.args(["login", "--apikey", "--nointeraction", "--raw"])
            .env(CLIENT_ID_ENV, credentials.client_id().expose())
            .env(CLIENT_SECRET_ENV, credentials.client_secret().expose())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(binary = %self.binary.display(), "Running provider login");

        let child = cmd.spawn().map_err(|e| {
            Error::ProcessSpawnFailed(format!("{}: {}", self.binary.display(), e))
        })?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::AuthenticationFailed(format!(
                    "login timed out after {}s",
                    self.timeout.as_secs()
                ))
            })??;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let outcome = classify_login_stderr(&stderr);

        match &outcome {
            Ok(LoginOutcome::LoggedIn) => info!("Provider login succeeded"),
            Ok(LoginOutcome::AlreadyLoggedIn) => info!("Provider session already exists"),
            Err(e) => warn!(exit = ?output.status.code(), "Provider login failed: {}", e),
        }

        outcome
    }

    async fn serve(&self, port: u16) -> Result<Box<dyn ServerProcess>> {
        let mut cmd = self.command();
        cmd.args(["serve", "--port", &port.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = cmd.spawn().map_err(|e| {
            Error::ProcessSpawnFailed(format!("{}: {}", self.binary.display(), e))
        })?;

        info!(port, pid = ?child.id(), "Spawned local vault server");

        Ok(Box::new(BwServerProcess { child }))
    }
}

/// Local vault server spawned by [`BwCli`]. Killed when dropped.
#[derive(Debug)]
pub struct BwServerProcess {
    child: Child,
}

#[async_trait]
impl ServerProcess for BwServerProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn kill(&mut self) -> Result<()> {
        self.child.kill().await?;
        Ok(())
    }
}
