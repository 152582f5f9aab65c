//! Supervision of the local vault server process.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use vaultserve_common::{Error, Result};

use crate::provider::{ProviderCli, ServerProcess};
use crate::transport::VaultTransport;

/// Owns at most one local vault server process.
///
/// The supervisor is the only component that terminates the process. It is
/// not synchronised itself; the owning session serialises access.
pub struct ProcessSupervisor {
    cli: Arc<dyn ProviderCli>,
    process: Option<Box<dyn ServerProcess>>,
}

impl ProcessSupervisor {
    /// Create a supervisor that spawns servers through `cli`.
    pub fn new(cli: Arc<dyn ProviderCli>) -> Self {
        Self { cli, process: None }
    }

    /// Check whether a server process is alive.
    pub fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(process) => process.is_running(),
            None => false,
        }
    }

    /// OS process id of the running server.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|process| process.id())
    }

    /// Start a server bound to `port`, killing any previous one first.
    ///
    /// # Postconditions
    /// - Exactly one server process is owned on success
    /// - If the previous process could not be killed it is still owned and
    ///   nothing new is spawned; otherwise no process is owned on failure
    ///
    /// # Errors
    /// - `ProcessSpawnFailed` if the previous process could not be killed or
    ///   the new process could not be started
    pub async fn start(&mut self, port: u16) -> Result<()> {
        if let Some(mut previous) = self.process.take() {
            if previous.is_running() {
                info!(pid = ?previous.id(), "Terminating previous vault server");
                if let Err(e) = previous.kill().await {
                    error!(pid = ?previous.id(), "Failed to kill previous vault server: {}", e);
                    self.process = Some(previous);
                    return Err(Error::ProcessSpawnFailed(format!(
                        "previous vault server is still running: {}",
                        e
                    )));
                }
            }
        }

        let process = self.cli.serve(port).await.map_err(|e| {
            error!(port, "Failed to start vault server: {}", e);
            e
        })?;

        info!(port, pid = ?process.id(), "Vault server started");
        self.process = Some(process);
        Ok(())
    }

    /// Stop the server. Calling this with nothing running is a no-op.
    ///
    /// A lock request is sent first on a best-effort basis, bounded by the
    /// transport's timeout, then the process is killed and its handle
    /// released.
    ///
    /// # Returns
    /// - `true` if a running process was stopped
    pub async fn stop(&mut self, transport: &VaultTransport) -> bool {
        let Some(mut process) = self.process.take() else {
            debug!("No vault server to stop");
            return false;
        };

        if !process.is_running() {
            debug!(pid = ?process.id(), "Vault server already exited");
            return false;
        }

        if let Err(e) = transport.send_lock().await {
            warn!("Lock before shutdown failed: {}", e);
        }

        let pid = process.id();
        match process.kill().await {
            Ok(()) => info!(pid = ?pid, "Vault server stopped"),
            Err(e) => error!(pid = ?pid, "Failed to kill vault server: {}", e),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Notifier;
    use crate::test_support::{FakeCli, FakeVaultServer};
    use std::time::Duration;

    fn transport(port: u16) -> VaultTransport {
        VaultTransport::new("127.0.0.1", port, Duration::from_secs(5), Notifier::disabled())
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_replaces_previous_process() {
        let cli = FakeCli::new();
        let mut supervisor = ProcessSupervisor::new(Arc::new(cli.clone()));

        supervisor.start(8087).await.unwrap();
        let first = supervisor.pid();
        supervisor.start(8087).await.unwrap();

        assert_eq!(cli.spawned(), 2);
        assert_eq!(cli.killed(), 1);
        assert_eq!(cli.live(), 1);
        assert_eq!(cli.max_live(), 1);
        assert_ne!(supervisor.pid(), first);
        assert!(supervisor.is_running());
    }

    #[tokio::test]
    async fn test_stop_locks_then_kills() {
        let server = FakeVaultServer::start().await;
        let cli = FakeCli::new();
        let mut supervisor = ProcessSupervisor::new(Arc::new(cli.clone()));
        let transport = transport(server.port());

        supervisor.start(server.port()).await.unwrap();
        assert!(supervisor.stop(&transport).await);

        assert_eq!(server.requests(), vec!["POST /lock".to_string()]);
        assert_eq!(cli.live(), 0);
        assert!(!supervisor.is_running());
        assert_eq!(supervisor.pid(), None);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let server = FakeVaultServer::start().await;
        let cli = FakeCli::new();
        let mut supervisor = ProcessSupervisor::new(Arc::new(cli.clone()));
        let transport = transport(server.port());

        assert!(!supervisor.stop(&transport).await);
        supervisor.start(server.port()).await.unwrap();
        assert!(supervisor.stop(&transport).await);
        assert!(!supervisor.stop(&transport).await);

        assert_eq!(server.requests().len(), 1);
        assert_eq!(cli.killed(), 1);
    }

    #[tokio::test]
    async fn test_stop_kills_even_if_lock_fails() {
        let cli = FakeCli::new();
        let mut supervisor = ProcessSupervisor::new(Arc::new(cli.clone()));
        let transport = transport(FakeVaultServer::unused_port().await);

        supervisor.start(8087).await.unwrap();
        assert!(supervisor.stop(&transport).await);
        assert_eq!(cli.live(), 0);
    }

    #[tokio::test]
    async fn test_no_spawn_while_previous_survives_kill() {
        let cli = FakeCli::new();
        let mut supervisor = ProcessSupervisor::new(Arc::new(cli.clone()));

        supervisor.start(8087).await.unwrap();
        let pid = supervisor.pid();
        cli.fail_kill(true);

        let result = supervisor.start(8087).await;
        assert!(matches!(result, Err(Error::ProcessSpawnFailed(_))));
        assert_eq!(cli.spawned(), 1);
        assert_eq!(cli.max_live(), 1);
        assert_eq!(supervisor.pid(), pid);
        assert!(supervisor.is_running());

        cli.fail_kill(false);
        supervisor.start(8087).await.unwrap();
        assert_eq!(cli.spawned(), 2);
        assert_eq!(cli.live(), 1);
        assert_eq!(cli.max_live(), 1);
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_nothing_running() {
        let cli = FakeCli::new();
        let mut supervisor = ProcessSupervisor::new(Arc::new(cli.clone()));

        supervisor.start(8087).await.unwrap();
        cli.fail_spawn();
        let result = supervisor.start(8087).await;

        assert!(matches!(result, Err(Error::ProcessSpawnFailed(_))));
        assert_eq!(cli.live(), 0);
        assert!(!supervisor.is_running());
    }
}
