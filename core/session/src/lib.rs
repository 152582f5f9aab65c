//! Client-side session management for a locally served credential vault.
//!
//! This module provides:
//! - Loading of API credentials and the unlock passphrase from files
//! - The session state machine gating every provider and server call
//! - Supervision of the local vault server process
//! - The HTTP transport to that server and state-change notifications
//!
//! # Architecture
//! A [`Session`] owns one [`ProcessSupervisor`] and one [`VaultTransport`].
//! All transitions run inside a single critical section per session, so
//! concurrent callers never interleave a spawn, kill, unlock or lock.

pub mod config;
pub mod credentials;
pub mod notify;
pub mod provider;
pub mod retry;
pub mod session;
pub mod state;
pub mod supervisor;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{SessionConfig, DEFAULT_PORT};
pub use credentials::Credentials;
pub use notify::{Notification, Notifier};
pub use provider::{BwCli, LoginOutcome, ProviderCli, ServerProcess};
pub use retry::{RetryConfig, RetryExecutor};
pub use session::Session;
pub use state::SessionState;
pub use supervisor::ProcessSupervisor;
pub use transport::VaultTransport;
