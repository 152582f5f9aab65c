//! Session lifecycle states.

use std::fmt;

/// Where a session is in its lifecycle.
///
/// States are ordered: each one implies every earlier one has been passed.
/// The only backward moves are `Unlocked -> ServerRunning` (lock) and
/// `ServerRunning | Unlocked -> Authenticated` (server stopped).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    /// No credentials loaded yet.
    #[default]
    Unconfigured,
    /// Credentials loaded and validated.
    Configured,
    /// Logged in with the provider.
    Authenticated,
    /// Local vault server is running; the vault is locked.
    ServerRunning,
    /// Vault is unlocked and can be queried.
    Unlocked,
}

impl SessionState {
    /// Check whether this state is at or past `other`.
    pub fn is_at_least(&self, other: SessionState) -> bool {
        *self >= other
    }

    /// Check whether a local server is expected to be running.
    pub fn has_server(&self) -> bool {
        self.is_at_least(SessionState::ServerRunning)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unconfigured => "unconfigured",
            SessionState::Configured => "configured",
            SessionState::Authenticated => "authenticated",
            SessionState::ServerRunning => "server running",
            SessionState::Unlocked => "unlocked",
        };
        f.write_str(name)
    }
}
