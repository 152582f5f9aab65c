//! Common error types for vaultserve.

use std::fmt;
use thiserror::Error;

/// Which credential file failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    ClientId,
    ClientSecret,
    Passphrase,
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CredentialField::ClientId => "client id",
            CredentialField::ClientSecret => "client secret",
            CredentialField::Passphrase => "unlock passphrase",
        };
        f.write_str(name)
    }
}

/// Top-level error type for vaultserve operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A credential file is missing, unreadable or empty.
    #[error("Invalid credentials: {field}: {reason}")]
    InvalidCredentials {
        field: CredentialField,
        reason: String,
    },

    /// Operation attempted out of session order.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// The provider rejected the login.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The local server rejected the unlock request.
    #[error("Unlock failed: {0}")]
    UnlockFailed(String),

    /// The local server rejected the lock request.
    #[error("Lock failed: {0}")]
    LockFailed(String),

    /// The local server process could not be started.
    #[error("Failed to spawn vault server: {0}")]
    ProcessSpawnFailed(String),

    /// A vault item carried a missing or unrecognised `type` discriminator.
    /// Holds the raw JSON text of the field when one was present.
    #[error("Unknown item type: {}", describe_discriminator(.0))]
    UnknownItemType(Option<String>),

    /// HTTP transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

fn describe_discriminator(discriminator: &Option<String>) -> &str {
    discriminator.as_deref().unwrap_or("missing")
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
