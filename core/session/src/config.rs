//! Session configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use vaultserve_common::{Error, Result};

/// Default port for the local vault server.
pub const DEFAULT_PORT: u16 = 8087;

/// Default host the local vault server is reached on.
pub const DEFAULT_HOST: &str = "localhost";

/// Default provider CLI, resolved through `PATH`.
pub const DEFAULT_PROVIDER_BINARY: &str = "bw";

/// Default bound on every HTTP round-trip and on provider login.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration for one session.
///
/// Stored as JSON. Only the three credential paths are required; everything
/// else falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// File whose first line is the API client id.
    pub client_id_path: PathBuf,
    /// File whose first line is the API client secret.
    pub client_secret_path: PathBuf,
    /// File whose first line is the vault unlock passphrase.
    pub passphrase_path: PathBuf,
    /// Port the local vault server binds to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host the local vault server is reached on.
    #[serde(default = "default_host")]
    pub host: String,
    /// Provider CLI executable.
    #[serde(default = "default_provider_binary")]
    pub provider_binary: PathBuf,
    /// Timeout for HTTP requests and provider login, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_provider_binary() -> PathBuf {
    PathBuf::from(DEFAULT_PROVIDER_BINARY)
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl SessionConfig {
    /// Create a configuration with default server settings.
    pub fn new(
        client_id_path: impl Into<PathBuf>,
        client_secret_path: impl Into<PathBuf>,
        passphrase_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client_id_path: client_id_path.into(),
            client_secret_path: client_secret_path.into(),
            passphrase_path: passphrase_path.into(),
            port: DEFAULT_PORT,
            host: default_host(),
            provider_binary: default_provider_binary(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Set the server port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the server host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the provider CLI executable.
    pub fn with_provider_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.provider_binary = binary.into();
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check the server settings.
    ///
    /// # Errors
    /// - `InvalidInput` for port 0, an empty host or a zero timeout
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::InvalidInput("port must be non-zero".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(Error::InvalidInput("host cannot be empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "request timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
