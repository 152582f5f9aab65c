//! HTTP client for the local vault server.

use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use vaultserve_common::{Error, Result, SecretString};
use vaultserve_items::{decode, QueryResult};

use crate::notify::{Notification, Notifier};

/// Item listing endpoint, relative to the server root.
const ITEMS_PATH: &str = "list/object/items";

/// Client for the local vault server's HTTP API.
///
/// Cheap to clone; clones share the connection pool and the notifier.
#[derive(Debug, Clone)]
pub struct VaultTransport {
    http: Client,
    base_url: Url,
    notifier: Notifier,
}

impl VaultTransport {
    /// Create a transport for `http://<host>:<port>`.
    ///
    /// Every request is bounded by `timeout`.
    pub fn new(host: &str, port: u16, timeout: Duration, notifier: Notifier) -> Result<Self> {
        let base_url = Url::parse(&format!("http://{}:{}/", host, port))
            .map_err(|e| Error::InvalidInput(format!("Invalid server address: {}", e)))?;

        let http = Client::builder()
            .user_agent(concat!("vaultserve/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            notifier,
        })
    }

    /// Send a notification to the observer, if any.
    pub fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::InvalidInput(format!("Invalid endpoint {}: {}", path, e)))
    }

    /// URL of the item listing for `search`.
    ///
    /// A blank search omits the `search` parameter entirely.
    pub fn items_url(&self, search: &str) -> Result<Url> {
        let mut url = self.endpoint(ITEMS_PATH)?;
        if !search.trim().is_empty() {
            url.query_pairs_mut().append_pair("search", search);
        }
        Ok(url)
    }

    /// Unlock the vault with `passphrase`.
    ///
    /// # Postconditions
    /// - On success an `Unlocked` notification has been sent
    ///
    /// # Errors
    /// - `UnlockFailed` if the server answered with a non-success status
    /// - `Network` if the request could not be completed
    pub async fn unlock(&self, passphrase: &SecretString) -> Result<()> {
        let body = serde_json::json!({ "password": passphrase.expose() });

        let response = self
            .http
            .post(self.endpoint("unlock")?)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to unlock: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Unlock rejected");
            return Err(Error::UnlockFailed(describe_failure(status, response).await));
        }

        debug!("Vault unlocked");
        self.notify(Notification::Unlocked);
        Ok(())
    }

    /// Lock the vault.
    ///
    /// # Postconditions
    /// - On success a `Locked` notification has been sent
    ///
    /// # Errors
    /// - `LockFailed` if the server answered with a non-success status
    /// - `Network` if the request could not be completed
    pub async fn lock(&self) -> Result<()> {
        self.send_lock().await?;
        debug!("Vault locked");
        self.notify(Notification::Locked);
        Ok(())
    }

    /// Lock request without a notification, used while shutting down.
    pub(crate) async fn send_lock(&self) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint("lock")?)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to lock: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Lock rejected");
            return Err(Error::LockFailed(describe_failure(status, response).await));
        }
        Ok(())
    }

    /// Ask the server to resynchronise the vault.
    ///
    /// # Returns
    /// - `Ok(true)` on a success status, `Ok(false)` otherwise
    ///
    /// # Errors
    /// - `Network` if the request could not be completed
    pub async fn sync(&self) -> Result<bool> {
        let response = self
            .http
            .post(self.endpoint("sync")?)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to sync: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Sync rejected");
        }
        Ok(status.is_success())
    }

    /// List items matching `search` and decode them.
    ///
    /// # Errors
    /// - `Network` on transport failure or a non-success status
    /// - any error from [`decode`], including `UnknownItemType`
    pub async fn list_items(&self, search: &str) -> Result<QueryResult> {
        let url = self.items_url(search)?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("Failed to list items: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!(
                "Item listing failed: {}",
                describe_failure(status, response).await
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read item listing: {}", e)))?;

        decode(&body)
    }
}

/// Status plus body text, for error messages.
async fn describe_failure(status: StatusCode, response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{} - {}", status, body.trim())
    }
}
