//! In-process fakes for the provider CLI and the local vault server.

use async_trait::async_trait;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use vaultserve_common::{Error, Result};

use crate::config::SessionConfig;
use crate::credentials::Credentials;
use crate::provider::{classify_login_stderr, LoginOutcome, ProviderCli, ServerProcess};

pub const LOGIN_LISTING: &str = r#"{
    "success": true,
    "data": {
        "object": "list",
        "data": [
            {
                "object": "item",
                "id": "a788aaaa-65eb-4b66-8438-aaaa00b3451a",
                "type": 1,
                "name": "test account",
                "login": {"username": "user@example.com", "password": "password", "totp": null}
            }
        ]
    }
}"#;

#[derive(Default)]
struct FakeServerState {
    requests: Mutex<Vec<String>>,
    unlock_bodies: Mutex<Vec<serde_json::Value>>,
    listing: Mutex<String>,
    reject_unlock: AtomicBool,
    reject_lock: AtomicBool,
    reject_sync: AtomicBool,
    fail_listing: AtomicBool,
}

impl FakeServerState {
    fn record(&self, request: String) {
        self.requests.lock().unwrap().push(request);
    }
}

/// Local vault server stand-in that records every request.
pub struct FakeVaultServer {
    port: u16,
    state: Arc<FakeServerState>,
    task: JoinHandle<()>,
}

impl FakeVaultServer {
    pub async fn start() -> Self {
        let state = Arc::new(FakeServerState::default());
        *state.listing.lock().unwrap() = r#"{"success": true, "data": {"data": []}}"#.to_string();

        let app = Router::new()
            .route("/unlock", post(unlock))
            .route("/lock", post(lock))
            .route("/sync", post(sync))
            .route("/list/object/items", get(list_items))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { port, state, task }
    }

    /// A port with nothing listening on it.
    pub async fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn unlock_bodies(&self) -> Vec<serde_json::Value> {
        self.state.unlock_bodies.lock().unwrap().clone()
    }

    pub fn set_listing(&self, body: &str) {
        *self.state.listing.lock().unwrap() = body.to_string();
    }

    pub fn reject_unlock(&self) {
        self.state.reject_unlock.store(true, Ordering::SeqCst);
    }

    pub fn reject_lock(&self) {
        self.state.reject_lock.store(true, Ordering::SeqCst);
    }

    pub fn reject_sync(&self) {
        self.state.reject_sync.store(true, Ordering::SeqCst);
    }

    pub fn fail_listing(&self) {
        self.state.fail_listing.store(true, Ordering::SeqCst);
    }
}

impl Drop for FakeVaultServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn status_for(rejected: &AtomicBool, failure: StatusCode) -> StatusCode {
    if rejected.load(Ordering::SeqCst) {
        failure
    } else {
        StatusCode::OK
    }
}

async fn unlock(
    State(state): State<Arc<FakeServerState>>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    state.record("POST /unlock".to_string());
    state.unlock_bodies.lock().unwrap().push(body);
    status_for(&state.reject_unlock, StatusCode::BAD_REQUEST)
}

async fn lock(State(state): State<Arc<FakeServerState>>) -> StatusCode {
    state.record("POST /lock".to_string());
    status_for(&state.reject_lock, StatusCode::INTERNAL_SERVER_ERROR)
}

async fn sync(State(state): State<Arc<FakeServerState>>) -> StatusCode {
    state.record("POST /sync".to_string());
    status_for(&state.reject_sync, StatusCode::BAD_REQUEST)
}

async fn list_items(
    State(state): State<Arc<FakeServerState>>,
    RawQuery(query): RawQuery,
) -> (StatusCode, String) {
    match query {
        Some(query) => state.record(format!("GET /list/object/items?{}", query)),
        None => state.record("GET /list/object/items".to_string()),
    }
    let status = status_for(&state.fail_listing, StatusCode::INTERNAL_SERVER_ERROR);
    (status, state.listing.lock().unwrap().clone())
}

#[derive(Default)]
struct ProcessCounters {
    live: AtomicUsize,
    max_live: AtomicUsize,
    spawned: AtomicUsize,
    killed: AtomicUsize,
    logins: AtomicUsize,
    next_pid: AtomicU32,
    fail_kill: AtomicBool,
}

/// Provider CLI stand-in that tracks how many fake servers are alive.
#[derive(Clone, Default)]
pub struct FakeCli {
    counters: Arc<ProcessCounters>,
    login_stderr: Arc<Mutex<String>>,
    fail_spawn: Arc<AtomicBool>,
}

impl FakeCli {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_login_stderr(&self, stderr: &str) {
        *self.login_stderr.lock().unwrap() = stderr.to_string();
    }

    pub fn fail_spawn(&self) {
        self.fail_spawn.store(true, Ordering::SeqCst);
    }

    pub fn fail_kill(&self, fail: bool) {
        self.counters.fail_kill.store(fail, Ordering::SeqCst);
    }

    pub fn live(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.counters.max_live.load(Ordering::SeqCst)
    }

    pub fn spawned(&self) -> usize {
        self.counters.spawned.load(Ordering::SeqCst)
    }

    pub fn killed(&self) -> usize {
        self.counters.killed.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> usize {
        self.counters.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderCli for FakeCli {
    async fn login(&self, _credentials: &Credentials) -> Result<LoginOutcome> {
        self.counters.logins.fetch_add(1, Ordering::SeqCst);
        let stderr = self.login_stderr.lock().unwrap().clone();
        classify_login_stderr(&stderr)
    }

    async fn serve(&self, _port: u16) -> Result<Box<dyn ServerProcess>> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(Error::ProcessSpawnFailed("spawn refused".to_string()));
        }

        // Yield so concurrent callers get a chance to interleave.
        tokio::task::yield_now().await;

        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_live.fetch_max(live, Ordering::SeqCst);
        self.counters.spawned.fetch_add(1, Ordering::SeqCst);
        let pid = self.counters.next_pid.fetch_add(1, Ordering::SeqCst) + 1000;

        Ok(Box::new(FakeProcess {
            counters: self.counters.clone(),
            pid,
            running: true,
        }))
    }
}

struct FakeProcess {
    counters: Arc<ProcessCounters>,
    pid: u32,
    running: bool,
}

#[async_trait]
impl ServerProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        self.running.then_some(self.pid)
    }

    fn is_running(&mut self) -> bool {
        self.running
    }

    async fn kill(&mut self) -> Result<()> {
        if self.counters.fail_kill.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "kill refused",
            )));
        }
        if self.running {
            self.running = false;
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
            self.counters.killed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for FakeProcess {
    fn drop(&mut self) {
        if self.running {
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Secret files plus a config pointing at them.
pub struct SecretFiles {
    _dir: TempDir,
    pub client_id: PathBuf,
    pub client_secret: PathBuf,
    pub passphrase: PathBuf,
}

impl SecretFiles {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let client_id = dir.path().join("client_id.txt");
        let client_secret = dir.path().join("client_secret.txt");
        let passphrase = dir.path().join("passphrase.txt");
        std::fs::write(&client_id, "user.1234\n").unwrap();
        std::fs::write(&client_secret, "secret-value\n").unwrap();
        std::fs::write(&passphrase, "correct horse\n").unwrap();

        Self {
            _dir: dir,
            client_id,
            client_secret,
            passphrase,
        }
    }

    pub fn config(&self, port: u16) -> SessionConfig {
        SessionConfig::new(&self.client_id, &self.client_secret, &self.passphrase)
            .with_host("127.0.0.1")
            .with_port(port)
    }
}
