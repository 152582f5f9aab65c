//! vaultserve - search a credential vault through its local server.
//!
//! Every command runs a short-lived session: credentials are loaded, the
//! provider login is performed, the local server is started for the
//! duration of the command and stopped again before exit.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vaultserve_common::Error;
use vaultserve_items::VaultItem;
use vaultserve_session::{Notifier, RetryConfig, RetryExecutor, Session, SessionConfig};

#[derive(Parser)]
#[command(name = "vaultserve")]
#[command(about = "Query a credential vault through its local server")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Session configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the local server port.
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Override the provider CLI executable.
    #[arg(long, global = true)]
    provider: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the vault and print matching items.
    Search {
        /// Text to search for. Lists everything when omitted.
        #[arg(default_value = "")]
        text: String,

        /// Print items as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Resynchronise the vault with the provider.
    Sync,

    /// Validate the credential files without contacting the provider.
    Check,

    /// Write a configuration file with default settings.
    InitConfig {
        /// Where to write the configuration.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };

    let builder = FmtSubscriber::builder()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();
    if std::env::var_os("RUST_LOG").is_some() {
        tracing::subscriber::set_global_default(
            builder.with_env_filter(EnvFilter::from_default_env()).finish(),
        )?;
    } else {
        tracing::subscriber::set_global_default(builder.with_max_level(level).finish())?;
    }

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    match cli.command {
        Commands::InitConfig { output } => {
            let output = output.unwrap_or(config_path);
            cmd_init_config(&output, cli.port, cli.provider)
        }
        Commands::Check => {
            let config = load_config(&config_path, cli.port, cli.provider)?;
            cmd_check(config).await
        }
        Commands::Search { text, json } => {
            let config = load_config(&config_path, cli.port, cli.provider)?;
            cmd_search(config, &text, json).await
        }
        Commands::Sync => {
            let config = load_config(&config_path, cli.port, cli.provider)?;
            cmd_sync(config).await
        }
    }
}

/// `<config dir>/vaultserve/config.json`.
fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Cannot determine the user configuration directory")?;
    Ok(dir.join("vaultserve").join("config.json"))
}

fn load_config(
    path: &Path,
    port: Option<u16>,
    provider: Option<PathBuf>,
) -> Result<SessionConfig> {
    let config = SessionConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    Ok(apply_overrides(config, port, provider))
}

fn apply_overrides(
    mut config: SessionConfig,
    port: Option<u16>,
    provider: Option<PathBuf>,
) -> SessionConfig {
    if let Some(port) = port {
        config = config.with_port(port);
    }
    if let Some(provider) = provider {
        config = config.with_provider_binary(provider);
    }
    config
}

/// Build a session whose notifications are logged.
fn open_session(config: SessionConfig) -> Result<Session> {
    let (notifier, mut rx) = Notifier::channel(vaultserve_session::notify::DEFAULT_CAPACITY);
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            debug!(?notification, "Session notification");
        }
    });

    Session::with_provider_binary(config, notifier).context("Failed to create session")
}

/// Authenticate, start the server, run `body`, and stop the server again
/// whatever `body` returned.
async fn with_server<'a, F, Fut, T>(session: &'a Session, body: F) -> Result<T>
where
    F: FnOnce(&'a Session) -> Fut,
    Fut: Future<Output = Result<T>> + 'a,
{
    if !session.authenticate().await? {
        bail!("Provider rejected the API credentials");
    }

    session
        .start_server()
        .await
        .context("Failed to start the local vault server")?;

    let result = body(session).await;
    session.stop_server().await;
    result
}

/// Unlock, retrying while the freshly spawned server comes up.
async fn unlock_with_retry(session: &Session) -> Result<()> {
    let retry = RetryExecutor::new(
        RetryConfig::default()
            .with_initial_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(4)),
    );

    retry
        .execute(|| async move {
            match session.unlock().await? {
                true => Ok(()),
                false => Err(Error::UnlockFailed(
                    "server rejected the passphrase or is not reachable".to_string(),
                )),
            }
        })
        .await
        .context("Failed to unlock the vault")
}

async fn cmd_check(config: SessionConfig) -> Result<()> {
    let session = open_session(config)?;
    session
        .configure_from_config()
        .await
        .context("Credential files are not usable")?;

    let config = session.config();
    println!("Credential files OK:");
    println!("  Client id:     {}", config.client_id_path.display());
    println!("  Client secret: {}", config.client_secret_path.display());
    println!("  Passphrase:    {}", config.passphrase_path.display());
    println!("  Server:        {}:{}", config.host, config.port);
    println!("  Provider:      {}", config.provider_binary.display());

    Ok(())
}

async fn cmd_search(config: SessionConfig, text: &str, json: bool) -> Result<()> {
    let session = open_session(config)?;
    session.configure_from_config().await?;

    let result = with_server(&session, |session| async move {
        unlock_with_retry(session).await?;
        Ok(session.query(text).await)
    })
    .await?;

    if !result.succeeded {
        bail!("Vault search failed");
    }

    info!(count = result.len(), "Search complete");

    if json {
        println!("{}", serde_json::to_string_pretty(&result.items)?);
    } else if result.is_empty() {
        println!("No items found.");
    } else {
        for item in result.iter() {
            println!("{}", format_item(item));
        }
    }

    Ok(())
}

async fn cmd_sync(config: SessionConfig) -> Result<()> {
    let session = open_session(config)?;
    session.configure_from_config().await?;

    let synced = with_server(&session, |session| async move {
        Ok(session.sync().await?)
    })
    .await?;

    if !synced {
        bail!("Vault sync failed");
    }

    println!("Vault synchronised.");
    Ok(())
}

fn cmd_init_config(output: &Path, port: Option<u16>, provider: Option<PathBuf>) -> Result<()> {
    if output.exists() {
        bail!("{} already exists", output.display());
    }

    let secrets = output.parent().unwrap_or_else(|| Path::new("."));
    let config = SessionConfig::new(
        secrets.join("client_id"),
        secrets.join("client_secret"),
        secrets.join("passphrase"),
    );
    let config = apply_overrides(config, port, provider);

    config
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Configuration written to {}", output.display());
    println!("Put the API client id, client secret and unlock passphrase in:");
    println!("  {}", config.client_id_path.display());
    println!("  {}", config.client_secret_path.display());
    println!("  {}", config.passphrase_path.display());

    Ok(())
}

/// One line per item: kind, name and summary.
fn format_item(item: &VaultItem) -> String {
    match item.summary() {
        Some(summary) => format!("[{}] {} ({})", item.kind(), item.name, summary),
        None => format!("[{}] {}", item.kind(), item.name),
    }
}
