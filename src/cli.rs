//!
//! This module implements the CLI interface for northbase: command parsing,
//! argument validation, and user-visible output.
//!
//! All mirror, cache and session logic lives in the [`northbase-core`] crate.
//! This module is strictly glue: it resolves settings, builds a
//! [`SyncEngine`] over a [`RemoteStore`], and prints results.
//!
//! ## How To Use
//! - For command-line users: `northbase --help`.
//! - For programmatic/integration use: call [`run`] with a parsed [`Cli`], or
//!   [`run_with`] to supply your own settings and remote store.
//!
//! [`northbase-core`]: ../../northbase-core/
use crate::load_config::load_config;
use crate::logging::init_tracing;
use crate::prompt::{prompt_line, prompt_password};
use crate::supabase::SupabaseClient;
use anyhow::Result;
use clap::{Parser, Subcommand};
use northbase_core::config::Settings;
use northbase_core::contract::RemoteStore;
use northbase_core::session::Freshness;
use northbase_core::synchronise::SyncEngine;
use northbase_core::NorthbaseError;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// CLI for northbase: keep a local mirror of your remote files.
#[derive(Parser)]
#[clap(
    name = "northbase",
    version,
    about = "Mirror a remote, authenticated file store into ~/.northbase/files"
)]
pub struct Cli {
    /// Log debug output to stderr
    #[clap(long, global = true)]
    pub debug: bool,

    /// Directory holding the session, cache index and mirror (default ~/.northbase)
    #[clap(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login {
        /// Email address; prompted for when omitted
        #[clap(long)]
        email: Option<String>,
    },
    /// Sign out and remove the local session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show local session status
    Session,
    /// List remote files
    List {
        /// Only paths starting with this prefix
        prefix: Option<String>,
    },
    /// Download every changed remote file
    Pull {
        /// Only paths starting with this prefix
        prefix: Option<String>,
    },
    /// Print a file, fetching it only if the remote copy changed
    Get {
        path: String,
    },
    /// Upload a file, reading its content from stdin
    Put {
        path: String,
    },
}

/// Async CLI entrypoint for main() and integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_config(cli.config_dir.as_deref(), cli.debug)?;
    init_tracing(settings.debug);
    tracing::debug!("trace_initialised");
    run_with(cli.command, &settings, SupabaseClient::hosted()).await
}

/// Execute `command` against `remote` with already-resolved settings.
pub async fn run_with<S: RemoteStore>(command: Commands, settings: &Settings, remote: S) -> Result<()> {
    let engine = SyncEngine::from_settings(remote, settings);

    match command {
        Commands::Login { email } => {
            let email = match email {
                Some(email) => email,
                None => prompt_line("Email: ")?,
            };
            let password = prompt_password("Password: ")?;
            engine.sessions().login(email.trim(), &password).await?;
            println!("Logged in.");
        }
        Commands::Logout => {
            engine.sessions().logout().await;
            println!("Logged out.");
        }
        Commands::Whoami => match engine.sessions().whoami() {
            Ok(user) => {
                let user = user.unwrap_or_default();
                println!(
                    "Logged in as {} ({})",
                    user.email.as_deref().unwrap_or("(unknown)"),
                    user.id.as_deref().unwrap_or("(unknown)")
                );
            }
            Err(NorthbaseError::NotAuthenticated) => println!("Not logged in."),
            Err(e) => return Err(e.into()),
        },
        Commands::Session => match engine.sessions().status() {
            Ok(status) => {
                let user = status.user.unwrap_or_default();
                let expires = chrono::DateTime::from_timestamp(status.expires_at, 0)
                    .filter(|_| status.expires_at > 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string());
                println!("user: {}", user.email.as_deref().unwrap_or("(unknown)"));
                println!("expires_at: {expires}");
                println!("remaining_seconds: {}", status.seconds_remaining.max(0));
                println!(
                    "state: {}",
                    match status.freshness {
                        Freshness::Valid => "valid",
                        Freshness::NeedsRefresh => "refresh on next use",
                    }
                );
            }
            Err(NorthbaseError::NotAuthenticated) => println!("Not logged in."),
            Err(e) => return Err(e.into()),
        },
        Commands::List { prefix } => {
            let files = engine.list(prefix.as_deref()).await?;
            for file in &files {
                let state = if file.cached { "cached" } else { "remote" };
                println!("{}\t{}\t{}", file.updated_at, state, file.path);
            }
            tracing::info!(command = "list", count = files.len(), "Listed remote files");
        }
        Commands::Pull { prefix } => {
            let report = engine.pull(prefix.as_deref()).await?;
            println!(
                "PULL ok total={} downloaded={} skipped={}",
                report.total, report.downloaded, report.skipped
            );
        }
        Commands::Get { path } => {
            let content = engine.get(&path).await?;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&content).await?;
            stdout.flush().await?;
        }
        Commands::Put { path } => {
            let mut content = Vec::new();
            tokio::io::stdin().read_to_end(&mut content).await?;
            let report = engine.put(&path, &content).await?;
            let updated_at = report
                .updated_at
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "null".to_string());
            println!("PUT ok {} bytes={} updated_at={}", report.path, report.bytes, updated_at);
        }
    }

    Ok(())
}
