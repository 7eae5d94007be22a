//! rolelink gateway — links Discord accounts to PlayFab and grants a role.
//!
//! Two contexts run side by side for the lifetime of the process:
//!
//! 1. The HTTP login gateway (`/`, `/login`, `/callback`), which performs
//!    the Discord OAuth exchange, fetches the profile and logs the user in to
//!    PlayFab with their Discord id as custom id.
//! 2. The Discord connection, which posts a login button when `!login` is
//!    typed in the login channel and drains the role-grant queue filled by
//!    successful logins.

mod bridge;
mod chat;
mod config;
mod directory;
mod error;
mod notifier;
mod oauth;
mod routes;
mod state;

use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rolelink_models::ConnectionState;
use serenity::http::Http;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::chat::ChatClient;
use crate::config::AppConfig;
use crate::directory::DiscordDirectory;
use crate::notifier::{RoleGrantWorker, RoleNotifier};
use crate::routes::AppState;

/// Discord → PlayFab login gateway.
#[derive(Parser, Debug)]
#[command(name = "rolelink-gateway", about = "Discord to PlayFab login gateway")]
struct Args {
    /// Load environment variables from this file instead of `./.env`.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Serve the HTTP gateway only, without connecting to Discord.
    /// Role grants are dropped.
    #[arg(long)]
    http_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_file = match &args.env_file {
        Some(path) => dotenv::from_path(path).map(|()| path.clone()).map_err(Some),
        None => dotenv::dotenv().map_err(|_| None),
    };

    // Structured logging (controlled via RUST_LOG env var).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match env_file {
        Ok(path) => info!(path = %path.display(), "environment file loaded"),
        Err(Some(e)) => anyhow::bail!("cannot load environment file: {e}"),
        Err(None) => {}
    }

    // Configuration: fail before anything starts.
    let config = AppConfig::from_env()?;
    info!(
        guild = %config.guild_id,
        login_channel = %config.login_channel_id,
        login_role = %config.login_role_id,
        playfab_title = %config.playfab_title_id,
        "configuration loaded"
    );
    if config.expose_upstream_errors {
        warn!("upstream error bodies will be shown to users");
    }

    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
    let (notifier, grants) = RoleNotifier::channel();

    let directory = Arc::new(DiscordDirectory::new(
        Arc::new(Http::new(&config.bot_token)),
        state_rx,
    ));
    let worker = RoleGrantWorker::new(directory, config.guild_id, config.login_role_id, grants);

    let app = routes::router(Arc::new(AppState::new(&config, notifier)?));
    let addr = format!("0.0.0.0:{}", config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "login gateway listening");

    let chat = async {
        if args.http_only {
            info!("Discord connection disabled (--http-only)");
            std::future::pending::<Result<(), chat::ChatError>>().await
        } else {
            ChatClient::new(&config, state_tx).run().await
        }
    };

    tokio::select! {
        result = axum::serve(listener, app).into_future() => result?,
        result = chat => result?,
        () = worker.run() => {}
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    Ok(())
}
