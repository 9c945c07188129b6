//! Standalone access control server
//!
//! Runs the OAuth2 endpoints and an identity echo route behind the full
//! authentication and authorization pipeline. Settings come from `DX_*`
//! environment variables (see `AccessConfig::from_env`).

use anyhow::Context;
use axum::routing::get;
use axum::{Extension, Json, Router};
use clap::Parser;
use opendif_dx_auth::oauth::CreateClientRequest;
use opendif_dx_auth::{AccessConfig, AppState, AuthenticatedIdentity, build_router};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dx-auth-server")]
#[command(about = "OpenDIF data-exchange access control server")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "DX_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Enable debug logging
    #[arg(long, env = "DX_DEBUG")]
    debug: bool,

    /// Seconds between purges of expired codes and tokens
    #[arg(long, env = "DX_CLEANUP_INTERVAL_SECS", default_value_t = 300)]
    cleanup_interval_secs: u64,

    /// Register a client at startup and print its credentials to stdout
    #[arg(long, env = "DX_BOOTSTRAP_CLIENT_NAME", requires = "bootstrap_redirect_uri")]
    bootstrap_client_name: Option<String>,

    /// Redirect URI of the bootstrap client
    #[arg(long, env = "DX_BOOTSTRAP_REDIRECT_URI")]
    bootstrap_redirect_uri: Option<String>,
}

async fn whoami(Extension(identity): Extension<AuthenticatedIdentity>) -> Json<AuthenticatedIdentity> {
    Json(identity)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = AccessConfig::from_env().context("invalid DX_* configuration")?;
    let state = AppState::new(config).context("failed to initialise access control")?;

    if let (Some(name), Some(redirect_uri)) = (cli.bootstrap_client_name, cli.bootstrap_redirect_uri) {
        let registered = state
            .oauth
            .create_client(CreateClientRequest {
                name,
                redirect_uri,
                ..Default::default()
            })
            .await
            .context("failed to register bootstrap client")?;
        println!("{}", serde_json::to_string_pretty(&registered)?);
    }

    let oauth = state.oauth.clone();
    let interval = Duration::from_secs(cli.cleanup_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = oauth.cleanup_expired().await {
                error!("Periodic cleanup failed: {}", e);
            }
        }
    });

    let resources = Router::new().route("/api/v1/whoami", get(whoami));
    let app = build_router(state, resources);

    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind))?;
    info!(addr = %cli.bind, "dx-auth-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
