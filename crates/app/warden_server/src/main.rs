//! Warden identity server binary.
//!
//! Serves register / login / refresh / identify over HTTP, backed by the
//! in-memory credential store and refresh ledger.

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use warden_api::config::{ApiConfig, parse_origins};
use warden_core::auth::ledger::MemoryLedger;
use warden_core::auth::service::AuthService;
use warden_core::auth::store::MemoryCredentialStore;
use warden_core::clock::{Clock, SystemClock};

/// CLI arguments for the identity server.
#[derive(Parser, Debug)]
#[command(name = "warden_server", about = "Warden identity server")]
struct Args {
    /// Address to bind (overrides `BIND_ADDR`).
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind_addr: String,

    /// Comma-separated origins allowed for credentialed CORS requests.
    #[arg(long, env = "CORS_ALLOWED_ORIGINS", default_value = "http://localhost:3000")]
    allowed_origins: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,warden_api=debug,warden_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    config.bind_addr = args.bind_addr;
    config.allowed_origins = parse_origins(&args.allowed_origins);

    info!(
        bind_addr = %config.bind_addr,
        origins = ?config.allowed_origins,
        identity = ?config.identity,
        "starting warden_server"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let ledger = Arc::new(MemoryLedger::new(&config.identity));
    let cleanup = ledger.spawn_cleanup_task(clock.clone());

    let auth = AuthService::new(
        config.identity.clone(),
        Arc::new(MemoryCredentialStore::new()),
        ledger,
        clock,
    );

    let state = warden_api::AppState {
        auth: Arc::new(auth),
        config: config.clone(),
    };
    let app = warden_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    cleanup.abort();
    Ok(())
}
