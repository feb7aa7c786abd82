mod config;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use defenserama_api::auth::{AppState, AppStateInner};
use defenserama_db::{Database, MemoryStore, Store, seed::seed_if_empty};

use crate::config::{Config, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "defenserama=debug,defenserama_api=debug,defenserama_db=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;
    if config.uses_placeholder_secret() {
        warn!("DEFENSERAMA_JWT_SECRET is unset or still a placeholder; tokens are forgeable");
    }

    let state = match config.storage {
        Storage::Sqlite => build_state(Database::open(&config.db_path)?, &config)?,
        Storage::Memory => {
            info!("Using in-memory storage; data is lost on exit");
            build_state(MemoryStore::new(), &config)?
        }
    };

    let app = defenserama_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.addr()?;
    info!("Defense-O-Rama listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_state(store: impl Store + 'static, config: &Config) -> anyhow::Result<AppState> {
    if config.seed && seed_if_empty(&store)? {
        info!("Seeded empty store with default characters and accusations");
    }
    Ok(AppStateInner::new(store, config.jwt_secret.clone()))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
