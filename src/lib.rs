//! Backend gateway for a bar's pour-cost tooling.
//!
//! # Endpoints
//! - `GET /health`
//! - `GET /api/cocktails/search?q=&limit=`: cached full-text search
//! - `POST /api/cocktails/calculate-cost?cocktail_id=`: margin of one drink,
//!   alerting management on `alerts`/`low-margin` when it is too thin
//! - `POST /api/cocktails/cost-summary`: margins of several drinks plus menu averages
//! - `GET /api/86-list`, `POST /api/86-list/add`: items currently unavailable
//! - `POST /api/ocr/menu?image_url=`: menu photo to priced items
//! - `GET /ws/updates`: live feed of everything broadcast under the namespace
//!
//! # Collaborators
//! - Postgres holds cocktails, ingredient costs and the 86 list
//! - Redis caches searches and carries broadcasts (`{namespace}:{channel}`)
//! - Google Vision transcribes menu photos
//!
//! Every collaborator call is bounded by `COLLABORATOR_TIMEOUT_MS`. Cache and
//! broadcast failures are logged and never fail a request.

use tokio::{net::TcpListener, signal::ctrl_c};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod routes;
pub mod state;
pub mod util;

use config::Config;
use error::StartupError;
use state::AppState;
use util::version::version_label;

pub async fn start_server() -> Result<(), StartupError> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Starting pour-cost gateway {}", version_label());
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::connect(config).await?;
    let app = app::build_router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(StartupError::Serve)?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(err) => {
                warn!("Failed to install Ctrl+C handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                warn!("Failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
