//! Contact Management API
//!
//! A REST service for contact records backed by a CouchDB-compatible
//! document store, degrading to in-memory storage when the store is
//! unavailable at startup.
//!
//! # Environment Variables
//!
//! - `CLOUDANT_URL`: document store endpoint (unset: in-memory storage)
//! - `CLOUDANT_API_KEY`: IAM API key (unset: in-memory storage)
//! - `CLOUDANT_DATABASE`: database name (default: `contacts_db`)
//! - `CLOUDANT_IAM_URL`: IAM token endpoint
//! - `CLOUDANT_TIMEOUT_MS`: document store request timeout (default: `10000`)
//! - `RUST_LOG`: Logging level (e.g., `debug`, `contact_management_api=debug`)
//! - `LOG_FORMAT`: `json` for JSON lines, anything else for human-readable output
//! - `HOST`: Server host address (default: `0.0.0.0`)
//! - `PORT`: Server port (default: `5000`)
//! - `WORKER_THREADS`: Number of tokio worker threads (default: logical CPU count)

use std::env;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contact_management_api::api::{AppState, router};
use contact_management_api::infrastructure::{RepositoryConfig, RepositoryFactory};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;

// =============================================================================
// Server Settings
// =============================================================================

/// Process-level settings, read before the runtime exists.
///
/// Invalid values fall back to their defaults. The reasons are kept in
/// `warnings` and logged once tracing is up.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ServerSettings {
    host: String,
    port: u16,
    worker_threads: Option<usize>,
    json_logs: bool,
    warnings: Vec<String>,
}

impl ServerSettings {
    fn from_lookup<F>(lookup: F, parallelism: usize) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut warnings = Vec::new();

        let port = match read("PORT") {
            None => DEFAULT_PORT,
            Some(value) => value.parse().unwrap_or_else(|_| {
                warnings.push(format!("PORT='{value}' is not a valid port, using {DEFAULT_PORT}"));
                DEFAULT_PORT
            }),
        };

        let max_threads = parallelism.saturating_mul(4).max(1);
        let worker_threads = match read("WORKER_THREADS").map(|value| (value.parse::<usize>(), value)) {
            None => None,
            Some((Ok(0) | Err(_), value)) => {
                warnings.push(format!(
                    "WORKER_THREADS='{value}' must be a positive number, using the default"
                ));
                None
            }
            Some((Ok(threads), _)) if threads > max_threads => {
                warnings.push(format!(
                    "WORKER_THREADS={threads} exceeds {max_threads}, capping to {max_threads}"
                ));
                Some(max_threads)
            }
            Some((Ok(threads), _)) => Some(threads),
        };

        Self {
            host: read("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            worker_threads,
            json_logs: read("LOG_FORMAT").is_some_and(|format| format.eq_ignore_ascii_case("json")),
            warnings,
        }
    }
}

// =============================================================================
// Entry Point
// =============================================================================

fn main() {
    dotenvy::dotenv().ok();

    let parallelism = std::thread::available_parallelism().map_or(16, std::num::NonZeroUsize::get);
    let settings = ServerSettings::from_lookup(|key| env::var(key).ok(), parallelism);

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(threads) = settings.worker_threads {
        builder.worker_threads(threads);
    }

    let runtime = builder.build().expect("Failed to create tokio runtime");
    runtime.block_on(serve(settings));
}

fn init_tracing(json: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contact_management_api=info,tower_http=info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn serve(settings: ServerSettings) {
    init_tracing(settings.json_logs);
    for warning in &settings.warnings {
        tracing::warn!("{warning}");
    }
    tracing::info!(worker_threads = ?settings.worker_threads, "Runtime started");

    let config = RepositoryConfig::from_env().unwrap_or_else(|error| {
        tracing::error!(%error, "Invalid document store configuration, using in-memory storage");
        RepositoryConfig::default()
    });
    tracing::debug!(?config, "Loaded repository configuration");

    let repository = RepositoryFactory::new(config).create().await;
    let backend = repository.backend();
    if backend.is_durable() {
        tracing::info!(%backend, "Contacts are persisted in the document store");
    } else {
        tracing::warn!(%backend, "Contacts are held in memory and will be lost on restart");
    }

    let listener = match TcpListener::bind((settings.host.as_str(), settings.port)).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, host = %settings.host, port = settings.port, "Failed to bind");
            std::process::exit(1);
        }
    };
    if let Ok(address) = listener.local_addr() {
        tracing::info!(%address, "Listening");
    }

    if let Err(error) = axum::serve(listener, router(AppState::new(repository)))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(%error, "Server error");
        std::process::exit(1);
    }

    tracing::info!("Server shutdown complete");
}

/// Resolves on Ctrl+C, or SIGTERM on Unix. A handler that cannot be
/// installed never resolves.
async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal_name = tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(error) = result {
                tracing::warn!(%error, "Ctrl+C handler unavailable");
                std::future::pending::<()>().await;
            }
            "SIGINT"
        }
        () = terminate => "SIGTERM",
    };
    tracing::info!(signal = signal_name, "Shutting down");
}
