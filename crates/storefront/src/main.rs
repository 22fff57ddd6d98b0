//! Toko Storefront - cart and favorites sync service.
//!
//! This binary serves the JSON API on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework, JSON only
//! - `PostgreSQL` for products, profiles, carts and favorites
//! - tower-sessions for identity and the guest ephemeral store
//! - `moka` caches for signed-in carts and favorite lists
//!
//! `STOREFRONT_BACKEND=memory` swaps both stores for in-process ones, which
//! is handy for local frontend work without a database.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use toko_storefront::config::{Backend, StorefrontConfig};
use toko_storefront::db::{self, CatalogStore, MemoryStore, NewProduct, PgStore};
use toko_storefront::middleware::{create_session_layer, postgres_session_store};
use toko_storefront::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let sentry_config = config.sentry.as_ref()?;

    let guard = sentry::init((
        sentry_config.dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: sentry_config
                .environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: sentry_config.sample_rate,
            traces_sample_rate: sentry_config.traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Load a JSON product list into the in-memory store.
async fn seed_catalog(store: &MemoryStore, path: &Path) -> Result<usize, String> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let products: Vec<NewProduct> =
        serde_json::from_str(&raw).map_err(|e| format!("invalid catalog: {e}"))?;

    for product in &products {
        store
            .upsert_product(product)
            .await
            .map_err(|e| format!("failed to seed {}: {e}", product.id))?;
    }
    Ok(products.len())
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = StorefrontConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "toko_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    tracing::info!(backend = config.backend.name(), "Starting storefront");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p toko-cli -- migrate
    let app: Router = match &config.backend {
        Backend::Postgres { database_url } => {
            let pool = db::create_pool(database_url)
                .await
                .expect("Failed to create database pool");
            tracing::info!("Database pool created");

            let session_layer = create_session_layer(postgres_session_store(&pool), &config);
            let state = AppState::new(config.clone(), Arc::new(PgStore::new(pool)));
            toko_storefront::app(state, session_layer)
        }
        Backend::Memory { catalog } => {
            let store = Arc::new(MemoryStore::new());
            if let Some(path) = catalog {
                let count = seed_catalog(&store, path)
                    .await
                    .expect("Failed to load catalog");
                tracing::info!(count, "Catalog loaded into memory store");
            }

            let session_layer =
                create_session_layer(tower_sessions::MemoryStore::default(), &config);
            let state = AppState::new(config.clone(), store);
            toko_storefront::app(state, session_layer)
        }
    };

    // Sentry layers (outermost for full request coverage)
    let app = app
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    // Start server
    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
