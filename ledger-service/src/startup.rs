//! Application startup and lifecycle management.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{LedgerConfig, StoreBackend};
use crate::handlers;
use crate::middleware::{auth_middleware, metrics_middleware};
use crate::services::storage::MAX_PROOF_BYTES;
use crate::services::{
    AccountStore, AuthService, InMemoryAccountStore, JwtService, LedgerEngine, LocalStorage,
    PgAccountStore, Storage,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<LedgerConfig>,
    pub store: Arc<dyn AccountStore>,
    pub ledger: LedgerEngine,
    pub auth: AuthService,
    pub jwt: JwtService,
    pub storage: Arc<dyn Storage>,
}

impl AppState {
    /// Wire services around an already-constructed store and blob storage.
    pub fn new(
        config: LedgerConfig,
        store: Arc<dyn AccountStore>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let jwt = JwtService::new(&config.jwt);
        Self {
            ledger: LedgerEngine::new(store.clone()),
            auth: AuthService::new(store.clone(), jwt.clone()),
            jwt,
            store,
            storage,
            config: Arc::new(config),
        }
    }
}

/// Build the HTTP router with all middleware applied.
pub fn build_router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route(
            "/api/user/deposit",
            post(handlers::ledger::deposit)
                .layer(DefaultBodyLimit::max(MAX_PROOF_BYTES + 1024 * 1024)),
        )
        .route("/api/user/deposits", get(handlers::ledger::list_deposits))
        .route("/api/user/withdrawal", post(handlers::ledger::withdraw))
        .route(
            "/api/user/withdrawals",
            get(handlers::ledger::list_withdrawals),
        )
        .route("/api/user/plan", post(handlers::ledger::subscribe_plan))
        .route("/api/user/plans", get(handlers::ledger::list_plans))
        .route(
            "/api/user/signal/subscribe",
            post(handlers::ledger::subscribe_signal),
        )
        .route("/api/user/signals", get(handlers::ledger::list_signals))
        .route(
            "/api/user/kyc",
            get(handlers::ledger::get_kyc).post(handlers::ledger::submit_kyc),
        )
        .route(
            "/api/user/settings",
            get(handlers::ledger::get_settings).put(handlers::ledger::update_settings),
        )
        .route("/api/user/referral", post(handlers::ledger::add_referral))
        .route("/api/user/referrals", get(handlers::ledger::list_referrals))
        .route("/api/user/profile", get(handlers::account::profile))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let cors = cors_layer(&state.config.security.allowed_origins);

    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .merge(user_routes)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: LedgerConfig) -> Result<Self, AppError> {
        let store: Arc<dyn AccountStore> = match config.database.backend {
            StoreBackend::Postgres => {
                let store = PgAccountStore::new(
                    config.database.url.expose_secret(),
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to PostgreSQL: {}", e);
                    AppError::from(e)
                })?;
                store.run_migrations().await?;
                Arc::new(store)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory account store; data is lost on restart");
                Arc::new(InMemoryAccountStore::new())
            }
        };

        let storage = LocalStorage::new(&config.storage.local_path)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to initialize storage at {}: {}",
                    config.storage.local_path,
                    e
                );
                e
            })?;

        let addr = format!("{}:{}", config.common.host, config.common.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let state = AppState::new(config, store, Arc::new(storage));

        tracing::info!(
            service = %state.config.service_name,
            version = %state.config.service_version,
            "Ledger service listening on port {}",
            port
        );

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on (useful with port 0).
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Serve until SIGINT or SIGTERM.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received, draining connections");
}
