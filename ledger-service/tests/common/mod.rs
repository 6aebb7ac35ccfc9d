//! Common test utilities for ledger-service integration tests.
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use ledger_service::config::{
    DatabaseConfig, Environment, JwtConfig, LedgerConfig, SecurityConfig, StorageConfig,
    StoreBackend,
};
use ledger_service::models::NewAccount;
use ledger_service::services::{AccountStore, InMemoryAccountStore, LedgerEngine, LocalStorage};
use ledger_service::utils::PasswordHashString;
use ledger_service::{build_router, AppState};
use secrecy::Secret;
use serde_json::{json, Value};
use service_core::config::Config as CommonConfig;
use std::path::Path;
use std::sync::{Arc, Once};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "ledger-test-jwt-secret";
pub const BOUNDARY: &str = "ledger-test-boundary";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,ledger_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn test_config(storage_path: &Path) -> LedgerConfig {
    LedgerConfig {
        common: CommonConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        environment: Environment::Dev,
        service_name: "ledger-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            backend: StoreBackend::Memory,
            url: Secret::new(String::new()),
            max_connections: 2,
            min_connections: 1,
        },
        jwt: JwtConfig {
            secret: Secret::new(TEST_JWT_SECRET.to_string()),
            expiry_days: 7,
        },
        storage: StorageConfig {
            local_path: storage_path.to_string_lossy().into_owned(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

/// Router over an in-memory store and a throwaway storage directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub storage_dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    init_tracing();

    let storage_dir = tempfile::tempdir().expect("Failed to create storage dir");
    let storage = LocalStorage::new(storage_dir.path())
        .await
        .expect("Failed to create local storage");

    let state = AppState::new(
        test_config(storage_dir.path()),
        Arc::new(InMemoryAccountStore::new()),
        Arc::new(storage),
    );

    TestApp {
        router: build_router(state.clone()),
        state,
        storage_dir,
    }
}

impl TestApp {
    /// Send a request and decode the body as JSON (`Value::Null` when empty or not JSON).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    /// Register an account and return its bearer token and id.
    pub async fn register(&self, username: &str) -> (String, Uuid) {
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/api/auth/register",
                None,
                json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": "correct horse battery staple",
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);

        let token = body["token"].as_str().expect("token").to_string();
        let id = body["user"]["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("user id");
        (token, id)
    }
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("Failed to build request")
}

/// Multipart deposit body with an `amount` field and an optional proof file.
pub fn multipart_deposit(token: &str, amount: &str, proof: Option<(&str, &[u8])>) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"amount\"\r\n\r\n{amount}\r\n"
        )
        .as_bytes(),
    );
    if let Some((filename, data)) = proof {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"proof\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/user/deposit")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .expect("Failed to build request")
}

/// Engine over a fresh in-memory store with one account already registered.
pub async fn engine_with_account() -> (LedgerEngine, Arc<InMemoryAccountStore>, Uuid) {
    init_tracing();

    let store = Arc::new(InMemoryAccountStore::new());
    let account = store
        .create(NewAccount {
            username: "trader".to_string(),
            email: "trader@example.com".to_string(),
            password_hash: PasswordHashString::new("$argon2id$test".to_string()),
        })
        .await
        .expect("Failed to create account");

    (LedgerEngine::new(store.clone()), store, account.id)
}
