//! HTTP API tests driven through the router with `oneshot`.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{get_request, json_request, multipart_deposit, spawn_app, TEST_JWT_SECRET};
use ledger_service::services::JwtService;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn register_and_login() {
    let app = spawn_app().await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "username": "alice", "email": "alice@example.com", "password": "s3cret!" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert!(body["user"].get("passwordHash").is_none());

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "alice@example.com", "password": "s3cret!" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();

    let (status, profile) = app.send(get_request("/api/user/profile", Some(token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "alice");
}

#[tokio::test]
async fn registration_conflicts_and_missing_fields() {
    let app = spawn_app().await;
    app.register("bob").await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "username": "bobby", "email": "bob@example.com", "password": "pw" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already registered.");

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "username": "bob", "email": "other@example.com", "password": "pw" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Username already taken.");

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/register",
            None,
            json!({ "username": "carol", "email": "carol@example.com" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "All fields are required.");
}

#[tokio::test]
async fn login_failures_are_unauthorized() {
    let app = spawn_app().await;
    app.register("dave").await;

    for body in [
        json!({ "email": "dave@example.com", "password": "wrong" }),
        json!({ "email": "nobody@example.com", "password": "correct horse battery staple" }),
    ] {
        let (status, response) = app
            .send(json_request(Method::POST, "/api/auth/login", None, body))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(response["error"], "Invalid credentials.");
    }
}

#[tokio::test]
async fn credentials_are_required_on_user_routes() {
    let app = spawn_app().await;

    let (status, body) = app.send(get_request("/api/user/deposits", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "No token provided.");

    let basic = Request::builder()
        .uri("/api/user/deposits")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(basic).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .send(get_request("/api/user/deposits", Some("not.a.token")))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Invalid token.");

    let foreign = JwtService::from_secret(b"some-other-secret", 7)
        .generate_access_token(Uuid::new_v4(), "x@example.com")
        .unwrap();
    let (status, _) = app
        .send(get_request("/api/user/deposits", Some(&foreign)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn valid_token_for_missing_account_is_not_found() {
    let app = spawn_app().await;
    let token = JwtService::from_secret(TEST_JWT_SECRET.as_bytes(), 7)
        .generate_access_token(Uuid::new_v4(), "ghost@example.com")
        .unwrap();

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/user/withdrawal",
            Some(&token),
            json!({ "amount": 1 }),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found.");
}

#[tokio::test]
async fn deposit_and_withdrawal_flow() {
    let app = spawn_app().await;
    let (token, _) = app.register("erin").await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/user/deposit",
            Some(&token),
            json!({ "amount": 100 }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 100.0);
    assert_eq!(body["activity"]["type"], "deposit");
    assert_eq!(body["activity"]["amount"], 100.0);
    assert!(body["activity"]["proofRef"].is_null());

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/user/withdrawal",
            Some(&token),
            json!({ "amount": 40 }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 60.0);
    assert_eq!(body["activity"]["type"], "withdrawal");

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/user/withdrawal",
            Some(&token),
            json!({ "amount": 1000 }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Insufficient funds"));

    let (_, deposits) = app.send(get_request("/api/user/deposits", Some(&token))).await;
    let (_, withdrawals) = app
        .send(get_request("/api/user/withdrawals", Some(&token)))
        .await;
    assert_eq!(deposits["deposits"].as_array().unwrap().len(), 1);
    assert_eq!(withdrawals["withdrawals"].as_array().unwrap().len(), 1);

    let (_, profile) = app.send(get_request("/api/user/profile", Some(&token))).await;
    assert_eq!(profile["balance"], 60.0);
    assert_eq!(profile["activities"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn invalid_amounts_are_bad_requests() {
    let app = spawn_app().await;
    let (token, _) = app.register("frank").await;

    for body in [
        json!({ "amount": 0 }),
        json!({ "amount": -5 }),
        json!({}),
        json!({ "amount": "lots" }),
    ] {
        let (status, _) = app
            .send(json_request(
                Method::POST,
                "/api/user/withdrawal",
                Some(&token),
                body.clone(),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
    }

    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/api/user/deposit",
            Some(&token),
            json!({ "amount": "100000000000000000000" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/api/user/deposit")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ amount: "))
        .unwrap();
    let (status, _) = app.send(malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, profile) = app.send(get_request("/api/user/profile", Some(&token))).await;
    assert!(profile["activities"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn multipart_deposit_stores_proof() {
    let app = spawn_app().await;
    let (token, account_id) = app.register("grace").await;

    let (status, body) = app
        .send(multipart_deposit(
            &token,
            "250.50",
            Some(("bank slip.png", b"fake-png-bytes")),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["balance"], 250.5);

    let proof_ref = body["activity"]["proofRef"].as_str().unwrap().to_string();
    assert!(proof_ref.starts_with(&format!("proofs/{}/", account_id)));
    assert!(proof_ref.ends_with("-bank_slip.png"));

    let stored = std::fs::read(app.storage_dir.path().join(&proof_ref)).unwrap();
    assert_eq!(stored, b"fake-png-bytes".to_vec());

    let (status, body) = app.send(multipart_deposit(&token, "10", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 260.5);
    assert!(body["activity"]["proofRef"].is_null());
}

#[tokio::test]
async fn rejected_multipart_deposit_leaves_no_file() {
    let app = spawn_app().await;
    let (token, _) = app.register("heidi").await;

    let (status, _) = app
        .send(multipart_deposit(&token, "-3", Some(("slip.png", b"bytes"))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(multipart_deposit(&token, "abc", Some(("slip.png", b"bytes"))))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(!app.storage_dir.path().join("proofs").exists());

    let (_, deposits) = app.send(get_request("/api/user/deposits", Some(&token))).await;
    assert!(deposits["deposits"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn plans_and_signals_accept_string_or_numeric_ids() {
    let app = spawn_app().await;
    let (token, _) = app.register("ivan").await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/user/plan",
            Some(&token),
            json!({ "planId": 42 }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["activity"]["type"], "plan");
    assert_eq!(body["activity"]["planId"], "42");

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/user/signal/subscribe",
            Some(&token),
            json!({ "signalId": "btc-breakout" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["activity"]["signalId"], "btc-breakout");

    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/api/user/plan",
            Some(&token),
            json!({}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, plans) = app.send(get_request("/api/user/plans", Some(&token))).await;
    let (_, signals) = app.send(get_request("/api/user/signals", Some(&token))).await;
    assert_eq!(plans["plans"].as_array().unwrap().len(), 1);
    assert_eq!(signals["signals"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn kyc_submission_and_status() {
    let app = spawn_app().await;
    let (token, _) = app.register("judy").await;

    let (status, body) = app.send(get_request("/api/user/kyc", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kycStatus"], "unverified");
    assert!(body["kycActivities"].as_array().unwrap().is_empty());

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/user/kyc",
            Some(&token),
            json!({ "kycData": { "document": "passport", "number": "X123" } }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kycStatus"], "pending");

    let (_, body) = app.send(get_request("/api/user/kyc", Some(&token))).await;
    assert_eq!(body["kycStatus"], "pending");
    let submissions = body["kycActivities"].as_array().unwrap();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0]["kycData"]["document"], "passport");

    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/api/user/kyc",
            Some(&token),
            json!({ "kycData": null }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn settings_are_echoed_and_logged() {
    let app = spawn_app().await;
    let (token, _) = app.register("kim").await;

    let (status, body) = app
        .send(json_request(
            Method::PUT,
            "/api/user/settings",
            Some(&token),
            json!({ "settings": { "theme": "dark", "notifications": false } }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["theme"], "dark");

    let (status, body) = app.send(get_request("/api/user/settings", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    let history = body["settingsActivities"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["type"], "settings");
    assert_eq!(history[0]["settings"]["notifications"], false);
}

#[tokio::test]
async fn referrals_are_recorded() {
    let app = spawn_app().await;
    let (token, _) = app.register("leo").await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/user/referral",
            Some(&token),
            json!({ "referredEmail": "friend@example.com" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["referredEmail"], "friend@example.com");

    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/api/user/referral",
            Some(&token),
            json!({}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.send(get_request("/api/user/referrals", Some(&token))).await;
    let referrals = body["referrals"].as_array().unwrap();
    assert_eq!(referrals.len(), 1);
    assert_eq!(referrals[0]["referredEmail"], "friend@example.com");
}

#[tokio::test]
async fn profile_lists_every_activity_without_secrets() {
    let app = spawn_app().await;
    let (token, account_id) = app.register("mia").await;

    app.send(json_request(
        Method::POST,
        "/api/user/deposit",
        Some(&token),
        json!({ "amount": 10 }),
    ))
    .await;
    app.send(json_request(
        Method::POST,
        "/api/user/plan",
        Some(&token),
        json!({ "planId": "gold" }),
    ))
    .await;

    let (status, body) = app.send(get_request("/api/user/profile", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], account_id.to_string());
    assert_eq!(body["email"], "mia@example.com");
    assert_eq!(body["kycStatus"], "unverified");
    assert!(body["createdAt"].as_str().is_some());
    assert!(body.get("passwordHash").is_none());
    assert!(body.get("password_hash").is_none());

    let kinds: Vec<&str> = body["activities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|activity| activity["type"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["deposit", "plan"]);
}

#[tokio::test]
async fn operational_endpoints() {
    let app = spawn_app().await;

    let response = {
        use tower::ServiceExt;
        app.router
            .clone()
            .oneshot(get_request("/", None))
            .await
            .unwrap()
    };
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let (status, body) = app.send(get_request("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.send(get_request("/ready", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    // Generate at least one labelled sample before scraping
    app.send(get_request("/api/user/profile", None)).await;
    let (status, _) = app.send(get_request("/metrics", None)).await;
    assert_eq!(status, StatusCode::OK);
}
