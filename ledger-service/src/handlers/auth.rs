use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service_core::error::AppError;

use crate::dtos::{AuthResponse, LoginRequest, RegisterRequest};
use crate::startup::AppState;
use crate::utils::{Password, ValidatedJson};

/// Register a new account and issue a token.
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .auth
        .register(
            req.username.as_deref().unwrap_or_default(),
            req.email.as_deref().unwrap_or_default(),
            Password::new(req.password.unwrap_or_default()),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(AuthResponse::from(session))))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state
        .auth
        .login(
            req.email.as_deref().unwrap_or_default(),
            Password::new(req.password.unwrap_or_default()),
        )
        .await?;

    Ok(Json(AuthResponse::from(session)))
}
