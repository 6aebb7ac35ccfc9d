use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::dtos::ProfileResponse;
use crate::middleware::AuthUser;
use crate::startup::AppState;

/// Full account snapshot, password hash excluded.
pub async fn profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let account = state.ledger.profile(user.account_id).await?;
    Ok(Json(ProfileResponse::from(account)))
}
