use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::header,
    Json,
};
use rust_decimal::Decimal;
use service_core::error::AppError;

use crate::dtos::{
    activity_bodies, identifier, ActivityBody, ActivityResponse, BalanceResponse,
    DepositRequest, DepositsResponse, KycRequest, KycStateResponse, KycStatusResponse,
    PlanRequest, PlansResponse, ReferralRequest, ReferralResponse, ReferralsResponse,
    SettingsHistoryResponse, SettingsRequest, SettingsResponse, SignalRequest, SignalsResponse,
    WithdrawalRequest, WithdrawalsResponse,
};
use crate::middleware::AuthUser;
use crate::models::{Activity, ActivityKind, Operation};
use crate::services::storage::{proof_key, MAX_PROOF_BYTES};
use crate::services::LedgerError;
use crate::startup::AppState;
use crate::utils::ValidatedJson;

/// Deposit body after parsing either JSON or multipart form data.
struct DepositForm {
    amount: Option<Decimal>,
    proof: Option<ProofUpload>,
}

struct ProofUpload {
    filename: Option<String>,
    data: Vec<u8>,
}

impl DepositForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = DepositForm {
            amount: None,
            proof: None,
        };

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
        })? {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(str::to_string);

            if name == "amount" {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Failed to read amount: {}", e))
                })?;
                let amount = text.trim().parse::<Decimal>().map_err(|_| {
                    LedgerError::InvalidInput("Amount must be a positive number".to_string())
                })?;
                form.amount = Some(amount);
            } else if filename.is_some() || name == "proof" {
                let data = field.bytes().await.map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e))
                })?;
                if data.len() > MAX_PROOF_BYTES {
                    return Err(LedgerError::InvalidInput(format!(
                        "File too large (max {}MB)",
                        MAX_PROOF_BYTES / (1024 * 1024)
                    ))
                    .into());
                }
                // An empty file input still sends a part
                if !data.is_empty() {
                    form.proof = Some(ProofUpload {
                        filename,
                        data: data.to_vec(),
                    });
                }
            }
        }

        Ok(form)
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Credit the account, optionally attaching an uploaded proof file.
pub async fn deposit(
    State(state): State<AppState>,
    user: AuthUser,
    req: Request,
) -> Result<Json<BalanceResponse>, AppError> {
    let form = if is_multipart(&req) {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e.body_text())))?;
        DepositForm::from_multipart(multipart).await?
    } else {
        let ValidatedJson(body) = ValidatedJson::<DepositRequest>::from_request(req, &state).await?;
        DepositForm {
            amount: body.amount,
            proof: None,
        }
    };

    let amount = form
        .amount
        .ok_or_else(|| LedgerError::InvalidInput("amount is required".to_string()))?;

    // Reject bad amounts before anything is written to storage
    Operation::Deposit {
        amount,
        proof_ref: None,
    }
    .validate()?;

    let proof_ref = match form.proof {
        Some(proof) => {
            let key = proof_key(user.account_id, proof.filename.as_deref());
            let reference = state.storage.upload(&key, proof.data).await.map_err(|e| {
                tracing::error!(storage_key = %key, error = %e, "Failed to store deposit proof");
                e
            })?;
            Some(reference)
        }
        None => None,
    };

    match state
        .ledger
        .deposit(user.account_id, amount, proof_ref.clone())
        .await
    {
        Ok(outcome) => Ok(Json(BalanceResponse::from(outcome))),
        Err(e) => {
            if let Some(reference) = proof_ref {
                if let Err(cleanup) = state.storage.delete(&reference).await {
                    tracing::warn!(
                        storage_key = %reference,
                        error = %cleanup,
                        "Failed to remove orphaned deposit proof"
                    );
                }
            }
            Err(e.into())
        }
    }
}

pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<WithdrawalRequest>,
) -> Result<Json<BalanceResponse>, AppError> {
    let amount = req
        .amount
        .ok_or_else(|| LedgerError::InvalidInput("amount is required".to_string()))?;

    let outcome = state.ledger.withdraw(user.account_id, amount).await?;
    Ok(Json(BalanceResponse::from(outcome)))
}

pub async fn subscribe_plan(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<PlanRequest>,
) -> Result<Json<ActivityResponse>, AppError> {
    let outcome = state
        .ledger
        .subscribe_plan(user.account_id, identifier(req.plan_id))
        .await?;
    Ok(Json(ActivityResponse {
        activity: outcome.activity.into(),
    }))
}

pub async fn subscribe_signal(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<SignalRequest>,
) -> Result<Json<ActivityResponse>, AppError> {
    let outcome = state
        .ledger
        .subscribe_signal(user.account_id, identifier(req.signal_id))
        .await?;
    Ok(Json(ActivityResponse {
        activity: outcome.activity.into(),
    }))
}

pub async fn submit_kyc(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<KycRequest>,
) -> Result<Json<KycStatusResponse>, AppError> {
    let outcome = state
        .ledger
        .submit_kyc(user.account_id, req.kyc_data.unwrap_or_default())
        .await?;
    Ok(Json(KycStatusResponse {
        kyc_status: outcome.kyc_status,
    }))
}

pub async fn get_kyc(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<KycStateResponse>, AppError> {
    let kyc = state.ledger.kyc_state(user.account_id).await?;
    Ok(Json(KycStateResponse::from(kyc)))
}

pub async fn update_settings(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<SettingsRequest>,
) -> Result<Json<SettingsResponse>, AppError> {
    let settings = req.settings.unwrap_or_default();
    state
        .ledger
        .update_settings(user.account_id, settings.clone())
        .await?;
    Ok(Json(SettingsResponse { settings }))
}

pub async fn get_settings(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<SettingsHistoryResponse>, AppError> {
    let settings_activities = list(&state, user, ActivityKind::Settings).await?;
    Ok(Json(SettingsHistoryResponse {
        settings_activities,
    }))
}

pub async fn add_referral(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<ReferralRequest>,
) -> Result<Json<ReferralResponse>, AppError> {
    let outcome = state
        .ledger
        .add_referral(user.account_id, req.referred_email.unwrap_or_default())
        .await?;

    let referred_email = match outcome.activity {
        Activity::Referral { referred_email, .. } => referred_email,
        other => {
            return Err(AppError::InternalError(anyhow::anyhow!(
                "Referral produced a {} activity",
                other.kind()
            )))
        }
    };
    Ok(Json(ReferralResponse { referred_email }))
}

async fn list(
    state: &AppState,
    user: AuthUser,
    kind: ActivityKind,
) -> Result<Vec<ActivityBody>, AppError> {
    let activities = state.ledger.list_activities(user.account_id, kind).await?;
    Ok(activity_bodies(activities))
}

pub async fn list_deposits(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<DepositsResponse>, AppError> {
    let deposits = list(&state, user, ActivityKind::Deposit).await?;
    Ok(Json(DepositsResponse { deposits }))
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<WithdrawalsResponse>, AppError> {
    let withdrawals = list(&state, user, ActivityKind::Withdrawal).await?;
    Ok(Json(WithdrawalsResponse { withdrawals }))
}

pub async fn list_plans(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PlansResponse>, AppError> {
    let plans = list(&state, user, ActivityKind::Plan).await?;
    Ok(Json(PlansResponse { plans }))
}

pub async fn list_signals(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<SignalsResponse>, AppError> {
    let signals = list(&state, user, ActivityKind::Signal).await?;
    Ok(Json(SignalsResponse { signals }))
}

pub async fn list_referrals(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ReferralsResponse>, AppError> {
    let referrals = list(&state, user, ActivityKind::Referral).await?;
    Ok(Json(ReferralsResponse { referrals }))
}
