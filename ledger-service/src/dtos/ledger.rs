use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Account, Activity, KycStatus};
use crate::services::{KycState, MutationOutcome};

/// JSON deposit body; multipart uploads carry the same `amount` field.
#[derive(Debug, Deserialize, Validate)]
pub struct DepositRequest {
    #[serde(default)]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct WithdrawalRequest {
    #[serde(default)]
    pub amount: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    #[serde(default)]
    pub plan_id: Option<Value>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignalRequest {
    #[serde(default)]
    pub signal_id: Option<Value>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct KycRequest {
    #[serde(default)]
    pub kyc_data: Option<Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SettingsRequest {
    #[serde(default)]
    pub settings: Option<Value>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReferralRequest {
    #[validate(email(message = "Invalid email format"))]
    pub referred_email: Option<String>,
}

/// Plan and signal identifiers arrive as strings or numbers.
///
/// Anything else becomes an empty identifier and is rejected downstream.
pub fn identifier(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Activity as rendered to clients: same shape as the stored record, with
/// amounts as JSON numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ActivityBody {
    Deposit {
        #[serde(with = "rust_decimal::serde::float")]
        amount: Decimal,
        proof_ref: Option<String>,
        date: DateTime<Utc>,
    },
    Withdrawal {
        #[serde(with = "rust_decimal::serde::float")]
        amount: Decimal,
        date: DateTime<Utc>,
    },
    Plan {
        plan_id: String,
        date: DateTime<Utc>,
    },
    Signal {
        signal_id: String,
        date: DateTime<Utc>,
    },
    Kyc {
        kyc_data: Value,
        date: DateTime<Utc>,
    },
    Settings {
        settings: Value,
        date: DateTime<Utc>,
    },
    Referral {
        referred_email: String,
        date: DateTime<Utc>,
    },
}

impl From<Activity> for ActivityBody {
    fn from(activity: Activity) -> Self {
        match activity {
            Activity::Deposit {
                amount,
                proof_ref,
                date,
            } => Self::Deposit {
                amount,
                proof_ref,
                date,
            },
            Activity::Withdrawal { amount, date } => Self::Withdrawal { amount, date },
            Activity::Plan { plan_id, date } => Self::Plan { plan_id, date },
            Activity::Signal { signal_id, date } => Self::Signal { signal_id, date },
            Activity::Kyc { kyc_data, date } => Self::Kyc { kyc_data, date },
            Activity::Settings { settings, date } => Self::Settings { settings, date },
            Activity::Referral {
                referred_email,
                date,
            } => Self::Referral {
                referred_email,
                date,
            },
        }
    }
}

pub fn activity_bodies(activities: Vec<Activity>) -> Vec<ActivityBody> {
    activities.into_iter().map(ActivityBody::from).collect()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub activity: ActivityBody,
}

impl From<MutationOutcome> for BalanceResponse {
    fn from(outcome: MutationOutcome) -> Self {
        Self {
            balance: outcome.balance,
            activity: outcome.activity.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub activity: ActivityBody,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycStatusResponse {
    pub kyc_status: KycStatus,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycStateResponse {
    pub kyc_status: KycStatus,
    pub kyc_activities: Vec<ActivityBody>,
}

impl From<KycState> for KycStateResponse {
    fn from(state: KycState) -> Self {
        Self {
            kyc_status: state.kyc_status,
            kyc_activities: activity_bodies(state.kyc_activities),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub settings: Value,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsHistoryResponse {
    pub settings_activities: Vec<ActivityBody>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralResponse {
    pub referred_email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DepositsResponse {
    pub deposits: Vec<ActivityBody>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawalsResponse {
    pub withdrawals: Vec<ActivityBody>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlansResponse {
    pub plans: Vec<ActivityBody>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignalsResponse {
    pub signals: Vec<ActivityBody>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferralsResponse {
    pub referrals: Vec<ActivityBody>,
}

/// Account snapshot without the password hash.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub kyc_status: KycStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub activities: Vec<ActivityBody>,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for ProfileResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            kyc_status: account.kyc_status,
            balance: account.balance,
            activities: activity_bodies(account.activities),
            created_at: account.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identifiers_accept_strings_and_numbers() {
        assert_eq!(identifier(Some(json!("gold"))), "gold");
        assert_eq!(identifier(Some(json!(42))), "42");
        assert_eq!(identifier(Some(json!({ "id": 1 }))), "");
        assert_eq!(identifier(None), "");
    }

    #[test]
    fn amounts_parse_from_numbers_and_strings() {
        let body: WithdrawalRequest = serde_json::from_value(json!({ "amount": 40.5 })).unwrap();
        assert_eq!(body.amount, Some(Decimal::new(405, 1)));

        let body: WithdrawalRequest = serde_json::from_value(json!({ "amount": "12" })).unwrap();
        assert_eq!(body.amount, Some(Decimal::from(12)));

        let body: WithdrawalRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(body.amount, None);
    }

    #[test]
    fn profile_hides_password_hash() {
        let account = Account::new(
            crate::models::NewAccount {
                username: "trader".to_string(),
                email: "trader@example.com".to_string(),
                password_hash: crate::utils::PasswordHashString::new("$argon2id$x".to_string()),
            },
            Utc::now(),
        );

        let body = serde_json::to_value(ProfileResponse::from(account)).unwrap();

        assert!(body.get("passwordHash").is_none());
        assert_eq!(body["kycStatus"], "unverified");
        assert_eq!(body["balance"], 0.0);
    }

    #[test]
    fn activity_amounts_render_as_numbers() {
        let activity = Activity::Withdrawal {
            amount: Decimal::new(4050, 2),
            date: Utc::now(),
        };

        let body = serde_json::to_value(ActivityBody::from(activity)).unwrap();

        assert_eq!(body["type"], "withdrawal");
        assert_eq!(body["amount"], json!(40.5));
    }
}
