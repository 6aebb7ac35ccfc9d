//! Account model: identity, balance, verification status and activity log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::activity::{Activity, ActivityKind};
use crate::services::LedgerError;
use crate::utils::PasswordHashString;

/// KYC verification status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    #[default]
    Unverified,
    Pending,
    Verified,
    Rejected,
}

impl KycStatus {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for KycStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unverified" => Ok(Self::Unverified),
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid KYC status: {}", s)),
        }
    }
}

impl std::fmt::Display for KycStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User account.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub password_hash: PasswordHashString,
    pub kyc_status: KycStatus,
    pub balance: Decimal,
    pub activities: Vec<Activity>,
    pub created_at: DateTime<Utc>,
    /// Incremented on every committed save; guards against lost updates.
    pub version: i64,
}

/// Input for creating a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password_hash: PasswordHashString,
}

/// A single activity-producing mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Deposit {
        amount: Decimal,
        proof_ref: Option<String>,
    },
    Withdraw {
        amount: Decimal,
    },
    SubscribePlan {
        plan_id: String,
    },
    SubscribeSignal {
        signal_id: String,
    },
    SubmitKyc {
        kyc_data: Value,
    },
    UpdateSettings {
        settings: Value,
    },
    AddReferral {
        referred_email: String,
    },
}

impl Operation {
    /// Operation name used for logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::SubscribePlan { .. } => "subscribe_plan",
            Self::SubscribeSignal { .. } => "subscribe_signal",
            Self::SubmitKyc { .. } => "submit_kyc",
            Self::UpdateSettings { .. } => "update_settings",
            Self::AddReferral { .. } => "add_referral",
        }
    }

    /// Check operation-specific input without looking at account state.
    pub fn validate(&self) -> Result<(), LedgerError> {
        match self {
            Self::Deposit { amount, .. } | Self::Withdraw { amount } => {
                if *amount <= Decimal::ZERO {
                    return Err(LedgerError::InvalidInput(
                        "Amount must be a positive number".to_string(),
                    ));
                }
                if *amount >= amount_limit() {
                    return Err(LedgerError::InvalidInput(
                        "Amount exceeds the supported range".to_string(),
                    ));
                }
                if amount.normalize().scale() > MAX_AMOUNT_SCALE {
                    return Err(LedgerError::InvalidInput(format!(
                        "Amount supports at most {} decimal places",
                        MAX_AMOUNT_SCALE
                    )));
                }
            }
            Self::SubscribePlan { plan_id } => require_text("planId", plan_id)?,
            Self::SubscribeSignal { signal_id } => require_text("signalId", signal_id)?,
            Self::AddReferral { referred_email } => {
                require_text("referredEmail", referred_email)?
            }
            Self::SubmitKyc { kyc_data } => require_payload("kycData", kyc_data)?,
            Self::UpdateSettings { settings } => require_payload("settings", settings)?,
        }
        Ok(())
    }
}

/// Matches the precision of the `balance` column.
const MAX_AMOUNT_SCALE: u32 = 8;

/// Exclusive upper bound for amounts and balances: `NUMERIC(28, 8)` holds
/// 20 integer digits.
pub fn amount_limit() -> Decimal {
    Decimal::from_i128_with_scale(100_000_000_000_000_000_000, 0)
}

fn require_text(field: &str, value: &str) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        return Err(LedgerError::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

fn require_payload(field: &str, value: &Value) -> Result<(), LedgerError> {
    if value.is_null() {
        return Err(LedgerError::InvalidInput(format!("{} is required", field)));
    }
    Ok(())
}

impl Account {
    /// Build a fresh account from registration input.
    pub fn new(input: NewAccount, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: input.email,
            username: input.username,
            password_hash: input.password_hash,
            kyc_status: KycStatus::Unverified,
            balance: Decimal::ZERO,
            activities: Vec::new(),
            created_at: now,
            version: 0,
        }
    }

    /// Apply one operation in memory and return the appended activity.
    ///
    /// On error the account is left untouched.
    pub fn apply(&mut self, operation: Operation, now: DateTime<Utc>) -> Result<Activity, LedgerError> {
        operation.validate()?;

        let activity = match operation {
            Operation::Deposit { amount, proof_ref } => {
                self.balance = self
                    .balance
                    .checked_add(amount)
                    .filter(|balance| *balance < amount_limit())
                    .ok_or_else(|| {
                        LedgerError::InvalidInput(
                            "Balance would exceed the supported range".to_string(),
                        )
                    })?;
                Activity::Deposit {
                    amount,
                    proof_ref,
                    date: now,
                }
            }
            Operation::Withdraw { amount } => {
                if amount > self.balance {
                    return Err(LedgerError::InsufficientFunds {
                        requested: amount,
                        available: self.balance,
                    });
                }
                self.balance -= amount;
                Activity::Withdrawal { amount, date: now }
            }
            Operation::SubscribePlan { plan_id } => Activity::Plan { plan_id, date: now },
            Operation::SubscribeSignal { signal_id } => Activity::Signal {
                signal_id,
                date: now,
            },
            Operation::SubmitKyc { kyc_data } => {
                self.kyc_status = KycStatus::Pending;
                Activity::Kyc {
                    kyc_data,
                    date: now,
                }
            }
            Operation::UpdateSettings { settings } => Activity::Settings {
                settings,
                date: now,
            },
            Operation::AddReferral { referred_email } => Activity::Referral {
                referred_email: referred_email.trim().to_string(),
                date: now,
            },
        };

        self.activities.push(activity.clone());
        Ok(activity)
    }

    /// Activities of one kind, in insertion order.
    pub fn activities_of(&self, kind: ActivityKind) -> Vec<Activity> {
        self.activities
            .iter()
            .filter(|activity| activity.kind() == kind)
            .cloned()
            .collect()
    }
}
