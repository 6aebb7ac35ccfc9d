//! Activity records appended to an account's history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Activity kinds, one per [`Activity`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Deposit,
    Withdrawal,
    Plan,
    Signal,
    Kyc,
    Settings,
    Referral,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 7] = [
        Self::Deposit,
        Self::Withdrawal,
        Self::Plan,
        Self::Signal,
        Self::Kyc,
        Self::Settings,
        Self::Referral,
    ];

    /// Get string representation, identical to the serialized `type` tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::Plan => "plan",
            Self::Signal => "signal",
            Self::Kyc => "kyc",
            Self::Settings => "settings",
            Self::Referral => "referral",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable record of an action taken against an account.
///
/// Serialized with a `type` tag and camelCase fields, e.g.
/// `{"type":"deposit","amount":"100.00","proofRef":null,"date":"..."}`.
/// Amounts are exact decimal strings so the stored log always sums to the
/// stored balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Activity {
    Deposit {
        #[serde(with = "rust_decimal::serde::str")]
        amount: Decimal,
        #[serde(default)]
        proof_ref: Option<String>,
        date: DateTime<Utc>,
    },
    Withdrawal {
        #[serde(with = "rust_decimal::serde::str")]
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

impl Activity {
    pub fn kind(&self) -> ActivityKind {
        match self {
            Self::Deposit { .. } => ActivityKind::Deposit,
            Self::Withdrawal { .. } => ActivityKind::Withdrawal,
            Self::Plan { .. } => ActivityKind::Plan,
            Self::Signal { .. } => ActivityKind::Signal,
            Self::Kyc { .. } => ActivityKind::Kyc,
            Self::Settings { .. } => ActivityKind::Settings,
            Self::Referral { .. } => ActivityKind::Referral,
        }
    }

    pub fn date(&self) -> DateTime<Utc> {
        match self {
            Self::Deposit { date, .. }
            | Self::Withdrawal { date, .. }
            | Self::Plan { date, .. }
            | Self::Signal { date, .. }
            | Self::Kyc { date, .. }
            | Self::Settings { date, .. }
            | Self::Referral { date, .. } => *date,
        }
    }

    /// Signed effect on the balance: positive for deposits, negative for
    /// withdrawals, zero otherwise.
    pub fn balance_delta(&self) -> Decimal {
        match self {
            Self::Deposit { amount, .. } => *amount,
            Self::Withdrawal { amount, .. } => -*amount,
            _ => Decimal::ZERO,
        }
    }
}
