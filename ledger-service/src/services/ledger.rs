//! Ledger engine: balance and activity-log mutations for a single account.
//!
//! Every mutation is load, apply in memory, then compare-and-set save. A
//! save that loses a race with another writer is retried against a fresh
//! copy of the account, so concurrent operations on one account behave as
//! if they ran one after another.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use service_core::retry::{retry_with_backoff, RetryConfig};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::metrics::{ERRORS_TOTAL, LEDGER_OPERATIONS_TOTAL};
use super::store::AccountStore;
use super::LedgerError;
use crate::models::{Account, Activity, ActivityKind, KycStatus, Operation};

/// Result of a committed mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    pub balance: Decimal,
    pub kyc_status: KycStatus,
    pub activity: Activity,
}

/// KYC status together with every KYC submission, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct KycState {
    pub kyc_status: KycStatus,
    pub kyc_activities: Vec<Activity>,
}

#[derive(Clone)]
pub struct LedgerEngine {
    store: Arc<dyn AccountStore>,
    retry: RetryConfig,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self {
            store,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub async fn deposit(
        &self,
        account_id: Uuid,
        amount: Decimal,
        proof_ref: Option<String>,
    ) -> Result<MutationOutcome, LedgerError> {
        self.execute(account_id, Operation::Deposit { amount, proof_ref })
            .await
    }

    pub async fn withdraw(
        &self,
        account_id: Uuid,
        amount: Decimal,
    ) -> Result<MutationOutcome, LedgerError> {
        self.execute(account_id, Operation::Withdraw { amount }).await
    }

    pub async fn subscribe_plan(
        &self,
        account_id: Uuid,
        plan_id: String,
    ) -> Result<MutationOutcome, LedgerError> {
        self.execute(account_id, Operation::SubscribePlan { plan_id })
            .await
    }

    pub async fn subscribe_signal(
        &self,
        account_id: Uuid,
        signal_id: String,
    ) -> Result<MutationOutcome, LedgerError> {
        self.execute(account_id, Operation::SubscribeSignal { signal_id })
            .await
    }

    /// Record a KYC submission and move the account to `pending`.
    ///
    /// Resubmitting from `verified` is allowed and also lands in `pending`.
    pub async fn submit_kyc(
        &self,
        account_id: Uuid,
        kyc_data: Value,
    ) -> Result<MutationOutcome, LedgerError> {
        self.execute(account_id, Operation::SubmitKyc { kyc_data })
            .await
    }

    /// Record a settings change. Settings are kept only in the activity log.
    pub async fn update_settings(
        &self,
        account_id: Uuid,
        settings: Value,
    ) -> Result<MutationOutcome, LedgerError> {
        self.execute(account_id, Operation::UpdateSettings { settings })
            .await
    }

    pub async fn add_referral(
        &self,
        account_id: Uuid,
        referred_email: String,
    ) -> Result<MutationOutcome, LedgerError> {
        self.execute(account_id, Operation::AddReferral { referred_email })
            .await
    }

    /// Apply one operation atomically with respect to other writers.
    #[instrument(skip(self, operation), fields(account_id = %account_id, operation = operation.name()))]
    pub async fn execute(
        &self,
        account_id: Uuid,
        operation: Operation,
    ) -> Result<MutationOutcome, LedgerError> {
        let name = operation.name();

        let result = match operation.validate() {
            Ok(()) => {
                retry_with_backoff(
                    &self.retry,
                    name,
                    |e: &LedgerError| matches!(e, LedgerError::StaleWrite),
                    || self.attempt(account_id, operation.clone(), Utc::now()),
                )
                .await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(outcome) => {
                LEDGER_OPERATIONS_TOTAL
                    .with_label_values(&[name, "ok"])
                    .inc();
                info!(balance = %outcome.balance, "Ledger operation committed");
            }
            Err(e) => {
                LEDGER_OPERATIONS_TOTAL
                    .with_label_values(&[name, e.kind()])
                    .inc();
                if matches!(
                    e,
                    LedgerError::StaleWrite | LedgerError::Store(_) | LedgerError::Internal(_)
                ) {
                    ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
                    warn!(error = %e, "Ledger operation failed");
                }
            }
        }

        result
    }

    async fn attempt(
        &self,
        account_id: Uuid,
        operation: Operation,
        now: DateTime<Utc>,
    ) -> Result<MutationOutcome, LedgerError> {
        let mut account = self.load(account_id).await?;

        if matches!(operation, Operation::SubmitKyc { .. })
            && account.kyc_status == KycStatus::Verified
        {
            warn!(%account_id, "KYC resubmitted by a verified account, status reset to pending");
        }

        let activity = account.apply(operation, now)?;
        let saved = self.store.save(&account).await?;

        Ok(MutationOutcome {
            balance: saved.balance,
            kyc_status: saved.kyc_status,
            activity,
        })
    }

    async fn load(&self, account_id: Uuid) -> Result<Account, LedgerError> {
        self.store
            .find_by_id(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound)
    }

    /// Activities of one kind, oldest first.
    #[instrument(skip(self), fields(account_id = %account_id, kind = %kind))]
    pub async fn list_activities(
        &self,
        account_id: Uuid,
        kind: ActivityKind,
    ) -> Result<Vec<Activity>, LedgerError> {
        Ok(self.load(account_id).await?.activities_of(kind))
    }

    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn kyc_state(&self, account_id: Uuid) -> Result<KycState, LedgerError> {
        let account = self.load(account_id).await?;
        Ok(KycState {
            kyc_status: account.kyc_status,
            kyc_activities: account.activities_of(ActivityKind::Kyc),
        })
    }

    /// Full account snapshot for the profile view.
    #[instrument(skip(self), fields(account_id = %account_id))]
    pub async fn profile(&self, account_id: Uuid) -> Result<Account, LedgerError> {
        self.load(account_id).await
    }
}
