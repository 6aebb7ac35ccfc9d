//! Persistence boundary for accounts.

use async_trait::async_trait;
use uuid::Uuid;

use super::LedgerError;
use crate::models::{Account, NewAccount};

/// Account persistence.
///
/// `save` is a compare-and-set on [`Account::version`]: it succeeds only if
/// the stored version still equals the version the caller loaded, and
/// returns the account carrying the new version. A lost race surfaces as
/// [`LedgerError::StaleWrite`].
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, LedgerError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, LedgerError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, LedgerError>;

    /// Insert a new account. Fails with [`LedgerError::Conflict`] when the
    /// email or username is taken.
    async fn create(&self, input: NewAccount) -> Result<Account, LedgerError>;

    async fn save(&self, account: &Account) -> Result<Account, LedgerError>;

    async fn health_check(&self) -> Result<(), LedgerError>;
}

pub(crate) const EMAIL_TAKEN: &str = "Email already registered.";
pub(crate) const USERNAME_TAKEN: &str = "Username already taken.";
