//! In-memory account store for local development and tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::store::{AccountStore, EMAIL_TAKEN, USERNAME_TAKEN};
use super::LedgerError;
use crate::models::{Account, NewAccount};

#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, Account>>, LedgerError> {
        self.accounts
            .lock()
            .map_err(|e| LedgerError::Store(anyhow::anyhow!("Account store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, LedgerError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, LedgerError> {
        Ok(self
            .lock()?
            .values()
            .find(|account| account.email == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, LedgerError> {
        Ok(self
            .lock()?
            .values()
            .find(|account| account.username == username)
            .cloned())
    }

    async fn create(&self, input: NewAccount) -> Result<Account, LedgerError> {
        let mut accounts = self.lock()?;

        if accounts.values().any(|a| a.email == input.email) {
            return Err(LedgerError::Conflict(EMAIL_TAKEN.to_string()));
        }
        if accounts.values().any(|a| a.username == input.username) {
            return Err(LedgerError::Conflict(USERNAME_TAKEN.to_string()));
        }

        let account = Account::new(input, Utc::now());
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn save(&self, account: &Account) -> Result<Account, LedgerError> {
        let mut accounts = self.lock()?;

        let stored = accounts
            .get_mut(&account.id)
            .ok_or(LedgerError::AccountNotFound)?;

        if stored.version != account.version {
            return Err(LedgerError::StaleWrite);
        }

        let mut saved = account.clone();
        saved.version += 1;
        *stored = saved.clone();
        Ok(saved)
    }

    async fn health_check(&self) -> Result<(), LedgerError> {
        self.lock().map(|_| ())
    }
}
