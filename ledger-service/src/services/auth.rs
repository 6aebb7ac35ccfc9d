use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::metrics::ACCOUNTS_CREATED;
use super::store::{AccountStore, EMAIL_TAKEN, USERNAME_TAKEN};
use super::{JwtService, LedgerError};
use crate::models::{Account, NewAccount};
use crate::utils::{hash_password, verify_password, Password};

/// Token plus the account it was issued for.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub account: Account,
}

/// Registration and login.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AccountStore>,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(store: Arc<dyn AccountStore>, jwt: JwtService) -> Self {
        Self { store, jwt }
    }

    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: Password,
    ) -> Result<AuthSession, LedgerError> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() || password.as_str().is_empty() {
            return Err(LedgerError::InvalidInput(
                "All fields are required.".to_string(),
            ));
        }

        if self.store.find_by_email(email).await?.is_some() {
            return Err(LedgerError::Conflict(EMAIL_TAKEN.to_string()));
        }
        if self.store.find_by_username(username).await?.is_some() {
            return Err(LedgerError::Conflict(USERNAME_TAKEN.to_string()));
        }

        // Argon2 is CPU-bound
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| LedgerError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
            .map_err(LedgerError::Internal)?;

        let account = self
            .store
            .create(NewAccount {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await?;

        ACCOUNTS_CREATED.inc();
        info!(account_id = %account.id, "Account registered");

        self.session(account)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: Password) -> Result<AuthSession, LedgerError> {
        let email = email.trim();
        if email.is_empty() || password.as_str().is_empty() {
            return Err(LedgerError::InvalidInput(
                "Email and password required.".to_string(),
            ));
        }

        let Some(account) = self.store.find_by_email(email).await? else {
            return Err(LedgerError::InvalidCredentials);
        };

        let password_hash = account.password_hash.clone();
        let verified =
            tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
                .await
                .map_err(|e| {
                    LedgerError::Internal(anyhow::anyhow!("Verification task failed: {}", e))
                })?;

        if verified.is_err() {
            warn!(account_id = %account.id, "Login failed: wrong password");
            return Err(LedgerError::InvalidCredentials);
        }

        self.session(account)
    }

    fn session(&self, account: Account) -> Result<AuthSession, LedgerError> {
        let token = self
            .jwt
            .generate_access_token(account.id, &account.email)
            .map_err(LedgerError::Internal)?;
        Ok(AuthSession { token, account })
    }
}
