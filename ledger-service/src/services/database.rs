//! PostgreSQL account store for ledger-service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use super::metrics::DB_QUERY_DURATION;
use super::store::{AccountStore, EMAIL_TAKEN, USERNAME_TAKEN};
use super::LedgerError;
use crate::models::{Account, Activity, KycStatus, NewAccount};
use crate::utils::PasswordHashString;

const ACCOUNT_COLUMNS: &str =
    "id, email, username, password_hash, kyc_status, balance, activities, created_at, version";

/// Row shape of the `accounts` table.
#[derive(Debug, FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    username: String,
    password_hash: String,
    kyc_status: String,
    balance: Decimal,
    activities: Json<Vec<Activity>>,
    created_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<AccountRow> for Account {
    type Error = LedgerError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let kyc_status: KycStatus = row
            .kyc_status
            .parse()
            .map_err(|e: String| LedgerError::Store(anyhow::anyhow!(e)))?;

        Ok(Account {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: PasswordHashString::new(row.password_hash),
            kyc_status,
            balance: row.balance,
            activities: row.activities.0,
            created_at: row.created_at,
            version: row.version,
        })
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "ledger-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, LedgerError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| LedgerError::Store(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), LedgerError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::Store(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn find_one(
        &self,
        operation: &str,
        column: &str,
        bind: FindKey<'_>,
    ) -> Result<Option<Account>, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&[operation])
            .start_timer();

        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {column} = $1");
        let query = sqlx::query_as::<_, AccountRow>(&sql);
        let query = match bind {
            FindKey::Id(id) => query.bind(id),
            FindKey::Text(text) => query.bind(text),
        };

        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LedgerError::Store(anyhow::anyhow!("Failed to {}: {}", operation, e)))?;

        timer.observe_duration();

        row.map(Account::try_from).transpose()
    }
}

enum FindKey<'a> {
    Id(Uuid),
    Text(&'a str),
}

#[async_trait]
impl AccountStore for PgAccountStore {
    #[instrument(skip(self), fields(account_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, LedgerError> {
        self.find_one("find_account_by_id", "id", FindKey::Id(id)).await
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, LedgerError> {
        self.find_one("find_account_by_email", "email", FindKey::Text(email))
            .await
    }

    #[instrument(skip(self))]
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, LedgerError> {
        self.find_one("find_account_by_username", "username", FindKey::Text(username))
            .await
    }

    #[instrument(skip(self, input), fields(username = %input.username))]
    async fn create(&self, input: NewAccount) -> Result<Account, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_account"])
            .start_timer();

        let sql = format!(
            "INSERT INTO accounts (id, email, username, password_hash) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.email)
            .bind(&input.username)
            .bind(input.password_hash.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    match db_err.constraint() {
                        Some(constraint) if constraint.contains("username") => {
                            LedgerError::Conflict(USERNAME_TAKEN.to_string())
                        }
                        _ => LedgerError::Conflict(EMAIL_TAKEN.to_string()),
                    }
                }
                _ => LedgerError::Store(anyhow::anyhow!("Failed to create account: {}", e)),
            })?;

        timer.observe_duration();

        let account = Account::try_from(row)?;
        info!(account_id = %account.id, "Account created");
        Ok(account)
    }

    #[instrument(skip(self, account), fields(account_id = %account.id, version = account.version))]
    async fn save(&self, account: &Account) -> Result<Account, LedgerError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["save_account"])
            .start_timer();

        let sql = format!(
            "UPDATE accounts \
             SET kyc_status = $2, balance = $3, activities = $4, version = version + 1 \
             WHERE id = $1 AND version = $5 \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(account.id)
            .bind(account.kyc_status.as_str())
            .bind(account.balance)
            .bind(Json(&account.activities))
            .bind(account.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LedgerError::Store(anyhow::anyhow!("Failed to save account: {}", e)))?;

        timer.observe_duration();

        match row {
            Some(row) => Account::try_from(row),
            None => {
                // Either the account vanished or a concurrent writer bumped the version
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM accounts WHERE id = $1)")
                        .bind(account.id)
                        .fetch_one(&self.pool)
                        .await?;
                if exists {
                    Err(LedgerError::StaleWrite)
                } else {
                    Err(LedgerError::AccountNotFound)
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::Store(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }
}
