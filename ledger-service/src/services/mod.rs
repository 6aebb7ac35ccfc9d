pub mod auth;
pub mod database;
pub mod error;
pub mod jwt;
pub mod ledger;
pub mod memory;
pub mod metrics;
pub mod storage;
pub mod store;

pub use auth::{AuthService, AuthSession};
pub use database::PgAccountStore;
pub use error::LedgerError;
pub use jwt::{AccessTokenClaims, JwtService};
pub use ledger::{KycState, LedgerEngine, MutationOutcome};
pub use memory::InMemoryAccountStore;
pub use storage::{LocalStorage, Storage};
pub use store::AccountStore;
