pub mod auth;
pub mod ledger;

pub use auth::{AuthResponse, LoginRequest, RegisterRequest, UserSummary};
pub use ledger::*;
