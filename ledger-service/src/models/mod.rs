//! Domain models for ledger-service.

mod account;
mod activity;

pub use account::{amount_limit, Account, KycStatus, NewAccount, Operation};
pub use activity::{Activity, ActivityKind};
