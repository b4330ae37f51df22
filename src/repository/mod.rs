//! Repository module
//!
//! Persistence port for users, bank accounts, cards and money transfers.
//! `PgRepository` is the PostgreSQL adapter; `InMemoryRepository` backs
//! tests and the `STORAGE=memory` demo mode.

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PgRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{BankAccount, BankUser, Card, MoneyTransfer};

/// Errors that can occur in a repository
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A row references an account that does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// A debit would take the balance below zero
    #[error("Insufficient funds on account {account_id}: available {available}")]
    InsufficientFunds {
        account_id: String,
        available: Decimal,
    },

    /// Unique constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RepositoryError {
    /// Map unique-constraint violations to `Conflict`
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(what.to_string())
            }
            _ => RepositoryError::Database(err),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Database repository abstraction
#[async_trait]
pub trait BankRepository: Send + Sync {
    // === Users ===

    /// Insert a user; `Conflict` when the normalized user name is taken
    async fn insert_user(&self, user: &BankUser) -> RepositoryResult<()>;

    async fn find_user(&self, id: &str) -> RepositoryResult<Option<BankUser>>;

    async fn find_user_by_normalized_name(
        &self,
        normalized_user_name: &str,
    ) -> RepositoryResult<Option<BankUser>>;

    async fn find_user_by_normalized_email(
        &self,
        normalized_email: &str,
    ) -> RepositoryResult<Option<BankUser>>;

    /// Persist the lockout counters after a sign-in attempt
    async fn update_lockout(
        &self,
        user_id: &str,
        access_failed_count: i32,
        lockout_end: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()>;

    /// Delete a user together with accounts, cards, transfers and tokens
    async fn delete_user(&self, id: &str) -> RepositoryResult<bool>;

    // === Tokens ===

    /// Replace the user's access token hash
    async fn store_token(&self, user_id: &str, token_hash: &str) -> RepositoryResult<()>;

    async fn find_user_id_by_token(&self, token_hash: &str) -> RepositoryResult<Option<String>>;

    async fn remove_token(&self, user_id: &str) -> RepositoryResult<()>;

    // === Accounts ===

    /// Insert an account; `Conflict` when the unique id is taken
    async fn insert_account(&self, account: &BankAccount) -> RepositoryResult<()>;

    async fn find_account(&self, id: &str) -> RepositoryResult<Option<BankAccount>>;

    async fn find_account_by_unique_id(
        &self,
        unique_id: &str,
    ) -> RepositoryResult<Option<BankAccount>>;

    /// Accounts of a user, oldest first
    async fn list_accounts_for_user(&self, user_id: &str) -> RepositoryResult<Vec<BankAccount>>;

    async fn rename_account(&self, id: &str, name: &str) -> RepositoryResult<bool>;

    async fn unique_id_exists(&self, unique_id: &str) -> RepositoryResult<bool>;

    // === Cards ===

    async fn insert_card(&self, card: &Card) -> RepositoryResult<()>;

    async fn find_card(&self, id: &str) -> RepositoryResult<Option<Card>>;

    async fn list_cards_for_user(&self, user_id: &str) -> RepositoryResult<Vec<Card>>;

    async fn delete_card(&self, id: &str) -> RepositoryResult<bool>;

    // === Transfers ===

    /// Transfers whose reference number equals `reference_number`
    async fn find_transfers_by_reference(
        &self,
        reference_number: &str,
    ) -> RepositoryResult<Vec<MoneyTransfer>>;

    /// Transfers of every account the user owns, newest first
    async fn list_transfers_for_user(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> RepositoryResult<Vec<MoneyTransfer>>;

    /// Transfers of one account, newest first
    async fn list_transfers_for_account(
        &self,
        account_id: &str,
    ) -> RepositoryResult<Vec<MoneyTransfer>>;

    /// Insert the transfers and apply each amount to its account balance,
    /// all in one transaction. Nothing is written when an account is missing.
    async fn record_transfers(&self, transfers: &[MoneyTransfer]) -> RepositoryResult<()>;

    /// Record both legs of a transfer between two accounts in one
    /// transaction. The `outgoing` amount is negative and is only applied if
    /// the balance stays at or above zero, otherwise `InsufficientFunds` and
    /// nothing is written. Returns the debited account's new balance.
    async fn record_internal_transfer(
        &self,
        outgoing: &MoneyTransfer,
        incoming: &MoneyTransfer,
    ) -> RepositoryResult<Decimal>;

    async fn count_transfers(&self) -> RepositoryResult<i64>;
}
