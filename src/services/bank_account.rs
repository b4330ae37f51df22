//! Bank Account Service

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{generators, BankAccount, DomainError};
use crate::error::{AppError, AppResult};
use crate::repository::{BankRepository, RepositoryError};

use super::{BankAccountCreate, BankAccountDetails};

/// Attempts at drawing an unused unique id before giving up
const MAX_UNIQUE_ID_ATTEMPTS: usize = 10;

#[derive(Clone)]
pub struct BankAccountService {
    repository: Arc<dyn BankRepository>,
    unique_id_prefix: String,
}

impl BankAccountService {
    pub fn new(repository: Arc<dyn BankRepository>, unique_id_prefix: impl Into<String>) -> Self {
        Self {
            repository,
            unique_id_prefix: unique_id_prefix.into(),
        }
    }

    /// Open a new zero-balance account for the user
    pub async fn create(
        &self,
        user_id: &str,
        request: BankAccountCreate,
    ) -> AppResult<BankAccountDetails> {
        request.validate()?;

        if self.repository.find_user(user_id).await?.is_none() {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }

        for _ in 0..MAX_UNIQUE_ID_ATTEMPTS {
            let unique_id = generators::unique_id(&self.unique_id_prefix);
            if self.repository.unique_id_exists(&unique_id).await? {
                continue;
            }

            let account = BankAccount {
                id: Uuid::new_v4().to_string(),
                balance: Decimal::ZERO,
                created_on: Utc::now(),
                name: request.name.trim().to_string(),
                unique_id,
                user_id: user_id.to_string(),
            };

            match self.repository.insert_account(&account).await {
                Ok(()) => {
                    tracing::info!(
                        account_id = %account.id,
                        unique_id = %account.unique_id,
                        "Bank account created"
                    );
                    return Ok(account.into());
                }
                // lost a race for the same unique id
                Err(RepositoryError::Conflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(DomainError::UniqueIdExhausted.into())
    }

    /// Account by id, visible only to its owner
    pub async fn get_by_id(&self, account_id: &str, user_id: &str) -> AppResult<BankAccountDetails> {
        self.owned(account_id, user_id).await.map(Into::into)
    }

    pub async fn get_by_unique_id(&self, unique_id: &str) -> AppResult<Option<BankAccountDetails>> {
        Ok(self
            .repository
            .find_account_by_unique_id(unique_id)
            .await?
            .map(Into::into))
    }

    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<BankAccountDetails>> {
        let accounts = self.repository.list_accounts_for_user(user_id).await?;
        Ok(accounts.into_iter().map(Into::into).collect())
    }

    pub async fn rename(
        &self,
        account_id: &str,
        user_id: &str,
        request: BankAccountCreate,
    ) -> AppResult<BankAccountDetails> {
        request.validate()?;

        let mut account = self.owned(account_id, user_id).await?;
        let name = request.name.trim().to_string();

        if !self.repository.rename_account(&account.id, &name).await? {
            return Err(AppError::AccountNotFound(account_id.to_string()));
        }

        account.name = name;
        Ok(account.into())
    }

    /// Load an account and check it belongs to `user_id`
    pub(crate) async fn owned(&self, account_id: &str, user_id: &str) -> AppResult<BankAccount> {
        self.repository
            .find_account(account_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| AppError::AccountNotFound(account_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::bank_account::NAME_MAX_LENGTH;
    use crate::services::testing::{Fixture, SAMPLE_BANK_ACCOUNT_ID, SAMPLE_USER_ID};

    fn named(name: &str) -> BankAccountCreate {
        BankAccountCreate {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_generates_prefixed_unique_id() {
        let fixture = Fixture::new();
        fixture.seed_bank_account().await;

        let account = fixture
            .accounts
            .create(SAMPLE_USER_ID, named("Holiday"))
            .await
            .unwrap();

        assert!(account.unique_id.starts_with(&fixture.config.unique_id_prefix));
        assert_eq!(account.balance, Decimal::ZERO);

        let listed = fixture.accounts.list_for_user(SAMPLE_USER_ID).await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_long_or_blank_name() {
        let fixture = Fixture::new();
        fixture.seed_bank_account().await;

        let long = "m".repeat(NAME_MAX_LENGTH as usize + 1);
        for name in [long.as_str(), "", "   "] {
            let result = fixture.accounts.create(SAMPLE_USER_ID, named(name)).await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_create_for_unknown_user() {
        let fixture = Fixture::new();
        let result = fixture.accounts.create("nobody", named("Main")).await;
        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_get_by_id_hides_foreign_accounts() {
        let fixture = Fixture::new();
        fixture.seed_bank_account().await;
        let (other_user, _) = fixture.seed_second_user().await;

        assert!(fixture
            .accounts
            .get_by_id(SAMPLE_BANK_ACCOUNT_ID, SAMPLE_USER_ID)
            .await
            .is_ok());

        let result = fixture
            .accounts
            .get_by_id(SAMPLE_BANK_ACCOUNT_ID, &other_user)
            .await;
        assert!(matches!(result, Err(AppError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_get_by_unique_id() {
        let fixture = Fixture::new();
        let account = fixture.seed_bank_account().await;

        let found = fixture
            .accounts
            .get_by_unique_id(&account.unique_id)
            .await
            .unwrap();
        assert_eq!(found.map(|a| a.id), Some(account.id));

        assert!(fixture
            .accounts
            .get_by_unique_id("ZZZZ9999999999")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_rename_by_owner_only() {
        let fixture = Fixture::new();
        fixture.seed_bank_account().await;
        let (other_user, _) = fixture.seed_second_user().await;

        let renamed = fixture
            .accounts
            .rename(SAMPLE_BANK_ACCOUNT_ID, SAMPLE_USER_ID, named(" Bills "))
            .await
            .unwrap();
        assert_eq!(renamed.name, "Bills");

        let result = fixture
            .accounts
            .rename(SAMPLE_BANK_ACCOUNT_ID, &other_user, named("Mine now"))
            .await;
        assert!(matches!(result, Err(AppError::AccountNotFound(_))));
    }
}
