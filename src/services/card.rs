//! Card Service

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::domain::{generators, Card};
use crate::error::{AppError, AppResult};
use crate::repository::BankRepository;

use super::{CardCreate, CardDetails};

#[derive(Clone)]
pub struct CardService {
    repository: Arc<dyn BankRepository>,
    issuer_prefix: String,
}

impl CardService {
    pub fn new(repository: Arc<dyn BankRepository>, issuer_prefix: impl Into<String>) -> Self {
        Self {
            repository,
            issuer_prefix: issuer_prefix.into(),
        }
    }

    /// Issue a card on one of the user's accounts
    pub async fn create(&self, user_id: &str, request: CardCreate) -> AppResult<CardDetails> {
        request.validate()?;

        let account = self
            .repository
            .find_account(&request.account_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| AppError::AccountNotFound(request.account_id.clone()))?;

        let card = Card {
            id: Uuid::new_v4().to_string(),
            account_id: account.id,
            user_id: user_id.to_string(),
            number: generators::card_number(&self.issuer_prefix),
            expiry_date: generators::card_expiry_date(Utc::now()),
            name: request.name.trim().to_string(),
            security_code: generators::card_security_code(),
        };

        self.repository.insert_card(&card).await?;

        tracing::info!(card_id = %card.id, account_id = %card.account_id, "Card issued");

        Ok(card.into())
    }

    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<CardDetails>> {
        let cards = self.repository.list_cards_for_user(user_id).await?;
        Ok(cards.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, card_id: &str, user_id: &str) -> AppResult<CardDetails> {
        self.owned(card_id, user_id).await.map(Into::into)
    }

    pub async fn delete(&self, card_id: &str, user_id: &str) -> AppResult<()> {
        let card = self.owned(card_id, user_id).await?;

        if !self.repository.delete_card(&card.id).await? {
            return Err(AppError::CardNotFound(card_id.to_string()));
        }

        tracing::info!(card_id = %card.id, "Card deleted");
        Ok(())
    }

    async fn owned(&self, card_id: &str, user_id: &str) -> AppResult<Card> {
        self.repository
            .find_card(card_id)
            .await?
            .filter(|c| c.user_id == user_id)
            .ok_or_else(|| AppError::CardNotFound(card_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::card::NAME_MAX_LENGTH;
    use crate::services::testing::{Fixture, SAMPLE_BANK_ACCOUNT_ID, SAMPLE_USER_ID};

    fn request(account_id: &str, name: &str) -> CardCreate {
        CardCreate {
            account_id: account_id.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_issues_luhn_valid_card() {
        let fixture = Fixture::new();
        fixture.seed_bank_account().await;

        let card = fixture
            .cards
            .create(SAMPLE_USER_ID, request(SAMPLE_BANK_ACCOUNT_ID, "Groceries"))
            .await
            .unwrap();

        assert!(card.number.starts_with(&fixture.config.card_issuer_prefix));
        assert!(generators::is_luhn_valid(&card.number));
        assert_eq!(card.expiry_date.len(), 5);

        let stored = fixture.repository.find_card(&card.id).await.unwrap().unwrap();
        assert_eq!(stored.security_code.len(), 3);
    }

    #[tokio::test]
    async fn test_create_on_foreign_account_rejected() {
        let fixture = Fixture::new();
        fixture.seed_bank_account().await;
        let (other_user, _) = fixture.seed_second_user().await;

        let result = fixture
            .cards
            .create(&other_user, request(SAMPLE_BANK_ACCOUNT_ID, "Stolen"))
            .await;
        assert!(matches!(result, Err(AppError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_long_name() {
        let fixture = Fixture::new();
        fixture.seed_bank_account().await;

        let result = fixture
            .cards
            .create(
                SAMPLE_USER_ID,
                request(SAMPLE_BANK_ACCOUNT_ID, &"m".repeat(NAME_MAX_LENGTH as usize + 1)),
            )
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_and_delete_by_owner_only() {
        let fixture = Fixture::new();
        fixture.seed_bank_account().await;
        let (other_user, _) = fixture.seed_second_user().await;

        let card = fixture
            .cards
            .create(SAMPLE_USER_ID, request(SAMPLE_BANK_ACCOUNT_ID, "Travel"))
            .await
            .unwrap();

        assert!(matches!(
            fixture.cards.get(&card.id, &other_user).await,
            Err(AppError::CardNotFound(_))
        ));
        assert!(matches!(
            fixture.cards.delete(&card.id, &other_user).await,
            Err(AppError::CardNotFound(_))
        ));

        assert_eq!(fixture.cards.get(&card.id, SAMPLE_USER_ID).await.unwrap(), card);
        fixture.cards.delete(&card.id, SAMPLE_USER_ID).await.unwrap();
        assert!(fixture.cards.list_for_user(SAMPLE_USER_ID).await.unwrap().is_empty());
    }
}
