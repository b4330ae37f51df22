//! In-memory repository
//!
//! Map-backed [`BankRepository`] that mirrors the SQL constraints: unique user
//! names and account unique ids, cascading deletes, all-or-nothing transfers.

use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::domain::{BankAccount, BankUser, Card, MoneyTransfer};

use super::{BankRepository, RepositoryError, RepositoryResult};

#[derive(Debug, Default)]
struct State {
    users: HashMap<String, BankUser>,
    /// user id -> access token hash
    tokens: HashMap<String, String>,
    accounts: HashMap<String, BankAccount>,
    cards: HashMap<String, Card>,
    /// insertion order is kept so equal timestamps sort stably
    transfers: Vec<MoneyTransfer>,
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut transfers: Vec<MoneyTransfer>) -> Vec<MoneyTransfer> {
    transfers.sort_by_key(|t| Reverse(t.made_on));
    transfers
}

#[async_trait]
impl BankRepository for InMemoryRepository {
    async fn insert_user(&self, user: &BankUser) -> RepositoryResult<()> {
        let mut state = self.state.write().await;

        if state.users.contains_key(&user.id) {
            return Err(RepositoryError::Conflict("user id already exists".to_string()));
        }
        if let Some(name) = &user.normalized_user_name {
            let taken = state
                .users
                .values()
                .any(|u| u.normalized_user_name.as_ref() == Some(name));
            if taken {
                return Err(RepositoryError::Conflict("user name already taken".to_string()));
            }
        }

        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_user(&self, id: &str) -> RepositoryResult<Option<BankUser>> {
        Ok(self.state.read().await.users.get(id).cloned())
    }

    async fn find_user_by_normalized_name(
        &self,
        normalized_user_name: &str,
    ) -> RepositoryResult<Option<BankUser>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.normalized_user_name.as_deref() == Some(normalized_user_name))
            .cloned())
    }

    async fn find_user_by_normalized_email(
        &self,
        normalized_email: &str,
    ) -> RepositoryResult<Option<BankUser>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.normalized_email.as_deref() == Some(normalized_email))
            .cloned())
    }

    async fn update_lockout(
        &self,
        user_id: &str,
        access_failed_count: i32,
        lockout_end: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.get_mut(user_id) {
            user.access_failed_count = access_failed_count;
            user.lockout_end = lockout_end;
            user.concurrency_stamp = Some(uuid::Uuid::new_v4().to_string());
        }
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> RepositoryResult<bool> {
        let mut state = self.state.write().await;

        if state.users.remove(id).is_none() {
            return Ok(false);
        }

        state.tokens.remove(id);

        let account_ids: Vec<String> = state
            .accounts
            .values()
            .filter(|a| a.user_id == id)
            .map(|a| a.id.clone())
            .collect();
        state.accounts.retain(|_, a| a.user_id != id);
        state
            .cards
            .retain(|_, c| c.user_id != id && !account_ids.contains(&c.account_id));
        state
            .transfers
            .retain(|t| !account_ids.contains(&t.account_id));

        Ok(true)
    }

    async fn store_token(&self, user_id: &str, token_hash: &str) -> RepositoryResult<()> {
        let mut state = self.state.write().await;
        state
            .tokens
            .insert(user_id.to_string(), token_hash.to_string());
        Ok(())
    }

    async fn find_user_id_by_token(&self, token_hash: &str) -> RepositoryResult<Option<String>> {
        let state = self.state.read().await;
        Ok(state
            .tokens
            .iter()
            .find(|(_, hash)| hash.as_str() == token_hash)
            .map(|(user_id, _)| user_id.clone()))
    }

    async fn remove_token(&self, user_id: &str) -> RepositoryResult<()> {
        self.state.write().await.tokens.remove(user_id);
        Ok(())
    }

    async fn insert_account(&self, account: &BankAccount) -> RepositoryResult<()> {
        let mut state = self.state.write().await;

        if !state.users.contains_key(&account.user_id) {
            return Err(RepositoryError::Conflict(format!(
                "user {} does not exist",
                account.user_id
            )));
        }
        let taken = state
            .accounts
            .values()
            .any(|a| a.id == account.id || a.unique_id == account.unique_id);
        if taken {
            return Err(RepositoryError::Conflict(
                "account unique id already taken".to_string(),
            ));
        }

        state.accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn find_account(&self, id: &str) -> RepositoryResult<Option<BankAccount>> {
        Ok(self.state.read().await.accounts.get(id).cloned())
    }

    async fn find_account_by_unique_id(
        &self,
        unique_id: &str,
    ) -> RepositoryResult<Option<BankAccount>> {
        let state = self.state.read().await;
        Ok(state
            .accounts
            .values()
            .find(|a| a.unique_id == unique_id)
            .cloned())
    }

    async fn list_accounts_for_user(&self, user_id: &str) -> RepositoryResult<Vec<BankAccount>> {
        let state = self.state.read().await;
        let mut accounts: Vec<BankAccount> = state
            .accounts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.created_on.cmp(&b.created_on).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    async fn rename_account(&self, id: &str, name: &str) -> RepositoryResult<bool> {
        let mut state = self.state.write().await;
        match state.accounts.get_mut(id) {
            Some(account) => {
                account.name = name.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn unique_id_exists(&self, unique_id: &str) -> RepositoryResult<bool> {
        let state = self.state.read().await;
        Ok(state.accounts.values().any(|a| a.unique_id == unique_id))
    }

    async fn insert_card(&self, card: &Card) -> RepositoryResult<()> {
        let mut state = self.state.write().await;

        if !state.accounts.contains_key(&card.account_id) {
            return Err(RepositoryError::AccountNotFound(card.account_id.clone()));
        }
        if state.cards.contains_key(&card.id) {
            return Err(RepositoryError::Conflict("card id already exists".to_string()));
        }

        state.cards.insert(card.id.clone(), card.clone());
        Ok(())
    }

    async fn find_card(&self, id: &str) -> RepositoryResult<Option<Card>> {
        Ok(self.state.read().await.cards.get(id).cloned())
    }

    async fn list_cards_for_user(&self, user_id: &str) -> RepositoryResult<Vec<Card>> {
        let state = self.state.read().await;
        let mut cards: Vec<Card> = state
            .cards
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        cards.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cards)
    }

    async fn delete_card(&self, id: &str) -> RepositoryResult<bool> {
        Ok(self.state.write().await.cards.remove(id).is_some())
    }

    async fn find_transfers_by_reference(
        &self,
        reference_number: &str,
    ) -> RepositoryResult<Vec<MoneyTransfer>> {
        let state = self.state.read().await;
        let found = state
            .transfers
            .iter()
            .filter(|t| t.reference_number == reference_number)
            .cloned()
            .collect();
        Ok(newest_first(found))
    }

    async fn list_transfers_for_user(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> RepositoryResult<Vec<MoneyTransfer>> {
        let state = self.state.read().await;
        let owned = |account_id: &str| {
            state
                .accounts
                .get(account_id)
                .is_some_and(|a| a.user_id == user_id)
        };
        let found = state
            .transfers
            .iter()
            .filter(|t| owned(&t.account_id))
            .cloned()
            .collect();

        let mut transfers = newest_first(found);
        if let Some(limit) = limit {
            transfers.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(transfers)
    }

    async fn list_transfers_for_account(
        &self,
        account_id: &str,
    ) -> RepositoryResult<Vec<MoneyTransfer>> {
        let state = self.state.read().await;
        let found = state
            .transfers
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        Ok(newest_first(found))
    }

    async fn record_transfers(&self, transfers: &[MoneyTransfer]) -> RepositoryResult<()> {
        let mut state = self.state.write().await;

        // validate every leg before touching anything
        if let Some(missing) = transfers
            .iter()
            .find(|t| !state.accounts.contains_key(&t.account_id))
        {
            return Err(RepositoryError::AccountNotFound(missing.account_id.clone()));
        }

        for transfer in transfers {
            if let Some(account) = state.accounts.get_mut(&transfer.account_id) {
                account.balance += transfer.amount;
            }
            state.transfers.push(transfer.clone());
        }

        Ok(())
    }

    async fn record_internal_transfer(
        &self,
        outgoing: &MoneyTransfer,
        incoming: &MoneyTransfer,
    ) -> RepositoryResult<Decimal> {
        let mut state = self.state.write().await;

        if !state.accounts.contains_key(&incoming.account_id) {
            return Err(RepositoryError::AccountNotFound(incoming.account_id.clone()));
        }
        let available = state
            .accounts
            .get(&outgoing.account_id)
            .map(|a| a.balance)
            .ok_or_else(|| RepositoryError::AccountNotFound(outgoing.account_id.clone()))?;

        let balance = available + outgoing.amount;
        if balance < Decimal::ZERO {
            return Err(RepositoryError::InsufficientFunds {
                account_id: outgoing.account_id.clone(),
                available,
            });
        }

        if let Some(account) = state.accounts.get_mut(&outgoing.account_id) {
            account.balance = balance;
        }
        if let Some(account) = state.accounts.get_mut(&incoming.account_id) {
            account.balance += incoming.amount;
        }
        state.transfers.push(outgoing.clone());
        state.transfers.push(incoming.clone());

        Ok(balance)
    }

    async fn count_transfers(&self) -> RepositoryResult<i64> {
        Ok(self.state.read().await.transfers.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn user(id: &str, name: &str) -> BankUser {
        BankUser {
            id: id.to_string(),
            user_name: Some(name.to_string()),
            normalized_user_name: Some(name.to_uppercase()),
            email: None,
            normalized_email: None,
            email_confirmed: false,
            full_name: "Test User".to_string(),
            password_hash: None,
            security_stamp: None,
            concurrency_stamp: None,
            phone_number: None,
            phone_number_confirmed: false,
            two_factor_enabled: false,
            lockout_end: None,
            lockout_enabled: true,
            access_failed_count: 0,
        }
    }

    fn account(id: &str, user_id: &str, unique_id: &str) -> BankAccount {
        BankAccount {
            id: id.to_string(),
            balance: dec!(0),
            created_on: Utc::now(),
            name: "Main".to_string(),
            unique_id: unique_id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    fn transfer(id: &str, account_id: &str, amount: rust_decimal::Decimal) -> MoneyTransfer {
        MoneyTransfer {
            id: id.to_string(),
            account_id: account_id.to_string(),
            amount,
            description: None,
            destination: "ABCJ0000000002".to_string(),
            source: "ABCJ0000000001".to_string(),
            made_on: Utc::now(),
            recipient_name: "recipient".to_string(),
            sender_name: "sender".to_string(),
            reference_number: "12345678901234567".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_user_name_rejected() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&user("u1", "alice")).await.unwrap();

        let result = repo.insert_user(&user("u2", "alice")).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_duplicate_unique_id_rejected() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&user("u1", "alice")).await.unwrap();
        repo.insert_account(&account("a1", "u1", "ABCJ1")).await.unwrap();

        let result = repo.insert_account(&account("a2", "u1", "ABCJ1")).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_record_transfers_is_all_or_nothing() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&user("u1", "alice")).await.unwrap();
        repo.insert_account(&account("a1", "u1", "ABCJ1")).await.unwrap();

        let result = repo
            .record_transfers(&[
                transfer("t1", "a1", dec!(-5)),
                transfer("t2", "missing", dec!(5)),
            ])
            .await;

        assert!(matches!(result, Err(RepositoryError::AccountNotFound(id)) if id == "missing"));
        assert_eq!(repo.count_transfers().await.unwrap(), 0);
        assert_eq!(repo.find_account("a1").await.unwrap().unwrap().balance, dec!(0));
    }

    #[tokio::test]
    async fn test_record_transfers_moves_balance() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&user("u1", "alice")).await.unwrap();
        repo.insert_account(&account("a1", "u1", "ABCJ1")).await.unwrap();

        repo.record_transfers(&[transfer("t1", "a1", dec!(25.50))])
            .await
            .unwrap();
        repo.record_transfers(&[transfer("t2", "a1", dec!(-10))])
            .await
            .unwrap();

        assert_eq!(repo.find_account("a1").await.unwrap().unwrap().balance, dec!(15.50));
    }

    #[tokio::test]
    async fn test_internal_transfer_moves_money_and_returns_balance() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&user("u1", "alice")).await.unwrap();
        repo.insert_account(&account("a1", "u1", "ABCJ1")).await.unwrap();
        repo.insert_account(&account("a2", "u1", "ABCJ2")).await.unwrap();
        repo.record_transfers(&[transfer("t0", "a1", dec!(100))])
            .await
            .unwrap();

        let balance = repo
            .record_internal_transfer(
                &transfer("t1", "a1", dec!(-80)),
                &transfer("t2", "a2", dec!(80)),
            )
            .await
            .unwrap();

        assert_eq!(balance, dec!(20));
        assert_eq!(repo.find_account("a2").await.unwrap().unwrap().balance, dec!(80));
        assert_eq!(repo.count_transfers().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_internal_transfer_never_overdraws() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&user("u1", "alice")).await.unwrap();
        repo.insert_account(&account("a1", "u1", "ABCJ1")).await.unwrap();
        repo.insert_account(&account("a2", "u1", "ABCJ2")).await.unwrap();
        repo.record_transfers(&[transfer("t0", "a1", dec!(100))])
            .await
            .unwrap();

        repo.record_internal_transfer(
            &transfer("t1", "a1", dec!(-80)),
            &transfer("t2", "a2", dec!(80)),
        )
        .await
        .unwrap();
        let second = repo
            .record_internal_transfer(
                &transfer("t3", "a1", dec!(-80)),
                &transfer("t4", "a2", dec!(80)),
            )
            .await;

        assert!(matches!(
            second,
            Err(RepositoryError::InsufficientFunds { available, .. }) if available == dec!(20)
        ));
        assert_eq!(repo.find_account("a1").await.unwrap().unwrap().balance, dec!(20));
        assert_eq!(repo.find_account("a2").await.unwrap().unwrap().balance, dec!(80));
        assert_eq!(repo.count_transfers().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_list_transfers_for_user_newest_first_with_limit() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&user("u1", "alice")).await.unwrap();
        repo.insert_account(&account("a1", "u1", "ABCJ1")).await.unwrap();

        let base = Utc::now();
        for i in 0..5 {
            let mut t = transfer(&format!("t{i}"), "a1", dec!(1));
            t.made_on = base + Duration::minutes(i);
            repo.record_transfers(&[t]).await.unwrap();
        }

        let limited = repo.list_transfers_for_user("u1", Some(3)).await.unwrap();
        let ids: Vec<&str> = limited.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t4", "t3", "t2"]);

        let all = repo.list_transfers_for_user("u1", None).await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let repo = InMemoryRepository::new();
        repo.insert_user(&user("u1", "alice")).await.unwrap();
        repo.insert_account(&account("a1", "u1", "ABCJ1")).await.unwrap();
        repo.insert_card(&Card {
            id: "c1".to_string(),
            account_id: "a1".to_string(),
            user_id: "u1".to_string(),
            number: "5224080000000000".to_string(),
            expiry_date: "01/30".to_string(),
            name: "Card".to_string(),
            security_code: "123".to_string(),
        })
        .await
        .unwrap();
        repo.record_transfers(&[transfer("t1", "a1", dec!(1))])
            .await
            .unwrap();
        repo.store_token("u1", "hash").await.unwrap();

        assert!(repo.delete_user("u1").await.unwrap());

        assert!(repo.find_account("a1").await.unwrap().is_none());
        assert!(repo.find_card("c1").await.unwrap().is_none());
        assert_eq!(repo.count_transfers().await.unwrap(), 0);
        assert!(repo.find_user_id_by_token("hash").await.unwrap().is_none());
        assert!(!repo.delete_user("u1").await.unwrap());
    }
}
