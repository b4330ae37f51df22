//! PostgreSQL repository
//!
//! `sqlx` implementation of [`BankRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::constants::token;
use crate::domain::{BankAccount, BankUser, Card, MoneyTransfer};

use super::{BankRepository, RepositoryError, RepositoryResult};

const USER_COLUMNS: &str = "id, user_name, normalized_user_name, email, normalized_email, \
    email_confirmed, full_name, password_hash, security_stamp, concurrency_stamp, phone_number, \
    phone_number_confirmed, two_factor_enabled, lockout_end, lockout_enabled, access_failed_count";

const ACCOUNT_COLUMNS: &str = "id, balance, created_on, name, unique_id, user_id";

const CARD_COLUMNS: &str = "id, account_id, user_id, number, expiry_date, name, security_code";

const TRANSFER_COLUMNS: &str = "t.id, t.account_id, t.amount, t.description, t.destination, \
    t.source, t.made_on, t.recipient_name, t.sender_name, t.reference_number";

/// Repository backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_user_where(
        &self,
        column: &str,
        value: &str,
    ) -> RepositoryResult<Option<BankUser>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, BankUser>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

/// Add `amount` to the account balance and return the new balance. With
/// `guarded`, the update only applies while the result stays at or above zero;
/// the row lock makes a concurrent debit re-check against the committed value.
async fn apply_to_balance(
    tx: &mut Transaction<'_, Postgres>,
    account_id: &str,
    amount: Decimal,
    guarded: bool,
) -> RepositoryResult<Decimal> {
    let sql = if guarded {
        "UPDATE accounts SET balance = balance + $2 \
         WHERE id = $1 AND balance + $2 >= 0 RETURNING balance"
    } else {
        "UPDATE accounts SET balance = balance + $2 WHERE id = $1 RETURNING balance"
    };

    let balance: Option<Decimal> = sqlx::query_scalar(sql)
        .bind(account_id)
        .bind(amount)
        .fetch_optional(&mut **tx)
        .await?;
    if let Some(balance) = balance {
        return Ok(balance);
    }

    let available: Option<Decimal> =
        sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&mut **tx)
            .await?;

    // dropping the transaction rolls back earlier updates
    match available {
        Some(available) => Err(RepositoryError::InsufficientFunds {
            account_id: account_id.to_string(),
            available,
        }),
        None => Err(RepositoryError::AccountNotFound(account_id.to_string())),
    }
}

async fn insert_transfer(
    tx: &mut Transaction<'_, Postgres>,
    transfer: &MoneyTransfer,
) -> RepositoryResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transfers (
            id, account_id, amount, description, destination, source, made_on,
            recipient_name, sender_name, reference_number
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(&transfer.id)
    .bind(&transfer.account_id)
    .bind(transfer.amount)
    .bind(&transfer.description)
    .bind(&transfer.destination)
    .bind(&transfer.source)
    .bind(transfer.made_on)
    .bind(&transfer.recipient_name)
    .bind(&transfer.sender_name)
    .bind(&transfer.reference_number)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait]
impl BankRepository for PgRepository {
    // =========================================================================
    // Users
    // =========================================================================

    async fn insert_user(&self, user: &BankUser) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, user_name, normalized_user_name, email, normalized_email, email_confirmed,
                full_name, password_hash, security_stamp, concurrency_stamp, phone_number,
                phone_number_confirmed, two_factor_enabled, lockout_end, lockout_enabled,
                access_failed_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(&user.id)
        .bind(&user.user_name)
        .bind(&user.normalized_user_name)
        .bind(&user.email)
        .bind(&user.normalized_email)
        .bind(user.email_confirmed)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(&user.security_stamp)
        .bind(&user.concurrency_stamp)
        .bind(&user.phone_number)
        .bind(user.phone_number_confirmed)
        .bind(user.two_factor_enabled)
        .bind(user.lockout_end)
        .bind(user.lockout_enabled)
        .bind(user.access_failed_count)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "user name already taken"))?;

        tracing::debug!("Inserted user {}", user.id);
        Ok(())
    }

    async fn find_user(&self, id: &str) -> RepositoryResult<Option<BankUser>> {
        self.find_user_where("id", id).await
    }

    async fn find_user_by_normalized_name(
        &self,
        normalized_user_name: &str,
    ) -> RepositoryResult<Option<BankUser>> {
        self.find_user_where("normalized_user_name", normalized_user_name)
            .await
    }

    async fn find_user_by_normalized_email(
        &self,
        normalized_email: &str,
    ) -> RepositoryResult<Option<BankUser>> {
        self.find_user_where("normalized_email", normalized_email)
            .await
    }

    async fn update_lockout(
        &self,
        user_id: &str,
        access_failed_count: i32,
        lockout_end: Option<DateTime<Utc>>,
    ) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET access_failed_count = $2,
                lockout_end = $3,
                concurrency_stamp = $4
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(access_failed_count)
        .bind(lockout_end)
        .bind(uuid::Uuid::new_v4().to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_user(&self, id: &str) -> RepositoryResult<bool> {
        // accounts, cards, transfers and identity rows go through ON DELETE CASCADE
        let rows_affected = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    async fn store_token(&self, user_id: &str, token_hash: &str) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_tokens (user_id, login_provider, name, value)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, login_provider, name) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(user_id)
        .bind(token::LOGIN_PROVIDER)
        .bind(token::ACCESS_TOKEN_NAME)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_user_id_by_token(&self, token_hash: &str) -> RepositoryResult<Option<String>> {
        let user_id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM user_tokens
            WHERE login_provider = $1 AND name = $2 AND value = $3
            "#,
        )
        .bind(token::LOGIN_PROVIDER)
        .bind(token::ACCESS_TOKEN_NAME)
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id)
    }

    async fn remove_token(&self, user_id: &str) -> RepositoryResult<()> {
        sqlx::query("DELETE FROM user_tokens WHERE user_id = $1 AND login_provider = $2 AND name = $3")
            .bind(user_id)
            .bind(token::LOGIN_PROVIDER)
            .bind(token::ACCESS_TOKEN_NAME)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    async fn insert_account(&self, account: &BankAccount) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, balance, created_on, name, unique_id, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&account.id)
        .bind(account.balance)
        .bind(account.created_on)
        .bind(&account.name)
        .bind(&account.unique_id)
        .bind(&account.user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_insert(e, "account unique id already taken"))?;

        Ok(())
    }

    async fn find_account(&self, id: &str) -> RepositoryResult<Option<BankAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let account = sqlx::query_as::<_, BankAccount>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_account_by_unique_id(
        &self,
        unique_id: &str,
    ) -> RepositoryResult<Option<BankAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE unique_id = $1");
        let account = sqlx::query_as::<_, BankAccount>(&sql)
            .bind(unique_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn list_accounts_for_user(&self, user_id: &str) -> RepositoryResult<Vec<BankAccount>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = $1 ORDER BY created_on ASC"
        );
        let accounts = sqlx::query_as::<_, BankAccount>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(accounts)
    }

    async fn rename_account(&self, id: &str, name: &str) -> RepositoryResult<bool> {
        let rows_affected = sqlx::query("UPDATE accounts SET name = $2 WHERE id = $1")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn unique_id_exists(&self, unique_id: &str) -> RepositoryResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM accounts WHERE unique_id = $1)")
                .bind(unique_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    // =========================================================================
    // Cards
    // =========================================================================

    async fn insert_card(&self, card: &Card) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cards (id, account_id, user_id, number, expiry_date, name, security_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&card.id)
        .bind(&card.account_id)
        .bind(&card.user_id)
        .bind(&card.number)
        .bind(&card.expiry_date)
        .bind(&card.name)
        .bind(&card.security_code)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_card(&self, id: &str) -> RepositoryResult<Option<Card>> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = $1");
        let card = sqlx::query_as::<_, Card>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(card)
    }

    async fn list_cards_for_user(&self, user_id: &str) -> RepositoryResult<Vec<Card>> {
        let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE user_id = $1 ORDER BY name");
        let cards = sqlx::query_as::<_, Card>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(cards)
    }

    async fn delete_card(&self, id: &str) -> RepositoryResult<bool> {
        let rows_affected = sqlx::query("DELETE FROM cards WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    async fn find_transfers_by_reference(
        &self,
        reference_number: &str,
    ) -> RepositoryResult<Vec<MoneyTransfer>> {
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers t \
             WHERE t.reference_number = $1 ORDER BY t.made_on DESC"
        );
        let transfers = sqlx::query_as::<_, MoneyTransfer>(&sql)
            .bind(reference_number)
            .fetch_all(&self.pool)
            .await?;
        Ok(transfers)
    }

    async fn list_transfers_for_user(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> RepositoryResult<Vec<MoneyTransfer>> {
        // LIMIT NULL is LIMIT ALL
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers t \
             JOIN accounts a ON a.id = t.account_id \
             WHERE a.user_id = $1 \
             ORDER BY t.made_on DESC \
             LIMIT $2"
        );
        let transfers = sqlx::query_as::<_, MoneyTransfer>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(transfers)
    }

    async fn list_transfers_for_account(
        &self,
        account_id: &str,
    ) -> RepositoryResult<Vec<MoneyTransfer>> {
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers t \
             WHERE t.account_id = $1 ORDER BY t.made_on DESC"
        );
        let transfers = sqlx::query_as::<_, MoneyTransfer>(&sql)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(transfers)
    }

    async fn record_transfers(&self, transfers: &[MoneyTransfer]) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;

        // row locks are always taken in account id order
        let mut by_account: Vec<&MoneyTransfer> = transfers.iter().collect();
        by_account.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        for transfer in by_account {
            apply_to_balance(&mut tx, &transfer.account_id, transfer.amount, false).await?;
        }

        for transfer in transfers {
            insert_transfer(&mut tx, transfer).await?;
        }

        tx.commit().await?;

        tracing::debug!("Recorded {} transfer row(s)", transfers.len());
        Ok(())
    }

    async fn record_internal_transfer(
        &self,
        outgoing: &MoneyTransfer,
        incoming: &MoneyTransfer,
    ) -> RepositoryResult<Decimal> {
        let mut tx = self.pool.begin().await?;

        let debit_first = outgoing.account_id <= incoming.account_id;
        let balance = if debit_first {
            let balance =
                apply_to_balance(&mut tx, &outgoing.account_id, outgoing.amount, true).await?;
            apply_to_balance(&mut tx, &incoming.account_id, incoming.amount, false).await?;
            balance
        } else {
            apply_to_balance(&mut tx, &incoming.account_id, incoming.amount, false).await?;
            apply_to_balance(&mut tx, &outgoing.account_id, outgoing.amount, true).await?
        };

        insert_transfer(&mut tx, outgoing).await?;
        insert_transfer(&mut tx, incoming).await?;

        tx.commit().await?;

        tracing::debug!(
            reference_number = %outgoing.reference_number,
            "Recorded internal transfer"
        );
        Ok(balance)
    }

    async fn count_transfers(&self) -> RepositoryResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transfers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
