//! Persisted entities
//!
//! One struct per table row. Identifiers are opaque strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identity principal (`users` table)
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct BankUser {
    pub id: String,
    pub user_name: Option<String>,
    pub normalized_user_name: Option<String>,
    pub email: Option<String>,
    pub normalized_email: Option<String>,
    pub email_confirmed: bool,
    pub full_name: String,
    pub password_hash: Option<String>,
    pub security_stamp: Option<String>,
    pub concurrency_stamp: Option<String>,
    pub phone_number: Option<String>,
    pub phone_number_confirmed: bool,
    pub two_factor_enabled: bool,
    pub lockout_end: Option<DateTime<Utc>>,
    pub lockout_enabled: bool,
    pub access_failed_count: i32,
}

impl BankUser {
    /// Whether sign-in is currently blocked by lockout
    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_enabled && self.lockout_end.is_some_and(|end| end > now)
    }
}

/// Normalize a user name or email for uniqueness checks.
pub fn normalize(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Balance-holding account owned by a user (`accounts` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BankAccount {
    pub id: String,
    pub balance: Decimal,
    pub created_on: DateTime<Utc>,
    pub name: String,
    pub unique_id: String,
    pub user_id: String,
}

/// Payment card bound to an account (`cards` table)
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Card {
    pub id: String,
    pub account_id: String,
    pub user_id: String,
    pub number: String,
    pub expiry_date: String,
    pub name: String,
    pub security_code: String,
}

/// Recorded movement of funds (`transfers` table).
///
/// A negative amount means money left the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MoneyTransfer {
    pub id: String,
    pub account_id: String,
    pub amount: Decimal,
    pub description: Option<String>,
    pub destination: String,
    pub source: String,
    pub made_on: DateTime<Utc>,
    pub recipient_name: String,
    pub sender_name: String,
    pub reference_number: String,
}
