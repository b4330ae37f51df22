//! Service models
//!
//! Inputs and outputs of the service layer. Inputs carry their column limits
//! as `validator` rules.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::constants::{bank_account, card, money_transfer, user};
use crate::domain::{BankAccount, BankUser, Card, MoneyTransfer};
use crate::validation::{non_zero_amount, not_blank, password_strength, positive_amount};

// =========================================================================
// Money transfers
// =========================================================================

/// A transfer row to record against one account
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct MoneyTransferCreate {
    #[validate(length(
        max = money_transfer::DESCRIPTION_MAX_LENGTH,
        message = "description is too long"
    ))]
    pub description: Option<String>,

    /// Negative when money leaves the account
    #[validate(custom(function = "non_zero_amount"))]
    pub amount: Decimal,

    #[validate(custom(function = "not_blank"))]
    pub account_id: String,

    /// Unique id of the receiving bank account
    #[validate(
        custom(function = "not_blank"),
        length(max = bank_account::UNIQUE_ID_MAX_LENGTH, message = "destination is too long")
    )]
    pub destination_bank_account_unique_id: String,

    /// Unique id of the sending bank account
    #[validate(
        custom(function = "not_blank"),
        length(max = bank_account::UNIQUE_ID_MAX_LENGTH, message = "source is too long")
    )]
    pub source: String,

    #[validate(
        custom(function = "not_blank"),
        length(max = user::FULL_NAME_MAX_LENGTH, message = "sender name is too long")
    )]
    pub sender_name: String,

    #[validate(
        custom(function = "not_blank"),
        length(max = user::FULL_NAME_MAX_LENGTH, message = "recipient name is too long")
    )]
    pub recipient_name: String,

    #[validate(custom(function = "not_blank"))]
    pub reference_number: String,
}

impl MoneyTransferCreate {
    /// Build the row to insert
    pub fn into_transfer(self, made_on: DateTime<Utc>) -> MoneyTransfer {
        MoneyTransfer {
            id: Uuid::new_v4().to_string(),
            account_id: self.account_id,
            amount: self.amount,
            description: self.description,
            destination: self.destination_bank_account_unique_id,
            source: self.source,
            made_on,
            recipient_name: self.recipient_name,
            sender_name: self.sender_name,
            reference_number: self.reference_number,
        }
    }
}

/// Read model for transfer lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoneyTransferListing {
    pub id: String,
    pub account_id: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub made_on: DateTime<Utc>,
    pub source: String,
    pub destination: String,
    pub sender_name: String,
    pub recipient_name: String,
    pub reference_number: String,
}

impl From<MoneyTransfer> for MoneyTransferListing {
    fn from(t: MoneyTransfer) -> Self {
        Self {
            id: t.id,
            account_id: t.account_id,
            description: t.description,
            amount: t.amount,
            made_on: t.made_on,
            source: t.source,
            destination: t.destination,
            sender_name: t.sender_name,
            recipient_name: t.recipient_name,
            reference_number: t.reference_number,
        }
    }
}

/// Move money from one of the caller's accounts to another account of the bank
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendMoney {
    #[validate(custom(function = "not_blank"))]
    pub account_id: String,

    #[validate(
        custom(function = "not_blank"),
        length(max = bank_account::UNIQUE_ID_MAX_LENGTH, message = "destination is too long")
    )]
    pub destination_bank_account_unique_id: String,

    #[validate(custom(function = "positive_amount"))]
    pub amount: Decimal,

    #[serde(default)]
    #[validate(length(
        max = money_transfer::DESCRIPTION_MAX_LENGTH,
        message = "description is too long"
    ))]
    pub description: Option<String>,
}

/// Outcome of a completed internal transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub reference_number: String,
    pub amount: Decimal,
    pub source: String,
    pub destination: String,
    pub made_on: DateTime<Utc>,
    pub balance: Decimal,
}

// =========================================================================
// Bank accounts
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BankAccountCreate {
    #[validate(
        custom(function = "not_blank"),
        length(max = bank_account::NAME_MAX_LENGTH, message = "name is too long")
    )]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccountDetails {
    pub id: String,
    pub name: String,
    pub unique_id: String,
    pub balance: Decimal,
    pub created_on: DateTime<Utc>,
}

impl From<BankAccount> for BankAccountDetails {
    fn from(a: BankAccount) -> Self {
        Self {
            id: a.id,
            name: a.name,
            unique_id: a.unique_id,
            balance: a.balance,
            created_on: a.created_on,
        }
    }
}

// =========================================================================
// Cards
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CardCreate {
    #[validate(custom(function = "not_blank"))]
    pub account_id: String,

    #[validate(
        custom(function = "not_blank"),
        length(max = card::NAME_MAX_LENGTH, message = "name is too long")
    )]
    pub name: String,
}

/// Card as shown to its owner; the security code is never listed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardDetails {
    pub id: String,
    pub account_id: String,
    pub name: String,
    pub number: String,
    pub expiry_date: String,
}

impl From<Card> for CardDetails {
    fn from(c: Card) -> Self {
        Self {
            id: c.id,
            account_id: c.account_id,
            name: c.name,
            number: c.number,
            expiry_date: c.expiry_date,
        }
    }
}

// =========================================================================
// Identity
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterUser {
    #[validate(
        custom(function = "not_blank"),
        length(max = user::USER_NAME_MAX_LENGTH, message = "user name is too long")
    )]
    pub user_name: String,

    #[validate(
        email(message = "invalid email format"),
        length(max = user::EMAIL_MAX_LENGTH, message = "email is too long")
    )]
    pub email: String,

    #[validate(
        custom(function = "not_blank"),
        length(max = user::FULL_NAME_MAX_LENGTH, message = "full name is too long")
    )]
    pub full_name: String,

    #[validate(custom(function = "password_strength"))]
    pub password: String,

    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginCredentials {
    #[validate(custom(function = "not_blank"))]
    pub user_name: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Public profile of a registered user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDetails {
    pub id: String,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub full_name: String,
    pub phone_number: Option<String>,
}

impl From<BankUser> for UserDetails {
    fn from(u: BankUser) -> Self {
        Self {
            id: u.id,
            user_name: u.user_name,
            email: u.email,
            full_name: u.full_name,
            phone_number: u.phone_number,
        }
    }
}

/// Bearer token handed out on sign-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthToken {
    pub user_id: String,
    pub access_token: String,
    pub token_type: String,
}
