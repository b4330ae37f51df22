//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;

/// Business rule violations raised by the services.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Not enough money on the source account
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Cannot transfer to the same account")]
    SameAccountTransfer,

    #[error("User name or email is already taken")]
    DuplicateUser,

    #[error("Could not allocate a unique account identifier")]
    UniqueIdExhausted,
}

impl DomainError {
    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds { required, available }
    }

    /// Check if this is a client error (user's fault)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::UniqueIdExhausted)
    }
}
