//! Domain module
//!
//! Core domain types: entities, limits, generators and errors.

pub mod constants;
pub mod context;
pub mod entities;
pub mod error;
pub mod generators;

pub use context::OperationContext;
pub use entities::{normalize, BankAccount, BankUser, Card, MoneyTransfer};
pub use error::DomainError;
