//! Services module
//!
//! Business operations over the repository port. Each service owns an
//! `Arc<dyn BankRepository>` and is cheap to clone into handler state.

mod bank_account;
mod card;
mod models;
mod money_transfer;
mod user;

pub use bank_account::BankAccountService;
pub use card::CardService;
pub use models::*;
pub use money_transfer::MoneyTransferService;
pub use user::UserService;
