//! API module
//!
//! HTTP API endpoints, shared handler state and middleware.

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use crate::config::Config;
use crate::notification::EmailSender;
use crate::repository::BankRepository;
use crate::services::{BankAccountService, CardService, MoneyTransferService, UserService};

pub use routes::{create_public_router, create_router};

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub accounts: BankAccountService,
    pub cards: CardService,
    pub transfers: MoneyTransferService,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn BankRepository>,
        email_sender: Arc<dyn EmailSender>,
        config: Config,
    ) -> Self {
        Self {
            users: UserService::new(repository.clone(), &config),
            accounts: BankAccountService::new(repository.clone(), config.unique_id_prefix.clone()),
            cards: CardService::new(repository.clone(), config.card_issuer_prefix.clone()),
            transfers: MoneyTransferService::new(
                repository,
                email_sender,
                config.bank_email.clone(),
            ),
            config: Arc::new(config),
        }
    }
}
