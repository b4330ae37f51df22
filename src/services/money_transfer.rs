//! Money Transfer Service
//!
//! Queries over recorded transfers, validated inserts with email
//! notification, and internal transfers between accounts of the bank.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use validator::Validate;

use crate::domain::constants::money_transfer::RECENT_LIMIT;
use crate::domain::{generators, BankAccount, DomainError, MoneyTransfer};
use crate::error::{AppError, AppResult};
use crate::notification::EmailSender;
use crate::repository::{BankRepository, RepositoryError};

use super::{MoneyTransferCreate, MoneyTransferListing, SendMoney, TransferReceipt};

/// Service for recording and listing money transfers
#[derive(Clone)]
pub struct MoneyTransferService {
    repository: Arc<dyn BankRepository>,
    email_sender: Arc<dyn EmailSender>,
    bank_email: String,
}

fn listings(transfers: Vec<MoneyTransfer>) -> Vec<MoneyTransferListing> {
    transfers.into_iter().map(MoneyTransferListing::from).collect()
}

impl MoneyTransferService {
    pub fn new(
        repository: Arc<dyn BankRepository>,
        email_sender: Arc<dyn EmailSender>,
        bank_email: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            email_sender,
            bank_email: bank_email.into(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Transfers carrying exactly this reference number
    pub async fn get_money_transfer(
        &self,
        reference_number: &str,
    ) -> AppResult<Vec<MoneyTransferListing>> {
        if reference_number.trim().is_empty() {
            return Ok(Vec::new());
        }

        let transfers = self
            .repository
            .find_transfers_by_reference(reference_number)
            .await?;
        Ok(listings(transfers))
    }

    /// Every transfer of every account the user owns, newest first
    pub async fn get_all_money_transfers(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<MoneyTransferListing>> {
        if user_id.trim().is_empty() {
            return Ok(Vec::new());
        }

        let transfers = self
            .repository
            .list_transfers_for_user(user_id, None)
            .await?;
        Ok(listings(transfers))
    }

    /// Every transfer of one account, newest first
    pub async fn get_all_money_transfers_for_account(
        &self,
        account_id: &str,
    ) -> AppResult<Vec<MoneyTransferListing>> {
        if account_id.trim().is_empty() {
            return Ok(Vec::new());
        }

        let transfers = self
            .repository
            .list_transfers_for_account(account_id)
            .await?;
        Ok(listings(transfers))
    }

    /// The ten newest transfers across the user's accounts
    pub async fn get_last10_money_transfers_for_user(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<MoneyTransferListing>> {
        if user_id.trim().is_empty() {
            return Ok(Vec::new());
        }

        let transfers = self
            .repository
            .list_transfers_for_user(user_id, Some(RECENT_LIMIT))
            .await?;
        Ok(listings(transfers))
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Record one transfer row and apply it to the account balance.
    ///
    /// Returns `Ok(false)` without writing anything when the model is invalid
    /// or the account does not exist. The owner is notified by email once the
    /// row is stored; delivery failures are only logged.
    pub async fn create_money_transfer(&self, model: MoneyTransferCreate) -> AppResult<bool> {
        if let Err(errors) = model.validate() {
            tracing::debug!("Rejected money transfer: {}", errors);
            return Ok(false);
        }

        let Some(account) = self.repository.find_account(&model.account_id).await? else {
            tracing::debug!("Rejected money transfer: account {} not found", model.account_id);
            return Ok(false);
        };

        let transfer = model.into_transfer(Utc::now());

        match self
            .repository
            .record_transfers(std::slice::from_ref(&transfer))
            .await
        {
            Ok(()) => {}
            // account removed between lookup and insert
            Err(RepositoryError::AccountNotFound(_)) => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            transfer_id = %transfer.id,
            account_id = %transfer.account_id,
            reference_number = %transfer.reference_number,
            "Money transfer recorded"
        );

        self.notify_owner(&account, &transfer).await;

        Ok(true)
    }

    /// Transfer `amount` from one of the caller's accounts to another account
    /// of this bank. Both legs share one reference number and are stored
    /// atomically; the debit never takes the source balance below zero, even
    /// with concurrent sends.
    pub async fn send_money(&self, request: SendMoney, user_id: &str) -> AppResult<TransferReceipt> {
        request.validate()?;

        let source = self
            .repository
            .find_account(&request.account_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| AppError::AccountNotFound(request.account_id.clone()))?;

        let destination = self
            .repository
            .find_account_by_unique_id(&request.destination_bank_account_unique_id)
            .await?
            .ok_or_else(|| {
                AppError::AccountNotFound(request.destination_bank_account_unique_id.clone())
            })?;

        if source.id == destination.id {
            return Err(DomainError::SameAccountTransfer.into());
        }

        // fail fast; the repository re-checks under the row lock
        if source.balance < request.amount {
            return Err(DomainError::insufficient_funds(request.amount, source.balance).into());
        }

        let sender_name = self.owner_name(&source.user_id).await?;
        let recipient_name = self.owner_name(&destination.user_id).await?;

        let reference_number = generators::reference_number();
        let made_on = Utc::now();

        let leg = |account: &BankAccount, amount: Decimal| {
            MoneyTransferCreate {
                description: request.description.clone(),
                amount,
                account_id: account.id.clone(),
                destination_bank_account_unique_id: destination.unique_id.clone(),
                source: source.unique_id.clone(),
                sender_name: sender_name.clone(),
                recipient_name: recipient_name.clone(),
                reference_number: reference_number.clone(),
            }
            .into_transfer(made_on)
        };

        let outgoing = leg(&source, -request.amount);
        let incoming = leg(&destination, request.amount);

        let balance = match self
            .repository
            .record_internal_transfer(&outgoing, &incoming)
            .await
        {
            Ok(balance) => balance,
            Err(RepositoryError::InsufficientFunds { available, .. }) => {
                return Err(DomainError::insufficient_funds(request.amount, available).into());
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            reference_number = %reference_number,
            source = %source.unique_id,
            destination = %destination.unique_id,
            amount = %request.amount,
            "Internal transfer completed"
        );

        self.notify_owner(&source, &outgoing).await;
        self.notify_owner(&destination, &incoming).await;

        Ok(TransferReceipt {
            reference_number,
            amount: request.amount,
            source: source.unique_id,
            destination: destination.unique_id,
            made_on,
            balance,
        })
    }

    async fn owner_name(&self, user_id: &str) -> AppResult<String> {
        self.repository
            .find_user(user_id)
            .await?
            .map(|u| u.full_name)
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))
    }

    async fn notify_owner(&self, account: &BankAccount, transfer: &MoneyTransfer) {
        let owner = match self.repository.find_user(&account.user_id).await {
            Ok(Some(owner)) => owner,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Could not load owner of account {}: {}", account.id, e);
                return;
            }
        };
        let Some(email) = owner.email.as_deref() else {
            return;
        };

        let (subject, body) = notification_message(account, transfer);

        if let Err(e) = self
            .email_sender
            .send_email(&self.bank_email, email, subject, &body)
            .await
        {
            tracing::warn!(
                transfer_id = %transfer.id,
                "Failed to send transfer notification: {}",
                e
            );
        }
    }
}

fn notification_message(account: &BankAccount, transfer: &MoneyTransfer) -> (&'static str, String) {
    if transfer.amount < Decimal::ZERO {
        (
            "You have sent money",
            format!(
                "<p>{} was sent from your account {} to {} ({}).</p><p>Reference number: {}</p>",
                transfer.amount.abs(),
                account.name,
                transfer.recipient_name,
                transfer.destination,
                transfer.reference_number,
            ),
        )
    } else {
        (
            "You have received money",
            format!(
                "<p>You have received {} on your account {} from {} ({}).</p><p>Reference number: {}</p>",
                transfer.amount,
                account.name,
                transfer.sender_name,
                transfer.source,
                transfer.reference_number,
            ),
        )
    }
}
