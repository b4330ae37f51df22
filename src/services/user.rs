//! User Service
//!
//! Registration, password sign-in with lockout, and bearer tokens. Only the
//! SHA-256 hash of a token is stored; the plain token goes to the client once.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::domain::constants::token::TOKEN_BYTES;
use crate::domain::{normalize, BankUser, DomainError};
use crate::error::{AppError, AppResult};
use crate::repository::{BankRepository, RepositoryError};

use super::{AuthToken, LoginCredentials, RegisterUser, UserDetails};

/// Hex SHA-256 of a bearer token as stored in `user_tokens`
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn BankRepository>,
    bcrypt_cost: u32,
    max_failed_attempts: i32,
    lockout_duration: Duration,
}

impl UserService {
    pub fn new(repository: Arc<dyn BankRepository>, config: &Config) -> Self {
        Self {
            repository,
            bcrypt_cost: config.bcrypt_cost,
            max_failed_attempts: config.lockout_max_failed_attempts,
            lockout_duration: Duration::minutes(config.lockout_duration_minutes),
        }
    }

    pub async fn register(&self, request: RegisterUser) -> AppResult<UserDetails> {
        request.validate()?;

        let user_name = request.user_name.trim().to_string();
        let email = request.email.trim().to_string();
        let normalized_user_name = normalize(&user_name);
        let normalized_email = normalize(&email);

        if self
            .repository
            .find_user_by_normalized_name(&normalized_user_name)
            .await?
            .is_some()
        {
            return Err(DomainError::DuplicateUser.into());
        }
        if self
            .repository
            .find_user_by_normalized_email(&normalized_email)
            .await?
            .is_some()
        {
            return Err(DomainError::DuplicateUser.into());
        }

        let password_hash = self.hash_password(request.password).await?;

        let user = BankUser {
            id: Uuid::new_v4().to_string(),
            user_name: Some(user_name),
            normalized_user_name: Some(normalized_user_name),
            email: Some(email),
            normalized_email: Some(normalized_email),
            email_confirmed: false,
            full_name: request.full_name.trim().to_string(),
            password_hash: Some(password_hash),
            security_stamp: Some(Uuid::new_v4().simple().to_string().to_uppercase()),
            concurrency_stamp: Some(Uuid::new_v4().to_string()),
            phone_number: request.phone_number.filter(|p| !p.trim().is_empty()),
            phone_number_confirmed: false,
            two_factor_enabled: false,
            lockout_end: None,
            lockout_enabled: true,
            access_failed_count: 0,
        };

        match self.repository.insert_user(&user).await {
            Ok(()) => {}
            Err(RepositoryError::Conflict(_)) => return Err(DomainError::DuplicateUser.into()),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = %user.id, "User registered");

        Ok(user.into())
    }

    /// Verify the password and issue a fresh access token
    pub async fn authenticate(&self, credentials: LoginCredentials) -> AppResult<AuthToken> {
        credentials.validate()?;

        let Some(user) = self
            .repository
            .find_user_by_normalized_name(&normalize(&credentials.user_name))
            .await?
        else {
            return Err(AppError::InvalidCredentials);
        };

        let now = Utc::now();
        if user.is_locked_out(now) {
            tracing::warn!(user_id = %user.id, "Sign-in attempt on locked out user");
            return Err(AppError::AccountLocked);
        }

        let verified = match user.password_hash.clone() {
            Some(hash) => self.verify_password(credentials.password, hash).await?,
            None => false,
        };

        if !verified {
            if !user.lockout_enabled {
                return Err(AppError::InvalidCredentials);
            }

            let failed = user.access_failed_count + 1;
            if failed >= self.max_failed_attempts {
                self.repository
                    .update_lockout(&user.id, 0, Some(now + self.lockout_duration))
                    .await?;
                tracing::warn!(user_id = %user.id, "User locked out after failed sign-ins");
                return Err(AppError::AccountLocked);
            }

            self.repository
                .update_lockout(&user.id, failed, user.lockout_end)
                .await?;
            return Err(AppError::InvalidCredentials);
        }

        if user.access_failed_count != 0 || user.lockout_end.is_some() {
            self.repository.update_lockout(&user.id, 0, None).await?;
        }

        let token = generate_token();
        self.repository
            .store_token(&user.id, &hash_token(&token))
            .await?;

        tracing::info!(user_id = %user.id, "User signed in");

        Ok(AuthToken {
            user_id: user.id,
            access_token: token,
            token_type: "Bearer".to_string(),
        })
    }

    /// User id owning this bearer token, if any
    pub async fn resolve_token(&self, token: &str) -> AppResult<Option<String>> {
        if token.is_empty() {
            return Ok(None);
        }
        Ok(self
            .repository
            .find_user_id_by_token(&hash_token(token))
            .await?)
    }

    pub async fn logout(&self, user_id: &str) -> AppResult<()> {
        self.repository.remove_token(user_id).await?;
        tracing::info!(user_id = %user_id, "User signed out");
        Ok(())
    }

    pub async fn get_user(&self, user_id: &str) -> AppResult<UserDetails> {
        self.repository
            .find_user(user_id)
            .await?
            .map(Into::into)
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))
    }

    /// Delete the user with all accounts, cards and transfers
    pub async fn delete_user(&self, user_id: &str) -> AppResult<()> {
        if !self.repository.delete_user(user_id).await? {
            return Err(AppError::UserNotFound(user_id.to_string()));
        }
        tracing::info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    async fn hash_password(&self, password: String) -> AppResult<String> {
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    }

    async fn verify_password(&self, password: String, hash: String) -> AppResult<bool> {
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map_err(|e| AppError::Internal(format!("Failed to verify password: {}", e)))
    }
}
