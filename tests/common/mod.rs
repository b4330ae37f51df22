//! Common test utilities
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::util::ServiceExt;

use bank_system::notification::{EmailError, EmailSender};
use bank_system::repository::{BankRepository, InMemoryRepository, PgRepository};
use bank_system::{build_router, db, AppState, Config};

/// Subject and recipient of a captured email
#[derive(Debug, Clone)]
pub struct CapturedEmail {
    pub to: String,
    pub subject: String,
}

#[derive(Debug, Default)]
pub struct CapturingEmailSender {
    sent: Mutex<Vec<CapturedEmail>>,
}

impl CapturingEmailSender {
    pub fn sent(&self) -> Vec<CapturedEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for CapturingEmailSender {
    async fn send_email(
        &self,
        _from: &str,
        to: &str,
        subject: &str,
        _html_body: &str,
    ) -> Result<(), EmailError> {
        self.sent.lock().unwrap().push(CapturedEmail {
            to: to.to_string(),
            subject: subject.to_string(),
        });
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub emails: Arc<CapturingEmailSender>,
}

pub fn test_config() -> Config {
    Config {
        bcrypt_cost: 4,
        lockout_max_failed_attempts: 3,
        ..Config::default()
    }
}

fn build(repository: Arc<dyn BankRepository>) -> TestApp {
    let emails = Arc::new(CapturingEmailSender::default());
    let state = AppState::new(repository, emails.clone(), test_config());
    TestApp {
        router: build_router(state.clone()),
        state,
        emails,
    }
}

/// Application over the in-memory repository
pub fn memory_app() -> TestApp {
    build(Arc::new(InMemoryRepository::new()))
}

/// Application over PostgreSQL with empty tables
pub async fn postgres_app() -> TestApp {
    let pool = setup_test_db().await;
    build(Arc::new(PgRepository::new(pool)))
}

/// Connect, migrate and truncate the test database
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = db::connect(&database_url, 5)
        .await
        .expect("Failed to connect to DB");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    sqlx::query("TRUNCATE TABLE transfers, cards, accounts, user_tokens, users CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to clean up DB");

    pool
}

impl TestApp {
    /// Send a request and decode the JSON body (`Null` when empty)
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    /// Register a user and sign in; returns (user id, token)
    pub async fn sign_up(&self, user_name: &str) -> (String, String) {
        let (status, user) = self
            .send(
                "POST",
                "/api/v1/auth/register",
                None,
                Some(json!({
                    "user_name": user_name,
                    "email": format!("{}@example.com", user_name),
                    "full_name": format!("{} Tester", user_name),
                    "password": "password1"
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "registration failed: {}", user);

        let (status, token) = self
            .send(
                "POST",
                "/api/v1/auth/login",
                None,
                Some(json!({ "user_name": user_name, "password": "password1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", token);

        (
            user["id"].as_str().unwrap().to_string(),
            token["access_token"].as_str().unwrap().to_string(),
        )
    }

    /// Open an account through the API; returns the account JSON
    pub async fn open_account(&self, token: &str, name: &str) -> Value {
        let (status, account) = self
            .send(
                "POST",
                "/api/v1/accounts",
                Some(token),
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "account creation failed: {}", account);
        account
    }
}
