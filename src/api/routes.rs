//! API Routes
//!
//! HTTP endpoint definitions. Resources of other users answer 404.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::domain::OperationContext;
use crate::error::AppError;
use crate::services::{
    AuthToken, BankAccountCreate, BankAccountDetails, CardCreate, CardDetails, LoginCredentials,
    MoneyTransferListing, RegisterUser, SendMoney, TransferReceipt, UserDetails,
};

use super::middleware::AuthenticatedUser;
use super::AppState;

// =========================================================================
// Routers
// =========================================================================

/// Routes reachable without a token
pub fn create_public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Routes behind the bearer-token middleware
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(logout))
        .route("/users/me", get(get_current_user).delete(delete_current_user))
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/:account_id", get(get_account).patch(rename_account))
        .route("/accounts/:account_id/transfers", get(list_account_transfers))
        .route("/cards", get(list_cards).post(create_card))
        .route("/cards/:card_id", get(get_card).delete(delete_card))
        .route("/transfers", get(list_transfers).post(send_money))
        .route("/transfers/recent", get(list_recent_transfers))
        .route(
            "/transfers/reference/:reference_number",
            get(get_transfers_by_reference),
        )
}

// =========================================================================
// Identity
// =========================================================================

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterUser>,
) -> Result<(StatusCode, Json<UserDetails>), AppError> {
    let user = state.users.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<AuthToken>, AppError> {
    Ok(Json(state.users.authenticate(credentials).await?))
}

async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<StatusCode, AppError> {
    state.users.logout(&user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_current_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<UserDetails>, AppError> {
    Ok(Json(state.users.get_user(&user.user_id).await?))
}

/// Delete the signed-in user with every account, card and transfer
async fn delete_current_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(context): Extension<OperationContext>,
) -> Result<StatusCode, AppError> {
    tracing::info!(correlation_id = ?context.correlation_id, "Deleting user {}", user.user_id);
    state.users.delete_user(&user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Bank accounts
// =========================================================================

async fn list_accounts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<BankAccountDetails>>, AppError> {
    Ok(Json(state.accounts.list_for_user(&user.user_id).await?))
}

async fn create_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<BankAccountCreate>,
) -> Result<(StatusCode, Json<BankAccountDetails>), AppError> {
    let account = state.accounts.create(&user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

async fn get_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(account_id): Path<String>,
) -> Result<Json<BankAccountDetails>, AppError> {
    Ok(Json(state.accounts.get_by_id(&account_id, &user.user_id).await?))
}

async fn rename_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(account_id): Path<String>,
    Json(request): Json<BankAccountCreate>,
) -> Result<Json<BankAccountDetails>, AppError> {
    Ok(Json(
        state
            .accounts
            .rename(&account_id, &user.user_id, request)
            .await?,
    ))
}

async fn list_account_transfers(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(account_id): Path<String>,
) -> Result<Json<Vec<MoneyTransferListing>>, AppError> {
    let account = state.accounts.get_by_id(&account_id, &user.user_id).await?;
    Ok(Json(
        state
            .transfers
            .get_all_money_transfers_for_account(&account.id)
            .await?,
    ))
}

// =========================================================================
// Cards
// =========================================================================

async fn list_cards(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<CardDetails>>, AppError> {
    Ok(Json(state.cards.list_for_user(&user.user_id).await?))
}

async fn create_card(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<CardCreate>,
) -> Result<(StatusCode, Json<CardDetails>), AppError> {
    let card = state.cards.create(&user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(card)))
}

async fn get_card(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(card_id): Path<String>,
) -> Result<Json<CardDetails>, AppError> {
    Ok(Json(state.cards.get(&card_id, &user.user_id).await?))
}

async fn delete_card(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(card_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.cards.delete(&card_id, &user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Money transfers
// =========================================================================

async fn list_transfers(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<MoneyTransferListing>>, AppError> {
    Ok(Json(
        state
            .transfers
            .get_all_money_transfers(&user.user_id)
            .await?,
    ))
}

async fn list_recent_transfers(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Vec<MoneyTransferListing>>, AppError> {
    Ok(Json(
        state
            .transfers
            .get_last10_money_transfers_for_user(&user.user_id)
            .await?,
    ))
}

/// Transfers with this reference number on the caller's own accounts
async fn get_transfers_by_reference(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(reference_number): Path<String>,
) -> Result<Json<Vec<MoneyTransferListing>>, AppError> {
    let owned: Vec<String> = state
        .accounts
        .list_for_user(&user.user_id)
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect();

    let mut transfers = state.transfers.get_money_transfer(&reference_number).await?;
    transfers.retain(|t| owned.contains(&t.account_id));

    Ok(Json(transfers))
}

async fn send_money(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<SendMoney>,
) -> Result<(StatusCode, Json<TransferReceipt>), AppError> {
    tracing::debug!(
        correlation_id = ?context.correlation_id,
        client_ip = ?context.client_ip,
        account_id = %request.account_id,
        "Send money requested"
    );

    let receipt = state.transfers.send_money(request, &user.user_id).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
