//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use upi_types::{
    AccountId, ActivateBankLineRequest, AppError, BalanceRequest, CallerIdentity, CreditLineId,
    HistoryQuery, LedgerRepository, LinkAccountRequest, PayToCreditLineRequest, RegisterRequest,
    SetPinRequest, TransferToAccountRequest,
};

use crate::LedgerService;

/// Application state shared across handlers.
pub struct AppState<R: LedgerRepository> {
    pub service: LedgerService<R>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidReceiver => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::FORBIDDEN,
            AppError::InvalidCredential => StatusCode::BAD_REQUEST,
            AppError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            AppError::CreditLimitExceeded => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(detail) => {
                tracing::error!("internal error: {detail}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Display of AppError::Internal hides the detail logged above.
        let body = serde_json::json!({
            "error": self.0.to_string(),
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Register a user and hand out their bearer token.
#[tracing::instrument(skip(state, req), fields(name = %req.name))]
pub async fn register<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state.service.register(req).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// List the banks available for account linking.
#[tracing::instrument(skip(state))]
pub async fn list_banks<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<impl IntoResponse, ApiError> {
    let banks = state.service.list_banks().await?;
    Ok(Json(banks))
}

/// Look up a branch record by IFSC code.
#[tracing::instrument(skip(state), fields(code = %code))]
pub async fn find_ifsc<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.service.find_ifsc(&code).await?;
    Ok(Json(detail))
}

/// Link a bank account. The request carries the PIN, so it is never traced.
#[tracing::instrument(skip(state, caller, req), fields(user_id = %caller.user_id))]
pub async fn link_account<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<CallerIdentity>,
    Json(req): Json<LinkAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.service.link_account(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// List the caller's linked accounts.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn list_accounts<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let accounts = state.service.list_accounts(&caller).await?;
    Ok(Json(accounts))
}

/// Get one of the caller's accounts by ID.
#[tracing::instrument(skip(state, caller), fields(account_id = %id))]
pub async fn get_account<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let account_id: AccountId = id
        .parse()
        .map_err(|_| AppError::Validation("Invalid account id".into()))?;

    let account = state.service.get_account(&caller, account_id).await?;
    Ok(Json(account))
}

/// Activate a credit line anchored to one of the caller's accounts.
#[tracing::instrument(skip(state, caller, req), fields(user_id = %caller.user_id, account_id = %req.account_id))]
pub async fn activate_bank_line<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<CallerIdentity>,
    Json(req): Json<ActivateBankLineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let line = state.service.activate_bank_line(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// Activate the caller's network-issued credit line.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn activate_network_line<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let line = state.service.activate_network_line(&caller).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

/// List the caller's credit lines.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn list_credit_lines<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let lines = state.service.list_credit_lines(&caller).await?;
    Ok(Json(lines))
}

/// Set a credit line's PIN, activating the line.
#[tracing::instrument(skip(state, caller, req), fields(line_id = %id))]
pub async fn set_credit_line_pin<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<String>,
    Json(req): Json<SetPinRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let line_id: CreditLineId = id
        .parse()
        .map_err(|_| AppError::Validation("Invalid credit line id".into()))?;

    let line = state.service.set_credit_line_pin(&caller, line_id, req).await?;
    Ok(Json(line))
}

/// PIN-gated balance read for an account or credit line.
#[tracing::instrument(skip(state, caller, req), fields(source_id = %req.source_id))]
pub async fn balance<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<CallerIdentity>,
    Json(req): Json<BalanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state.service.balance(&caller, req).await?;
    Ok(Json(resp))
}

// #[tracing::instrument(skip(state, caller, req), fields(amount = req.amount, kind = "account"))]
#[tracing::instrument(skip(state, caller, req), fields(amount = req.amount))]
pub async fn transfer_to_account<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<CallerIdentity>,
    Json(req): Json<TransferToAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("👉 ENTERING transfer handler for {} paise", req.amount);
    let receipt = state.service.transfer_to_account(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Pay down a bank-anchored credit line.
#[tracing::instrument(skip(state, caller, req), fields(amount = req.amount, line_id = %req.to_credit_line_id))]
pub async fn pay_to_credit_line<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<CallerIdentity>,
    Json(req): Json<PayToCreditLineRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = state.service.pay_to_credit_line(&caller, req).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Page through the caller's transaction history with filters.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn history<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.service.history(&caller, query).await?;
    Ok(Json(page))
}

/// Distinct counterparties the caller most recently paid.
#[tracing::instrument(skip(state, caller), fields(user_id = %caller.user_id))]
pub async fn recent_receivers<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<CallerIdentity>,
) -> Result<impl IntoResponse, ApiError> {
    let receivers = state.service.recent_receivers(&caller).await?;
    Ok(Json(receivers))
}

/// Full detail of one recorded transfer, shaped for the caller's role.
#[tracing::instrument(skip(state, caller), fields(txn_ref = %txn_ref))]
pub async fn transaction_detail<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(caller): Extension<CallerIdentity>,
    Path(txn_ref): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = state.service.transaction_detail(&caller, &txn_ref).await?;
    Ok(Json(detail))
}
