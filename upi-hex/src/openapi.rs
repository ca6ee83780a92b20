//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use upi_types::domain::{
    AccountId, AccountType, BankId, CreditLineId, CreditLineKind, TransactionId,
    TransactionStatus, TransferKind, TxnRef, UpiAddress, UserId,
};
use upi_types::dto::{
    AccountResponse, ActivateBankLineRequest, AmountRange, BalanceRequest, BalanceResponse,
    BankResponse, CreditLineResponse, DateRange, Direction, HistoryEntry, HistoryPage,
    IfscResponse, LinkAccountRequest, PartyDetail, PayToCreditLineRequest, ReceiverSummary,
    RecentReceiver, RegisterRequest, RegisterResponse, SetPinRequest, TransactionDetailResponse,
    TransactionRole, TransferResponse, TransferToAccountRequest,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

/// Register a user and receive the access token
#[utoipa::path(
    post,
    path = "/api/register",
    tag = "identity",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered, token shown once", body = RegisterResponse),
        (status = 409, description = "Phone or identity document already registered"),
        (status = 422, description = "Invalid registration data")
    )
)]
async fn register() {}

/// List banks available for account linking
#[utoipa::path(
    get,
    path = "/api/banks",
    tag = "directory",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "List of banks", body = Vec<BankResponse>),
        (status = 401, description = "Unauthorized")
    )
)]
async fn list_banks() {}

/// Look up a branch by IFSC code
#[utoipa::path(
    get,
    path = "/api/ifsc/{code}",
    tag = "directory",
    security(("bearer_auth" = [])),
    params(
        ("code" = String, Path, description = "IFSC code, case-insensitive")
    ),
    responses(
        (status = 200, description = "Branch record", body = IfscResponse),
        (status = 404, description = "IFSC not found"),
        (status = 401, description = "Unauthorized")
    )
)]
async fn find_ifsc() {}

/// Link a bank account
#[utoipa::path(
    post,
    path = "/api/accounts",
    tag = "accounts",
    request_body = LinkAccountRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Account linked with a fresh UPI address", body = AccountResponse),
        (status = 409, description = "Account number already linked"),
        (status = 422, description = "Invalid account number or PIN"),
        (status = 401, description = "Unauthorized")
    )
)]
async fn link_account() {}

/// List the caller's accounts
#[utoipa::path(
    get,
    path = "/api/accounts",
    tag = "accounts",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "List of linked accounts", body = Vec<AccountResponse>),
        (status = 401, description = "Unauthorized")
    )
)]
async fn list_accounts() {}

/// Get one of the caller's accounts by ID
#[utoipa::path(
    get,
    path = "/api/accounts/{id}",
    tag = "accounts",
    security(("bearer_auth" = [])),
    params(
        ("id" = AccountId, Path, description = "Account ID (UUID)")
    ),
    responses(
        (status = 200, description = "Account details", body = AccountResponse),
        (status = 404, description = "Account not found"),
        (status = 401, description = "Unauthorized")
    )
)]
async fn get_account() {}

/// Activate a credit line anchored to one of the caller's accounts
#[utoipa::path(
    post,
    path = "/api/credit-lines/bank",
    tag = "credit-lines",
    request_body = ActivateBankLineRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Credit line activated, PIN not yet set", body = CreditLineResponse),
        (status = 404, description = "Account not found"),
        (status = 409, description = "Credit line already activated for this account"),
        (status = 401, description = "Unauthorized")
    )
)]
async fn activate_bank_line() {}

/// Activate the caller's network-issued credit line
#[utoipa::path(
    post,
    path = "/api/credit-lines/network",
    tag = "credit-lines",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Network credit line activated", body = CreditLineResponse),
        (status = 409, description = "Network credit line already exists"),
        (status = 401, description = "Unauthorized")
    )
)]
async fn activate_network_line() {}

/// List the caller's credit lines
#[utoipa::path(
    get,
    path = "/api/credit-lines",
    tag = "credit-lines",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "List of credit lines", body = Vec<CreditLineResponse>),
        (status = 401, description = "Unauthorized")
    )
)]
async fn list_credit_lines() {}

/// Set a credit line's PIN, activating it for sending
#[utoipa::path(
    post,
    path = "/api/credit-lines/{id}/pin",
    tag = "credit-lines",
    request_body = SetPinRequest,
    security(("bearer_auth" = [])),
    params(
        ("id" = CreditLineId, Path, description = "Credit line ID (UUID)")
    ),
    responses(
        (status = 200, description = "PIN set, line active", body = CreditLineResponse),
        (status = 404, description = "Credit line not found"),
        (status = 422, description = "Invalid PIN or confirmation mismatch"),
        (status = 401, description = "Unauthorized")
    )
)]
async fn set_credit_line_pin() {}

/// PIN-gated balance read for an account or credit line
#[utoipa::path(
    post,
    path = "/api/balance",
    tag = "accounts",
    request_body = BalanceRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Available balance or credit in paise", body = BalanceResponse),
        (status = 400, description = "Invalid PIN"),
        (status = 404, description = "Funding source not found"),
        (status = 401, description = "Unauthorized")
    )
)]
async fn balance() {}

/// Move money to a bank account addressed by id, UPI address or phone
#[utoipa::path(
    post,
    path = "/api/transfers/account",
    tag = "transfers",
    request_body = TransferToAccountRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Transfer committed", body = TransferResponse),
        (status = 400, description = "Invalid PIN, insufficient balance or invalid receiver"),
        (status = 403, description = "Sender not owned by the caller"),
        (status = 404, description = "Sender or receiver not found"),
        (status = 422, description = "Malformed request"),
        (status = 401, description = "Unauthorized")
    )
)]
async fn transfer_to_account() {}

/// Pay down a bank-anchored credit line
#[utoipa::path(
    post,
    path = "/api/transfers/credit-line",
    tag = "transfers",
    request_body = PayToCreditLineRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Payment committed", body = TransferResponse),
        (status = 400, description = "Invalid PIN or insufficient balance"),
        (status = 404, description = "Credit line not found"),
        (status = 422, description = "Repayment would exceed the credit limit"),
        (status = 401, description = "Unauthorized")
    )
)]
async fn pay_to_credit_line() {}

/// Page through the caller's transaction history
#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("status" = Option<TransactionStatus>, Query, description = "Filter by terminal status"),
        ("kind" = Option<TransferKind>, Query, description = "Filter by funding-source family"),
        ("date_range" = Option<DateRange>, Query, description = "Relative time window"),
        ("amount_range" = Option<AmountRange>, Query, description = "Fixed rupee bucket"),
        ("direction" = Option<Direction>, Query, description = "Caller's side of the transfer"),
        ("page" = Option<u32>, Query, description = "1-based page number")
    ),
    responses(
        (status = 200, description = "One page of history, newest first", body = HistoryPage),
        (status = 401, description = "Unauthorized")
    )
)]
async fn history() {}

/// Distinct counterparties the caller most recently paid
#[utoipa::path(
    get,
    path = "/api/transactions/recent-receivers",
    tag = "transactions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Recent receivers, newest first", body = Vec<RecentReceiver>),
        (status = 401, description = "Unauthorized")
    )
)]
async fn recent_receivers() {}

/// Full detail of one recorded transfer
#[utoipa::path(
    get,
    path = "/api/transactions/{txn_ref}",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(
        ("txn_ref" = String, Path, description = "Transaction reference, TXN followed by 18 digits")
    ),
    responses(
        (status = 200, description = "Transaction detail shaped for the caller", body = TransactionDetailResponse),
        (status = 404, description = "Transaction not found or caller is not a party"),
        (status = 422, description = "Malformed reference"),
        (status = 401, description = "Unauthorized")
    )
)]
async fn transaction_detail() {}

/// OpenAPI documentation for the UPI ledger API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "UPI Ledger Service API",
        version = "1.0.0",
        description = "A UPI-style mobile payments backend: linked bank accounts, credit lines, PIN-authorized transfers and an immutable transaction trail.\n\n## Authentication\n\nRegister once via `/api/register`; the response carries your access token exactly once. Include it in the `Authorization` header:\n\n```\nAuthorization: Bearer upi_your_token_here\n```",
        license(name = "MIT"),
    ),
    paths(
        health,
        register,
        list_banks,
        find_ifsc,
        link_account,
        list_accounts,
        get_account,
        activate_bank_line,
        activate_network_line,
        list_credit_lines,
        set_credit_line_pin,
        balance,
        transfer_to_account,
        pay_to_credit_line,
        history,
        recent_receivers,
        transaction_detail,
    ),
    components(
        schemas(
            RegisterRequest,
            RegisterResponse,
            BankResponse,
            IfscResponse,
            LinkAccountRequest,
            AccountResponse,
            ActivateBankLineRequest,
            CreditLineResponse,
            SetPinRequest,
            BalanceRequest,
            BalanceResponse,
            TransferToAccountRequest,
            PayToCreditLineRequest,
            TransferResponse,
            ReceiverSummary,
            HistoryEntry,
            HistoryPage,
            PartyDetail,
            TransactionDetailResponse,
            TransactionRole,
            RecentReceiver,
            AccountId,
            BankId,
            CreditLineId,
            TransactionId,
            UserId,
            TxnRef,
            UpiAddress,
            AccountType,
            CreditLineKind,
            TransferKind,
            TransactionStatus,
            DateRange,
            AmountRange,
            Direction,
        )
    ),

    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "identity", description = "Registration and access tokens"),
        (name = "directory", description = "Bank and IFSC lookups"),
        (name = "accounts", description = "Linked accounts and balance reads"),
        (name = "credit-lines", description = "Credit line activation and PINs"),
        (name = "transfers", description = "Money movement operations"),
        (name = "transactions", description = "History and transaction records"),
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for Bearer token authentication.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
