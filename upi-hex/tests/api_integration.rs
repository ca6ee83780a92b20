//! Integration tests for the HTTP adapter.
//!
//! These tests drive the full middleware stack (metrics, rate limiting,
//! bearer auth) and the application service against an in-memory SQLite
//! database, so they cover routing, status mapping and body shapes the
//! way a real client sees them.
//!
//! This test requires the `sqlite` feature flag.

#![cfg(feature = "sqlite")]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use upi_hex::{LedgerService, inbound::HttpServer};
use upi_repo::Repo;

/// Hex-encoded AES-256 key for test databases.
const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

const PIN: &str = "4321";

/// Helper to create a test server with the given rate limit.
async fn create_test_server(requests_per_minute: u32) -> HttpServer<Repo> {
    // In-memory SQLite; migrations create tables and seed the bank directory
    let repo = Repo::new("sqlite::memory:", TEST_KEY).await.unwrap();
    let service = LedgerService::new(repo);
    HttpServer::with_rate_limit(service, requests_per_minute)
}

/// Helper to make a health check request.
fn health_request() -> Request<Body> {
    Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap()
}

/// Helper to make an authenticated GET request.
fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

/// Helper to make a JSON POST request, with or without a token.
fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Helper to collect a response body as JSON.
async fn body_json(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

/// Helper to register a user and extract the access token.
///
/// Aadhaar and PAN are derived from the phone so fixtures stay unique.
async fn register(app: &Router, name: &str, phone: &str) -> String {
    let last4 = &phone[phone.len() - 4..];
    let body = json!({
        "name": name,
        "phone": phone,
        "aadhaar": format!("{phone}99"),
        "pan": format!("ABCDE{last4}F"),
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/register", None, &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    json["access_token"].as_str().unwrap().to_string()
}

/// Helper to link an account against the first bank in the directory.
async fn link_account(app: &Router, token: &str, account_number: &str) -> Value {
    let response = app.clone().oneshot(get("/api/banks", token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let banks = body_json(response).await;
    let bank_id = banks[0]["id"].as_str().unwrap().to_string();

    let body = json!({
        "bank_id": bank_id,
        "account_number": account_number,
        "account_type": "saving",
        "pin": PIN,
        "pin_confirmation": PIN,
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/accounts", Some(token), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

/// Helper to activate a bank credit line on `account_id` and set its PIN.
async fn activate_line(app: &Router, token: &str, account_id: &str) -> Value {
    let body = json!({ "account_id": account_id });
    let response = app
        .clone()
        .oneshot(post_json("/api/credit-lines/bank", Some(token), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let line = body_json(response).await;
    assert_eq!(line["is_active"], false);

    let line_id = line["id"].as_str().unwrap();
    let body = json!({ "pin": PIN, "pin_confirmation": PIN });
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/credit-lines/{line_id}/pin"),
            Some(token),
            &body,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let line = body_json(response).await;
    assert_eq!(line["is_active"], true);
    line
}

#[tokio::test]
async fn test_rate_limiting_returns_429_when_exceeded() {
    // Create server with only 3 requests allowed per minute.
    // Registration uses the "anonymous" key, so the token gets a full quota of 3.
    let server = create_test_server(3).await;
    let app = server.router();

    let token = register(&app, "Ravi Kumar", "9876543210").await;

    // Make 3 requests (uses up the quota for this token)
    for i in 1..=3 {
        let response = app.clone().oneshot(get("/api/banks", &token)).await.unwrap();
        assert_ne!(
            response.status(),
            StatusCode::TOO_MANY_REQUESTS,
            "Request {} should not be rate limited (quota not yet exceeded)",
            i
        );
    }

    // 4th request should be rate limited
    let response = app.clone().oneshot(get("/api/banks", &token)).await.unwrap();
    assert_eq!(
        response.status(),
        StatusCode::TOO_MANY_REQUESTS,
        "Request should be rate limited after exceeding quota"
    );

    let json = body_json(response).await;
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("Rate limit exceeded")
    );
    assert_eq!(json["retry_after_seconds"], 60);
}

#[tokio::test]
async fn test_health_bypasses_auth_and_rate_limit() {
    // Create server with only 1 request allowed per minute
    let server = create_test_server(1).await;
    let app = server.router();

    // No Authorization header and well past the quota; all should succeed
    for _ in 0..10 {
        let response = app.clone().oneshot(health_request()).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::OK,
            "Health endpoint should bypass auth and rate limiting"
        );
    }
}

#[tokio::test]
async fn test_missing_or_invalid_token_is_unauthorized() {
    let server = create_test_server(100).await;
    let app = server.router();

    // No Authorization header at all
    let request = Request::builder()
        .uri("/api/accounts")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Missing or invalid Authorization header");

    // A token nobody issued
    let response = app
        .clone()
        .oneshot(get("/api/accounts", "upi_not_a_real_token_at_all_00000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid access token");
}

#[tokio::test]
async fn test_register_link_and_list_accounts() {
    let server = create_test_server(1000).await;
    let app = server.router();

    let token = register(&app, "Ravi Kumar", "9876543210").await;
    assert!(token.starts_with("upi_"), "tokens carry the upi_ prefix");

    let account = link_account(&app, &token, "483920471234").await;
    assert_eq!(account["masked_account_number"], "XXXX XXXX 1234");
    assert_eq!(account["is_primary"], true);
    assert_eq!(account["account_type"], "saving");
    assert_eq!(account["bank_name"], "Axis Bank");
    assert!(account["upi_address"].as_str().unwrap().contains('@'));
    assert!(account["ifsc"]["ifsc_code"].as_str().unwrap().len() >= 4);

    let response = app
        .clone()
        .oneshot(get("/api/accounts", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let accounts = body_json(response).await;
    assert_eq!(accounts.as_array().unwrap().len(), 1);
    assert_eq!(accounts[0]["id"], account["id"]);
}

#[tokio::test]
async fn test_credit_line_transfer_end_to_end() {
    let server = create_test_server(1000).await;
    let app = server.router();

    let sender_token = register(&app, "Ravi Kumar", "9876543210").await;
    let receiver_token = register(&app, "Priya Sharma", "9123456789").await;

    let sender_account = link_account(&app, &sender_token, "555500001111").await;
    let receiver_account = link_account(&app, &receiver_token, "777700002222").await;

    // Fresh accounts hold nothing, so the sender spends from a credit line
    let line = activate_line(&app, &sender_token, sender_account["id"].as_str().unwrap()).await;
    let credit_limit = line["credit_limit"].as_i64().unwrap();
    assert!(credit_limit >= 2_000_000, "smallest drawable limit is Rs 20,000");

    let body = json!({
        "amount": 500_000,
        "credit_upi": line["upi_address"],
        "upi_address": receiver_account["upi_address"],
        "pin": PIN,
        "description": "rent",
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/transfers/account", Some(&sender_token), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let transfer = body_json(response).await;

    let txn_ref = transfer["txn_ref"].as_str().unwrap().to_string();
    assert!(txn_ref.starts_with("TXN"));
    assert_eq!(transfer["kind"], "credit_upi");
    assert_eq!(transfer["amount"], 500_000);
    assert_eq!(transfer["receiver"]["name"], "Priya Sharma");
    assert_eq!(transfer["receiver"]["masked_account_number"], "XXXX XXXX 2222");

    // Receiver sees the credited balance through the PIN-gated read
    let body = json!({ "source_id": receiver_account["id"], "pin": PIN });
    let response = app
        .clone()
        .oneshot(post_json("/api/balance", Some(&receiver_token), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let balance = body_json(response).await;
    assert_eq!(balance["available"], 500_000);

    // Sender's available credit dropped by exactly the amount
    let response = app
        .clone()
        .oneshot(get("/api/credit-lines", &sender_token))
        .await
        .unwrap();
    let lines = body_json(response).await;
    assert_eq!(
        lines[0]["available_credit"].as_i64().unwrap(),
        credit_limit - 500_000
    );

    // Both parties can read the record, each shaped for their side
    let response = app
        .clone()
        .oneshot(get(&format!("/api/transactions/{txn_ref}"), &sender_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let detail = body_json(response).await;
    assert_eq!(detail["role"], "sender");
    assert_eq!(detail["status"], "completed");
    assert_eq!(detail["receiver"]["name"], "Priya Sharma");

    let response = app
        .clone()
        .oneshot(get(&format!("/api/transactions/{txn_ref}"), &receiver_token))
        .await
        .unwrap();
    let detail = body_json(response).await;
    assert_eq!(detail["role"], "receiver");
    assert_eq!(detail["sender"]["name"], "Ravi Kumar");

    // Malformed references are rejected before any lookup
    let response = app
        .clone()
        .oneshot(get("/api/transactions/garbage", &sender_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_fresh_account_has_no_spendable_balance() {
    let server = create_test_server(1000).await;
    let app = server.router();

    let sender_token = register(&app, "Amit Verma", "9000011111").await;
    let receiver_token = register(&app, "Neha Singh", "9000022222").await;

    let sender_account = link_account(&app, &sender_token, "111122223333").await;
    let receiver_account = link_account(&app, &receiver_token, "444455556666").await;

    let body = json!({
        "amount": 100,
        "from_account_id": sender_account["id"],
        "upi_address": receiver_account["upi_address"],
        "pin": PIN,
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/transfers/account", Some(&sender_token), &body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Insufficient balance");

    // The attempt still left a failed record in the sender's history
    let response = app
        .clone()
        .oneshot(get("/api/transactions", &sender_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["status"], "failed");
    assert_eq!(page["items"][0]["direction"], "send_money");
}
