//! # UPI Client SDK
//!
//! A typed Rust client for the UPI ledger API.

use reqwest::Client;
use serde::de::DeserializeOwned;
use upi_types::{
    AccountId, AccountResponse, AccountType, ActivateBankLineRequest, BalanceRequest,
    BalanceResponse, BankId, BankResponse, CreditLineId, CreditLineResponse, HistoryPage,
    HistoryQuery, IfscResponse, LinkAccountRequest, PayToCreditLineRequest, RecentReceiver,
    RegisterRequest, RegisterResponse, SetPinRequest, TransactionDetailResponse, TransferResponse,
    TransferToAccountRequest,
};
use uuid::Uuid;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// UPI ledger API client.
pub struct UpiClient {
    base_url: String,
    access_token: Option<String>,
    http: Client,
}

impl UpiClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: None,
            http: Client::new(),
        }
    }

    /// Sets the access token for authentication.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Registers a user. The response carries the access token exactly once.
    pub async fn register(
        &self,
        name: &str,
        phone: &str,
        aadhaar: &str,
        pan: &str,
    ) -> Result<RegisterResponse, ClientError> {
        let req = RegisterRequest {
            name: name.to_string(),
            phone: phone.to_string(),
            aadhaar: aadhaar.to_string(),
            pan: pan.to_string(),
        };
        self.post("/api/register", &req).await
    }

    /// Lists banks available for account linking.
    pub async fn list_banks(&self) -> Result<Vec<BankResponse>, ClientError> {
        self.get("/api/banks").await
    }

    /// Looks up a branch by IFSC code.
    pub async fn find_ifsc(&self, code: &str) -> Result<IfscResponse, ClientError> {
        self.get(&format!("/api/ifsc/{}", code)).await
    }

    /// Links a bank account. The PIN is confirmed with itself; interactive
    /// callers should collect the confirmation separately.
    pub async fn link_account(
        &self,
        bank_id: BankId,
        account_number: &str,
        account_type: AccountType,
        pin: &str,
    ) -> Result<AccountResponse, ClientError> {
        let req = LinkAccountRequest {
            bank_id,
            account_number: account_number.to_string(),
            account_type,
            pin: pin.to_string(),
            pin_confirmation: pin.to_string(),
        };
        self.post("/api/accounts", &req).await
    }

    /// Lists the caller's accounts.
    pub async fn list_accounts(&self) -> Result<Vec<AccountResponse>, ClientError> {
        self.get("/api/accounts").await
    }

    /// Gets one of the caller's accounts by ID.
    pub async fn get_account(&self, id: AccountId) -> Result<AccountResponse, ClientError> {
        self.get(&format!("/api/accounts/{}", id)).await
    }

    /// Activates a credit line anchored to one of the caller's accounts.
    pub async fn activate_bank_line(
        &self,
        account_id: AccountId,
    ) -> Result<CreditLineResponse, ClientError> {
        let req = ActivateBankLineRequest { account_id };
        self.post("/api/credit-lines/bank", &req).await
    }

    /// Activates the caller's network-issued credit line.
    pub async fn activate_network_line(&self) -> Result<CreditLineResponse, ClientError> {
        self.post_empty("/api/credit-lines/network").await
    }

    /// Lists the caller's credit lines.
    pub async fn list_credit_lines(&self) -> Result<Vec<CreditLineResponse>, ClientError> {
        self.get("/api/credit-lines").await
    }

    /// Sets a credit line's PIN, activating it for sending.
    pub async fn set_credit_line_pin(
        &self,
        id: CreditLineId,
        pin: &str,
    ) -> Result<CreditLineResponse, ClientError> {
        let req = SetPinRequest {
            pin: pin.to_string(),
            pin_confirmation: pin.to_string(),
        };
        self.post(&format!("/api/credit-lines/{}/pin", id), &req)
            .await
    }

    /// Reads the available balance of an account or credit line.
    pub async fn balance(&self, source_id: Uuid, pin: &str) -> Result<BalanceResponse, ClientError> {
        let req = BalanceRequest {
            source_id,
            pin: pin.to_string(),
        };
        self.post("/api/balance", &req).await
    }

    /// Moves money to a bank account addressed by id, UPI address or phone.
    pub async fn transfer_to_account(
        &self,
        req: &TransferToAccountRequest,
    ) -> Result<TransferResponse, ClientError> {
        self.post("/api/transfers/account", req).await
    }

    /// Pays down a bank-anchored credit line.
    pub async fn pay_to_credit_line(
        &self,
        req: &PayToCreditLineRequest,
    ) -> Result<TransferResponse, ClientError> {
        self.post("/api/transfers/credit-line", req).await
    }

    /// Pages through the caller's transaction history.
    pub async fn history(&self, query: &HistoryQuery) -> Result<HistoryPage, ClientError> {
        let mut req = self
            .http
            .get(format!("{}/api/transactions", self.base_url))
            .query(query);
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    /// Distinct counterparties the caller most recently paid.
    pub async fn recent_receivers(&self) -> Result<Vec<RecentReceiver>, ClientError> {
        self.get("/api/transactions/recent-receivers").await
    }

    /// Full detail of one recorded transfer.
    pub async fn transaction_detail(
        &self,
        txn_ref: &str,
    ) -> Result<TransactionDetailResponse, ClientError> {
        self.get(&format!("/api/transactions/{}", txn_ref)).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let mut req = self.http.get(format!("{}{}", self.base_url, path));
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let mut req = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body);
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let mut req = self.http.post(format!("{}{}", self.base_url, path));
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or(body);
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = UpiClient::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_trailing_slash() {
        let client = UpiClient::new("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_access_token() {
        let client = UpiClient::new("http://localhost:3000").with_access_token("upi_abc");
        assert_eq!(client.access_token, Some("upi_abc".to_string()));
    }
}
