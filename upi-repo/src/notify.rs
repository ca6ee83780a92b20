//! Background delivery of queued notifications to the push gateway.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, instrument};

use upi_types::{LedgerRepository, Notification, NotificationStatus};

use crate::{Repo, security};

/// Delivery attempts before a notification is parked as failed.
const MAX_DELIVERY_ATTEMPTS: i32 = 3;

/// How many queued rows one poll picks up.
const DELIVERY_BATCH_SIZE: u32 = 10;

/// Upper bound on one gateway POST; a stuck gateway must not stall the
/// delivery loop.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct NotificationWorker {
    repo: Repo,
    client: reqwest::Client,
    gateway_url: String,
    signing_secret: String,
}

impl NotificationWorker {
    pub fn new(repo: Repo, gateway_url: String, signing_secret: String) -> Self {
        Self {
            repo,
            client: reqwest::Client::new(),
            gateway_url,
            signing_secret,
        }
    }

    #[instrument(skip(self))]
    pub async fn run(self) {
        info!("Starting notification worker sending to {}", self.gateway_url);
        loop {
            match self.repo.pending_notifications(DELIVERY_BATCH_SIZE).await {
                Ok(batch) => {
                    if !batch.is_empty() {
                        info!("Delivering {} pending notifications", batch.len());
                        for notification in batch {
                            self.deliver(notification).await;
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to fetch pending notifications: {}", e);
                }
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    #[instrument(skip(self, notification), fields(notification_id = %notification.id))]
    async fn deliver(&self, notification: Notification) {
        let payload = serde_json::json!({
            "id": notification.id,
            "user_id": notification.user_id,
            "title": notification.title,
            "body": notification.body,
            "data": notification.data,
        });
        let body = payload.to_string();
        let signature = security::sign_notification(body.as_bytes(), &self.signing_secret);

        let result = self
            .client
            .post(&self.gateway_url)
            .timeout(DELIVERY_TIMEOUT)
            .header("X-Notification-Signature", signature)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await;

        let delivered = match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                error!("Gateway rejected notification: HTTP {}", resp.status());
                false
            }
            Err(e) => {
                error!("Failed to reach notification gateway: {}", e);
                false
            }
        };

        let status = if delivered {
            NotificationStatus::Sent
        } else if notification.attempts + 1 >= MAX_DELIVERY_ATTEMPTS {
            NotificationStatus::Failed
        } else {
            // Stays pending; the next poll picks it up again.
            NotificationStatus::Pending
        };

        if let Err(e) = self.repo.mark_notification(notification.id, status).await {
            error!("Failed to update notification status: {}", e);
        }
    }
}
