use async_trait::async_trait;
use serde_json::{Value, json};

use remedia_application::{ActionRunMode, ActionRunRequest, ActionRunner};
use remedia_core::{AppError, AppResult};

use crate::http_support::send_with_retry;

/// Webhook-delivering runner for notification-style actions.
///
/// Covers the reminder, escalation and notify action kinds: the corrective
/// side effect is a message delivered to the tenant's integration endpoint.
pub struct HttpWebhookNotifyRunner {
    http_client: reqwest::Client,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl HttpWebhookNotifyRunner {
    /// Creates a webhook notify runner.
    #[must_use]
    pub fn new(http_client: reqwest::Client, max_attempts: u8, retry_backoff_ms: u64) -> Self {
        Self {
            http_client,
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        }
    }
}

#[async_trait]
impl ActionRunner for HttpWebhookNotifyRunner {
    async fn run(&self, request: ActionRunRequest) -> AppResult<Value> {
        let config = request.config.as_object().ok_or_else(|| {
            AppError::Validation("notify action config must be an object".to_owned())
        })?;

        let endpoint = config.get("endpoint").and_then(Value::as_str).ok_or_else(|| {
            AppError::Validation(
                "notify action config requires string field 'endpoint'".to_owned(),
            )
        })?;
        let event = config
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or("remediation.action");
        let message = config.get("message").cloned().unwrap_or(Value::Null);

        if request.mode == ActionRunMode::DryRun {
            return Ok(json!({
                "simulated": true,
                "endpoint": endpoint,
                "event": event,
            }));
        }

        let body = json!({
            "event": event,
            "action_kind": request.action_kind.as_str(),
            "message": message,
            "context": request.trigger_payload,
            "execution_id": request.execution_id,
        });

        let attempts = send_with_retry(
            &self.http_client,
            self.max_attempts,
            self.retry_backoff_ms,
            "notify webhook delivery",
            |client| {
                client
                    .post(endpoint)
                    .header("Idempotency-Key", request.execution_id.as_str())
                    .header("X-Remedia-Execution", request.execution_id.as_str())
                    .json(&body)
            },
        )
        .await?;

        Ok(json!({
            "delivered": true,
            "endpoint": endpoint,
            "event": event,
            "attempts": attempts,
        }))
    }
}
