use async_trait::async_trait;
use serde_json::{Value, json};

use remedia_application::{
    ActionReverseRequest, ActionRunMode, ActionRunRequest, ActionRunner,
};
use remedia_core::{AppError, AppResult};

use crate::http_support::send_with_retry;

/// Work-redistribution runner with a defined inverse operation.
///
/// The forward run moves work items from one assignee to another through the
/// tenant's assignment endpoint; the inverse moves the same items back,
/// which is what makes redistribute executions rollback-eligible.
pub struct HttpRedistributeRunner {
    http_client: reqwest::Client,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl HttpRedistributeRunner {
    /// Creates a redistribute runner.
    #[must_use]
    pub fn new(http_client: reqwest::Client, max_attempts: u8, retry_backoff_ms: u64) -> Self {
        Self {
            http_client,
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        }
    }

    async fn post_assignment(
        &self,
        endpoint: &str,
        execution_id: &str,
        body: &Value,
        context: &str,
    ) -> AppResult<u8> {
        send_with_retry(
            &self.http_client,
            self.max_attempts,
            self.retry_backoff_ms,
            context,
            |client| {
                client
                    .post(endpoint)
                    .header("Idempotency-Key", execution_id)
                    .header("X-Remedia-Execution", execution_id)
                    .json(body)
            },
        )
        .await
    }
}

fn assignment_parts(config: &Value) -> AppResult<(&str, &str, &str, Value)> {
    let config = config.as_object().ok_or_else(|| {
        AppError::Validation("redistribute action config must be an object".to_owned())
    })?;

    let endpoint = config.get("endpoint").and_then(Value::as_str).ok_or_else(|| {
        AppError::Validation(
            "redistribute action config requires string field 'endpoint'".to_owned(),
        )
    })?;
    let from_assignee = config
        .get("from_assignee")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AppError::Validation(
                "redistribute action config requires string field 'from_assignee'".to_owned(),
            )
        })?;
    let to_assignee = config
        .get("to_assignee")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AppError::Validation(
                "redistribute action config requires string field 'to_assignee'".to_owned(),
            )
        })?;
    let work_items = config
        .get("work_items")
        .cloned()
        .unwrap_or_else(|| json!([]));

    Ok((endpoint, from_assignee, to_assignee, work_items))
}

#[async_trait]
impl ActionRunner for HttpRedistributeRunner {
    async fn run(&self, request: ActionRunRequest) -> AppResult<Value> {
        let (endpoint, from_assignee, to_assignee, work_items) =
            assignment_parts(&request.config)?;

        if request.mode == ActionRunMode::DryRun {
            return Ok(json!({
                "simulated": true,
                "endpoint": endpoint,
                "from_assignee": from_assignee,
                "to_assignee": to_assignee,
                "work_items": work_items,
            }));
        }

        let body = json!({
            "from_assignee": from_assignee,
            "to_assignee": to_assignee,
            "work_items": work_items,
            "execution_id": request.execution_id,
        });

        self.post_assignment(
            endpoint,
            request.execution_id.as_str(),
            &body,
            "work redistribution",
        )
        .await?;

        // The result carries everything the inverse needs.
        Ok(json!({
            "redistributed": true,
            "endpoint": endpoint,
            "from_assignee": from_assignee,
            "to_assignee": to_assignee,
            "work_items": work_items,
        }))
    }

    fn supports_reverse(&self) -> bool {
        true
    }

    async fn reverse(&self, request: ActionReverseRequest) -> AppResult<Value> {
        let original = request.original_result.as_object().ok_or_else(|| {
            AppError::Validation(
                "redistribute reverse requires the original result object".to_owned(),
            )
        })?;

        let endpoint = original.get("endpoint").and_then(Value::as_str).ok_or_else(|| {
            AppError::Validation(
                "redistribute original result is missing field 'endpoint'".to_owned(),
            )
        })?;
        let from_assignee = original
            .get("from_assignee")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::Validation(
                    "redistribute original result is missing field 'from_assignee'".to_owned(),
                )
            })?;
        let to_assignee = original
            .get("to_assignee")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::Validation(
                    "redistribute original result is missing field 'to_assignee'".to_owned(),
                )
            })?;
        let work_items = original
            .get("work_items")
            .cloned()
            .unwrap_or_else(|| json!([]));

        // Swap the direction of the original move.
        let body = json!({
            "from_assignee": to_assignee,
            "to_assignee": from_assignee,
            "work_items": work_items,
            "reverse_of_execution": request.execution_id,
        });

        let reverse_key = format!("{}:reverse", request.execution_id);
        self.post_assignment(
            endpoint,
            reverse_key.as_str(),
            &body,
            "work redistribution reverse",
        )
        .await?;

        Ok(json!({
            "reversed": true,
            "from_assignee": to_assignee,
            "to_assignee": from_assignee,
            "work_items": work_items,
        }))
    }
}
