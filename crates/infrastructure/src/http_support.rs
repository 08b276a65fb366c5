use std::time::Duration;

use remedia_core::{AppError, AppResult};

/// Sends one outbound HTTP request with bounded retries on transient
/// failures (5xx, 429, transport errors) and returns the attempt count.
pub(crate) async fn send_with_retry<F>(
    http_client: &reqwest::Client,
    max_attempts: u8,
    retry_backoff_ms: u64,
    context: &str,
    mut build: F,
) -> AppResult<u8>
where
    F: FnMut(&reqwest::Client) -> reqwest::RequestBuilder,
{
    let mut attempt = 0_u8;
    let mut last_error: Option<String> = None;

    while attempt < max_attempts {
        attempt = attempt.saturating_add(1);
        let response = build(http_client).send().await;

        match response {
            Ok(response) if response.status().is_success() => return Ok(attempt),
            Ok(response)
                if response.status().is_server_error()
                    || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS =>
            {
                last_error = Some(format!(
                    "transient HTTP status {} for {context}",
                    response.status()
                ));
            }
            Ok(response) => {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<response body unavailable>".to_owned());
                return Err(AppError::Validation(format!(
                    "{context} failed with status {status}: {body}"
                )));
            }
            Err(error) => {
                last_error = Some(format!("transport error for {context}: {error}"));
            }
        }

        if attempt < max_attempts {
            let delay = retry_backoff_ms.saturating_mul(u64::from(attempt));
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    Err(AppError::Internal(last_error.unwrap_or_else(|| {
        format!("{context} exhausted retries")
    })))
}
