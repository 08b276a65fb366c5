use async_trait::async_trait;
use reqwest::header;
use serde::Deserialize;
use serde_json::Value;

use remedia_application::{DetectedPattern, PatternDetector};
use remedia_core::{AppError, AppResult, TenantId};

/// HTTP client for the pattern detection service.
pub struct HttpPatternDetector {
    http_client: reqwest::Client,
    base_url: String,
    shared_secret: String,
}

#[derive(Debug, Deserialize)]
struct DetectedPatternsResponse {
    patterns: Vec<DetectedPatternResponse>,
}

#[derive(Debug, Deserialize)]
struct DetectedPatternResponse {
    tenant_id: String,
    pattern_type: String,
    instance_key: String,
    payload: Value,
}

impl HttpPatternDetector {
    /// Creates a detector client.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        shared_secret: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
            shared_secret: shared_secret.into(),
        }
    }
}

#[async_trait]
impl PatternDetector for HttpPatternDetector {
    async fn detect(&self) -> AppResult<Vec<DetectedPattern>> {
        let endpoint = format!("{}/api/internal/patterns/pending", self.base_url);
        let response = self
            .http_client
            .get(endpoint)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.shared_secret),
            )
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to call pattern detector endpoint: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(AppError::Internal(format!(
                "pattern detector endpoint returned status {}: {body}",
                status.as_u16()
            )));
        }

        let response_body = response
            .json::<DetectedPatternsResponse>()
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to parse pattern detector response body: {error}"
                ))
            })?;

        response_body
            .patterns
            .into_iter()
            .map(|pattern| {
                let tenant_uuid =
                    uuid::Uuid::parse_str(pattern.tenant_id.as_str()).map_err(|error| {
                        AppError::Validation(format!(
                            "invalid tenant id '{}' from pattern detector: {error}",
                            pattern.tenant_id
                        ))
                    })?;

                Ok(DetectedPattern {
                    tenant_id: TenantId::from_uuid(tenant_uuid),
                    pattern_type: pattern.pattern_type,
                    instance_key: pattern.instance_key,
                    payload: pattern.payload,
                })
            })
            .collect()
    }
}
