//! Remedia remediation sweep runtime.
//!
//! Polls the external pattern detector and feeds detected conditions into
//! the execution engine, one tenant at a time.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use remedia_application::{
    ActionRunnerRegistry, DetectedPattern, ExecutionService, ExecutionUsageSource,
    PatternDetector, SafetyPolicy, SafetyValidator,
};
use remedia_core::{ActorIdentity, AppError, AppResult, TenantId};
use remedia_domain::ActionKind;
use remedia_infrastructure::{
    HttpPatternDetector, HttpRedistributeRunner, HttpWebhookNotifyRunner,
    PostgresAuditRepository, PostgresRemediationRepository, RedisFingerprintLock,
};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct SweeperConfig {
    database_url: String,
    redis_url: String,
    detector_base_url: String,
    detector_shared_secret: String,
    sweeper_id: String,
    sweep_interval_ms: u64,
    dry_run: bool,
    webhook_max_attempts: u8,
    webhook_retry_backoff_ms: u64,
    safety_policy: SafetyPolicy,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = SweeperConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let redis_client = redis::Client::open(config.redis_url.as_str())
        .map_err(|error| AppError::Internal(format!("failed to open redis client: {error}")))?;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let execution_service = build_execution_service(pool, redis_client, &http_client, &config);
    let detector = HttpPatternDetector::new(
        http_client,
        config.detector_base_url.clone(),
        config.detector_shared_secret.clone(),
    );

    info!(
        sweeper_id = %config.sweeper_id,
        detector_base_url = %config.detector_base_url,
        sweep_interval_ms = config.sweep_interval_ms,
        dry_run = config.dry_run,
        "remedia-worker started"
    );

    loop {
        match detector.detect().await {
            Ok(patterns) if patterns.is_empty() => {
                tokio::time::sleep(Duration::from_millis(config.sweep_interval_ms)).await;
            }
            Ok(patterns) => {
                info!(
                    sweeper_id = %config.sweeper_id,
                    detected_count = patterns.len(),
                    "detected patterns awaiting remediation"
                );

                for (tenant_id, tenant_patterns) in group_by_tenant(patterns) {
                    let actor =
                        ActorIdentity::new("remediation-sweeper", "Remediation Sweeper", tenant_id);

                    match execution_service
                        .execute_actions_for_patterns(&actor, &tenant_patterns, config.dry_run)
                        .await
                    {
                        Ok(executions) => {
                            info!(
                                sweeper_id = %config.sweeper_id,
                                tenant_id = %tenant_id,
                                pattern_count = tenant_patterns.len(),
                                execution_count = executions.len(),
                                "remediation sweep finished for tenant"
                            );
                        }
                        Err(error) => {
                            warn!(
                                sweeper_id = %config.sweeper_id,
                                tenant_id = %tenant_id,
                                error = %error,
                                "remediation sweep failed for tenant"
                            );
                        }
                    }
                }

                tokio::time::sleep(Duration::from_millis(config.sweep_interval_ms)).await;
            }
            Err(error) => {
                warn!(
                    sweeper_id = %config.sweeper_id,
                    error = %error,
                    "failed to poll pattern detector"
                );
                tokio::time::sleep(Duration::from_millis(config.sweep_interval_ms)).await;
            }
        }
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_execution_service(
    pool: PgPool,
    redis_client: redis::Client,
    http_client: &reqwest::Client,
    config: &SweeperConfig,
) -> ExecutionService {
    let repository = Arc::new(PostgresRemediationRepository::new(pool.clone()));
    let audit_repository = Arc::new(PostgresAuditRepository::new(pool));
    let usage: Arc<dyn ExecutionUsageSource> = repository.clone();
    let safety_validator = SafetyValidator::new(usage, config.safety_policy.clone());

    let notify_runner = Arc::new(HttpWebhookNotifyRunner::new(
        http_client.clone(),
        config.webhook_max_attempts,
        config.webhook_retry_backoff_ms,
    ));
    let redistribute_runner = Arc::new(HttpRedistributeRunner::new(
        http_client.clone(),
        config.webhook_max_attempts,
        config.webhook_retry_backoff_ms,
    ));
    let runner_registry = Arc::new(
        ActionRunnerRegistry::new()
            .with_runner(ActionKind::Reminder, notify_runner.clone())
            .with_runner(ActionKind::Escalation, notify_runner.clone())
            .with_runner(ActionKind::Notify, notify_runner)
            .with_runner(ActionKind::Redistribute, redistribute_runner),
    );

    let lock_coordinator = Arc::new(RedisFingerprintLock::new(redis_client, "remedia:locks"));

    ExecutionService::new(
        repository,
        safety_validator,
        runner_registry,
        lock_coordinator,
        audit_repository,
    )
}

fn group_by_tenant(patterns: Vec<DetectedPattern>) -> HashMap<TenantId, Vec<DetectedPattern>> {
    let mut grouped: HashMap<TenantId, Vec<DetectedPattern>> = HashMap::new();
    for pattern in patterns {
        grouped.entry(pattern.tenant_id).or_default().push(pattern);
    }

    grouped
}

impl SweeperConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_owned());
        let detector_base_url = env::var("DETECTOR_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3001".to_owned())
            .trim_end_matches('/')
            .to_owned();
        let detector_shared_secret = required_env("DETECTOR_SHARED_SECRET")?;
        let sweeper_id = env::var("SWEEPER_ID")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("sweeper-{}", std::process::id()));
        let sweep_interval_ms = parse_env_u64("SWEEP_INTERVAL_MS", 5000)?;
        let dry_run = parse_env_bool("SWEEP_DRY_RUN", false)?;
        let webhook_max_attempts = parse_env_u8("WEBHOOK_MAX_ATTEMPTS", 3)?;
        let webhook_retry_backoff_ms = parse_env_u64("WEBHOOK_RETRY_BACKOFF_MS", 200)?;
        let safety_policy = load_safety_policy()?;

        if sweep_interval_ms == 0 {
            return Err(AppError::Validation(
                "SWEEP_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        if webhook_max_attempts == 0 {
            return Err(AppError::Validation(
                "WEBHOOK_MAX_ATTEMPTS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            redis_url,
            detector_base_url,
            detector_shared_secret,
            sweeper_id,
            sweep_interval_ms,
            dry_run,
            webhook_max_attempts,
            webhook_retry_backoff_ms,
            safety_policy,
        })
    }
}

fn load_safety_policy() -> AppResult<SafetyPolicy> {
    let defaults = SafetyPolicy::default();

    let max_executions_per_hour = parse_env_u32(
        "SAFETY_MAX_EXECUTIONS_PER_HOUR",
        defaults.max_executions_per_hour,
    )?;
    let max_targets = parse_env_u32("SAFETY_MAX_TARGETS", defaults.max_targets)?;

    let denied_action_kinds = match env::var("SAFETY_DENIED_ACTION_KINDS") {
        Ok(value) => value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ActionKind::parse)
            .collect::<AppResult<Vec<_>>>()?,
        Err(_) => Vec::new(),
    };

    let allowed_utc_hours = match env::var("SAFETY_ALLOWED_UTC_HOURS") {
        Ok(value) => Some(parse_hour_window(value.as_str())?),
        Err(_) => None,
    };

    Ok(SafetyPolicy {
        max_executions_per_hour,
        denied_action_kinds,
        allowed_utc_hours,
        max_targets,
    })
}

fn parse_hour_window(value: &str) -> AppResult<(u8, u8)> {
    let (start, end) = value.split_once('-').ok_or_else(|| {
        AppError::Validation(format!(
            "invalid SAFETY_ALLOWED_UTC_HOURS value '{value}': expected 'start-end'"
        ))
    })?;

    let start = start.trim().parse::<u8>().map_err(|error| {
        AppError::Validation(format!(
            "invalid SAFETY_ALLOWED_UTC_HOURS start hour '{start}': {error}"
        ))
    })?;
    let end = end.trim().parse::<u8>().map_err(|error| {
        AppError::Validation(format!(
            "invalid SAFETY_ALLOWED_UTC_HOURS end hour '{end}': {error}"
        ))
    })?;

    if start >= 24 || end >= 24 {
        return Err(AppError::Validation(
            "SAFETY_ALLOWED_UTC_HOURS hours must be between 0 and 23".to_owned(),
        ));
    }

    Ok((start, end))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_bool(name: &str, default: bool) -> AppResult<bool> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => Err(AppError::Validation(format!(
                "invalid {name} value '{other}': expected a boolean"
            ))),
        },
        Err(_) => Ok(default),
    }
}

fn parse_env_u8(name: &str, default: u8) -> AppResult<u8> {
    match env::var(name) {
        Ok(value) => value.parse::<u8>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
