//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_pattern_detector;
mod http_redistribute_runner;
mod http_support;
mod http_webhook_notify_runner;
mod postgres_audit_repository;
mod postgres_remediation_repository;
mod redis_fingerprint_lock;

pub use http_pattern_detector::HttpPatternDetector;
pub use http_redistribute_runner::HttpRedistributeRunner;
pub use http_webhook_notify_runner::HttpWebhookNotifyRunner;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_remediation_repository::PostgresRemediationRepository;
pub use redis_fingerprint_lock::RedisFingerprintLock;
