mod config;
mod ports;
mod service;

pub use config::SafetyPolicy;
pub use ports::ExecutionUsageSource;
pub use service::{SafetyCheck, SafetyCheckResult, SafetyContext, SafetyValidator};
