//! AWS test utilities
//!
//! Region detection and unique names for tests that talk to a real account.

use chrono::Utc;

/// AWS region for live tests: `AWS_REGION`, then `AWS_DEFAULT_REGION`,
/// then `us-east-1`.
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-east-1".to_string())
}

/// Unique run ID: `test-{timestamp_ms}-{counter}`.
///
/// ```
/// use agentcore_deploy_test_utils::aws::test_run_id;
///
/// assert!(test_run_id().starts_with("test-"));
/// ```
pub fn test_run_id() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test-{}-{}", ts, counter)
}

/// A project name no real deployment uses, so live tests only ever see
/// their own registry parameters.
pub fn test_project() -> String {
    format!("it{}", test_run_id().replace('-', ""))
}
