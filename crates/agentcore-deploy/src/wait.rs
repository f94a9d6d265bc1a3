//! Readiness polling with exponential backoff and cancellation support.
//!
//! Knowledge bases, memories, gateways, runtimes and functions come back from
//! their create call in a transitional state. [`wait_until_ready`] polls a
//! status check until it reports ready, fails, times out, or the run is
//! cancelled with Ctrl-C.

use anyhow::Result;
use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for readiness polling.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Initial delay between checks
    pub initial_delay: Duration,
    /// Maximum delay between checks (cap for exponential growth)
    pub max_delay: Duration,
    /// Maximum total time to wait before timeout
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(15),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Outcome of a single status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Pending(String),
    Failed(String),
}

impl Readiness {
    /// Map a service status string onto readiness.
    ///
    /// `ready` lists the terminal success states; anything containing
    /// `FAILED` is terminal failure; everything else is still in progress.
    pub fn from_status(status: &str, ready: &[&str]) -> Self {
        if ready.contains(&status) {
            Readiness::Ready
        } else if status.contains("FAILED") || status.eq_ignore_ascii_case("failed") {
            Readiness::Failed(status.to_string())
        } else {
            Readiness::Pending(status.to_string())
        }
    }
}

/// Poll `check` until the resource is ready.
///
/// # Returns
/// * `Ok(())` - Resource is ready
/// * `Err` - Timeout, cancelled, terminal failure state, or the check errored
///
/// # Example
/// ```ignore
/// wait_until_ready(WaitConfig::default(), &cancel, || async {
///     let status = client.gateway_status(&id).await?;
///     Ok(Readiness::from_status(&status, &["READY"]))
/// }, "gateway").await?;
/// ```
pub async fn wait_until_ready<F, Fut>(
    config: WaitConfig,
    cancel: &CancellationToken,
    check: F,
    resource_name: &str,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Readiness>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    let mut delays = ExponentialBuilder::default()
        .with_min_delay(config.initial_delay)
        .with_max_delay(config.max_delay)
        .with_factor(2.0)
        .with_jitter()
        .build();

    loop {
        attempts += 1;

        if cancel.is_cancelled() {
            anyhow::bail!("Wait for {} cancelled", resource_name);
        }

        if start.elapsed() >= config.timeout {
            anyhow::bail!(
                "Timeout waiting for {} after {:?} ({} attempts)",
                resource_name,
                config.timeout,
                attempts
            );
        }

        match check().await {
            Ok(Readiness::Ready) => {
                debug!(resource = %resource_name, attempts, "Resource ready");
                return Ok(());
            }
            Ok(Readiness::Failed(status)) => {
                anyhow::bail!("{} entered state {}", resource_name, status);
            }
            Ok(Readiness::Pending(status)) => {
                let delay = delays.next().unwrap_or(config.max_delay);
                debug!(
                    resource = %resource_name,
                    status = %status,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Resource not ready, polling again"
                );

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        anyhow::bail!("Wait for {} cancelled", resource_name);
                    }
                }
            }
            Err(e) => {
                warn!(resource = %resource_name, error = ?e, "Status check failed");
                return Err(e);
            }
        }
    }
}
