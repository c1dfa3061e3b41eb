//! Bounded polling for "change still pending" provider conditions
//!
//! Polls at a fixed interval with no backoff until the probe reports
//! [`ChangeStatus::InSync`], the policy timeout passes, or the invocation is
//! cancelled. An invocation deadline earlier than the policy timeout wins.

use crate::config::PollingConfig;
use crate::error::{InquisitorError, Result};
use crate::invocation::Invocation;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Propagation status of a provider-side change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeStatus {
    Pending,
    InSync,
}

/// Fixed-interval polling bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(300),
        }
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            timeout: config.timeout(),
        }
    }
}

/// Poll `probe` until the change settles
///
/// Returns the number of probes made. Probe errors surface immediately.
pub async fn wait_until_settled<F, Fut>(
    ctx: &Invocation,
    policy: PollPolicy,
    what: &str,
    mut probe: F,
) -> Result<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<ChangeStatus>>,
{
    let mut deadline = Instant::now() + policy.timeout;
    if let Some(invocation_deadline) = ctx.deadline() {
        deadline = deadline.min(invocation_deadline);
    }

    let mut attempts = 0u32;
    loop {
        ctx.check(what)?;
        attempts += 1;

        match probe().await? {
            ChangeStatus::InSync => {
                tracing::debug!(what = %what, attempts, "Change in sync");
                return Ok(attempts);
            }
            ChangeStatus::Pending => {
                let now = Instant::now();
                if now + policy.interval > deadline {
                    tracing::warn!(
                        what = %what,
                        attempts,
                        timeout_secs = policy.timeout.as_secs(),
                        "Change still pending at deadline"
                    );
                    return Err(InquisitorError::Timeout(format!(
                        "{} still pending after {} attempts",
                        what, attempts
                    )));
                }
                tracing::debug!(what = %what, attempts, "Change pending");
            }
        }

        tokio::select! {
            _ = ctx.token().cancelled() => {
                return Err(InquisitorError::Cancelled(what.to_string()));
            }
            _ = tokio::time::sleep(policy.interval) => {}
        }
    }
}
