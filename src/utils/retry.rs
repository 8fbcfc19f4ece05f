use crate::clients::ApiError;
use crate::models::ResourceKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, warn};

/// How the pause between attempts grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// `delay * attempt`
    Linear,
    /// `delay * 2^(attempt - 1)`
    Exponential,
}

impl Backoff {
    pub fn from_config_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "linear" => Some(Backoff::Linear),
            "exponential" => Some(Backoff::Exponential),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backoff::Linear => "linear",
            Backoff::Exponential => "exponential",
        }
    }
}

/// Every collaborator call that may be retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOperation {
    ListResources(ResourceKind),
    FetchCount { kind: ResourceKind, resource: String },
    SendText,
    SendImage { caption: String },
}

impl fmt::Display for RetryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryOperation::ListResources(kind) => write!(f, "list {kind}"),
            RetryOperation::FetchCount { kind, resource } => {
                write!(f, "fetch {kind} count for '{resource}'")
            }
            RetryOperation::SendText => f.write_str("send text message"),
            RetryOperation::SendImage { caption } => write!(f, "send image '{caption}'"),
        }
    }
}

/// Bounded retry with a fixed attempt count and no jitter
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff,
        }
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Backoff::Linear)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause after the failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.base_delay.saturating_mul(factor)
            }
        }
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up. The last error is returned in the latter cases.
    pub async fn run<T, F, Fut>(
        &self,
        operation: RetryOperation,
        mut call: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{operation} succeeded on attempt {attempt}");
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => {
                    error!("{operation} failed permanently: {e}");
                    return Err(e);
                }
                Err(e) if attempt >= self.max_attempts => {
                    error!("{operation} failed after {attempt} attempts: {e}");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{operation} failed (attempt {attempt}/{}): {e}, retrying in {delay:?}",
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Backoff::Linear)
    }
}
