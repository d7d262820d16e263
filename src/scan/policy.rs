use async_trait::async_trait;
use std::time::Duration;

/// Wait between two polls of a scan that is still running.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Wait after the provider signals rate limiting.
pub const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(30);

/// Fixed delays applied by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPolicy {
    pub poll_interval: Duration,
    pub rate_limit_backoff: Duration,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            rate_limit_backoff: DEFAULT_RATE_LIMIT_BACKOFF,
        }
    }
}

/// Source of delays, swappable so tests can observe waits without waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
