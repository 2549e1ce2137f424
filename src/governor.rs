use crate::error::{PlatformError, PlatformResult};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff/retry parameters applied around platform calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts per chunk/call before giving up on it (>= 1).
    pub max_attempts: u32,
    /// Sleep when the platform rate-limits without a retry-after value.
    pub backoff_floor: Duration,
    /// Fixed pause between successful calls to stay under burst limits.
    pub inter_call_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_floor: Duration::from_secs(1),
            inter_call_delay: Duration::from_millis(100),
        }
    }
}

/// What a chunked write run actually did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ChunkReport {
    /// Ids covered by chunks that were written successfully.
    pub written: usize,
    /// Ids covered by chunks abandoned after a non-retryable error or
    /// exhausted rate-limit retries.
    pub skipped: usize,
}

/// Split `ids` into fixed-size chunks and issue one write call per chunk.
///
/// Rate-limit responses re-issue the *same* chunk after sleeping for the
/// signaled retry-after (or the policy floor), bounded by `max_attempts`,
/// so no chunk is skipped or duplicated by the retry path. Any other
/// chunk failure is logged and skipped so one bad chunk never aborts the
/// whole run. Token expiry is not retried here; it propagates so the
/// request boundary can report it.
pub async fn write_chunked<F, Fut>(
    ids: &[String],
    chunk_size: usize,
    policy: &RetryPolicy,
    mut write: F,
) -> PlatformResult<ChunkReport>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: Future<Output = PlatformResult<()>>,
{
    let mut report = ChunkReport::default();
    for chunk in ids.chunks(chunk_size.max(1)) {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match write(chunk.to_vec()).await {
                Ok(()) => {
                    report.written += chunk.len();
                    tokio::time::sleep(policy.inter_call_delay).await;
                    break;
                }
                Err(PlatformError::TokenExpired) => return Err(PlatformError::TokenExpired),
                Err(PlatformError::RateLimited { retry_after }) => {
                    if attempt >= policy.max_attempts {
                        warn!(
                            "giving up on chunk of {} after {} rate-limited attempts",
                            chunk.len(),
                            attempt
                        );
                        report.skipped += chunk.len();
                        break;
                    }
                    let wait = retry_after.unwrap_or(policy.backoff_floor);
                    warn!("rate limited; retrying same chunk in {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    warn!("skipping chunk of {}: {}", chunk.len(), e);
                    report.skipped += chunk.len();
                    break;
                }
            }
        }
    }
    Ok(report)
}

/// Bounded rate-limit retry for a single call (a page fetch or a search
/// lookup). Other errors, including token expiry, pass straight through.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut call: F) -> PlatformResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PlatformResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match call().await {
            Err(PlatformError::RateLimited { retry_after }) if attempt < policy.max_attempts => {
                let wait = retry_after.unwrap_or(policy.backoff_floor);
                warn!("rate limited; retrying call in {:?}", wait);
                tokio::time::sleep(wait).await;
            }
            other => return other,
        }
    }
}
