//! Detached context with bounded timeout (spec §4.J, §5): persistence that
//! must outlive caller cancellation runs here instead of under the caller's
//! own cancellation token.
//!
//! No structured-concurrency framework is pulled in — the teacher doesn't
//! use one either; `tokio::time::timeout` on a freshly spawned task is
//! enough to decouple the future from the caller's dropped scope.

use std::future::Future;
use std::time::Duration;

use crate::error::{GatewayError, Result};

pub const DEFAULT_DETACH_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawns `future` onto its own task (so dropping the caller's future does
/// not cancel it) and awaits it with a bound of `timeout`. A timeout is
/// reported, not silently swallowed, so callers can log it; spec §7 still
/// requires bookkeeping failures never surface as a 500 to the end user —
/// that swallow happens at the call site, not here.
pub async fn detached_with_timeout<F>(timeout: Duration, future: F) -> Result<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let handle = tokio::spawn(future);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(inner)) => inner,
        Ok(Err(join_err)) => Err(GatewayError::Internal(format!("detached task panicked: {join_err}"))),
        Err(_) => Err(GatewayError::Internal("detached persistence timed out".into())),
    }
}
