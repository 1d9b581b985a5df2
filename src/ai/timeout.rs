//! Request Timeouts
//!
//! Bounds the outbound completion call. Without this, a hanging request
//! would block the calling task indefinitely.
//!
//! ## Usage
//!
//! ```ignore
//! use crate::ai::timeout::with_timeout;
//!
//! let completion = with_timeout(
//!     Duration::from_secs(600),
//!     provider.complete(&credential, &request),
//!     "completion request",
//! ).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use crate::types::{GateError, Result};

/// Execute an async operation with a timeout
///
/// Returns `GateError::Timeout` if the operation doesn't complete within the
/// specified duration. Timeouts classify as retryable.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(GateError::timeout(operation_name, timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(
            Duration::from_secs(1),
            async { Ok::<_, GateError>(42) },
            "test operation",
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_timeout_passes_inner_error() {
        let result: Result<()> = with_timeout(
            Duration::from_secs(1),
            async { Err(GateError::Config("bad".to_string())) },
            "test operation",
        )
        .await;
        assert!(matches!(result, Err(GateError::Config(_))));
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok::<_, GateError>(42)
            },
            "slow operation",
        )
        .await;
        assert!(matches!(result.unwrap_err(), GateError::Timeout { .. }));
    }
}
