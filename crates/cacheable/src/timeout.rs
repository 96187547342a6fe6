// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::{Error, Result};

/// Awaits `future`, giving up after `timeout`.
///
/// On expiry the future is dropped. Useful to bound the latency of a slow
/// store inside a custom client or strategy.
///
/// Must be called within a Tokio runtime.
///
/// # Errors
///
/// Returns [`Error::Timeout`] if `future` did not complete in time.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use cacheable::{Error, with_timeout};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let fast = with_timeout(Duration::from_secs(1), async { 5 }).await;
/// assert_eq!(fast.unwrap(), 5);
///
/// let slow = with_timeout(Duration::from_millis(1), std::future::pending::<()>()).await;
/// assert!(matches!(slow, Err(Error::Timeout(_))));
/// # }
/// ```
pub async fn with_timeout<T>(timeout: Duration, future: impl Future<Output = T>) -> Result<T> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_elapsed| Error::Timeout(timeout))
}
