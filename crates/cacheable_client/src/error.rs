// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for store operations.

use std::sync::Arc;

/// An error from a store operation.
///
/// This is an opaque error type that can wrap any underlying failure of a
/// client. It is cheap to clone, so one failure can be reported to every caller
/// that was waiting on the same in-flight operation. Use
/// [`std::error::Error::source()`] to reach the underlying cause.
///
/// # Example
///
/// ```
/// use cacheable_client::Error;
///
/// let error = Error::from_message("connection refused");
/// assert!(error.to_string().contains("connection refused"));
/// ```
#[derive(Clone, Debug, thiserror::Error)]
#[error("cache client operation failed: {cause}")]
pub struct Error {
    #[source]
    cause: Arc<dyn std::error::Error + Send + Sync>,
}

impl Error {
    /// Creates a new error from a message or any other error type.
    pub fn from_message(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }

    /// Creates a new error wrapping `cause`.
    pub fn caused_by(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self {
            cause: Arc::from(cause.into()),
        }
    }
}

/// A specialized [`Result`] type for store operations.
pub type Result<T> = std::result::Result<T, Error>;
