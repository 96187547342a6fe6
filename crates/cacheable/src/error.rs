// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for decorated calls.

use std::{sync::Arc, time::Duration};

type BoxedError = Arc<dyn std::error::Error + Send + Sync>;

/// An error returned by a decorated call.
///
/// Store failures are absorbed by the built-in strategies, so in practice a
/// decorated call fails with [`Error::Method`] when the wrapped method failed
/// and with one of the other variants only when a value could not be
/// represented in the store or a custom strategy reported a failure.
///
/// The type is cheap to clone: when concurrent identical calls are collapsed
/// into one execution, every caller receives the same error.
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The wrapped method failed. The underlying error is preserved.
    #[error("decorated method failed: {0}")]
    Method(#[source] BoxedError),

    /// A store operation failed and nothing absorbed the failure.
    #[error(transparent)]
    Client(#[from] cacheable_client::Error),

    /// A value could not be converted into the store representation.
    #[error("value could not be encoded for the cache: {0}")]
    Encode(#[source] Arc<serde_json::Error>),

    /// A stored value could not be converted back into the method's return type.
    #[error("cached value could not be decoded: {0}")]
    Decode(#[source] Arc<serde_json::Error>),

    /// No client was configured and the manager requires one.
    #[error("no cache client configured for `{method}`")]
    MissingClient {
        /// The decorated method's name.
        method: String,
    },

    /// The operation did not complete in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Wraps a failure of the decorated method.
    pub fn method(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Method(Arc::from(cause.into()))
    }

    pub(crate) fn encode(cause: serde_json::Error) -> Self {
        Self::Encode(Arc::new(cause))
    }

    pub(crate) fn decode(cause: serde_json::Error) -> Self {
        Self::Decode(Arc::new(cause))
    }

    /// Returns the wrapped method's own error if it is of type `T`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cacheable::Error;
    ///
    /// let error = Error::method(std::io::Error::other("disk gone"));
    /// let io = error.method_error::<std::io::Error>().unwrap();
    /// assert_eq!(io.to_string(), "disk gone");
    /// ```
    #[must_use]
    pub fn method_error<T>(&self) -> Option<&T>
    where
        T: std::error::Error + 'static,
    {
        match self {
            Self::Method(cause) => cause.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Returns `true` if the wrapped method itself failed.
    #[must_use]
    pub fn is_method(&self) -> bool {
        matches!(self, Self::Method(_))
    }
}

/// A specialized [`Result`] type for decorated calls.
pub type Result<T> = std::result::Result<T, Error>;
