// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured log events for absorbed failures.
//!
//! Events are emitted only when the manager's debug flag is set.

use std::fmt::Display;

#[cfg(test)]
pub(crate) mod testing;

/// Field names used by every event.
#[cfg(test)]
pub(crate) mod attributes {
    pub(crate) const METHOD: &str = "cache.method";
    pub(crate) const ACTIVITY: &str = "cache.activity";
    pub(crate) const KEY: &str = "cache.key";
}

/// A condition worth reporting while debugging cache behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Activity {
    GetFailed,
    SetFailed,
    FallbackSetFailed,
    ClearFailed,
    FallbackClearFailed,
    MissingClient,
    KeyUnavailable,
    EncodeFailed,
}

impl Activity {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::GetFailed => "get_failed",
            Self::SetFailed => "set_failed",
            Self::FallbackSetFailed => "fallback_set_failed",
            Self::ClearFailed => "clear_failed",
            Self::FallbackClearFailed => "fallback_clear_failed",
            Self::MissingClient => "missing_client",
            Self::KeyUnavailable => "key_unavailable",
            Self::EncodeFailed => "encode_failed",
        }
    }
}

/// Emits a warning for `activity` when `debug` is set.
pub(crate) fn report(debug: bool, method: &str, activity: Activity, key: Option<&str>, error: Option<&dyn Display>) {
    if !debug {
        return;
    }

    let activity = activity.as_str();
    let error = error.map(ToString::to_string);

    // Field names must match the constants in `attributes`.
    tracing::warn!(
        cache.method = method,
        cache.activity = activity,
        cache.key = key,
        error = error.as_deref(),
        "cache.event"
    );
}
