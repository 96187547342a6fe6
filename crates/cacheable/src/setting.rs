// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-call-site settings that are either fixed or computed per call.

use std::{fmt::Debug, sync::Arc};

type Builder<T, A, C, R> = Arc<dyn Fn(&A, Option<&C>, Option<&R>) -> T + Send + Sync>;

/// A value that is either fixed at the call site or derived from each call.
///
/// Builders receive the call's arguments, the receiver (unless the manager
/// excludes it) and, where a result already exists, the method's return value.
/// A setting is resolved exactly once per call.
///
/// # Examples
///
/// ```
/// use cacheable::Setting;
///
/// let fixed: Setting<String, u32, (), ()> = Setting::value("users".to_string());
/// assert_eq!(fixed.resolve(&7, None, None), "users");
///
/// let derived: Setting<String, u32, (), ()> = Setting::from_fn(|id, _, _| format!("user-{id}"));
/// assert_eq!(derived.resolve(&7, None, None), "user-7");
/// ```
pub enum Setting<T, A, C, R> {
    /// A fixed value.
    Value(T),
    /// A function of `(args, context, result)`.
    Builder(Builder<T, A, C, R>),
}

impl<T, A, C, R> Setting<T, A, C, R> {
    /// Creates a fixed setting.
    pub fn value(value: T) -> Self {
        Self::Value(value)
    }

    /// Creates a setting computed from each call.
    pub fn from_fn<F>(builder: F) -> Self
    where
        F: Fn(&A, Option<&C>, Option<&R>) -> T + Send + Sync + 'static,
    {
        Self::Builder(Arc::new(builder))
    }

    /// Resolves the setting for one call.
    pub fn resolve(&self, args: &A, context: Option<&C>, result: Option<&R>) -> T
    where
        T: Clone,
    {
        match self {
            Self::Value(value) => value.clone(),
            Self::Builder(builder) => builder(args, context, result),
        }
    }
}

impl<T: Clone, A, C, R> Clone for Setting<T, A, C, R> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Builder(builder) => Self::Builder(Arc::clone(builder)),
        }
    }
}

impl<T: Debug, A, C, R> Debug for Setting<T, A, C, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Builder(_) => write!(f, "Builder(<closure>)"),
        }
    }
}

impl<T, A, C, R> From<T> for Setting<T, A, C, R> {
    fn from(value: T) -> Self {
        Self::Value(value)
    }
}
