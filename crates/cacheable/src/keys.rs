// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache key derivation.
//!
//! Keys are derived fresh on every call and never stored. An explicit key (fixed
//! or built from the call) wins; otherwise the key is a digest of the method
//! name, the arguments and, when the manager does not exclude it, the receiver.
//! An optional hash key prefixes the result as `<hash>:<key>` so related entries
//! can be dropped together.

use serde::Serialize;
use xxhash_rust::xxh3::xxh3_128;

use crate::{Error, Result, Setting};

/// A resolved cache key: one slot or several.
///
/// Multiple keys only make sense for invalidation, which is why `Cacheable` and
/// `CacheUpdate` work with plain `String` keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A single key.
    Single(String),
    /// Several keys handled in one operation.
    Many(Vec<String>),
}

impl CacheKey {
    /// Returns the keys as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::Single(key) => std::slice::from_ref(key),
            Self::Many(keys) => keys,
        }
    }

    /// Returns `true` if there is no usable key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(key) => key.is_empty(),
            Self::Many(keys) => keys.is_empty(),
        }
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self::Single(key)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::Single(key.to_string())
    }
}

impl From<Vec<String>> for CacheKey {
    fn from(keys: Vec<String>) -> Self {
        Self::Many(keys)
    }
}

impl From<Vec<&str>> for CacheKey {
    fn from(keys: Vec<&str>) -> Self {
        Self::Many(keys.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CacheKey {
    fn from(keys: [&str; N]) -> Self {
        Self::Many(keys.iter().map(|key| (*key).to_string()).collect())
    }
}

mod sealed {
    pub(crate) trait Sealed {}

    impl Sealed for String {}
    impl Sealed for super::CacheKey {}
}

/// The shapes a final key can take: `String` or [`CacheKey`].
///
/// This trait is sealed and cannot be implemented outside this crate.
#[expect(private_bounds, reason = "intentionally sealed trait pattern")]
pub trait KeyShape: Clone + sealed::Sealed {
    /// Returns `true` if the key should be replaced by the default digest.
    fn is_blank(&self) -> bool;

    /// Builds a key from a digest.
    fn from_digest(digest: String) -> Self;

    /// Prefixes every key with `<hash>:`.
    #[must_use]
    fn prefixed(self, hash: &str) -> Self;
}

impl KeyShape for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn from_digest(digest: String) -> Self {
        digest
    }

    fn prefixed(self, hash: &str) -> Self {
        format!("{hash}:{self}")
    }
}

impl KeyShape for CacheKey {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn from_digest(digest: String) -> Self {
        Self::Single(digest)
    }

    fn prefixed(self, hash: &str) -> Self {
        match self {
            Self::Single(key) => Self::Single(key.prefixed(hash)),
            Self::Many(keys) => Self::Many(keys.into_iter().map(|key| key.prefixed(hash)).collect()),
        }
    }
}

#[derive(Serialize)]
struct CallMap<'a, A, C> {
    args: &'a A,
    method_name: &'a str,
    context: Option<&'a C>,
}

/// Resolves a key setting, if one is configured.
pub fn extract_key<T, A, C, R>(setting: Option<&Setting<T, A, C, R>>, args: &A, context: Option<&C>, result: Option<&R>) -> Option<T>
where
    T: Clone,
{
    setting.map(|setting| setting.resolve(args, context, result))
}

/// Computes the default key: a stable digest of the method name, the arguments and the receiver.
///
/// Structurally equal inputs always produce the same 32-character hex digest,
/// including maps whose iteration order differs.
///
/// # Errors
///
/// Returns [`Error::Encode`] if the arguments or the receiver cannot be serialized.
///
/// # Examples
///
/// ```
/// let a = cacheable::keys::default_key("get_user", &("42",), None::<&()>).unwrap();
/// let b = cacheable::keys::default_key("get_user", &("42",), None::<&()>).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 32);
/// ```
pub fn default_key<A, C>(method_name: &str, args: &A, context: Option<&C>) -> Result<String>
where
    A: Serialize,
    C: Serialize,
{
    let call = CallMap {
        args,
        method_name,
        context,
    };
    // Map entries are ordered by key here, whatever order the caller's maps iterate in.
    let canonical = serde_json::to_value(&call).map_err(Error::encode)?;
    let serialized = serde_json::to_vec(&canonical).map_err(Error::encode)?;
    Ok(format!("{:032x}", xxh3_128(&serialized)))
}

/// Resolves the cache key, falling back to [`default_key`] when no usable key is configured.
///
/// # Errors
///
/// Returns [`Error::Encode`] if the default digest is needed and the inputs cannot be serialized.
pub fn get_cache_key<K, A, C, R>(
    setting: Option<&Setting<K, A, C, R>>,
    method_name: &str,
    args: &A,
    context: Option<&C>,
    result: Option<&R>,
) -> Result<K>
where
    K: KeyShape,
    A: Serialize,
    C: Serialize,
{
    match extract_key(setting, args, context, result) {
        Some(key) if !key.is_blank() => Ok(key),
        _ => default_key(method_name, args, context).map(K::from_digest),
    }
}

/// Resolves the final key: the cache key, prefixed with the hash key when one is set.
///
/// # Errors
///
/// Returns [`Error::Encode`] if the default digest is needed and the inputs cannot be serialized.
///
/// # Examples
///
/// ```
/// use cacheable::{Setting, keys::get_final_key};
///
/// let key: Setting<String, (u32,), (), ()> = Setting::<String, (u32,), (), ()>::from_fn(|(id,), _, _| id.to_string());
/// let hash: Setting<String, (u32,), (), ()> = Setting::value("users".to_string());
///
/// let final_key: String = get_final_key(Some(&key), Some(&hash), "get_user", &(7,), None, None).unwrap();
/// assert_eq!(final_key, "users:7");
/// ```
pub fn get_final_key<K, A, C, R>(
    cache_key: Option<&Setting<K, A, C, R>>,
    hash_key: Option<&Setting<String, A, C, R>>,
    method_name: &str,
    args: &A,
    context: Option<&C>,
    result: Option<&R>,
) -> Result<K>
where
    K: KeyShape,
    A: Serialize,
    C: Serialize,
{
    let key = get_cache_key(cache_key, method_name, args, context, result)?;
    match extract_key(hash_key, args, context, result) {
        Some(hash) if !hash.is_empty() => Ok(key.prefixed(&hash)),
        _ => Ok(key),
    }
}
