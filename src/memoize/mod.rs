//! Memoizing Decorator
//!
//! Wraps an async function so each call first consults the bound backend and
//! only evaluates the function on a miss.
//!
//! ```ignore
//! let monthly = cachual
//!     .cached(CacheOptions::default().with_ttl(60))
//!     .apply("reports::monthly", |month: u8| async move { build_report(month).await });
//!
//! let report = monthly.call(5).await?;
//! ```
//!
//! There is no locking around the lookup and the store: concurrent misses on
//! the same key each evaluate the function and the last write wins.

mod codec;
mod key;

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::backend::{RawDecorator, SharedBackend};
use crate::error::Result;
use crate::facade::Cachual;

pub use codec::{identity_pack, identity_unpack, json_pack, json_unpack, PackFn, UnpackFn};
pub use key::{CacheKey, CallArgs, KEY_NAMESPACE, MAX_DERIVED_KEY_LENGTH, MAX_LABEL_LENGTH};

// == Cache Options ==
/// TTL and pack/unpack settings for a memoized function.
pub struct CacheOptions<R> {
    ttl: Option<u64>,
    pack: PackFn<R>,
    unpack: UnpackFn<R>,
}

impl<R: Serialize + DeserializeOwned + 'static> Default for CacheOptions<R> {
    /// Backend default TTL, JSON pack/unpack.
    fn default() -> Self {
        Self {
            ttl: None,
            pack: json_pack(),
            unpack: json_unpack(),
        }
    }
}

impl CacheOptions<String> {
    /// Stores string results verbatim, without JSON quoting.
    pub fn identity() -> Self {
        Self {
            ttl: None,
            pack: identity_pack(),
            unpack: identity_unpack(),
        }
    }
}

impl<R> CacheOptions<R> {
    /// Options with a custom pack/unpack pair, for result types without serde
    /// support or with a cheaper encoding.
    pub fn with_codec<P, U>(pack: P, unpack: U) -> Self
    where
        P: Fn(&R) -> Result<String> + Send + Sync + 'static,
        U: Fn(&str) -> Result<R> + Send + Sync + 'static,
    {
        Self {
            ttl: None,
            pack: Arc::new(pack),
            unpack: Arc::new(unpack),
        }
    }

    /// Expire entries after `seconds`; 0 stores them without expiry.
    pub fn with_ttl(mut self, seconds: u64) -> Self {
        self.ttl = Some(seconds);
        self
    }

    pub fn with_pack<P>(mut self, pack: P) -> Self
    where
        P: Fn(&R) -> Result<String> + Send + Sync + 'static,
    {
        self.pack = Arc::new(pack);
        self
    }

    pub fn with_unpack<U>(mut self, unpack: U) -> Self
    where
        U: Fn(&str) -> Result<R> + Send + Sync + 'static,
    {
        self.unpack = Arc::new(unpack);
        self
    }
}

// == Decoration Record ==
/// The settings captured when `cached` is called; immutable afterwards.
pub struct DecorationRecord<R> {
    ttl: Option<u64>,
    pack: PackFn<R>,
    unpack: UnpackFn<R>,
}

impl<R> DecorationRecord<R> {
    /// TTL handed to the backend; None selects the backend default.
    pub fn ttl(&self) -> Option<u64> {
        self.ttl
    }

    pub fn pack(&self) -> &PackFn<R> {
        &self.pack
    }

    pub fn unpack(&self) -> &UnpackFn<R> {
        &self.unpack
    }
}

impl<R> From<CacheOptions<R>> for DecorationRecord<R> {
    fn from(options: CacheOptions<R>) -> Self {
        Self {
            ttl: options.ttl,
            pack: options.pack,
            unpack: options.unpack,
        }
    }
}

impl<R> Clone for DecorationRecord<R> {
    fn clone(&self) -> Self {
        Self {
            ttl: self.ttl,
            pack: Arc::clone(&self.pack),
            unpack: Arc::clone(&self.unpack),
        }
    }
}

// == Decorator ==
/// A backend's memoizing decorator for one decoration record.
///
/// The backend contributes the string-level part through
/// [`CacheBackend::make_decorator`](crate::backend::CacheBackend::make_decorator);
/// the record contributes pack and unpack.
pub struct Decorator<R> {
    backend: SharedBackend,
    raw: RawDecorator,
    record: DecorationRecord<R>,
}

impl<R> Decorator<R> {
    /// Asks `backend` for its decorator with the record's TTL.
    pub fn new(backend: SharedBackend, record: &DecorationRecord<R>) -> Self {
        let raw = backend.make_decorator(record.ttl());
        Self {
            backend,
            raw,
            record: record.clone(),
        }
    }

    pub fn backend(&self) -> &SharedBackend {
        &self.backend
    }

    pub fn raw(&self) -> &RawDecorator {
        &self.raw
    }

    pub fn record(&self) -> &DecorationRecord<R> {
        &self.record
    }

    /// Returns the cached result of `func(args)`, evaluating and storing it on
    /// a miss. `func` is not evaluated on a hit.
    ///
    /// Backend failures are returned as errors rather than treated as misses.
    pub async fn invoke<A, F, Fut>(&self, identity: &str, func: &F, args: A) -> Result<R>
    where
        A: Serialize,
        F: Fn(A) -> Fut,
        Fut: Future<Output = R>,
    {
        let derived = CacheKey::derive(identity, &args)?;
        let key = self.raw.storage_key(&derived);

        if let Some(raw) = self.backend.get(&key).await? {
            debug!(key = %key, backend = self.backend.kind(), "Memoized call hit");
            return (self.record.unpack)(&raw);
        }

        debug!(key = %key, backend = self.backend.kind(), "Memoized call miss");
        let value = func(args).await;
        let packed = (self.record.pack)(&value)?;
        self.backend.set(&key, &packed, self.raw.ttl()).await?;

        Ok(value)
    }

    /// Drops the stored result for `args`, returning whether one existed.
    pub async fn invalidate<A>(&self, identity: &str, args: &A) -> Result<bool>
    where
        A: Serialize + ?Sized,
    {
        let derived = CacheKey::derive(identity, args)?;
        self.backend.delete(&self.raw.storage_key(&derived)).await
    }
}

// == Cached ==
/// The decorator returned by [`Cachual::cached`]; apply it to functions.
pub struct Cached<R> {
    facade: Cachual,
    record: DecorationRecord<R>,
}

impl<R> Cached<R> {
    pub(crate) fn new(facade: Cachual, options: CacheOptions<R>) -> Self {
        Self {
            facade,
            record: options.into(),
        }
    }

    pub fn record(&self) -> &DecorationRecord<R> {
        &self.record
    }

    /// Wraps `func`. `identity` names the function in cache keys and must be
    /// unique among memoized functions sharing a backend.
    pub fn apply<A, F, Fut>(&self, identity: impl Into<String>, func: F) -> Memoized<A, R, F>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = R>,
    {
        Memoized {
            identity: identity.into(),
            func,
            facade: self.facade.clone(),
            record: self.record.clone(),
            _args: PhantomData,
        }
    }
}

// == Memoized ==
/// A memoized function. The backend is resolved from the facade on every
/// call, so a function can be wrapped before the facade is bound.
pub struct Memoized<A, R, F> {
    identity: String,
    func: F,
    facade: Cachual,
    record: DecorationRecord<R>,
    _args: PhantomData<fn(A)>,
}

impl<A, R, F> Memoized<A, R, F> {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The wrapped function, for direct (uncached) use.
    pub fn inner(&self) -> &F {
        &self.func
    }

    pub fn record(&self) -> &DecorationRecord<R> {
        &self.record
    }
}

impl<A, R, F, Fut> Memoized<A, R, F>
where
    A: Serialize,
    F: Fn(A) -> Fut,
    Fut: Future<Output = R>,
{
    /// Calls the function through the cache.
    ///
    /// # Errors
    /// - `NotBound` when the facade has no backend
    /// - backend, pack/unpack and key derivation failures
    pub async fn call(&self, args: A) -> Result<R> {
        let backend = self.facade.backend()?;
        let decorator = Decorator::new(backend, &self.record);
        decorator.invoke(&self.identity, &self.func, args).await
    }

    /// Drops the cached result for `args`, returning whether one was stored.
    pub async fn invalidate(&self, args: &A) -> Result<bool> {
        let backend = self.facade.backend()?;
        Decorator::new(backend, &self.record)
            .invalidate(&self.identity, args)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::error::CacheError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn memory() -> SharedBackend {
        Arc::new(MemoryBackend::new(100, 300))
    }

    fn record<R: Serialize + DeserializeOwned + 'static>(
        options: CacheOptions<R>,
    ) -> DecorationRecord<R> {
        options.into()
    }

    #[tokio::test]
    async fn test_decorator_hit_skips_function() {
        let calls = AtomicUsize::new(0);
        let double = |n: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { n * 2 }
        };
        let decorator = Decorator::new(memory(), &record(CacheOptions::<u32>::default()));

        assert_eq!(decorator.invoke("double", &double, 21).await.unwrap(), 42);
        assert_eq!(decorator.invoke("double", &double, 21).await.unwrap(), 42);
        assert_eq!(decorator.invoke("double", &double, 5).await.unwrap(), 10);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_decorator_passes_ttl_to_backend() {
        let backend = memory();
        let decorator = Decorator::new(
            Arc::clone(&backend),
            &record(CacheOptions::<u32>::default().with_ttl(0)),
        );
        decorator.invoke("id", &|n: u32| async move { n }, 1).await.unwrap();

        let key = CacheKey::derive("id", &1u32).unwrap();
        assert_eq!(backend.get(key.as_str()).await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_unpack_failure_surfaces() {
        let backend = memory();
        let key = CacheKey::derive("broken", &7u32).unwrap();
        backend.set(key.as_str(), "not json", None).await.unwrap();

        let decorator =
            Decorator::new(Arc::clone(&backend), &record(CacheOptions::<u32>::default()));
        let result = decorator.invoke("broken", &|n: u32| async move { n }, 7).await;

        assert!(matches!(result, Err(CacheError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_custom_codec_is_used() {
        let backend = memory();
        let options = CacheOptions::with_codec(
            |value: &u64| -> Result<String> { Ok(format!("n={}", value)) },
            |raw: &str| -> Result<u64> {
                raw.trim_start_matches("n=")
                    .parse()
                    .map_err(|e| CacheError::Serialization(format!("{}", e)))
            },
        );
        let decorator = Decorator::new(Arc::clone(&backend), &record(options));

        let square = |n: u64| async move { n * n };
        assert_eq!(decorator.invoke("square", &square, 9).await.unwrap(), 81);

        let key = CacheKey::derive("square", &9u64).unwrap();
        assert_eq!(backend.get(key.as_str()).await.unwrap().as_deref(), Some("n=81"));
        assert_eq!(decorator.invoke("square", &square, 9).await.unwrap(), 81);
    }

    #[tokio::test]
    async fn test_any_identity_works_on_memory_backend() {
        let backend = memory();
        let decorator = Decorator::new(backend, &record(CacheOptions::<u32>::default()));
        let identity = format!("monthly report {}", "x".repeat(300));

        let add_one = |n: u32| async move { n + 1 };
        assert_eq!(decorator.invoke(&identity, &add_one, 1).await.unwrap(), 2);
        assert!(decorator.invalidate(&identity, &1u32).await.unwrap());
    }

    #[tokio::test]
    async fn test_identity_options_store_strings_verbatim() {
        let backend = memory();
        let decorator = Decorator::new(Arc::clone(&backend), &record(CacheOptions::identity()));
        let shout = |s: String| async move { s.to_uppercase() };

        let value = decorator.invoke("shout", &shout, "hi".to_string()).await.unwrap();
        assert_eq!(value, "HI");

        let key = CacheKey::derive("shout", "hi").unwrap();
        assert_eq!(backend.get(key.as_str()).await.unwrap().as_deref(), Some("HI"));
    }

    #[tokio::test]
    async fn test_unbound_call_is_usage_error() {
        let memoized = Cachual::new()
            .cached(CacheOptions::<u32>::default())
            .apply("never", |n: u32| async move { n });

        assert!(matches!(memoized.call(1).await, Err(CacheError::NotBound)));
        assert!(matches!(memoized.invalidate(&1).await, Err(CacheError::NotBound)));
        assert_eq!(memoized.identity(), "never");
    }

    #[test]
    fn test_record_keeps_ttl() {
        let options = CacheOptions::<String>::default()
            .with_ttl(30)
            .with_pack(|v: &String| -> Result<String> { Ok(v.to_uppercase()) })
            .with_unpack(|raw: &str| -> Result<String> { Ok(raw.to_lowercase()) });
        let record: DecorationRecord<String> = options.into();

        assert_eq!(record.ttl(), Some(30));
        assert_eq!((record.pack())(&"abc".to_string()).unwrap(), "ABC");
        assert_eq!((record.unpack())("ABC").unwrap(), "abc");
    }
}
