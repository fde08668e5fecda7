//! In-memory request cache with request coalescing.
//!
//! Maps a request key to a shared response future. Callers asking for the
//! same key while an entry is live await the same future, so at most one
//! request per key is in flight. Entries are evicted by a timer after their
//! time-to-live, on failure, or explicitly.
//!
//! The entry map sits behind a synchronous mutex that is never held across
//! an await point, so lookup-then-use cannot observe an evicted entry.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::fetch::{abortable, AbortSignal, FetchError};

/// A response future shared by every caller of one cache entry.
pub type SharedResponse = Shared<BoxFuture<'static, Result<Value, FetchError>>>;

struct CacheEntry {
    generation: u64,
    response: SharedResponse,
    inserted_at: Instant,
    created_at: DateTime<Utc>,
    ttl: Duration,
    expiry: JoinHandle<()>,
}

impl CacheEntry {
    fn is_live(&self) -> bool {
        self.inserted_at.elapsed() < self.ttl
    }
}

/// Read-only view of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntryInfo {
    pub key: String,
    pub inserted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    next_generation: u64,
}

/// Request cache shared between clones.
#[derive(Clone, Default)]
pub struct RequestCache {
    state: Arc<Mutex<CacheState>>,
}

impl fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("RequestCache")
            .field("ttl", &state.ttl)
            .field("entries", &state.entries.len())
            .finish()
    }
}

impl RequestCache {
    /// Create a cache. A zero `ttl` disables caching.
    pub fn new(ttl: Duration) -> Self {
        let cache = Self::default();
        cache.lock().ttl = ttl;
        cache
    }

    /// Time-to-live given to new entries.
    pub fn ttl(&self) -> Duration {
        self.lock().ttl
    }

    /// Change the time-to-live for entries created from now on.
    pub fn set_ttl(&self, ttl: Duration) {
        self.lock().ttl = ttl;
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl().is_zero()
    }

    /// Get the response for `key`, sharing a live entry or creating one.
    ///
    /// `factory` starts a request. Shared requests are started without a
    /// signal so no single caller can cancel them; each caller's signal
    /// only guards its own wait. Uncached requests get the caller's signal.
    /// When a shared request still ends cancelled, this caller gets a fresh
    /// uncached request instead of the cancellation.
    pub async fn get<F, Fut>(
        &self,
        key: &str,
        signal: Option<&AbortSignal>,
        factory: F,
    ) -> Result<Value, FetchError>
    where
        F: Fn(Option<AbortSignal>) -> Fut,
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        let Some((generation, response)) = self.lookup_or_insert(key, &factory) else {
            return abortable(signal, factory(signal.cloned())).await;
        };

        match abortable(signal, response).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_cancellation() => {
                if signal.is_some_and(AbortSignal::is_aborted) {
                    // Our own cancellation; the entry may still serve others
                    return Err(err);
                }
                debug!(key, "Shared request was cancelled, fetching uncached");
                self.remove_generation(key, generation);
                abortable(signal, factory(signal.cloned())).await
            }
            Err(err) => {
                self.remove_generation(key, generation);
                Err(err)
            }
        }
    }

    fn lookup_or_insert<F, Fut>(
        &self,
        key: &str,
        factory: &F,
    ) -> Option<(u64, SharedResponse)>
    where
        F: Fn(Option<AbortSignal>) -> Fut,
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        let mut state = self.lock();
        if state.ttl.is_zero() {
            return None;
        }

        let hit = state
            .entries
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| (entry.generation, entry.response.clone()));
        if hit.is_some() {
            debug!(key, "Cache hit");
            return hit;
        }
        if let Some(stale) = state.entries.remove(key) {
            stale.expiry.abort();
        }

        debug!(key, "Cache miss");
        let generation = state.next_generation;
        state.next_generation += 1;

        let ttl = state.ttl;
        let response = factory(None).boxed().shared();
        let entry = CacheEntry {
            generation,
            response: response.clone(),
            inserted_at: Instant::now(),
            created_at: Utc::now(),
            ttl,
            expiry: self.schedule_expiry(key.to_string(), generation, ttl),
        };
        state.entries.insert(key.to_string(), entry);

        Some((generation, response))
    }

    fn schedule_expiry(&self, key: String, generation: u64, ttl: Duration) -> JoinHandle<()> {
        let state = Arc::downgrade(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if state
                .entries
                .get(&key)
                .is_some_and(|entry| entry.generation == generation)
            {
                state.entries.remove(&key);
                debug!(key, "Cache entry expired");
            }
        })
    }

    /// Remove `key` only if it still holds the given entry.
    fn remove_generation(&self, key: &str, generation: u64) {
        let mut state = self.lock();
        if state
            .entries
            .get(key)
            .is_some_and(|entry| entry.generation == generation)
        {
            if let Some(entry) = state.entries.remove(key) {
                entry.expiry.abort();
            }
        }
    }

    /// Drop the entry for `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &str) -> bool {
        match self.lock().entries.remove(key) {
            Some(entry) => {
                entry.expiry.abort();
                debug!(key, "Cache entry invalidated");
                true
            }
            None => false,
        }
    }

    /// Remove every entry and cancel pending evictions.
    pub fn clear(&self) {
        let mut state = self.lock();
        for (_, entry) in state.entries.drain() {
            entry.expiry.abort();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Current entries, sorted by key.
    pub fn snapshot(&self) -> Vec<CacheEntryInfo> {
        let state = self.lock();
        let mut entries: Vec<CacheEntryInfo> = state
            .entries
            .iter()
            .map(|(key, entry)| CacheEntryInfo {
                key: key.clone(),
                inserted_at: entry.created_at,
                expires_at: chrono::Duration::from_std(entry.ttl)
                    .ok()
                    .and_then(|ttl| entry.created_at.checked_add_signed(ttl))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::AbortHandle;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Factory that counts calls and answers after `delay`.
    fn counting_factory(
        calls: Arc<AtomicUsize>,
        delay: Duration,
        result: Result<Value, FetchError>,
    ) -> impl Fn(Option<AbortSignal>) -> BoxFuture<'static, Result<Value, FetchError>>
           + Clone
           + Send
           + Sync
           + 'static {
        move |signal| {
            calls.fetch_add(1, Ordering::SeqCst);
            let result = result.clone();
            async move {
                abortable(signal.as_ref(), async {
                    tokio::time::sleep(delay).await;
                    result
                })
                .await
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl_and_miss_after_expiry() {
        let cache = RequestCache::new(Duration::from_secs(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(calls.clone(), Duration::ZERO, Ok(json!(1)));

        cache.get("/global/statistics", None, &factory).await.unwrap();
        cache.get("/global/statistics", None, &factory).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(cache.is_empty());

        cache.get("/global/statistics", None, &factory).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_request() {
        let cache = RequestCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(calls.clone(), Duration::from_secs(1), Ok(json!("x")));

        let (a, b, c) = tokio::join!(
            cache.get("k", None, &factory),
            cache.get("k", None, &factory),
            cache.get("k", None, &factory),
        );

        assert_eq!(a.unwrap(), json!("x"));
        assert_eq!(b.unwrap(), json!("x"));
        assert_eq!(c.unwrap(), json!("x"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_stores_nothing() {
        let cache = RequestCache::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(calls.clone(), Duration::ZERO, Ok(json!(null)));

        cache.get("k", None, &factory).await.unwrap();
        cache.get("k", None, &factory).await.unwrap();

        assert!(!cache.is_enabled());
        assert!(cache.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_evicts_entry() {
        let cache = RequestCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let failing = counting_factory(
            calls.clone(),
            Duration::ZERO,
            Err(FetchError::HttpStatus {
                status: 500,
                message: "Internal Server Error".to_string(),
            }),
        );

        let err = cache.get("k", None, &failing).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(!cache.contains_key("k"));

        let working = counting_factory(calls.clone(), Duration::ZERO, Ok(json!(2)));
        assert_eq!(cache.get("k", None, &working).await.unwrap(), json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let cache = RequestCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(calls.clone(), Duration::ZERO, Ok(json!(1)));

        cache.get("a", None, &factory).await.unwrap();
        cache.get("b", None, &factory).await.unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());

        cache.get("a", None, &factory).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = RequestCache::new(Duration::from_secs(60));
        let factory = counting_factory(Arc::default(), Duration::ZERO, Ok(json!(1)));

        cache.get("a", None, &factory).await.unwrap();
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert!(!cache.contains_key("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_change_applies_to_new_entries() {
        let cache = RequestCache::new(Duration::from_secs(1));
        let factory = counting_factory(Arc::default(), Duration::ZERO, Ok(json!(1)));

        cache.get("short", None, &factory).await.unwrap();
        cache.set_ttl(Duration::from_secs(10));
        cache.get("long", None, &factory).await.unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!cache.contains_key("short"));
        assert!(cache.contains_key("long"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabling_keeps_existing_entries_until_cleared() {
        let cache = RequestCache::new(Duration::from_secs(60));
        let factory = counting_factory(Arc::default(), Duration::ZERO, Ok(json!(1)));

        cache.get("a", None, &factory).await.unwrap();
        cache.set_ttl(Duration::ZERO);

        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_caller_aborting_does_not_cancel_others() {
        let cache = RequestCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(calls.clone(), Duration::from_secs(5), Ok(json!("shared")));

        // The second caller creates the entry
        let first = AbortHandle::new();
        let first_signal = first.signal();
        let second = AbortHandle::new();
        let second_signal = second.signal();

        let waiting = {
            let cache = cache.clone();
            let factory = factory.clone();
            tokio::spawn(async move { cache.get("k", Some(&second_signal), &factory).await })
        };
        tokio::task::yield_now().await;

        let aborted = {
            let cache = cache.clone();
            let factory = factory.clone();
            tokio::spawn(async move { cache.get("k", Some(&first_signal), &factory).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        first.abort();

        assert!(matches!(aborted.await.unwrap(), Err(FetchError::Aborted)));
        assert_eq!(waiting.await.unwrap().unwrap(), json!("shared"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains_key("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_creator_abort_keeps_shared_request_alive() {
        let cache = RequestCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = counting_factory(calls.clone(), Duration::from_secs(5), Ok(json!("shared")));

        let creator = AbortHandle::new();
        let creator_signal = creator.signal();
        let creating = {
            let cache = cache.clone();
            let factory = factory.clone();
            tokio::spawn(async move { cache.get("k", Some(&creator_signal), &factory).await })
        };
        tokio::task::yield_now().await;
        assert!(cache.contains_key("k"));

        let joiners: Vec<_> = (0..3)
            .map(|_| {
                let cache = cache.clone();
                let factory = factory.clone();
                tokio::spawn(async move { cache.get("k", None, &factory).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_secs(1)).await;
        creator.abort();

        assert!(matches!(creating.await.unwrap(), Err(FetchError::Aborted)));
        for joiner in joiners {
            assert_eq!(joiner.await.unwrap().unwrap(), json!("shared"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);

        // Later callers are served from the entry
        assert_eq!(cache.get("k", None, &factory).await.unwrap(), json!("shared"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_shared_request_is_recovered() {
        let cache = RequestCache::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));

        // The shared request itself ends cancelled, the retry succeeds
        let factory = {
            let calls = calls.clone();
            move |_signal: Option<AbortSignal>| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    if call == 0 {
                        Err(FetchError::Aborted)
                    } else {
                        Ok(json!("fresh"))
                    }
                }
                .boxed()
            }
        };

        let (first, second) = tokio::join!(
            cache.get("k", None, &factory),
            cache.get("k", None, &factory),
        );

        assert_eq!(first.unwrap(), json!("fresh"));
        assert_eq!(second.unwrap(), json!("fresh"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Recovery requests are not cached
        assert!(!cache.contains_key("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_reports_expiry() {
        let cache = RequestCache::new(Duration::from_secs(30));
        let factory = counting_factory(Arc::default(), Duration::ZERO, Ok(json!(1)));

        cache.get("b", None, &factory).await.unwrap();
        cache.get("a", None, &factory).await.unwrap();

        let snapshot = cache.snapshot();
        let keys: Vec<&str> = snapshot.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(
            snapshot[0].expires_at - snapshot[0].inserted_at,
            chrono::Duration::seconds(30)
        );
    }
}
