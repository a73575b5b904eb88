use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionCause {
    /// Pushed out by a newer entry.
    Capacity,
    /// Not accessed within the TTL.
    Expired,
    /// Removed by `invalidate` or `clear`.
    Explicit,
    /// Overwritten by an insert under the same key.
    Replaced,
}

pub type EvictionListener<K, V> = Box<dyn Fn(&K, V, EvictionCause) + Send + Sync>;

struct Entry<V> {
    value: V,
    last_access: Instant,
}

/// LRU cache bounded by capacity and, optionally, by time since last access.
///
/// Every value that leaves the cache is handed to the eviction listener
/// exactly once, after the internal lock has been released.
pub struct LruCache<K, V> {
    cache: Mutex<lru::LruCache<K, Entry<V>>>,
    ttl: Option<Duration>,
    capacity: usize,
    listener: Option<EvictionListener<K, V>>,
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
    eviction_count: AtomicUsize,
}

impl<K: Hash + Eq + Clone, V: Clone> LruCache<K, V> {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Result<Self> {
        let cap = NonZeroUsize::new(capacity).ok_or_else(|| Error::invalid_argument("cache capacity must be positive"))?;
        Ok(LruCache {
            cache: Mutex::new(lru::LruCache::new(cap)),
            ttl,
            capacity,
            listener: None,
            hit_count: AtomicUsize::new(0),
            miss_count: AtomicUsize::new(0),
            eviction_count: AtomicUsize::new(0),
        })
    }

    pub fn with_eviction_listener(mut self, listener: EvictionListener<K, V>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn is_expired(&self, entry: &Entry<V>, now: Instant) -> bool {
        self.ttl.map_or(false, |ttl| now.duration_since(entry.last_access) >= ttl)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut evicted = Vec::new();
        let found = {
            let mut cache = self.cache.lock();
            let expired = cache.peek(key).map(|e| self.is_expired(e, now));
            match expired {
                Some(true) => {
                    if let Some(entry) = cache.pop(key) {
                        evicted.push((key.clone(), entry.value, EvictionCause::Expired));
                    }
                    None
                }
                Some(false) => cache.get_mut(key).map(|entry| {
                    entry.last_access = now;
                    entry.value.clone()
                }),
                None => None,
            }
        };
        self.notify(evicted);

        if found.is_some() {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn insert(&self, key: K, value: V) {
        let now = Instant::now();
        let mut evicted = self.take_expired(now);
        {
            let mut cache = self.cache.lock();
            if let Some((old_key, old)) = cache.push(key.clone(), Entry { value, last_access: now }) {
                let cause = if old_key == key { EvictionCause::Replaced } else { EvictionCause::Capacity };
                evicted.push((old_key, old.value, cause));
            }
        }
        self.notify(evicted);
    }

    /// Returns the cached value or inserts the one produced by `create`.
    /// When another caller wins the race, the freshly created value is
    /// released and the cached one returned.
    pub fn get_or_try_insert_with(&self, key: &K, create: impl FnOnce() -> Result<V>) -> Result<V> {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let created = create()?;
        let now = Instant::now();
        let mut evicted = self.take_expired(now);
        let value = {
            let mut cache = self.cache.lock();
            match cache.get_mut(key) {
                Some(entry) => {
                    entry.last_access = now;
                    evicted.push((key.clone(), created, EvictionCause::Replaced));
                    entry.value.clone()
                }
                None => {
                    if let Some((old_key, old)) = cache.push(key.clone(), Entry { value: created.clone(), last_access: now }) {
                        evicted.push((old_key, old.value, EvictionCause::Capacity));
                    }
                    created
                }
            }
        };
        self.notify(evicted);
        Ok(value)
    }

    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.cache.lock().pop(key);
        match removed {
            Some(entry) => {
                self.notify(vec![(key.clone(), entry.value, EvictionCause::Explicit)]);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        let drained: Vec<_> = {
            let mut cache = self.cache.lock();
            let mut out = Vec::with_capacity(cache.len());
            while let Some((key, entry)) = cache.pop_lru() {
                out.push((key, entry.value, EvictionCause::Explicit));
            }
            out
        };
        self.notify(drained);
    }

    /// Evicts every entry whose TTL has elapsed.
    pub fn purge_expired(&self) {
        let evicted = self.take_expired(Instant::now());
        self.notify(evicted);
    }

    fn take_expired(&self, now: Instant) -> Vec<(K, V, EvictionCause)> {
        if self.ttl.is_none() {
            return Vec::new();
        }
        let mut cache = self.cache.lock();
        let stale: Vec<K> = cache
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key.clone())
            .collect();
        stale
            .into_iter()
            .filter_map(|key| cache.pop(&key).map(|entry| (key, entry.value, EvictionCause::Expired)))
            .collect()
    }

    fn notify(&self, evicted: Vec<(K, V, EvictionCause)>) {
        if evicted.is_empty() {
            return;
        }
        self.eviction_count.fetch_add(evicted.len(), Ordering::Relaxed);
        if let Some(listener) = &self.listener {
            for (key, value, cause) in evicted {
                listener(&key, value, cause);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &K) -> bool {
        self.cache.lock().contains(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            eviction_count: self.eviction_count.load(Ordering::Relaxed),
            size: self.len(),
            capacity: self.capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub hit_count: usize,
    pub miss_count: usize,
    pub eviction_count: usize,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    type Log = Arc<parking_lot::Mutex<Vec<(u32, String, EvictionCause)>>>;

    fn cache(capacity: usize, ttl: Option<Duration>) -> (LruCache<u32, String>, Log) {
        let log: Log = Arc::default();
        let sink = Arc::clone(&log);
        let cache = LruCache::new(capacity, ttl)
            .unwrap()
            .with_eviction_listener(Box::new(move |k: &u32, v: String, cause| sink.lock().push((*k, v, cause))));
        (cache, log)
    }

    #[test]
    fn capacity_evicts_least_recently_used_once() {
        let (cache, log) = cache(2, None);
        cache.insert(1, "one".into());
        cache.insert(2, "two".into());
        assert_eq!(cache.get(&1).as_deref(), Some("one"));
        cache.insert(3, "three".into());

        assert_eq!(*log.lock(), vec![(2, "two".to_string(), EvictionCause::Capacity)]);
        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
    }

    #[test]
    fn entries_expire_after_last_access() {
        let (cache, log) = cache(4, Some(Duration::from_millis(30)));
        cache.insert(1, "one".into());
        thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.get(&1), None);
        assert_eq!(*log.lock(), vec![(1, "one".to_string(), EvictionCause::Expired)]);
    }

    #[test]
    fn without_ttl_nothing_expires() {
        let (cache, log) = cache(4, None);
        cache.insert(1, "one".into());
        thread::sleep(Duration::from_millis(20));
        cache.purge_expired();
        assert_eq!(cache.get(&1).as_deref(), Some("one"));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn replacing_a_key_releases_the_old_value() {
        let (cache, log) = cache(4, None);
        cache.insert(1, "old".into());
        cache.insert(1, "new".into());
        assert_eq!(*log.lock(), vec![(1, "old".to_string(), EvictionCause::Replaced)]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn get_or_insert_creates_once() {
        let (cache, _) = cache(4, None);
        let mut calls = 0;
        let v = cache.get_or_try_insert_with(&1, || { calls += 1; Ok("one".to_string()) }).unwrap();
        assert_eq!(v, "one");
        let v = cache.get_or_try_insert_with(&1, || Ok("other".to_string())).unwrap();
        assert_eq!(v, "one");
        assert_eq!(calls, 1);
        assert!(cache.get_or_try_insert_with(&2, || Err(Error::backend("down"))).is_err());
        assert!(!cache.contains(&2));
    }

    #[test]
    fn clear_releases_everything() {
        let (cache, log) = cache(4, None);
        cache.insert(1, "one".into());
        cache.insert(2, "two".into());
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(log.lock().len(), 2);
        assert!(log.lock().iter().all(|(_, _, cause)| *cause == EvictionCause::Explicit));
        let stats = cache.stats();
        assert_eq!(stats.eviction_count, 2);
        assert_eq!(stats.capacity, 4);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(LruCache::<u32, String>::new(0, None).is_err());
    }
}
