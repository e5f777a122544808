//! Time-limited memoization of the canonical default-parameter result
//!
//! The cache is a single slot holding the most recent value and the time it
//! was created. The slot is swapped as a whole, so readers either see the old
//! entry or the new one, never a mix. Concurrent writers race and the last one
//! wins, which is harmless because the canonical run is seeded.

use chrono::{DateTime, Duration, Utc};
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// A cached value and when it was produced
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResult<T> {
    pub value: T,
    pub created_at: DateTime<Utc>,
}

impl<T> CachedResult<T> {
    /// Age of the entry at `now`
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }
}

/// Single-slot TTL cache
pub struct ResultCache<T> {
    slot: RwLock<Option<Arc<CachedResult<T>>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T> std::fmt::Debug for ResultCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("ttl", &self.ttl)
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}

impl<T> ResultCache<T> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache on the wall clock
    pub fn with_system_clock(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current entry if it is younger than the TTL
    pub fn get(&self) -> Option<Arc<CachedResult<T>>> {
        let entry = self.slot.read().unwrap_or_else(|e| e.into_inner()).clone()?;
        if entry.age(self.clock.now()) < self.ttl {
            Some(entry)
        } else {
            None
        }
    }

    /// Replace the slot with a new entry stamped now
    pub fn store(&self, value: T) -> Arc<CachedResult<T>> {
        let entry = Arc::new(CachedResult {
            value,
            created_at: self.clock.now(),
        });
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&entry));
        entry
    }

    /// Return the fresh entry or compute, store and return a new one
    ///
    /// The flag is `true` on a hit. A failed computation leaves the slot untouched.
    pub fn get_or_try_insert_with<E, F>(&self, compute: F) -> Result<(Arc<CachedResult<T>>, bool), E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(entry) = self.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Result cache hit (created {})", entry.created_at);
            return Ok((entry, true));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Result cache miss, recomputing");
        let value = compute()?;
        Ok((self.store(value), false))
    }

    /// Drop the cached entry
    pub fn clear(&self) {
        *self.slot.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()))
    }

    #[test]
    fn test_hit_within_ttl() {
        let clock = clock();
        let cache: ResultCache<u32> = ResultCache::new(Duration::hours(1), clock.clone());

        let (first, hit) = cache.get_or_try_insert_with(|| Ok::<_, ()>(1)).unwrap();
        assert!(!hit);
        assert_eq!(first.value, 1);

        clock.advance(Duration::minutes(59));
        let (second, hit) = cache.get_or_try_insert_with(|| Ok::<_, ()>(2)).unwrap();
        assert!(hit);
        assert_eq!(second.value, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_expires_after_ttl() {
        let clock = clock();
        let cache: ResultCache<u32> = ResultCache::new(Duration::hours(1), clock.clone());
        cache.store(1);

        clock.advance(Duration::hours(1));
        assert!(cache.get().is_none());

        let (entry, hit) = cache.get_or_try_insert_with(|| Ok::<_, ()>(2)).unwrap();
        assert!(!hit);
        assert_eq!(entry.value, 2);
        assert_eq!(entry.created_at, clock.now());
    }

    #[test]
    fn test_failed_compute_keeps_slot() {
        let clock = clock();
        let cache: ResultCache<u32> = ResultCache::new(Duration::hours(1), clock.clone());
        cache.store(1);
        clock.advance(Duration::hours(2));

        let err = cache.get_or_try_insert_with(|| Err::<u32, _>("boom")).unwrap_err();
        assert_eq!(err, "boom");

        // the stale entry is still there, just not served
        clock.set(Utc.with_ymd_and_hms(2026, 1, 1, 12, 30, 0).unwrap());
        assert_eq!(cache.get().unwrap().value, 1);
    }

    #[test]
    fn test_hit_rate_and_clear() {
        let cache: ResultCache<&str> = ResultCache::new(Duration::hours(1), clock());

        cache.get_or_try_insert_with(|| Ok::<_, ()>("a")).unwrap();
        cache.get_or_try_insert_with(|| Ok::<_, ()>("b")).unwrap();
        cache.get_or_try_insert_with(|| Ok::<_, ()>("c")).unwrap();
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
        assert!((cache.hit_rate() - 2.0 / 3.0).abs() < 1e-12);

        cache.clear();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_concurrent_readers_see_whole_entries() {
        let cache: Arc<ResultCache<Vec<u32>>> =
            Arc::new(ResultCache::with_system_clock(Duration::hours(1)));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        cache.store(vec![i; 16]);
                        if let Some(entry) = cache.get() {
                            let first = entry.value[0];
                            assert!(entry.value.iter().all(|&v| v == first));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.get().is_some());
    }
}
