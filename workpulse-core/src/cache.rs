//! Analysis cache
//!
//! A keyed store of derived analyses shared by readers and the background
//! aggregator. Entries carry the time they were written:
//! - fresh while `now - last_updated < ttl` and not invalidated
//! - stale entries stay until evicted, they only force recomputation
//! - when the entry count exceeds the cap, the oldest tenth by write time
//!   is evicted across every key family, however recently it was read
//!
//! Map mutations take the map lock briefly. [`AnalysisCache::get_or_compute`]
//! serialises work on one key with a per-key lock and computes outside the
//! map lock, so unrelated keys never wait on each other. An invalidation
//! that lands while a key is being computed leaves the stored result stale.

use crate::clock::Clock;
use crate::error::Result;
use crate::types::ReportPeriod;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================
// Keys
// ============================================

/// Structured form of a cache key.
///
/// Renders as `YYYY-MM-DD` for days, `week_<monday>` for weeks,
/// `pattern_<start>_<end>` and `summary_<period>_<start>_<end>` for ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Day(NaiveDate),
    Week(NaiveDate),
    Pattern(NaiveDate, NaiveDate),
    Summary(ReportPeriod, NaiveDate, NaiveDate),
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

fn parse_range(s: &str) -> Option<(NaiveDate, NaiveDate)> {
    let (start, end) = s.split_once('_')?;
    Some((parse_date(start)?, parse_date(end)?))
}

impl CacheKey {
    pub fn parse(key: &str) -> Option<Self> {
        if let Some(rest) = key.strip_prefix("week_") {
            return parse_date(rest).map(CacheKey::Week);
        }
        if let Some(rest) = key.strip_prefix("pattern_") {
            let (start, end) = parse_range(rest)?;
            return Some(CacheKey::Pattern(start, end));
        }
        if let Some(rest) = key.strip_prefix("summary_") {
            let (period, range) = rest.split_once('_')?;
            let period = period.parse().ok()?;
            let (start, end) = parse_range(range)?;
            return Some(CacheKey::Summary(period, start, end));
        }
        parse_date(key).map(CacheKey::Day)
    }

    /// Whether activity on `date` can change this entry.
    pub fn covers(&self, date: NaiveDate) -> bool {
        match *self {
            CacheKey::Day(day) => day == date,
            CacheKey::Week(start) => start <= date && date <= start + Duration::days(6),
            CacheKey::Pattern(start, end) | CacheKey::Summary(_, start, end) => {
                start <= date && date <= end
            }
        }
    }

    /// Last date a day or week entry describes. Range entries have none.
    fn retention_date(&self) -> Option<NaiveDate> {
        match *self {
            CacheKey::Day(day) => Some(day),
            CacheKey::Week(start) => Some(start + Duration::days(6)),
            CacheKey::Pattern(..) | CacheKey::Summary(..) => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Day(day) => write!(f, "{}", day.format(DATE_FORMAT)),
            CacheKey::Week(start) => write!(f, "week_{}", start.format(DATE_FORMAT)),
            CacheKey::Pattern(start, end) => write!(
                f,
                "pattern_{}_{}",
                start.format(DATE_FORMAT),
                end.format(DATE_FORMAT)
            ),
            CacheKey::Summary(period, start, end) => write!(
                f,
                "summary_{}_{}_{}",
                period,
                start.format(DATE_FORMAT),
                end.format(DATE_FORMAT)
            ),
        }
    }
}

// ============================================
// Cache
// ============================================

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    last_updated: DateTime<Utc>,
    invalidated: bool,
}

/// Per-key critical section. Lives only while some caller holds it.
#[derive(Default)]
struct KeySlot {
    lock: Mutex<()>,
    /// Bumped by every invalidation of the key
    generation: AtomicU64,
}

/// Counters exposed for observability.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered with a fresh entry
    pub hits: u64,
    /// Reads that found nothing or a stale entry
    pub misses: u64,
    /// Entries removed by capacity eviction
    pub evictions: u64,
    /// Entries removed by maintenance or because their key was malformed
    pub purged: u64,
    pub entries: usize,
}

/// Concurrency-safe analysis cache. Values should be cheap to clone
/// (typically an enum of `Arc`s).
pub struct AnalysisCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    key_locks: Mutex<HashMap<String, Arc<KeySlot>>>,
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    purged: AtomicU64,
}

impl<V: Clone> AnalysisCache<V> {
    pub fn new(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            key_locks: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            purged: AtomicU64::new(0),
        }
    }

    fn is_fresh(&self, entry: &Entry<V>, now: DateTime<Utc>) -> bool {
        !entry.invalidated && now - entry.last_updated < self.ttl
    }

    /// Look up `key`, returning the value and whether it is fresh.
    pub fn get(&self, key: &str) -> Option<(V, bool)> {
        let now = self.clock.now();
        let found = {
            let entries = self.entries.read();
            entries
                .get(key)
                .map(|entry| (entry.value.clone(), self.is_fresh(entry, now)))
        };

        match &found {
            Some((_, true)) => self.hits.fetch_add(1, Ordering::Relaxed),
            _ => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Store `value` under `key`, stamped now, then enforce the cap.
    pub fn put(&self, key: &str, value: V) {
        self.insert(key, value, false);
    }

    fn insert(&self, key: &str, value: V, invalidated: bool) {
        let now = self.clock.now();
        self.entries.write().insert(
            key.to_string(),
            Entry {
                value,
                last_updated: now,
                invalidated,
            },
        );
        self.evict_if_over_capacity();
    }

    /// Remove the oldest-written tenth of all entries (at least one, and at
    /// least enough to get back under the cap) when over capacity.
    ///
    /// Read recency is not considered. Returns the number evicted.
    pub fn evict_if_over_capacity(&self) -> usize {
        let evicted: Vec<String> = {
            let mut entries = self.entries.write();
            if entries.len() <= self.max_entries {
                return 0;
            }

            let excess = entries.len() - self.max_entries;
            let to_remove = (self.max_entries / 10).max(excess).max(1);

            let mut by_age: Vec<(DateTime<Utc>, String)> = entries
                .iter()
                .map(|(key, entry)| (entry.last_updated, key.clone()))
                .collect();
            by_age.sort();

            by_age
                .into_iter()
                .take(to_remove)
                .map(|(_, key)| {
                    entries.remove(&key);
                    key
                })
                .collect()
        };

        self.release_key_locks(&evicted);
        self.evictions
            .fetch_add(evicted.len() as u64, Ordering::Relaxed);
        tracing::debug!(evicted = evicted.len(), "Evicted oldest cache entries");
        evicted.len()
    }

    /// Mark `key` stale without removing it. Returns whether it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        let existed = match self.entries.write().get_mut(key) {
            Some(entry) => {
                entry.invalidated = true;
                true
            }
            None => false,
        };
        self.bump_generations(|k| k == key);
        existed
    }

    /// Mark every entry whose key covers `date` stale.
    ///
    /// Entries whose key cannot be parsed are dropped. Returns the number
    /// of entries invalidated.
    pub fn invalidate_covering(&self, date: NaiveDate) -> usize {
        let mut invalidated = 0;
        let mut malformed = Vec::new();
        {
            let mut entries = self.entries.write();
            for (key, entry) in entries.iter_mut() {
                match CacheKey::parse(key) {
                    Some(parsed) if parsed.covers(date) => {
                        entry.invalidated = true;
                        invalidated += 1;
                    }
                    Some(_) => {}
                    None => malformed.push(key.clone()),
                }
            }
            for key in &malformed {
                entries.remove(key);
            }
        }
        self.bump_generations(|key| CacheKey::parse(key).is_some_and(|k| k.covers(date)));
        self.note_malformed(&malformed);
        invalidated
    }

    /// Return the fresh value for `key`, or compute, store and return a new one.
    ///
    /// The check, the computation and the write happen under one per-key
    /// lock, so concurrent callers for the same key compute once. The map
    /// itself is not locked while `compute` runs. The flag is `true` when
    /// the value was computed by this call.
    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> Result<(V, bool)>
    where
        F: FnOnce() -> Result<V>,
    {
        self.get_or_compute_with(key, || compute().map(|value| (value, true)))
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but `compute` also
    /// decides whether its result may be stored. Degraded results are
    /// returned to the caller without being cached.
    pub fn get_or_compute_with<F>(&self, key: &str, compute: F) -> Result<(V, bool)>
    where
        F: FnOnce() -> Result<(V, bool)>,
    {
        let slot = self.key_lock(key);
        let result = {
            let _guard = slot.lock.lock();
            self.compute_locked(key, &slot, compute)
        };
        drop(slot);
        self.release_key_locks(&[key.to_string()]);
        result
    }

    fn compute_locked<F>(&self, key: &str, slot: &KeySlot, compute: F) -> Result<(V, bool)>
    where
        F: FnOnce() -> Result<(V, bool)>,
    {
        if let Some((value, true)) = self.get(key) {
            return Ok((value, false));
        }

        let generation = slot.generation.load(Ordering::SeqCst);
        let (value, cacheable) = compute()?;
        if !cacheable {
            tracing::debug!(key = %key, "Computed result not cached");
        } else if slot.generation.load(Ordering::SeqCst) != generation {
            // The source may have changed after compute read it
            tracing::debug!(key = %key, "Key invalidated while computing, stored stale");
            self.insert(key, value.clone(), true);
        } else {
            self.put(key, value.clone());
        }
        Ok((value, true))
    }

    /// Drop day and week entries that ended before `now - retention`, and
    /// any entry whose key cannot be parsed. Returns the number removed.
    pub fn purge_older_than(&self, retention: Duration) -> usize {
        let cutoff = (self.clock.now() - retention).date_naive();
        let mut removed = Vec::new();
        let mut malformed = Vec::new();
        {
            let mut entries = self.entries.write();
            entries.retain(|key, _| match CacheKey::parse(key) {
                Some(parsed) => match parsed.retention_date() {
                    Some(date) if date < cutoff => {
                        removed.push(key.clone());
                        false
                    }
                    _ => true,
                },
                None => {
                    malformed.push(key.clone());
                    false
                }
            });
        }

        self.release_key_locks(&removed);
        self.note_malformed(&malformed);
        self.purged
            .fetch_add(removed.len() as u64, Ordering::Relaxed);
        tracing::debug!(
            removed = removed.len(),
            malformed = malformed.len(),
            cutoff = %cutoff,
            "Purged expired cache entries"
        );
        removed.len() + malformed.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    fn key_lock(&self, key: &str) -> Arc<KeySlot> {
        self.key_locks
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Tell in-flight computations of matching keys that their input moved.
    fn bump_generations(&self, matches: impl Fn(&str) -> bool) {
        for (key, slot) in self.key_locks.lock().iter() {
            if matches(key) {
                slot.generation.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Number of per-key locks currently tracked.
    #[cfg(test)]
    fn tracked_key_locks(&self) -> usize {
        self.key_locks.lock().len()
    }

    /// Forget per-key locks nobody is holding.
    fn release_key_locks(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        let mut locks = self.key_locks.lock();
        for key in keys {
            if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
                locks.remove(key);
            }
        }
    }

    fn note_malformed(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        for key in keys {
            tracing::warn!(key = %key, "Dropped cache entry with malformed key");
        }
        self.purged.fetch_add(keys.len() as u64, Ordering::Relaxed);
        self.release_key_locks(keys);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::Error;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration as StdDuration;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn setup(max_entries: usize) -> (Arc<ManualClock>, AnalysisCache<u32>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(),
        ));
        let cache = AnalysisCache::new(Duration::minutes(30), max_entries, clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_key_render_and_parse() {
        let keys = [
            CacheKey::Day(date(4)),
            CacheKey::Week(date(4)),
            CacheKey::Pattern(date(1), date(10)),
            CacheKey::Summary(ReportPeriod::Weekly, date(4), date(10)),
        ];
        let rendered: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "2024-03-04",
                "week_2024-03-04",
                "pattern_2024-03-01_2024-03-10",
                "summary_weekly_2024-03-04_2024-03-10",
            ]
        );
        for (key, text) in keys.iter().zip(rendered.iter()) {
            assert_eq!(CacheKey::parse(text), Some(*key));
        }
        assert_eq!(CacheKey::parse("week_garbage"), None);
        assert_eq!(CacheKey::parse("summary_yearly_2024-03-04_2024-03-10"), None);
        assert_eq!(CacheKey::parse("2024-13-01"), None);
    }

    #[test]
    fn test_key_coverage() {
        assert!(CacheKey::Day(date(4)).covers(date(4)));
        assert!(!CacheKey::Day(date(4)).covers(date(5)));
        assert!(CacheKey::Week(date(4)).covers(date(10)));
        assert!(!CacheKey::Week(date(4)).covers(date(11)));
        assert!(CacheKey::Pattern(date(1), date(5)).covers(date(5)));
        assert!(!CacheKey::Pattern(date(1), date(5)).covers(date(6)));
    }

    #[test]
    fn test_freshness_follows_ttl() {
        let (clock, cache) = setup(10);
        assert!(cache.get("2024-03-04").is_none());

        cache.put("2024-03-04", 7);
        assert_eq!(cache.get("2024-03-04"), Some((7, true)));

        clock.advance(Duration::minutes(29));
        assert_eq!(cache.get("2024-03-04"), Some((7, true)));

        clock.advance(Duration::minutes(1));
        // Stale but still present
        assert_eq!(cache.get("2024-03-04"), Some((7, false)));
        assert_eq!(cache.len(), 1);

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_put_overwrites_and_restamps() {
        let (clock, cache) = setup(10);
        cache.put("2024-03-04", 1);
        clock.advance(Duration::minutes(45));
        cache.put("2024-03-04", 2);
        assert_eq!(cache.get("2024-03-04"), Some((2, true)));
    }

    #[test]
    fn test_invalidate_marks_stale_without_removing() {
        let (_clock, cache) = setup(10);
        cache.put("2024-03-04", 1);
        cache.put("week_2024-03-04", 2);
        cache.put("pattern_2024-02-01_2024-03-01", 3);
        cache.put("2024-03-05", 4);

        assert!(cache.invalidate("2024-03-05"));
        assert!(!cache.invalidate("2024-03-06"));
        assert_eq!(cache.get("2024-03-05"), Some((4, false)));

        assert_eq!(cache.invalidate_covering(date(4)), 2);
        assert_eq!(cache.get("2024-03-04"), Some((1, false)));
        assert_eq!(cache.get("week_2024-03-04"), Some((2, false)));
        assert_eq!(cache.get("pattern_2024-02-01_2024-03-01"), Some((3, true)));
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_invalidate_covering_drops_malformed_keys() {
        let (_clock, cache) = setup(10);
        cache.put("2024-03-04", 1);
        cache.put("not-a-date", 2);
        assert_eq!(cache.invalidate_covering(date(4)), 1);
        assert!(!cache.contains("not-a-date"));
        assert_eq!(cache.stats().purged, 1);
    }

    #[test]
    fn test_eviction_stays_under_cap_and_removes_oldest() {
        let (clock, cache) = setup(20);
        for i in 0..20u32 {
            cache.put(&CacheKey::Day(date(1) + Duration::days(i as i64)).to_string(), i);
            clock.advance(Duration::seconds(1));
        }
        assert_eq!(cache.len(), 20);

        // One more entry triggers eviction of the oldest 10% (two entries)
        cache.put("week_2024-04-01", 99);
        assert!(cache.len() <= 20);
        assert_eq!(cache.len(), 19);
        assert!(!cache.contains("2024-03-01"));
        assert!(!cache.contains("2024-03-02"));
        assert!(cache.contains("2024-03-03"));
        assert!(cache.contains("week_2024-04-01"));
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn test_eviction_ignores_read_recency() {
        let (clock, cache) = setup(3);
        cache.put("2024-03-01", 1);
        clock.advance(Duration::seconds(1));
        cache.put("2024-03-02", 2);
        clock.advance(Duration::seconds(1));
        cache.put("2024-03-03", 3);

        // Reading the oldest entry does not protect it
        assert!(cache.get("2024-03-01").is_some());
        clock.advance(Duration::seconds(1));
        cache.put("2024-03-04", 4);

        assert!(!cache.contains("2024-03-01"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_eviction_spans_key_families() {
        let (clock, cache) = setup(2);
        cache.put("pattern_2024-03-01_2024-03-10", 1);
        clock.advance(Duration::seconds(1));
        cache.put("week_2024-03-04", 2);
        clock.advance(Duration::seconds(1));
        // A day insert evicts the oldest entry, which is a pattern
        cache.put("2024-03-04", 3);

        assert!(!cache.contains("pattern_2024-03-01_2024-03-10"));
        assert!(cache.contains("week_2024-03-04"));
        assert!(cache.contains("2024-03-04"));
    }

    #[test]
    fn test_get_or_compute_caches() {
        let (clock, cache) = setup(10);
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(5)
        };

        assert_eq!(cache.get_or_compute("2024-03-04", compute).unwrap(), (5, true));
        assert_eq!(cache.get_or_compute("2024-03-04", compute).unwrap(), (5, false));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::minutes(31));
        assert_eq!(cache.get_or_compute("2024-03-04", compute).unwrap(), (5, true));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_get_or_compute_error_leaves_cache_untouched() {
        let (_clock, cache) = setup(10);
        let result = cache.get_or_compute("2024-03-04", || Err(Error::Task("boom".into())));
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_uncacheable_result_is_returned_but_not_stored() {
        let (_clock, cache) = setup(10);
        let result = cache.get_or_compute_with("2024-03-04", || Ok((9, false)));
        assert_eq!(result.unwrap(), (9, true));
        assert!(!cache.contains("2024-03-04"));

        let result = cache.get_or_compute_with("2024-03-04", || Ok((10, true)));
        assert_eq!(result.unwrap(), (10, true));
        assert_eq!(cache.get("2024-03-04"), Some((10, true)));
    }

    #[test]
    fn test_key_locks_released_after_compute() {
        let (_clock, cache) = setup(10);
        for i in 0..200i64 {
            let key = CacheKey::Summary(ReportPeriod::Custom, date(1), date(1) + Duration::days(i))
                .to_string();
            if i % 2 == 0 {
                assert!(cache.get_or_compute_with(&key, || Ok((1, false))).is_ok());
            } else {
                assert!(cache
                    .get_or_compute(&key, || Err(Error::Task("boom".into())))
                    .is_err());
            }
        }
        assert!(cache.is_empty());
        assert_eq!(cache.tracked_key_locks(), 0);

        assert!(cache.get_or_compute("2024-03-04", || Ok(3)).is_ok());
        assert_eq!(cache.tracked_key_locks(), 0);
        assert_eq!(cache.get("2024-03-04"), Some((3, true)));
    }

    #[test]
    fn test_invalidation_during_compute_stores_stale() {
        let (_clock, cache) = setup(10);
        let cache = Arc::new(cache);
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let reader_cache = cache.clone();
        let reader = std::thread::spawn(move || {
            reader_cache.get_or_compute("2024-03-04", move || {
                started_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                Ok(1)
            })
        });

        started_rx.recv().unwrap();
        // Nothing stored yet, but the computation in flight is affected
        assert_eq!(cache.invalidate_covering(date(4)), 0);
        release_tx.send(()).unwrap();
        assert_eq!(reader.join().unwrap().unwrap(), (1, true));

        assert_eq!(cache.get("2024-03-04"), Some((1, false)));
        assert_eq!(cache.get_or_compute("2024-03-04", || Ok(2)).unwrap(), (2, true));
        assert_eq!(cache.get("2024-03-04"), Some((2, true)));
    }

    #[test]
    fn test_same_key_computes_once_under_contention() {
        let (_clock, cache) = setup(10);
        let cache = Arc::new(cache);
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let calls = calls.clone();
                std::thread::spawn(move || {
                    cache
                        .get_or_compute("2024-03-04", || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(StdDuration::from_millis(20));
                            Ok(42)
                        })
                        .unwrap()
                        .0
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_different_keys_compute_concurrently() {
        let (_clock, cache) = setup(10);
        let cache = Arc::new(cache);
        let (a_tx, a_rx) = mpsc::channel::<()>();
        let (b_tx, b_rx) = mpsc::channel::<()>();

        let cache_a = cache.clone();
        let a = std::thread::spawn(move || {
            cache_a.get_or_compute("2024-03-04", move || {
                a_tx.send(()).unwrap();
                // Only succeeds if the other key is computing at the same time
                b_rx.recv_timeout(StdDuration::from_secs(5))
                    .map_err(|_| Error::Task("timed out".into()))?;
                Ok(1)
            })
        });
        let cache_b = cache.clone();
        let b = std::thread::spawn(move || {
            cache_b.get_or_compute("2024-03-05", move || {
                b_tx.send(()).unwrap();
                a_rx.recv_timeout(StdDuration::from_secs(5))
                    .map_err(|_| Error::Task("timed out".into()))?;
                Ok(2)
            })
        });

        assert_eq!(a.join().unwrap().unwrap(), (1, true));
        assert_eq!(b.join().unwrap().unwrap(), (2, true));
    }

    #[test]
    fn test_purge_older_than_retention() {
        let (_clock, cache) = setup(20);
        // now is 2024-03-10, retention 7 days -> cutoff 2024-03-03
        cache.put("2024-03-01", 1);
        cache.put("2024-03-03", 2);
        cache.put("week_2024-02-19", 3); // ends 02-25
        cache.put("week_2024-02-26", 4); // ends 03-03
        cache.put("pattern_2024-01-01_2024-01-31", 5);
        cache.put("garbage", 6);

        let removed = cache.purge_older_than(Duration::days(7));
        assert_eq!(removed, 3);
        assert!(!cache.contains("2024-03-01"));
        assert!(cache.contains("2024-03-03"));
        assert!(!cache.contains("week_2024-02-19"));
        assert!(cache.contains("week_2024-02-26"));
        assert!(cache.contains("pattern_2024-01-01_2024-01-31"));
        assert!(!cache.contains("garbage"));
    }
}
