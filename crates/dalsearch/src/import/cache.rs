//! Short-lived caching of fetched timetables, plus a circuit breaker for the portal.

use super::RawSessionRecord;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cache key derived from a portal session token and the requested week.
///
/// The token is hashed so raw session ids never sit in memory longer than
/// the request that carried them.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(token: &str, week_of: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.update(b"\0");
        hasher.update(week_of.as_bytes());
        let digest = hasher.finalize();
        Self(digest[..16].iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}...", &self.0[..8.min(self.0.len())])
    }
}

#[derive(Clone)]
struct CachedTimetable {
    records: Vec<RawSessionRecord>,
    cached_at: Instant,
}

/// Thread-safe TTL cache of parsed timetables.
pub struct ImportCache {
    entries: DashMap<SessionKey, CachedTimetable>,
    ttl: Duration,
}

impl ImportCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Gets cached records if present and not expired.
    pub fn get(&self, key: &SessionKey) -> Option<Vec<RawSessionRecord>> {
        let entry = self.entries.get(key)?;
        if entry.cached_at.elapsed() < self.ttl {
            return Some(entry.records.clone());
        }
        drop(entry);
        self.entries.remove(key);
        None
    }

    pub fn insert(&self, key: SessionKey, records: Vec<RawSessionRecord>) {
        self.entries.insert(
            key,
            CachedTimetable {
                records,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &SessionKey) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Removes expired entries.
    pub fn cleanup_expired(&self) {
        self.entries.retain(|_, entry| entry.cached_at.elapsed() < self.ttl);
    }

    pub fn stats(&self) -> CacheStats {
        let total = self.entries.len();
        let expired = self
            .entries
            .iter()
            .filter(|entry| entry.cached_at.elapsed() >= self.ttl)
            .count();
        CacheStats {
            total_entries: total,
            expired_entries: expired,
            active_entries: total - expired,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
}

/// Opens after `threshold` consecutive failures and stays open for `recovery_time`.
pub struct CircuitBreaker {
    failure_count: AtomicU32,
    last_failure: Mutex<Option<Instant>>,
    threshold: u32,
    recovery_time: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, recovery_time: Duration) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            last_failure: Mutex::new(None),
            threshold,
            recovery_time,
        }
    }

    pub fn is_open(&self) -> bool {
        if self.failure_count.load(Ordering::Relaxed) < self.threshold {
            return false;
        }

        if let Ok(guard) = self.last_failure.lock() {
            if let Some(last) = *guard {
                if last.elapsed() > self.recovery_time {
                    drop(guard);
                    self.reset();
                    return false;
                }
            }
        }

        true
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_failure.lock() {
            *guard = Some(Instant::now());
        }
    }

    pub fn reset(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_failure.lock() {
            *guard = None;
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Relaxed)
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}

/// Cache and breaker shared by every import request.
pub struct ImportCacheState {
    pub cache: ImportCache,
    pub circuit_breaker: CircuitBreaker,
}

impl ImportCacheState {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: ImportCache::new(ttl),
            circuit_breaker: CircuitBreaker::default(),
        }
    }
}

impl Default for ImportCacheState {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Day;

    fn record() -> RawSessionRecord {
        RawSessionRecord {
            day: Day::Monday,
            subject: "CSCI".to_string(),
            course_number: "1100".to_string(),
            section: "01".to_string(),
            crn: "11111".to_string(),
            start_time: "1005".parse().unwrap(),
            end_time: "1125".parse().unwrap(),
            location: "Dunn 117".to_string(),
        }
    }

    #[test]
    fn test_session_key_hashing() {
        let a = SessionKey::new("token", "01/06/2025");
        let b = SessionKey::new("token", "01/06/2025");
        let c = SessionKey::new("token", "01/13/2025");
        let d = SessionKey::new("other", "01/06/2025");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a.as_str().len(), 32);
        assert!(!a.to_string().contains("token"));
    }

    #[test]
    fn test_cache_ttl() {
        let cache = ImportCache::new(Duration::from_secs(60));
        let key = SessionKey::new("token", "01/06/2025");
        assert!(cache.get(&key).is_none());
        cache.insert(key.clone(), vec![record()]);
        assert_eq!(cache.get(&key), Some(vec![record()]));
        assert_eq!(cache.stats().active_entries, 1);

        cache.invalidate(&key);
        assert!(cache.get(&key).is_none());

        let expired = ImportCache::new(Duration::ZERO);
        expired.insert(key.clone(), vec![record()]);
        assert!(expired.get(&key).is_none());
    }

    #[test]
    fn test_circuit_breaker_threshold() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60));

        assert!(!cb.is_open());
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
        cb.record_failure();
        assert!(cb.is_open());
        assert_eq!(cb.failure_count(), 3);

        cb.record_success();
        assert!(!cb.is_open());
    }

    #[test]
    fn test_circuit_breaker_recovers() {
        let cb = CircuitBreaker::new(1, Duration::ZERO);
        cb.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(!cb.is_open());
        assert_eq!(cb.failure_count(), 0);
    }
}
