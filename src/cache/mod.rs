//! 결과 캐시 - 검색 결과 메모리 캐시
//!
//! `moka::sync::Cache` 기반. 엔트리는 TTL이 지나면 만료되고,
//! 용량을 넘으면 오래/드물게 쓰인 엔트리부터 밀려납니다.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::sync::Cache;
use sha2::{Digest, Sha256};

/// TTL + 용량 상한 캐시 (조회 적중/실패 집계)
pub struct ResultCache<V: Clone + Send + Sync + 'static> {
    cache: Cache<String, V>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> ResultCache<V> {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// 조회 (만료된 엔트리는 None)
    pub fn get(&self, key: &str) -> Option<V> {
        match self.cache.get(key) {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: String, value: V) {
        self.cache.insert(key, value);
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    /// 현재 엔트리 수 (대기 중인 정리 작업 반영 후)
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (적중, 실패)
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

/// 캐시 키 생성 (SHA-256 hex)
pub fn cache_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_insert() {
        let cache = ResultCache::new(Duration::from_secs(60), 10);
        assert!(cache.get("k").is_none());
        cache.insert("k".to_string(), 42);
        assert_eq!(cache.get("k"), Some(42));
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn test_expired_entries_are_not_returned() {
        let cache = ResultCache::new(Duration::from_millis(20), 10);
        cache.insert("k".to_string(), "v".to_string());
        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_capacity_bounds_live_entries() {
        let cache = ResultCache::new(Duration::from_secs(300), 100);
        for i in 0..5_000 {
            cache.insert(format!("key-{i}"), i);
        }
        assert!(cache.len() <= 100);
    }

    #[test]
    fn test_clear() {
        let cache = ResultCache::new(Duration::from_secs(60), 10);
        cache.insert("a".to_string(), 1);
        cache.clear();
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_cache_key_separates_parts() {
        assert_eq!(cache_key(&["a", "b"]).len(), 64);
        assert_eq!(cache_key(&["a", "b"]), cache_key(&["a", "b"]));
        assert_ne!(cache_key(&["ab", ""]), cache_key(&["a", "b"]));
    }
}
