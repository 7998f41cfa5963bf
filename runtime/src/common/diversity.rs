use lru::LruCache;
use std::{hash::Hash, num::NonZeroUsize, sync::Mutex};

/// 不同多样性的缓存容量。
#[derive(Clone, Debug)]
pub struct CacheSize {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl Default for CacheSize {
    fn default() -> Self {
        Self {
            low: 4,
            medium: 16,
            high: 64,
        }
    }
}

/// 被缓存的键的多样性。
#[derive(Clone, Copy, Debug)]
pub enum Diversity {
    Low,
    Medium,
    High,
}

impl CacheSize {
    pub fn new_cache<K: Hash + Eq, V>(&self, level: Diversity) -> Mutex<LruCache<K, V>> {
        let size = match level {
            Diversity::Low => self.low,
            Diversity::Medium => self.medium,
            Diversity::High => self.high,
        };
        Mutex::new(LruCache::new(
            NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN),
        ))
    }
}

#[test]
fn test_cache_size() {
    let sizes = CacheSize {
        low: 0,
        ..Default::default()
    };
    let cache = sizes.new_cache::<u32, u32>(Diversity::Low);
    let mut cache = cache.lock().unwrap();
    cache.put(1, 1);
    cache.put(2, 2);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&2), Some(&2));
}
