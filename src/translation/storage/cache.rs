//! 翻译结果缓存
//!
//! 以 `(提供商, 源语言, 目标语言, 原文)` 的 blake3 摘要为键的 LRU 缓存，
//! 只缓存成功的译文。

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use lru::LruCache;

/// 缓存统计信息
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }
}

/// 翻译缓存
pub struct TranslationCache {
    entries: Mutex<LruCache<[u8; 32], String>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TranslationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// 生成缓存键
    pub fn cache_key(provider: &str, source_lang: &str, target_lang: &str, text: &str) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        for part in [provider, source_lang, target_lang, text] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        *hasher.finalize().as_bytes()
    }

    pub fn get(&self, key: &[u8; 32]) -> Option<String> {
        let found = self
            .entries
            .lock()
            .ok()
            .and_then(|mut entries| entries.get(key).cloned());

        match found {
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

    /// 是否已缓存，不计入命中统计也不更新最近使用顺序
    pub fn contains(&self, key: &[u8; 32]) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains(key))
            .unwrap_or(false)
    }

    pub fn insert(&self, key: [u8; 32], translated: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(key, translated);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// 获取统计信息
    pub fn stats(&self) -> CacheStats {
        let cache_hits = self.hits.load(Ordering::Relaxed);
        let cache_misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            total_requests: cache_hits + cache_misses,
            cache_hits,
            cache_misses,
            total_entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_separates_fields() {
        let a = TranslationCache::cache_key("nllb", "en", "zh", "ab");
        let b = TranslationCache::cache_key("nllb", "en", "zha", "b");
        let c = TranslationCache::cache_key("openai", "en", "zh", "ab");
        assert_ne!(a, b, "字段边界不同的输入不应产生相同的键");
        assert_ne!(a, c);
        assert_eq!(a, TranslationCache::cache_key("nllb", "en", "zh", "ab"));
    }

    #[test]
    fn test_lru_eviction_and_stats() {
        let cache = TranslationCache::new(2);
        let k1 = TranslationCache::cache_key("p", "en", "zh", "one");
        let k2 = TranslationCache::cache_key("p", "en", "zh", "two");
        let k3 = TranslationCache::cache_key("p", "en", "zh", "three");

        cache.insert(k1, "一".into());
        cache.insert(k2, "二".into());
        assert_eq!(cache.get(&k1).as_deref(), Some("一"));
        cache.insert(k3, "三".into());

        assert!(cache.get(&k2).is_none(), "最久未使用的条目应被淘汰");
        assert_eq!(cache.len(), 2);

        let stats = cache.stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }
}
