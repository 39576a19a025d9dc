//! 带缓存的翻译器包装

use std::sync::Arc;

use async_trait::async_trait;

use super::{TranslationUnit, Translator};
use crate::translation::error::TranslationResult;
use crate::translation::storage::TranslationCache;

/// 在任意翻译器外层增加结果缓存
///
/// 带上文语境的单元不走缓存，因为同一原文在不同语境下译文可能不同。
pub struct CachedTranslator {
    inner: Arc<dyn Translator>,
    cache: Arc<TranslationCache>,
}

impl CachedTranslator {
    pub fn new(inner: Arc<dyn Translator>, cache: Arc<TranslationCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }
}

#[async_trait]
impl Translator for CachedTranslator {
    fn provider_id(&self) -> &str {
        self.inner.provider_id()
    }

    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }

    fn uses_context(&self) -> bool {
        self.inner.uses_context()
    }

    fn needs_request(&self, units: &[TranslationUnit], source_language: &str, target_language: &str) -> bool {
        let provider = self.inner.provider_id();
        units.iter().any(|unit| {
            if unit.text.trim().is_empty() {
                return false;
            }
            unit.context.is_some()
                || !self.cache.contains(&TranslationCache::cache_key(
                    provider,
                    source_language,
                    target_language,
                    &unit.text,
                ))
        })
    }

    fn check_languages(&self, source_language: &str, target_language: &str) -> TranslationResult<()> {
        self.inner.check_languages(source_language, target_language)
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn translate_non_empty(
        &self,
        units: &[TranslationUnit],
        source_language: &str,
        target_language: &str,
    ) -> TranslationResult<Vec<String>> {
        let provider = self.inner.provider_id();
        let mut results: Vec<Option<String>> = Vec::with_capacity(units.len());
        let mut misses: Vec<usize> = Vec::new();

        for (index, unit) in units.iter().enumerate() {
            let cached = if unit.context.is_none() {
                let key = TranslationCache::cache_key(provider, source_language, target_language, &unit.text);
                self.cache.get(&key)
            } else {
                None
            };
            if cached.is_none() {
                misses.push(index);
            }
            results.push(cached);
        }

        if !misses.is_empty() {
            let pending: Vec<TranslationUnit> = misses.iter().map(|&i| units[i].clone()).collect();
            let translated = self
                .inner
                .translate_units(&pending, source_language, target_language)
                .await?;

            for (index, text) in misses.into_iter().zip(translated) {
                if units[index].context.is_none() {
                    let key = TranslationCache::cache_key(
                        provider,
                        source_language,
                        target_language,
                        &units[index].text,
                    );
                    self.cache.insert(key, text.clone());
                }
                results[index] = Some(text);
            }
        }

        Ok(results.into_iter().map(Option::unwrap_or_default).collect())
    }
}
