//! 翻译核心模块
//!
//! 定义统一的 [`Translator`] 接口、提供商目录以及按提供商标识构造翻译器的工厂。
//!
//! ## 核心功能
//!
//! - **统一接口**: 所有提供商实现 `translate_batch`，输出数量与输入严格一致
//! - **空文本跳过**: 空白输入原样返回，不调用后端
//! - **提供商目录**: `nllb`（本地模型）与 `openai`/`deepseek`/`deepseek-reasoner`（远程对话）
//! - **工厂校验**: 提供商与语言对在构造时校验，而非首次调用时

pub mod cached;
pub mod languages;
pub mod local;
pub mod remote;
pub mod retry;
pub mod service;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::translation::config::{constants, PipelineConfig};
use crate::translation::error::{TranslationError, TranslationResult};

pub use cached::CachedTranslator;
pub use local::{HttpSeq2SeqModel, LocalNeuralTranslator, Seq2SeqModel};
pub use remote::RemoteChatTranslator;
pub use retry::{RetryOutcome, RetryPolicy};
pub use service::{PipelineService, ServiceStats};

/// 翻译提供商
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Nllb,
    OpenAi,
    DeepSeek,
    DeepSeekReasoner,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Nllb,
        ProviderKind::OpenAi,
        ProviderKind::DeepSeek,
        ProviderKind::DeepSeekReasoner,
    ];

    /// 根据提供商标识解析
    pub fn from_id(id: &str) -> TranslationResult<Self> {
        let normalized = id.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == normalized)
            .ok_or_else(|| {
                TranslationError::ConfigError(format!(
                    "不支持的翻译提供商 '{}'，可选: {}",
                    id,
                    supported_providers().join(", ")
                ))
            })
    }

    pub fn id(self) -> &'static str {
        match self {
            ProviderKind::Nllb => "nllb",
            ProviderKind::OpenAi => "openai",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::DeepSeekReasoner => "deepseek-reasoner",
        }
    }

    pub fn is_remote(self) -> bool {
        !matches!(self, ProviderKind::Nllb)
    }

    /// 单批次估算 token 预算
    pub fn token_budget(self) -> usize {
        match self {
            ProviderKind::Nllb => 15_000,
            ProviderKind::OpenAi | ProviderKind::DeepSeek => 12_000,
            ProviderKind::DeepSeekReasoner => 8_000,
        }
    }

    /// 单批次文本数上限
    pub fn batch_cap(self) -> usize {
        match self {
            ProviderKind::Nllb => 5,
            ProviderKind::OpenAi | ProviderKind::DeepSeek => 20,
            ProviderKind::DeepSeekReasoner => 10,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// 所有已注册的提供商标识
pub fn supported_providers() -> Vec<&'static str> {
    ProviderKind::ALL.iter().map(|kind| kind.id()).collect()
}

/// 根据平均文本长度计算动态批次大小
///
/// 按每字符约 1.5 个 token 估算，不超过配置值与提供商上限。
pub fn dynamic_batch_size(kind: ProviderKind, configured: usize, texts: &[&str]) -> usize {
    let configured = configured.max(1);
    if texts.is_empty() {
        return configured;
    }

    let total_chars: usize = texts.iter().map(|text| text.chars().count()).sum();
    let avg_chars = total_chars as f64 / texts.len() as f64;
    let tokens_per_text = avg_chars * constants::TOKENS_PER_CHAR_ESTIMATE;

    let by_budget = if tokens_per_text <= 0.0 {
        configured
    } else {
        (kind.token_budget() as f64 / tokens_per_text) as usize
    };

    by_budget.clamp(1, configured).min(kind.batch_cap())
}

/// 待翻译单元
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationUnit {
    pub text: String,
    /// 仅供理解语境的上文，不应出现在译文中
    pub context: Option<String>,
}

impl TranslationUnit {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.context = if context.trim().is_empty() { None } else { Some(context) };
        self
    }
}

/// 翻译器接口
///
/// 实现者只需提供 [`Translator::translate_non_empty`]；
/// 数量一致与空文本跳过由默认方法保证。
#[async_trait]
pub trait Translator: Send + Sync {
    /// 提供商标识
    fn provider_id(&self) -> &str;

    /// 单次后端调用可处理的最大文本数
    fn max_batch_size(&self) -> usize {
        1
    }

    /// 是否利用上文语境
    fn uses_context(&self) -> bool {
        false
    }

    /// 翻译这些单元是否需要访问后端，调度器据此决定是否限速
    fn needs_request(&self, units: &[TranslationUnit], _source_language: &str, _target_language: &str) -> bool {
        units.iter().any(|unit| !unit.text.trim().is_empty())
    }

    /// 后端是否可用，本地模型在此时完成加载
    async fn is_available(&self) -> bool {
        true
    }

    /// 校验语言对
    fn check_languages(&self, source_language: &str, target_language: &str) -> TranslationResult<()>;

    /// 调用后端翻译，输入保证不含空白文本
    async fn translate_non_empty(
        &self,
        units: &[TranslationUnit],
        source_language: &str,
        target_language: &str,
    ) -> TranslationResult<Vec<String>>;

    /// 翻译带语境的单元列表
    async fn translate_units(
        &self,
        units: &[TranslationUnit],
        source_language: &str,
        target_language: &str,
    ) -> TranslationResult<Vec<String>> {
        let mut outputs: Vec<String> = units
            .iter()
            .map(|unit| {
                if unit.text.trim().is_empty() {
                    unit.text.clone()
                } else {
                    String::new()
                }
            })
            .collect();

        let pending: Vec<usize> = units
            .iter()
            .enumerate()
            .filter(|(_, unit)| !unit.text.trim().is_empty())
            .map(|(index, _)| index)
            .collect();

        if pending.is_empty() {
            return Ok(outputs);
        }

        let batch: Vec<TranslationUnit> = pending.iter().map(|&index| units[index].clone()).collect();
        let translated = self
            .translate_non_empty(&batch, source_language, target_language)
            .await?;

        if translated.len() != batch.len() {
            return Err(TranslationError::ProviderPermanent(format!(
                "{} 返回 {} 条译文，期望 {} 条",
                self.provider_id(),
                translated.len(),
                batch.len()
            )));
        }

        for (index, text) in pending.into_iter().zip(translated) {
            outputs[index] = text;
        }

        Ok(outputs)
    }

    /// 批量翻译文本
    async fn translate_batch(
        &self,
        texts: &[String],
        source_language: &str,
        target_language: &str,
    ) -> TranslationResult<Vec<String>> {
        let units: Vec<TranslationUnit> = texts.iter().map(TranslationUnit::new).collect();
        self.translate_units(&units, source_language, target_language)
            .await
    }
}

/// 按配置构造翻译器
///
/// 提供商标识与语言对在此校验，失败时不会发出任何翻译请求。
pub fn create_translator(config: &PipelineConfig) -> TranslationResult<Arc<dyn Translator>> {
    let kind = ProviderKind::from_id(&config.provider)?;
    languages::check_language_pair(kind, &config.source_language, &config.target_language)?;

    let translator: Arc<dyn Translator> = match kind {
        ProviderKind::Nllb => Arc::new(LocalNeuralTranslator::from_config(config)?),
        ProviderKind::OpenAi | ProviderKind::DeepSeek | ProviderKind::DeepSeekReasoner => {
            Arc::new(RemoteChatTranslator::new(kind, config)?)
        }
    };

    tracing::info!("已创建翻译器: {}", kind);
    Ok(translator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct UppercaseTranslator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for UppercaseTranslator {
        fn provider_id(&self) -> &str {
            "uppercase"
        }

        fn check_languages(&self, _: &str, _: &str) -> TranslationResult<()> {
            Ok(())
        }

        async fn translate_non_empty(
            &self,
            units: &[TranslationUnit],
            _: &str,
            _: &str,
        ) -> TranslationResult<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(units.iter().all(|u| !u.text.trim().is_empty()));
            Ok(units.iter().map(|u| u.text.to_uppercase()).collect())
        }
    }

    #[tokio::test]
    async fn test_empty_inputs_skip_backend() {
        let translator = UppercaseTranslator { calls: AtomicUsize::new(0) };
        let texts = vec!["".to_string(), "a".to_string(), "".to_string()];

        let output = translator.translate_batch(&texts, "en", "zh").await.unwrap();
        assert_eq!(output, vec!["", "A", ""]);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);

        let output = translator
            .translate_batch(&["".to_string(), "  ".to_string()], "en", "zh")
            .await
            .unwrap();
        assert_eq!(output, vec!["", "  "]);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1, "全空输入不应调用后端");
    }

    #[test]
    fn test_provider_ids_roundtrip() {
        for kind in ProviderKind::ALL {
            assert_eq!(ProviderKind::from_id(kind.id()).unwrap(), kind);
        }
        assert_eq!(ProviderKind::from_id(" DeepSeek ").unwrap(), ProviderKind::DeepSeek);
        assert!(ProviderKind::from_id("google").is_err());
        assert!(!ProviderKind::Nllb.is_remote());
        assert!(ProviderKind::DeepSeekReasoner.is_remote());
    }

    #[test]
    fn test_dynamic_batch_size() {
        let short = vec!["hello"; 50];
        assert_eq!(dynamic_batch_size(ProviderKind::DeepSeek, 10, &short), 10);
        assert_eq!(dynamic_batch_size(ProviderKind::Nllb, 10, &short), 5);

        let long_text = "x".repeat(4000);
        let long = vec![long_text.as_str(); 4];
        // 4000 * 1.5 = 6000 tokens，预算 12000 只够 2 条
        assert_eq!(dynamic_batch_size(ProviderKind::OpenAi, 10, &long), 2);
        assert_eq!(dynamic_batch_size(ProviderKind::DeepSeekReasoner, 10, &long), 1);
        assert_eq!(dynamic_batch_size(ProviderKind::OpenAi, 10, &[]), 10);
    }

    #[test]
    fn test_factory_rejects_before_any_call() {
        let mut config = PipelineConfig::for_provider("nllb", "tlh");
        config.source_language = "en".into();
        assert!(matches!(
            create_translator(&config),
            Err(TranslationError::UnsupportedLanguage(_))
        ));

        let config = PipelineConfig::for_provider("unknown", "en");
        assert!(matches!(create_translator(&config), Err(TranslationError::ConfigError(_))));
    }

    #[test]
    fn test_factory_builds_remote_variant() {
        let mut config = PipelineConfig::for_provider("deepseek", "en");
        config.api_key = Some("sk-test".into());
        let translator = create_translator(&config).unwrap();
        assert_eq!(translator.provider_id(), "deepseek");
        assert!(translator.uses_context());
    }
}
