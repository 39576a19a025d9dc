//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值。
//! 加载顺序：`.env` 文件 → 配置文件 → 环境变量覆盖 → 校验。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::core::{languages, ProviderKind};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::model::{Layout, OutputFormat};

/// 提供商重试耗尽后的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 保留原文并标记 `succeeded = false`，任务继续
    #[default]
    DegradeToSource,
    /// 任务立即失败
    AbortTask,
}

/// 流水线配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    // 提供商
    pub provider: String,
    pub source_language: String,
    pub target_language: String,
    pub model: Option<String>,
    /// 本地模型加载失败时依次尝试的模型
    pub fallback_models: Vec<String>,
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub local_model_endpoint: String,
    pub temperature: f32,

    // 输出
    pub output_formats: Vec<OutputFormat>,
    pub layout: Layout,
    pub generate_report: bool,
    pub pdf_font_path: Option<String>,

    // 分块
    pub use_smart_chunking: bool,
    pub max_chunk_chars: usize,
    pub min_chunk_chars: usize,
    pub overlap_chars: usize,
    pub preserve_sentences: bool,
    pub preserve_paragraphs: bool,

    // 批次与速率
    pub batch_size: usize,
    pub delay_between_requests_ms: u64,
    pub max_workers: usize,
    pub request_timeout_secs: u64,

    // 重试与失败策略
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub failure_policy: FailurePolicy,

    // 资源限制
    pub max_file_size: usize,

    // 缓存
    pub cache_enabled: bool,
    pub cache_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider: constants::DEFAULT_PROVIDER.to_string(),
            source_language: constants::DEFAULT_SOURCE_LANG.to_string(),
            target_language: constants::DEFAULT_TARGET_LANG.to_string(),
            model: None,
            fallback_models: Vec::new(),
            api_key: None,
            api_base_url: None,
            local_model_endpoint: constants::DEFAULT_LOCAL_MODEL_ENDPOINT.to_string(),
            temperature: constants::DEFAULT_TEMPERATURE,

            output_formats: vec![OutputFormat::Docx],
            layout: Layout::SideBySide,
            generate_report: false,
            pdf_font_path: None,

            use_smart_chunking: true,
            max_chunk_chars: constants::DEFAULT_MAX_CHUNK_CHARS,
            min_chunk_chars: constants::DEFAULT_MIN_CHUNK_CHARS,
            overlap_chars: constants::DEFAULT_OVERLAP_CHARS,
            preserve_sentences: true,
            preserve_paragraphs: true,

            batch_size: constants::DEFAULT_BATCH_SIZE,
            delay_between_requests_ms: constants::DEFAULT_DELAY_BETWEEN_REQUESTS_MS,
            max_workers: constants::DEFAULT_MAX_WORKERS,
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),

            max_retries: constants::DEFAULT_MAX_RETRIES,
            retry_delay_ms: constants::DEFAULT_RETRY_DELAY_MS,
            failure_policy: FailurePolicy::DegradeToSource,

            max_file_size: constants::DEFAULT_MAX_FILE_SIZE,

            cache_enabled: true,
            cache_size: constants::DEFAULT_CACHE_SIZE,
        }
    }
}

impl PipelineConfig {
    /// 创建指定提供商与目标语言的配置
    pub fn for_provider(provider: &str, target_language: &str) -> Self {
        Self {
            provider: provider.to_string(),
            target_language: target_language.to_string(),
            ..Self::default()
        }
    }

    /// 校验配置
    ///
    /// 提供商标识、语言对、分块边界与输出格式都在此阶段检查，
    /// 不会等到第一次调用提供商时才暴露问题。
    pub fn validate(&self) -> TranslationResult<()> {
        let provider = ProviderKind::from_id(&self.provider)?;

        if provider.is_remote()
            && self.api_key.as_deref().map_or(true, |key| key.trim().is_empty())
        {
            return Err(TranslationError::ConfigError(format!(
                "提供商 {} 需要配置 API 密钥",
                provider.id()
            )));
        }

        languages::check_language_pair(provider, &self.source_language, &self.target_language)?;

        if self.max_chunk_chars == 0 {
            return Err(TranslationError::ConfigError("最大分块字符数不能为0".to_string()));
        }

        if self.min_chunk_chars == 0 || self.min_chunk_chars > self.max_chunk_chars {
            return Err(TranslationError::ConfigError(format!(
                "最小分块字符数必须在 1 到 {} 之间",
                self.max_chunk_chars
            )));
        }

        if self.overlap_chars >= self.max_chunk_chars {
            return Err(TranslationError::ConfigError("重叠字符数必须小于最大分块字符数".to_string()));
        }

        if self.batch_size == 0 {
            return Err(TranslationError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.max_workers == 0 {
            return Err(TranslationError::ConfigError("最大并发数不能为0".to_string()));
        }

        if self.request_timeout_secs == 0 {
            return Err(TranslationError::ConfigError("请求超时不能为0".to_string()));
        }

        if self.output_formats.is_empty() {
            return Err(TranslationError::ConfigError("至少需要一种输出格式".to_string()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TranslationError::ConfigError("采样温度必须在 0 到 2 之间".to_string()));
        }

        if self.cache_enabled && self.cache_size == 0 {
            return Err(TranslationError::ConfigError("启用缓存时缓存大小不能为0".to_string()));
        }

        if let Some(base_url) = &self.api_base_url {
            url::Url::parse(base_url).map_err(|e| {
                TranslationError::ConfigError(format!("API 地址无效 '{}': {}", base_url, e))
            })?;
        }

        Ok(())
    }

    /// 应用环境变量覆盖（仅覆盖显式设置的变量）
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{translation, EnvVar};

        macro_rules! override_from_env {
            ($var:ty, $apply:expr) => {
                match <$var>::get_set() {
                    Ok(Some(value)) => $apply(value),
                    Ok(None) => {}
                    Err(e) => tracing::warn!("忽略无效的环境变量: {}", e),
                }
            };
        }

        override_from_env!(translation::Provider, |v| self.provider = v);
        override_from_env!(translation::SourceLang, |v| self.source_language = v);
        override_from_env!(translation::TargetLang, |v| self.target_language = v);
        override_from_env!(translation::ApiKey, |v| self.api_key = Some(v));
        override_from_env!(translation::ApiBaseUrl, |v: String| {
            tracing::info!("环境变量覆盖 API 地址: {}", v);
            self.api_base_url = Some(v);
        });
        override_from_env!(translation::LocalModelEndpoint, |v| self.local_model_endpoint = v);
        override_from_env!(translation::MaxWorkers, |v| self.max_workers = v);
        override_from_env!(translation::BatchSize, |v| self.batch_size = v);
        override_from_env!(translation::RequestDelay, |v: Duration| {
            self.delay_between_requests_ms = v.as_millis() as u64;
        });
        override_from_env!(translation::RequestTimeout, |v: Duration| {
            self.request_timeout_secs = v.as_secs();
        });
        override_from_env!(translation::CacheEnabled, |v| self.cache_enabled = v);
    }

    pub fn delay_between_requests(&self) -> Duration {
        Duration::from_millis(self.delay_between_requests_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: PipelineConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new() -> TranslationResult<Self> {
        let config = Self::load_unvalidated(None)?;
        config.validate()?;

        Ok(Self { config })
    }

    /// 从指定文件创建配置管理器
    pub fn from_file(path: &str) -> TranslationResult<Self> {
        let config = Self::load_unvalidated(Some(path))?;
        config.validate()?;

        Ok(Self { config })
    }

    /// 加载配置文件并应用环境变量，不做校验
    ///
    /// 调用方还要叠加命令行参数等覆盖项时使用，覆盖完成后需自行调用 `validate`。
    pub fn load_unvalidated(path: Option<&str>) -> TranslationResult<PipelineConfig> {
        let mut config = match path {
            Some(path) => {
                Self::load_dotenv();
                let expanded = shellexpand::tilde(path);
                Self::load_from_file(expanded.as_ref())?
            }
            None => Self::load_config()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// 获取配置
    pub fn get_config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 导出为 TOML
    pub fn to_toml_string(&self) -> TranslationResult<String> {
        toml::to_string_pretty(&self.config)
            .map_err(|e| TranslationError::SerializationError(format!("TOML序列化失败: {}", e)))
    }

    /// 从默认路径加载配置
    fn load_config() -> TranslationResult<PipelineConfig> {
        Self::load_dotenv();

        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(PipelineConfig::default())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &str) -> TranslationResult<PipelineConfig> {
        if path.ends_with(".toml") {
            let content = std::fs::read_to_string(path)
                .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;
            return Ok(toml::from_str(&content)?);
        }

        // 其他格式（JSON、YAML 等）交给 config crate 识别
        let settings = config::Config::builder()
            .add_source(config::File::from(Path::new(path)))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env.development", ".env.production", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() {
                if dotenv::from_filename(env_file).is_ok() {
                    tracing::info!("已加载环境变量文件: {}", env_file);
                    break;
                }
            }
        }
    }
}

impl From<PipelineConfig> for ConfigManager {
    fn from(config: PipelineConfig) -> Self {
        Self { config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok(), "默认配置应当有效");
        assert_eq!(config.max_chunk_chars, 1500);
        assert_eq!(config.min_chunk_chars, 50);
        assert_eq!(config.failure_policy, FailurePolicy::DegradeToSource);
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = PipelineConfig::for_provider("babelfish", "en");
        assert!(matches!(config.validate(), Err(TranslationError::ConfigError(_))));
    }

    #[test]
    fn test_remote_provider_requires_api_key() {
        let mut config = PipelineConfig::for_provider("deepseek", "en");
        assert!(config.validate().is_err());

        config.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unsupported_language_detected_at_config_time() {
        let mut config = PipelineConfig::for_provider("nllb", "tlh");
        config.source_language = "en".to_string();
        assert!(matches!(
            config.validate(),
            Err(TranslationError::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn test_chunk_bounds_validation() {
        let mut config = PipelineConfig::default();
        config.min_chunk_chars = 2000;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.overlap_chars = config.max_chunk_chars;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "provider = \"nllb\"\ntarget_language = \"ja\"\nlayout = \"translation_only\"\noutput_formats = [\"md\", \"pdf\"]").unwrap();

        let manager = ConfigManager::from_file(file.path().to_str().unwrap()).unwrap();
        let config = manager.get_config();
        assert_eq!(config.target_language, "ja");
        assert_eq!(config.layout, Layout::TranslationOnly);
        assert_eq!(config.output_formats, vec![OutputFormat::Markdown, OutputFormat::Pdf]);
        assert_eq!(config.batch_size, constants::DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_json_config_via_config_crate() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{"provider": "nllb", "max_workers": 3, "failure_policy": "abort_task"}}"#).unwrap();

        let manager = ConfigManager::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(manager.get_config().max_workers, 3);
        assert_eq!(manager.get_config().failure_policy, FailurePolicy::AbortTask);
    }

    #[test]
    fn test_toml_export_reloads() {
        let mut config = PipelineConfig::for_provider("nllb", "fr");
        config.max_workers = 2;
        let text = ConfigManager::from(config).to_toml_string().unwrap();
        assert!(text.contains("target_language = \"fr\""));

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "{}", text).unwrap();
        let reloaded = ConfigManager::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(reloaded.get_config().max_workers, 2);
        assert_eq!(reloaded.get_config().target_language, "fr");
    }
}
