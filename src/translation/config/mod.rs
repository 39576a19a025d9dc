//! 流水线配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, FailurePolicy, PipelineConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 翻译默认值
    pub const DEFAULT_PROVIDER: &str = "nllb";
    pub const DEFAULT_SOURCE_LANG: &str = "auto";
    pub const DEFAULT_TARGET_LANG: &str = "zh-CN";
    pub const DEFAULT_TEMPERATURE: f32 = 0.1;

    // 分块相关
    pub const DEFAULT_MAX_CHUNK_CHARS: usize = 1500;
    pub const DEFAULT_MIN_CHUNK_CHARS: usize = 50;
    pub const DEFAULT_OVERLAP_CHARS: usize = 0;
    /// 向后查找切分点的窗口占 max_chunk_chars 的比例
    pub const BOUNDARY_LOOKBACK_RATIO: f32 = 0.3;
    pub const MIN_BOUNDARY_LOOKBACK: usize = 8;

    // 批次与速率
    pub const DEFAULT_BATCH_SIZE: usize = 10;
    pub const DEFAULT_DELAY_BETWEEN_REQUESTS_MS: u64 = 1000;
    pub const DEFAULT_MAX_WORKERS: usize = 1;
    pub const TOKENS_PER_CHAR_ESTIMATE: f64 = 1.5;

    // 重试
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
    pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    // 文件
    pub const DEFAULT_MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

    // 本地模型
    pub const DEFAULT_LOCAL_MODEL: &str = "facebook/nllb-200-distilled-600M";
    pub const DEFAULT_LOCAL_MODEL_ENDPOINT: &str = "http://127.0.0.1:6060/translate";

    // 缓存
    pub const DEFAULT_CACHE_SIZE: usize = 2000;

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "doctrans.toml",
        "doctrans.json",
        ".doctrans.toml",
        "~/.config/doctrans/config.toml",
        "/etc/doctrans/config.toml",
    ];
}

/// 加载配置，失败时回退到默认配置
pub fn load_pipeline_config() -> PipelineConfig {
    match ConfigManager::new() {
        Ok(manager) => manager.get_config().clone(),
        Err(e) => {
            tracing::warn!("配置加载失败，使用默认配置: {}", e);
            PipelineConfig::default()
        }
    }
}
