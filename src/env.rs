//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问。所有变量以 `DOCTRANS_` 为前缀，
//! 只有显式设置的变量才会覆盖配置文件中的值。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    /// 未设置时使用的默认值
    fn default_value() -> Option<T> {
        None
    }

    /// 读取显式设置的值，未设置返回 `None`
    fn get_set() -> EnvResult<Option<T>> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value).map(Some),
            Err(_) => Ok(None),
        }
    }

    fn get() -> EnvResult<T> {
        match Self::get_set()? {
            Some(value) => Ok(value),
            None => Self::default_value().ok_or_else(|| EnvError {
                variable: Self::NAME.to_string(),
                message: "Required environment variable not set".to_string(),
            }),
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

fn error(name: &str, message: impl Into<String>) -> EnvError {
    EnvError {
        variable: name.to_string(),
        message: message.into(),
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "DOCTRANS_LOG_LEVEL";
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn default_value() -> Option<String> {
            Some("info".to_string())
        }

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(error(
                    Self::NAME,
                    format!("Invalid log level '{}'. Use: trace, debug, info, warn, error", value),
                )),
            }
        }
    }

    /// 文件存储目录
    pub struct StorageDir;
    impl EnvVar<String> for StorageDir {
        const NAME: &'static str = "DOCTRANS_STORAGE_DIR";
        const DESCRIPTION: &'static str = "Directory for uploaded files and generated outputs";

        fn default_value() -> Option<String> {
            Some("doctrans-data".to_string())
        }

        fn parse(value: &str) -> EnvResult<String> {
            let dir = value.trim();
            if dir.is_empty() {
                return Err(error(Self::NAME, "Directory cannot be empty"));
            }
            Ok(shellexpand::tilde(dir).into_owned())
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 翻译提供商
    pub struct Provider;
    impl EnvVar<String> for Provider {
        const NAME: &'static str = "DOCTRANS_PROVIDER";
        const DESCRIPTION: &'static str =
            "Translation provider: nllb, openai, deepseek, deepseek-reasoner";

        fn parse(value: &str) -> EnvResult<String> {
            let provider = value.trim().to_lowercase();
            if provider.is_empty() {
                return Err(error(Self::NAME, "Provider cannot be empty"));
            }
            Ok(provider)
        }
    }

    /// 源语言
    pub struct SourceLang;
    impl EnvVar<String> for SourceLang {
        const NAME: &'static str = "DOCTRANS_SOURCE_LANG";
        const DESCRIPTION: &'static str = "Source language code ('auto' for detection)";

        fn parse(value: &str) -> EnvResult<String> {
            parse_lang(value, Self::NAME)
        }
    }

    /// 目标语言
    pub struct TargetLang;
    impl EnvVar<String> for TargetLang {
        const NAME: &'static str = "DOCTRANS_TARGET_LANG";
        const DESCRIPTION: &'static str = "Target language code, e.g. zh-CN, en, ja";

        fn parse(value: &str) -> EnvResult<String> {
            let lang = parse_lang(value, Self::NAME)?;
            if lang == "auto" {
                return Err(error(Self::NAME, "Target language cannot be 'auto'"));
            }
            Ok(lang)
        }
    }

    /// 远程提供商 API 密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "DOCTRANS_API_KEY";
        const DESCRIPTION: &'static str = "API key for remote chat providers";

        fn parse(value: &str) -> EnvResult<String> {
            let key = value.trim();
            if key.is_empty() {
                return Err(error(Self::NAME, "API key cannot be empty"));
            }
            Ok(key.to_string())
        }
    }

    /// 远程提供商 API 地址
    pub struct ApiBaseUrl;
    impl EnvVar<String> for ApiBaseUrl {
        const NAME: &'static str = "DOCTRANS_API_BASE_URL";
        const DESCRIPTION: &'static str = "Override base URL of the chat completions API";

        fn parse(value: &str) -> EnvResult<String> {
            parse_http_url(value, Self::NAME)
        }
    }

    /// 本地模型推理服务地址
    pub struct LocalModelEndpoint;
    impl EnvVar<String> for LocalModelEndpoint {
        const NAME: &'static str = "DOCTRANS_LOCAL_MODEL_ENDPOINT";
        const DESCRIPTION: &'static str = "Endpoint of the local seq2seq inference server";

        fn parse(value: &str) -> EnvResult<String> {
            parse_http_url(value, Self::NAME)
        }
    }

    /// 最大并发工作数
    pub struct MaxWorkers;
    impl EnvVar<usize> for MaxWorkers {
        const NAME: &'static str = "DOCTRANS_MAX_WORKERS";
        const DESCRIPTION: &'static str = "Maximum concurrent provider calls (1 = sequential)";

        fn default_value() -> Option<usize> {
            Some(1)
        }

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 64)
        }
    }

    /// 批次大小
    pub struct BatchSize;
    impl EnvVar<usize> for BatchSize {
        const NAME: &'static str = "DOCTRANS_BATCH_SIZE";
        const DESCRIPTION: &'static str = "Maximum texts per provider batch";

        fn default_value() -> Option<usize> {
            Some(10)
        }

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1, 100)
        }
    }

    /// 请求间隔
    pub struct RequestDelay;
    impl EnvVar<Duration> for RequestDelay {
        const NAME: &'static str = "DOCTRANS_DELAY_MS";
        const DESCRIPTION: &'static str = "Delay between consecutive provider calls in milliseconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let millis: u64 = value
                .trim()
                .parse()
                .map_err(|_| error(Self::NAME, "Must be a valid number of milliseconds"))?;
            if millis > 60_000 {
                return Err(error(Self::NAME, "Delay too long (max 60000 ms)"));
            }
            Ok(Duration::from_millis(millis))
        }
    }

    /// 单次请求超时
    pub struct RequestTimeout;
    impl EnvVar<Duration> for RequestTimeout {
        const NAME: &'static str = "DOCTRANS_REQUEST_TIMEOUT";
        const DESCRIPTION: &'static str = "Per-call provider timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds: u64 = value
                .trim()
                .parse()
                .map_err(|_| error(Self::NAME, "Must be a valid number of seconds"))?;
            if seconds == 0 {
                return Err(error(Self::NAME, "Timeout must be greater than 0"));
            }
            if seconds > 600 {
                return Err(error(Self::NAME, "Timeout too long (max 600 seconds)"));
            }
            Ok(Duration::from_secs(seconds))
        }
    }

    /// 翻译缓存开关
    pub struct CacheEnabled;
    impl EnvVar<bool> for CacheEnabled {
        const NAME: &'static str = "DOCTRANS_CACHE_ENABLED";
        const DESCRIPTION: &'static str = "Enable the in-process translation cache";

        fn default_value() -> Option<bool> {
            Some(true)
        }

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// Web服务器相关环境变量
pub mod web {
    use super::*;

    /// 绑定地址
    pub struct BindAddress;
    impl EnvVar<String> for BindAddress {
        const NAME: &'static str = "DOCTRANS_WEB_BIND_ADDRESS";
        const DESCRIPTION: &'static str = "Web server bind address";

        fn default_value() -> Option<String> {
            Some("127.0.0.1".to_string())
        }

        fn parse(value: &str) -> EnvResult<String> {
            let addr = value.trim();
            if addr.is_empty() {
                return Err(error(Self::NAME, "Address cannot be empty"));
            }
            Ok(addr.to_string())
        }
    }

    /// 端口
    pub struct Port;
    impl EnvVar<u16> for Port {
        const NAME: &'static str = "DOCTRANS_WEB_PORT";
        const DESCRIPTION: &'static str = "Web server port";

        fn default_value() -> Option<u16> {
            Some(7080)
        }

        fn parse(value: &str) -> EnvResult<u16> {
            let port: u16 = value
                .trim()
                .parse()
                .map_err(|_| error(Self::NAME, "Must be a valid port number (1-65535)"))?;
            if port == 0 {
                return Err(error(Self::NAME, "Port cannot be 0"));
            }
            Ok(port)
        }
    }

    /// 已结束任务及其文件的保留时长
    pub struct TaskRetention;
    impl EnvVar<Duration> for TaskRetention {
        const NAME: &'static str = "DOCTRANS_TASK_RETENTION_SECS";
        const DESCRIPTION: &'static str = "Seconds to keep finished tasks and their files";

        fn default_value() -> Option<Duration> {
            Some(Duration::from_secs(86400))
        }

        fn parse(value: &str) -> EnvResult<Duration> {
            let secs: u64 = value
                .trim()
                .parse()
                .map_err(|_| error(Self::NAME, "Must be a valid number of seconds"))?;
            if secs < 60 {
                return Err(error(Self::NAME, "Retention must be at least 60 seconds"));
            }
            Ok(Duration::from_secs(secs))
        }
    }
}

fn parse_bool(value: &str, name: &str) -> EnvResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(error(name, format!("Invalid boolean '{}'", value))),
    }
}

fn parse_positive_usize(value: &str, name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let number: usize = value
        .trim()
        .parse()
        .map_err(|_| error(name, "Must be a valid positive integer"))?;
    if number < min || number > max {
        return Err(error(name, format!("Value must be between {} and {}", min, max)));
    }
    Ok(number)
}

fn parse_lang(value: &str, name: &str) -> EnvResult<String> {
    let lang = value.trim();
    let valid = !lang.is_empty()
        && lang.len() <= 10
        && lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(error(name, format!("Invalid language code '{}'", value)));
    }
    Ok(lang.to_string())
}

fn parse_http_url(value: &str, name: &str) -> EnvResult<String> {
    let url = value.trim();
    match url::Url::parse(url) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
            Ok(url.trim_end_matches('/').to_string())
        }
        _ => Err(error(name, "URL must start with http:// or https://")),
    }
}

/// 生成环境变量说明文档
pub fn generate_env_docs() -> String {
    let entries: [(&str, &str); 15] = [
        (core::LogLevel::NAME, core::LogLevel::DESCRIPTION),
        (core::StorageDir::NAME, core::StorageDir::DESCRIPTION),
        (translation::Provider::NAME, translation::Provider::DESCRIPTION),
        (translation::SourceLang::NAME, translation::SourceLang::DESCRIPTION),
        (translation::TargetLang::NAME, translation::TargetLang::DESCRIPTION),
        (translation::ApiKey::NAME, translation::ApiKey::DESCRIPTION),
        (translation::ApiBaseUrl::NAME, translation::ApiBaseUrl::DESCRIPTION),
        (translation::LocalModelEndpoint::NAME, translation::LocalModelEndpoint::DESCRIPTION),
        (translation::MaxWorkers::NAME, translation::MaxWorkers::DESCRIPTION),
        (translation::BatchSize::NAME, translation::BatchSize::DESCRIPTION),
        (translation::RequestDelay::NAME, translation::RequestDelay::DESCRIPTION),
        (translation::RequestTimeout::NAME, translation::RequestTimeout::DESCRIPTION),
        (translation::CacheEnabled::NAME, translation::CacheEnabled::DESCRIPTION),
        (web::Port::NAME, web::Port::DESCRIPTION),
        (web::TaskRetention::NAME, web::TaskRetention::DESCRIPTION),
    ];

    let mut docs = String::from("# Environment Variables\n\n");
    for (name, description) in entries {
        docs.push_str(&format!("- `{}`: {}\n", name, description));
    }
    docs
}
