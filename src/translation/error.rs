//! 翻译流水线统一错误处理
//!
//! 提供结构化错误类型，区分可重试的瞬时错误与需要立即失败的永久错误

use std::fmt;

use thiserror::Error;

/// 翻译流水线错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 文档解析错误（文件损坏或无法读取）
    #[error("文档解析失败: {0}")]
    ParseError(String),

    /// 不支持的文档格式
    #[error("不支持的文档格式: {0}")]
    UnsupportedFormat(String),

    /// 翻译提供商不支持的语言
    #[error("不支持的语言: {0}")]
    UnsupportedLanguage(String),

    /// 提供商瞬时错误（超时、限流、5xx）
    #[error("翻译服务暂时不可用: {0}")]
    ProviderTransient(String),

    /// 提供商永久错误（认证失败、请求格式错误）
    #[error("翻译服务拒绝请求: {0}")]
    ProviderPermanent(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 分块映射不一致
    #[error("分块不变量被破坏: {0}")]
    ChunkingInvariantViolation(String),

    /// 文档重建错误
    #[error("文档重建失败: {0}")]
    RebuildError(String),

    /// 文件存储错误
    #[error("存储错误: {0}")]
    StorageError(String),

    /// 同一文档已有进行中的任务
    #[error("文档正在处理中: {0}")]
    DocumentBusy(String),

    /// 任务不存在
    #[error("任务不存在: {0}")]
    TaskNotFound(String),

    /// 任务被取消
    #[error("任务已取消: {0}")]
    Cancelled(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranslationError::ProviderTransient(_) | TranslationError::TimeoutError(_)
        )
    }

    /// 是否为致命错误（任务应进入 Failed 状态）
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable() && !matches!(self, TranslationError::ProviderPermanent(_))
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::ParseError(_) => ErrorSeverity::Error,
            TranslationError::UnsupportedFormat(_) => ErrorSeverity::Error,
            TranslationError::UnsupportedLanguage(_) => ErrorSeverity::Error,
            TranslationError::ProviderTransient(_) => ErrorSeverity::Warning,
            TranslationError::ProviderPermanent(_) => ErrorSeverity::Error,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::ChunkingInvariantViolation(_) => ErrorSeverity::Critical,
            TranslationError::RebuildError(_) => ErrorSeverity::Critical,
            TranslationError::StorageError(_) => ErrorSeverity::Error,
            TranslationError::DocumentBusy(_) => ErrorSeverity::Info,
            TranslationError::TaskNotFound(_) => ErrorSeverity::Info,
            TranslationError::Cancelled(_) => ErrorSeverity::Info,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::ParseError(_) | TranslationError::UnsupportedFormat(_) => {
                ErrorCategory::Parsing
            }
            TranslationError::UnsupportedLanguage(_) | TranslationError::InvalidInput(_) => {
                ErrorCategory::Input
            }
            TranslationError::ProviderTransient(_) | TranslationError::ProviderPermanent(_) => {
                ErrorCategory::Provider
            }
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::ChunkingInvariantViolation(_) => ErrorCategory::Invariant,
            TranslationError::RebuildError(_) => ErrorCategory::Rebuild,
            TranslationError::StorageError(_) => ErrorCategory::Storage,
            TranslationError::DocumentBusy(_)
            | TranslationError::TaskNotFound(_)
            | TranslationError::Cancelled(_) => ErrorCategory::Task,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        match &mut self {
            TranslationError::ConfigError(msg)
            | TranslationError::ParseError(msg)
            | TranslationError::UnsupportedFormat(msg)
            | TranslationError::UnsupportedLanguage(msg)
            | TranslationError::ProviderTransient(msg)
            | TranslationError::ProviderPermanent(msg)
            | TranslationError::TimeoutError(msg)
            | TranslationError::ChunkingInvariantViolation(msg)
            | TranslationError::RebuildError(msg)
            | TranslationError::StorageError(msg)
            | TranslationError::DocumentBusy(msg)
            | TranslationError::TaskNotFound(msg)
            | TranslationError::Cancelled(msg)
            | TranslationError::InvalidInput(msg)
            | TranslationError::SerializationError(msg)
            | TranslationError::InternalError(msg) => {
                *msg = format!("{} (上下文: {})", msg, context);
            }
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Parsing,
    Input,
    Provider,
    Timeout,
    Invariant,
    Rebuild,
    Storage,
    Task,
    Serialization,
    Internal,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::StorageError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<config::ConfigError> for TranslationError {
    fn from(error: config::ConfigError) -> Self {
        TranslationError::ConfigError(format!("配置加载错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(format!("请求超时: {}", error))
        } else if error.is_connect() || error.is_request() {
            TranslationError::ProviderTransient(format!("网络错误: {}", error))
        } else if error.is_decode() {
            TranslationError::ProviderPermanent(format!("响应解析失败: {}", error))
        } else {
            TranslationError::ProviderTransient(error.to_string())
        }
    }
}

impl From<zip::result::ZipError> for TranslationError {
    fn from(error: zip::result::ZipError) -> Self {
        TranslationError::ParseError(format!("ZIP容器错误: {}", error))
    }
}

impl From<quick_xml::Error> for TranslationError {
    fn from(error: quick_xml::Error) -> Self {
        TranslationError::ParseError(format!("XML错误: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度选择日志级别记录错误
    pub fn log_error(context: &str, error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("{}: {}", context, error),
            ErrorSeverity::Warning => tracing::warn!("{}: {}", context, error),
            ErrorSeverity::Error => tracing::error!("{}: {}", context, error),
            ErrorSeverity::Critical => tracing::error!("{} (严重): {}", context, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TranslationError::ProviderTransient("503".into()).is_retryable());
        assert!(TranslationError::TimeoutError("30s".into()).is_retryable());
        assert!(!TranslationError::ProviderPermanent("401".into()).is_retryable());
        assert!(!TranslationError::ParseError("bad".into()).is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(TranslationError::RebuildError("x".into()).is_fatal());
        assert!(TranslationError::ChunkingInvariantViolation("x".into()).is_fatal());
        assert!(!TranslationError::ProviderPermanent("401".into()).is_fatal());
        assert!(!TranslationError::ProviderTransient("429".into()).is_fatal());
    }

    #[test]
    fn test_with_context_keeps_variant() {
        let error = TranslationError::ParseError("slide1.xml".into()).with_context("pptx");
        assert!(matches!(error, TranslationError::ParseError(_)));
        assert!(error.to_string().contains("上下文: pptx"));
    }

    #[test]
    fn test_severity_and_category() {
        let error = TranslationError::ChunkingInvariantViolation("gap".into());
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert_eq!(error.category(), ErrorCategory::Invariant);
        assert_eq!(
            TranslationError::DocumentBusy("doc".into()).category(),
            ErrorCategory::Task
        );
    }
}
