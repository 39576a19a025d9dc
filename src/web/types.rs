//! Web 模块的数据类型定义

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::translation::{PipelineConfig, PipelineService, TranslationError};

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub service: PipelineService,
    /// 上传请求未指定的选项取自这里
    pub default_config: PipelineConfig,
}

/// 启动任务时可覆盖的选项
#[derive(Debug, Default, Deserialize)]
pub struct TaskOptions {
    pub provider: Option<String>,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub output_format: Option<String>,
    pub layout: Option<String>,
    pub api_key: Option<String>,
    pub generate_report: Option<bool>,
}

/// 任务创建响应
#[derive(Debug, Serialize, Deserialize)]
pub struct StartTaskResponse {
    pub task_id: String,
    pub status_url: String,
}

/// 取消任务响应
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelTaskResponse {
    pub task_id: String,
    pub cancelled: bool,
}

/// 提供商列表响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ProvidersResponse {
    pub providers: Vec<String>,
    pub default_provider: String,
    /// 提供商标识 → 支持的语言代码
    pub languages: BTreeMap<String, Vec<String>>,
}

/// 错误响应体
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub category: String,
}

/// 接口错误，按错误类别映射 HTTP 状态码
#[derive(Debug)]
pub struct ApiError(pub TranslationError);

impl From<TranslationError> for ApiError {
    fn from(error: TranslationError) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            TranslationError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            TranslationError::DocumentBusy(_) => StatusCode::CONFLICT,
            TranslationError::ConfigError(_)
            | TranslationError::InvalidInput(_)
            | TranslationError::UnsupportedFormat(_)
            | TranslationError::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self.0);
        } else {
            tracing::warn!("请求被拒绝: {}", self.0);
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
            category: format!("{:?}", self.0.category()),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
