//! Web 服务器模块
//!
//! 为翻译流水线提供 HTTP 接口：上传并启动任务、轮询进度、下载输出文件。
//! 处理器只做参数转换，全部业务逻辑在 [`PipelineService`] 中。

pub mod config;
pub mod handlers;
pub mod routes;
pub mod types;

pub use config::*;
pub use routes::*;
pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::DefaultBodyLimit, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};

use crate::translation::{
    load_pipeline_config, FsStorage, PipelineConfig, PipelineService, TranslationError,
    TranslationResult,
};

/// 过期任务清理的检查间隔上限
const PRUNE_INTERVAL: Duration = Duration::from_secs(600);

/// Web 服务器
pub struct WebServer {
    config: WebConfig,
    pipeline_config: PipelineConfig,
}

impl WebServer {
    /// 创建新的 Web 服务器
    pub fn new(config: WebConfig, pipeline_config: PipelineConfig) -> Self {
        Self {
            config,
            pipeline_config,
        }
    }

    /// 使用环境变量与配置文件创建
    pub fn from_env() -> TranslationResult<Self> {
        let config = WebConfig::from_env().map_err(|e| TranslationError::ConfigError(e.to_string()))?;
        Ok(Self::new(config, load_pipeline_config()))
    }

    /// 启动 Web 服务器
    pub async fn start(&self) -> TranslationResult<()> {
        let storage = FsStorage::new(&self.config.storage_dir)?;
        let service = PipelineService::new(Arc::new(storage))?;
        let state = Arc::new(AppState {
            service: service.clone(),
            default_config: self.pipeline_config.clone(),
        });

        let retention = self.config.task_retention;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PRUNE_INTERVAL.min(retention).max(Duration::from_secs(1)));
            loop {
                interval.tick().await;
                service.prune_finished(retention);
            }
        });

        let app = create_router(state, &self.config);
        let address = self.config.socket_addr();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| TranslationError::ConfigError(format!("无法绑定地址 {}: {}", address, e)))?;

        tracing::info!("Web 服务已启动: http://{}", address);
        tracing::info!("文件存储目录: {}", self.config.storage_dir);

        axum::serve(listener, app)
            .await
            .map_err(|e| TranslationError::InternalError(format!("服务器错误: {}", e)))
    }
}

/// 创建路由器
pub fn create_router(state: Arc<AppState>, config: &WebConfig) -> Router {
    create_routes().with_state(state).layer(
        ServiceBuilder::new()
            .layer(CorsLayer::permissive())
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.max_upload_bytes)),
    )
}
