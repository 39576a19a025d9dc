//! Web 路由定义

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::web::{handlers::*, types::AppState};

/// 创建 API 路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/translation/tasks", post(start_task))
        .route("/api/translation/tasks/:task_id", get(get_task))
        .route("/api/translation/tasks/:task_id/cancel", post(cancel_task))
        .route("/api/translation/files/:file_ref", get(download_file))
        .route("/api/translation/providers", get(list_providers))
}
