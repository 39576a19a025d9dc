//! 翻译任务 API 处理器
//!
//! 上传使用 multipart 表单：`file` 字段为文档，其余字段为可选的任务选项
//! （`provider`、`source_lang`、`target_lang`、`output_format`、`layout`、
//! `api_key`、`generate_report`），未提供的选项取服务端默认配置。

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};

use crate::translation::core::languages::supported_languages;
use crate::translation::{
    supported_providers, Layout, ProviderKind, OutputFormat, PipelineConfig, Task, TranslationError,
    TranslationResult,
};
use crate::web::types::{
    ApiError, ApiResult, AppState, CancelTaskResponse, ProvidersResponse, StartTaskResponse,
    TaskOptions,
};

/// 把表单选项叠加到默认配置上
pub fn apply_options(base: &PipelineConfig, options: TaskOptions) -> TranslationResult<PipelineConfig> {
    let mut config = base.clone();
    if let Some(provider) = options.provider {
        config.provider = provider;
    }
    if let Some(source) = options.source_lang {
        config.source_language = source;
    }
    if let Some(target) = options.target_lang {
        config.target_language = target;
    }
    if let Some(formats) = options.output_format {
        config.output_formats = OutputFormat::parse_list(&formats)?;
    }
    if let Some(layout) = options.layout {
        config.layout = layout.parse::<Layout>()?;
    }
    if let Some(key) = options.api_key.filter(|key| !key.trim().is_empty()) {
        config.api_key = Some(key);
    }
    if let Some(report) = options.generate_report {
        config.generate_report = report;
    }
    Ok(config)
}

fn multipart_error(e: impl std::fmt::Display) -> ApiError {
    ApiError(TranslationError::InvalidInput(format!("表单读取失败: {}", e)))
}

/// 上传文档并启动翻译任务
pub async fn start_task(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<StartTaskResponse>)> {
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut options = TaskOptions::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let filename = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| ApiError(TranslationError::InvalidInput("上传文件缺少文件名".to_string())))?;
            let bytes = field.bytes().await.map_err(multipart_error)?;
            upload = Some((filename, bytes.to_vec()));
            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "provider" => options.provider = Some(value),
            "source_lang" => options.source_lang = Some(value),
            "target_lang" => options.target_lang = Some(value),
            "output_format" => options.output_format = Some(value),
            "layout" => options.layout = Some(value),
            "api_key" => options.api_key = Some(value),
            "generate_report" => options.generate_report = Some(matches!(value.trim(), "true" | "1" | "on")),
            other => tracing::debug!("忽略未知表单字段: {}", other),
        }
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError(TranslationError::InvalidInput("缺少 file 字段".to_string())))?;
    let config = apply_options(&state.default_config, options)?;

    tracing::info!("收到翻译请求: {} ({} 字节, 提供商 {})", filename, bytes.len(), config.provider);
    let task_id = state.service.submit(&bytes, &filename, config)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(StartTaskResponse {
            status_url: format!("/api/translation/tasks/{}", task_id),
            task_id,
        }),
    ))
}

/// 查询任务进度
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Task>> {
    Ok(Json(state.service.get_progress(&task_id)?))
}

/// 取消任务
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<CancelTaskResponse>> {
    let cancelled = state.service.cancel(&task_id)?;
    Ok(Json(CancelTaskResponse { task_id, cancelled }))
}

/// 列出支持的翻译提供商
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<ProvidersResponse> {
    Json(providers_response(&state.default_config.provider))
}

fn providers_response(default_provider: &str) -> ProvidersResponse {
    let providers: Vec<String> = supported_providers().into_iter().map(str::to_string).collect();
    let languages = providers
        .iter()
        .filter_map(|id| ProviderKind::from_id(id).ok().map(|kind| (id.clone(), kind)))
        .map(|(id, kind)| {
            let codes = supported_languages(kind).into_iter().map(str::to_string).collect();
            (id, codes)
        })
        .collect();

    ProvidersResponse {
        providers,
        default_provider: default_provider.to_string(),
        languages,
    }
}
