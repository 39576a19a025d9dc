//! 文件下载处理器

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::translation::{OutputFormat, TranslationError};
use crate::web::types::{ApiError, ApiResult, AppState};

/// 按扩展名推断 MIME 类型
pub fn content_type_for(filename: &str) -> &'static str {
    filename
        .rsplit_once('.')
        .and_then(|(_, ext)| ext.parse::<OutputFormat>().ok())
        .map_or("application/octet-stream", OutputFormat::mime_type)
}

/// RFC 5987 形式的附件头
pub fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename*=UTF-8''{}",
        utf8_percent_encode(filename, NON_ALPHANUMERIC)
    )
}

/// 下载生成的文件
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(file_ref): Path<String>,
) -> ApiResult<Response> {
    let storage = state.service.storage();
    let filename = storage
        .file_name(&file_ref)
        .ok_or_else(|| ApiError(TranslationError::TaskNotFound(format!("文件 {}", file_ref))))?;
    let bytes = storage.read(&file_ref)?;

    let disposition = HeaderValue::from_str(&content_disposition(&filename))
        .map_err(|e| ApiError(TranslationError::InternalError(format!("响应头无效: {}", e))))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type_for(&filename))),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_lookup() {
        assert_eq!(content_type_for("a_translated.txt"), OutputFormat::Text.mime_type());
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_content_disposition_is_ascii() {
        let header = content_disposition("报告 1.docx");
        assert!(header.is_ascii());
        assert!(header.ends_with("1%2Edocx"));
    }
}
