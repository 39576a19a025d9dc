//! # Doc Translator Library
//!
//! 文档翻译流水线：解析 PDF/PPTX/DOCX/HTML/文本文档，按句子边界分块，
//! 调用本地或远程翻译服务，再按所选排版重建输出文档。
//!
//! ## 模块组织
//!
//! - `translation` - 流水线本体（解析、分块、翻译、重建、进度）
//! - `env` - 类型化的环境变量
//! - `web` - HTTP 接口（可选）

pub mod env;
pub mod translation;
#[cfg(feature = "web")]
pub mod web;

pub use translation::{PipelineConfig, PipelineService, TranslationError, TranslationResult};
