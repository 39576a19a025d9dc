//! 文档翻译流水线
//!
//! 采用清晰的模块化架构：
//! - **parsers**: 各输入格式的解析器，输出有序的文本片段
//! - **pipeline**: 分块、批次调度与任务进度
//! - **core**: 翻译器接口、提供商实现、重试策略与流水线服务
//! - **rebuild**: 译文回填与多格式输出
//! - **storage**: 文件存储与翻译缓存
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use doc_translator::translation::{MemoryStorage, PipelineConfig, PipelineService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = PipelineService::new(Arc::new(MemoryStorage::new()))?;
//! let config = PipelineConfig::for_provider("nllb", "zh-CN");
//! let task_id = service.submit(b"Hello world.", "hello.txt", config)?;
//!
//! let task = service.get_progress(&task_id)?;
//! println!("{}: {:.0}%", task.current_step, task.progress_percent);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod model;
pub mod parsers;
pub mod pipeline;
pub mod rebuild;
pub mod storage;

pub use config::{load_pipeline_config, ConfigManager, FailurePolicy, PipelineConfig};
pub use core::{create_translator, supported_providers, PipelineService, ProviderKind, Translator};
pub use error::{TranslationError, TranslationResult};
pub use model::{
    Chunk, DocumentFormat, Layout, OutputFile, OutputFormat, ProcessingResult, Task, TaskStatus,
    TextSegment, Translation,
};
pub use parsers::{DocumentParser, ParserRegistry};
pub use pipeline::{BatchOrchestrator, Chunker, ProgressTracker};
pub use rebuild::DocumentRebuilder;
pub use storage::{FileStorage, FsStorage, MemoryStorage, TranslationCache};
