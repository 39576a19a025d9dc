//! 翻译流水线模块
//!
//! 分块、批次调度与进度跟踪。单个任务按 解析 → 分块 → 翻译 → 重建
//! 的顺序执行，只有翻译阶段可以在有限的工作者之间并发。

pub mod chunker;
pub mod orchestrator;
pub mod progress;

pub use chunker::{validate_chunks, Chunker, ChunkerConfig};
pub use orchestrator::{BatchOrchestrator, OrchestratorConfig};
pub use progress::ProgressTracker;
