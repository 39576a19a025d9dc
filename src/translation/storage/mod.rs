//! 存储模块
//!
//! 文件存储接口与翻译缓存

pub mod cache;
pub mod files;

pub use cache::{CacheStats, TranslationCache};
pub use files::{FileStorage, FsStorage, MemoryStorage};
