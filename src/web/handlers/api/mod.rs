//! API 处理器

pub mod files;
pub mod translation;

pub use files::*;
pub use translation::*;
