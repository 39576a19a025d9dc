//! 文档解析模块
//!
//! 按格式提取有序的文本片段及其位置、样式信息。
//!
//! ## 核心功能
//!
//! - **格式注册表**: 格式标签到解析器构造函数的显式映射，启动时校验完整性
//! - **容错提取**: 单个形状或段落无法读取时记录警告并跳过，不中断整个文档
//! - **空文档**: 没有可提取文本的文档返回空片段列表，而不是错误
//!
//! 结构化格式（PDF、PPTX、DOCX、HTML）的片段文本以换行结尾；
//! 纯文本与 Markdown 的片段是原文的精确切片，拼接后与输入完全一致。

pub mod docx;
pub mod html;
pub mod pdf;
pub mod pptx;
pub mod text;
pub(crate) mod xml;

use std::collections::HashMap;

use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::model::{DocumentFormat, Position, TextSegment, TextStyle};

pub use docx::DocxParser;
pub use html::HtmlParser;
pub use pdf::PdfParser;
pub use pptx::PptxParser;
pub use text::{MarkdownParser, PlainTextParser};

/// 解析结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub segments: Vec<TextSegment>,
    pub warnings: Vec<String>,
}

impl ParsedDocument {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_chars(&self) -> usize {
        self.segments.iter().map(TextSegment::char_count).sum()
    }
}

/// 文档解析器
pub trait DocumentParser: Send + Sync {
    fn format(&self) -> DocumentFormat;

    fn parse(&self, bytes: &[u8]) -> TranslationResult<ParsedDocument>;
}

/// 解析器构造函数
pub type ParserConstructor = fn() -> Box<dyn DocumentParser>;

/// 格式注册表
#[derive(Clone)]
pub struct ParserRegistry {
    constructors: HashMap<DocumentFormat, ParserConstructor>,
}

impl ParserRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// 注册全部内置解析器并校验
    pub fn with_defaults() -> TranslationResult<Self> {
        let mut registry = Self::empty();
        registry.register(DocumentFormat::Pdf, || Box::new(PdfParser));
        registry.register(DocumentFormat::Pptx, || Box::new(PptxParser));
        registry.register(DocumentFormat::Docx, || Box::new(DocxParser));
        registry.register(DocumentFormat::Html, || Box::new(HtmlParser));
        registry.register(DocumentFormat::Text, || Box::new(PlainTextParser));
        registry.register(DocumentFormat::Markdown, || Box::new(MarkdownParser));
        registry.validate()?;
        Ok(registry)
    }

    pub fn register(&mut self, format: DocumentFormat, constructor: ParserConstructor) {
        self.constructors.insert(format, constructor);
    }

    /// 确认每种格式都有解析器，且解析器声明的格式与注册键一致
    pub fn validate(&self) -> TranslationResult<()> {
        for format in DocumentFormat::ALL {
            let constructor = self.constructors.get(&format).ok_or_else(|| {
                TranslationError::ConfigError(format!("格式 {} 没有注册解析器", format))
            })?;
            let declared = constructor().format();
            if declared != format {
                return Err(TranslationError::ConfigError(format!(
                    "格式 {} 注册的解析器实际处理 {}",
                    format, declared
                )));
            }
        }
        Ok(())
    }

    pub fn supports(&self, format: DocumentFormat) -> bool {
        self.constructors.contains_key(&format)
    }

    pub fn parser_for(&self, format: DocumentFormat) -> TranslationResult<Box<dyn DocumentParser>> {
        self.constructors
            .get(&format)
            .map(|constructor| constructor())
            .ok_or_else(|| TranslationError::UnsupportedFormat(format!("不支持的输入格式: {}", format)))
    }

    /// 解析文档
    pub fn parse(&self, format: DocumentFormat, bytes: &[u8]) -> TranslationResult<ParsedDocument> {
        tracing::info!("开始解析 {} 文档 ({} 字节)", format, bytes.len());
        let parsed = self.parser_for(format)?.parse(bytes)?;
        tracing::info!(
            "解析完成: {} 个片段, {} 条警告",
            parsed.segments.len(),
            parsed.warnings.len()
        );
        Ok(parsed)
    }
}

/// 按阅读顺序收集片段，自动分配编号
#[derive(Debug, Default)]
pub(crate) struct SegmentCollector {
    segments: Vec<TextSegment>,
    warnings: Vec<String>,
}

impl SegmentCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 原样加入片段，空白文本被忽略
    pub fn push_raw(
        &mut self,
        origin_index: usize,
        sub_index: usize,
        text: String,
        position: Option<Position>,
        style: Option<TextStyle>,
    ) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let id = self.segments.len();
        self.segments.push(
            TextSegment::new(id, origin_index, sub_index, text)
                .with_position(position)
                .with_style(style),
        );
        true
    }

    /// 加入结构化格式的片段，去除首尾空白并以换行结尾
    pub fn push_block(
        &mut self,
        origin_index: usize,
        sub_index: usize,
        text: &str,
        position: Option<Position>,
        style: Option<TextStyle>,
    ) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.push_raw(origin_index, sub_index, format!("{}\n", trimmed), position, style)
    }

    /// 追加到最后一个片段末尾
    pub fn append_to_last(&mut self, text: &str) -> bool {
        match self.segments.last_mut() {
            Some(segment) => {
                segment.text.push_str(text);
                true
            }
            None => false,
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn finish(self) -> ParsedDocument {
        ParsedDocument {
            segments: self.segments,
            warnings: self.warnings,
        }
    }
}
