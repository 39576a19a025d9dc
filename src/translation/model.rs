//! 流水线数据模型
//!
//! 定义文本片段、分块、翻译记录、任务与输出文件等核心实体。
//!
//! ## 不变量
//!
//! - `TextSegment::text` 非空，片段按 `(origin_index, sub_index)` 排序即为阅读顺序
//! - 每个 `Chunk` 的 `spans` 精确指向片段文本中的字节区间，所有分块的区间
//!   按顺序首尾相接，恰好覆盖全部片段文本一次
//! - `Translation` 每个分块每个任务只创建一次，写入后不可变

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::translation::error::TranslationError;

/// 片段标识
pub type SegmentId = usize;

/// 片段在原文档中的位置（单位由格式决定，PPTX 为 EMU，PDF 为点）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// 片段样式，所有字段均可缺省
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_name: Option<String>,
    pub font_size: Option<f32>,
    pub bold: bool,
    pub italic: bool,
    pub color: Option<String>,
}

/// 从文档中提取的单个文本片段
///
/// `text` 保留片段后的分隔空白（例如段落后的换行），
/// 这样所有片段按顺序拼接即可得到完整文本流。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSegment {
    pub id: SegmentId,
    /// 页码、幻灯片序号或段落序号
    pub origin_index: usize,
    /// 形状、段落或文本块序号
    pub sub_index: usize,
    pub text: String,
    pub position: Option<Position>,
    pub style: Option<TextStyle>,
}

impl TextSegment {
    pub fn new(id: SegmentId, origin_index: usize, sub_index: usize, text: impl Into<String>) -> Self {
        Self {
            id,
            origin_index,
            sub_index,
            text: text.into(),
            position: None,
            style: None,
        }
    }

    pub fn with_position(mut self, position: Option<Position>) -> Self {
        self.position = position;
        self
    }

    pub fn with_style(mut self, style: Option<TextStyle>) -> Self {
        self.style = style;
        self
    }

    /// 去除首尾空白后的正文
    pub fn content(&self) -> &str {
        self.text.trim()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// 分块覆盖的片段区间（片段文本内的字节偏移，左闭右开）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSpan {
    pub segment_id: SegmentId,
    pub start: usize,
    pub end: usize,
}

impl SegmentSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// 翻译单元
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: usize,
    /// 按顺序排列的片段区间
    pub spans: Vec<SegmentSpan>,
    /// 核心文本（不含重叠前缀）
    pub text: String,
    /// 上一分块末尾的上下文，不计入字符数，重建时不写回
    pub overlap: String,
    /// 核心文本字符数
    pub char_count: usize,
}

impl Chunk {
    /// 分块涉及的片段（去重且保持顺序）
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        let mut ids: Vec<SegmentId> = Vec::with_capacity(self.spans.len());
        for span in &self.spans {
            if ids.last() != Some(&span.segment_id) {
                ids.push(span.segment_id);
            }
        }
        ids
    }
}

/// 单个分块的翻译记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub chunk_id: usize,
    pub source_text: String,
    pub translated_text: String,
    pub provider: String,
    pub succeeded: bool,
    pub attempts: u32,
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Parsing,
    Chunking,
    Translating,
    Rebuilding,
    Completed,
    Failed,
}

impl TaskStatus {
    /// 状态在生命周期中的次序，终态共享最高次序
    pub fn rank(self) -> u8 {
        match self {
            TaskStatus::Queued => 0,
            TaskStatus::Parsing => 1,
            TaskStatus::Chunking => 2,
            TaskStatus::Translating => 3,
            TaskStatus::Rebuilding => 4,
            TaskStatus::Completed | TaskStatus::Failed => 5,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// 是否允许迁移到 `next`
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == TaskStatus::Failed {
            return true;
        }
        next.rank() > self.rank()
    }

    /// 面向用户的阶段描述
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Queued => "排队中",
            TaskStatus::Parsing => "解析文档",
            TaskStatus::Chunking => "文本分块",
            TaskStatus::Translating => "翻译中",
            TaskStatus::Rebuilding => "生成输出文档",
            TaskStatus::Completed => "已完成",
            TaskStatus::Failed => "失败",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 翻译任务记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub document_id: String,
    pub status: TaskStatus,
    pub progress_percent: f64,
    pub total_units: usize,
    pub completed_units: usize,
    pub current_step: String,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub outputs: Vec<OutputFile>,
    pub result: Option<ProcessingResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: impl Into<String>, document_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            document_id: document_id.into(),
            status: TaskStatus::Queued,
            progress_percent: 0.0,
            total_units: 0,
            completed_units: 0,
            current_step: TaskStatus::Queued.label().to_string(),
            warnings: Vec::new(),
            error: None,
            outputs: Vec::new(),
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// 输入文档格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Pptx,
    Docx,
    Html,
    Text,
    Markdown,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 6] = [
        DocumentFormat::Pdf,
        DocumentFormat::Pptx,
        DocumentFormat::Docx,
        DocumentFormat::Html,
        DocumentFormat::Text,
        DocumentFormat::Markdown,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Html => "html",
            DocumentFormat::Text => "txt",
            DocumentFormat::Markdown => "md",
        }
    }

    /// 根据文件名扩展名推断格式
    pub fn from_filename(filename: &str) -> Result<Self, TranslationError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        extension.parse()
    }
}

impl FromStr for DocumentFormat {
    type Err = TranslationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "pptx" => Ok(DocumentFormat::Pptx),
            "docx" => Ok(DocumentFormat::Docx),
            "html" | "htm" => Ok(DocumentFormat::Html),
            "txt" | "text" => Ok(DocumentFormat::Text),
            "md" | "markdown" => Ok(DocumentFormat::Markdown),
            other => Err(TranslationError::UnsupportedFormat(format!(
                "无法识别的输入格式 '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// 输出文档格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Docx,
    Pdf,
    Pptx,
    #[serde(alias = "md")]
    Markdown,
    Html,
    #[serde(alias = "txt")]
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Docx => "docx",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Pptx => "pptx",
            OutputFormat::Markdown => "md",
            OutputFormat::Html => "html",
            OutputFormat::Text => "txt",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            OutputFormat::Pdf => "application/pdf",
            OutputFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            OutputFormat::Markdown => "text/markdown; charset=utf-8",
            OutputFormat::Html => "text/html; charset=utf-8",
            OutputFormat::Text => "text/plain; charset=utf-8",
        }
    }

    /// 解析输出格式列表，`both` 展开为 docx 与 pdf
    pub fn parse_list(value: &str) -> Result<Vec<OutputFormat>, TranslationError> {
        let mut formats: Vec<OutputFormat> = Vec::new();
        for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let expanded = if item.eq_ignore_ascii_case("both") {
                vec![OutputFormat::Docx, OutputFormat::Pdf]
            } else {
                vec![item.parse()?]
            };
            for format in expanded {
                if !formats.contains(&format) {
                    formats.push(format);
                }
            }
        }
        Ok(formats)
    }
}

impl FromStr for OutputFormat {
    type Err = TranslationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "docx" => Ok(OutputFormat::Docx),
            "pdf" => Ok(OutputFormat::Pdf),
            "pptx" => Ok(OutputFormat::Pptx),
            "md" | "markdown" => Ok(OutputFormat::Markdown),
            "html" | "htm" => Ok(OutputFormat::Html),
            "txt" | "text" => Ok(OutputFormat::Text),
            other => Err(TranslationError::UnsupportedFormat(format!(
                "无法识别的输出格式 '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// 原文与译文的排版方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    #[default]
    SideBySide,
    ParagraphByParagraph,
    TranslationOnly,
}

impl FromStr for Layout {
    type Err = TranslationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "side_by_side" => Ok(Layout::SideBySide),
            "paragraph_by_paragraph" => Ok(Layout::ParagraphByParagraph),
            "translation_only" => Ok(Layout::TranslationOnly),
            other => Err(TranslationError::InvalidInput(format!("未知的排版方式 '{}'", other))),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layout::SideBySide => "side_by_side",
            Layout::ParagraphByParagraph => "paragraph_by_paragraph",
            Layout::TranslationOnly => "translation_only",
        };
        f.write_str(name)
    }
}

/// 已生成的输出文件描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFile {
    pub format: OutputFormat,
    pub layout: Layout,
    pub filename: String,
    pub content_ref: String,
    pub size_bytes: usize,
}

/// 处理结果摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub processing_time_secs: f64,
    pub original_text_count: usize,
    pub translated_text_count: usize,
    pub degraded_count: usize,
    pub provider: String,
    pub timestamp: DateTime<Utc>,
}
