//! PDF 解析器
//!
//! 使用 `pdf-extract` 提取文本层，按换页符分页、按空行分段，
//! 段内换行合并为空格。不做 OCR，纯图片页面不产生片段。

use super::{DocumentParser, ParsedDocument, SegmentCollector};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::model::DocumentFormat;

pub struct PdfParser;

/// 把提取出的整页文本拆成段落
pub(crate) fn split_paragraphs(page: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in page.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs
}

impl DocumentParser for PdfParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn parse(&self, bytes: &[u8]) -> TranslationResult<ParsedDocument> {
        if !bytes.starts_with(b"%PDF") {
            return Err(TranslationError::ParseError("文件不是有效的 PDF".to_string()));
        }

        // pdf-extract 遇到部分损坏文件会 panic
        let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
            .map_err(|_| TranslationError::ParseError("PDF 文本提取异常中止".to_string()))?
            .map_err(|e| TranslationError::ParseError(format!("PDF 文本提取失败: {}", e)))?;

        let mut collector = SegmentCollector::new();
        for (page_index, page) in extracted.split('\u{c}').enumerate() {
            for (paragraph_index, paragraph) in split_paragraphs(page).iter().enumerate() {
                collector.push_block(page_index + 1, paragraph_index, paragraph, None, None);
            }
        }

        let parsed = collector.finish();
        if parsed.is_empty() {
            tracing::warn!("PDF 中没有可提取的文本层");
        }
        Ok(parsed)
    }
}
