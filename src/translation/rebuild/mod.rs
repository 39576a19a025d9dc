//! 文档重建与输出编码
//!
//! ## 核心功能
//!
//! - **译文回填**: 按分块到片段的映射，把每个分块的译文拆回其覆盖的片段
//! - **排版方式**: 并排对照、逐段对照、仅译文
//! - **多格式输出**: 一次重建可并行生成多个输出文件，不会再次调用翻译器
//!
//! 拆分策略：译文与原文相同时按区间长度精确切分；译文的段落数与区间数
//! 一致时按段落切分；否则按原文字符比例切分并对齐到空白处。

pub mod docx;
pub mod pdf;
pub mod pptx;
pub mod report;
pub mod text;

use std::collections::HashMap;

use rayon::prelude::*;

use crate::translation::config::PipelineConfig;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::model::{
    Chunk, DocumentFormat, Layout, OutputFormat, SegmentId, TextSegment, Translation,
};

pub use report::{BatchEntry, BatchOutcome, BatchReport, ReportData, ReportGenerator};

/// 已回填译文的片段
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSegment {
    pub segment: TextSegment,
    /// 拆分得到的原始译文（可能带有首尾空白）
    pub translated: String,
    pub succeeded: bool,
}

impl AlignedSegment {
    /// 原文正文
    pub fn original(&self) -> &str {
        self.segment.content()
    }

    /// 译文正文
    pub fn translation(&self) -> &str {
        self.translated.trim()
    }

    /// 套用原文首尾空白的译文，流式文本输出使用
    pub fn translation_in_place(&self) -> String {
        let source = &self.segment.text;
        let leading = &source[..source.len() - source.trim_start().len()];
        let trailing = &source[source.trim_end().len()..];
        format!("{}{}{}", leading, self.translation(), trailing)
    }
}

/// 按 `origin_index` 分组（页、幻灯片或段落），保持顺序
pub(crate) fn group_by_origin(aligned: &[AlignedSegment]) -> Vec<&[AlignedSegment]> {
    let mut groups = Vec::new();
    let mut start = 0;
    for index in 1..=aligned.len() {
        if index == aligned.len()
            || aligned[index].segment.origin_index != aligned[start].segment.origin_index
        {
            if start < index {
                groups.push(&aligned[start..index]);
            }
            start = index;
        }
    }
    groups
}

/// 把段落级文本切成若干“段落 + 其后的换行”片段
fn split_paragraph_pieces(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut seen_content = false;
    let mut in_newlines = false;

    for (offset, c) in text.char_indices() {
        if c == '\n' {
            in_newlines = seen_content;
        } else if !c.is_whitespace() {
            if in_newlines {
                pieces.push(&text[start..offset]);
                start = offset;
                in_newlines = false;
            }
            seen_content = true;
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// 按字符比例切分，切点对齐到其后的第一个空白
fn split_proportionally(text: &str, weights: &[usize]) -> Vec<String> {
    let total_weight: usize = weights.iter().sum::<usize>().max(1);
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let total_chars = chars.len();

    let mut pieces = Vec::with_capacity(weights.len());
    let mut start_char = 0usize;
    let mut cumulative = 0usize;

    for (index, weight) in weights.iter().enumerate() {
        cumulative += weight;
        let end_char = if index + 1 == weights.len() {
            total_chars
        } else {
            let target = (total_chars * cumulative / total_weight).max(start_char);
            let snapped = (target..total_chars)
                .find(|&i| chars[i].1.is_whitespace())
                .unwrap_or(target);
            snapped.min(total_chars)
        };

        let byte_start = chars.get(start_char).map_or(text.len(), |(offset, _)| *offset);
        let byte_end = chars.get(end_char).map_or(text.len(), |(offset, _)| *offset);
        pieces.push(text[byte_start..byte_end].to_string());
        start_char = end_char;
    }

    pieces
}

/// 将分块译文拆回其区间，返回数量与区间数一致
pub fn resplit(chunk: &Chunk, translated: &str) -> Vec<String> {
    match chunk.spans.len() {
        0 => Vec::new(),
        1 => vec![translated.to_string()],
        count => {
            if translated == chunk.text {
                let mut pieces = Vec::with_capacity(count);
                let mut offset = 0;
                for span in &chunk.spans {
                    pieces.push(translated[offset..offset + span.len()].to_string());
                    offset += span.len();
                }
                return pieces;
            }

            let source_pieces = split_paragraph_pieces(&chunk.text);
            let translated_pieces = split_paragraph_pieces(translated);
            if source_pieces.len() == count && translated_pieces.len() == count {
                return translated_pieces.into_iter().map(str::to_string).collect();
            }

            let mut offset = 0;
            let weights: Vec<usize> = chunk
                .spans
                .iter()
                .map(|span| {
                    let piece = &chunk.text[offset..offset + span.len()];
                    offset += span.len();
                    piece.chars().count()
                })
                .collect();
            split_proportionally(translated, &weights)
        }
    }
}

/// 把同一片段的后续译文接到已有译文之后
///
/// 译文在切点两侧都没有空白时，补上原文切点处的空白。
fn join_piece(joined: &mut String, source: &str, cut: usize, piece: &str) {
    let touches = joined.ends_with(char::is_whitespace) || piece.starts_with(char::is_whitespace);
    if !touches {
        let before = source.get(..cut).unwrap_or_default();
        let after = source.get(cut..).unwrap_or_default();
        joined.push_str(&before[before.trim_end().len()..]);
        joined.push_str(&after[..after.len() - after.trim_start().len()]);
    }
    joined.push_str(piece);
}

/// 按分块映射把译文回填到片段
pub fn align(
    segments: &[TextSegment],
    chunks: &[Chunk],
    translations: &[Translation],
) -> TranslationResult<Vec<AlignedSegment>> {
    if translations.len() != chunks.len() {
        return Err(TranslationError::RebuildError(format!(
            "译文数量 {} 与分块数量 {} 不一致",
            translations.len(),
            chunks.len()
        )));
    }

    let by_chunk: HashMap<usize, &Translation> =
        translations.iter().map(|translation| (translation.chunk_id, translation)).collect();
    let positions: HashMap<SegmentId, usize> = segments
        .iter()
        .enumerate()
        .map(|(index, segment)| (segment.id, index))
        .collect();

    let mut pieces: Vec<Option<String>> = vec![None; segments.len()];
    let mut succeeded = vec![true; segments.len()];

    for chunk in chunks {
        let translation = by_chunk.get(&chunk.id).ok_or_else(|| {
            TranslationError::RebuildError(format!("分块 {} 缺少译文", chunk.id))
        })?;

        let split = resplit(chunk, &translation.translated_text);
        if split.len() != chunk.spans.len() {
            return Err(TranslationError::RebuildError(format!(
                "分块 {} 译文拆分为 {} 段，期望 {} 段",
                chunk.id,
                split.len(),
                chunk.spans.len()
            )));
        }

        for (span, piece) in chunk.spans.iter().zip(split) {
            let position = *positions.get(&span.segment_id).ok_or_else(|| {
                TranslationError::RebuildError(format!("分块 {} 引用了未知片段 {}", chunk.id, span.segment_id))
            })?;
            match pieces[position].as_mut() {
                Some(joined) => join_piece(joined, &segments[position].text, span.start, &piece),
                None => pieces[position] = Some(piece),
            }
            succeeded[position] &= translation.succeeded;
        }
    }

    segments
        .iter()
        .zip(pieces)
        .zip(succeeded)
        .map(|((segment, piece), ok)| {
            let translated = piece.ok_or_else(|| {
                TranslationError::RebuildError(format!("片段 {} 没有对应的译文", segment.id))
            })?;
            Ok(AlignedSegment {
                segment: segment.clone(),
                translated,
                succeeded: ok,
            })
        })
        .collect()
}

/// 重建请求
#[derive(Debug, Clone, Copy)]
pub struct RebuildRequest<'a> {
    /// 输出文件名主干
    pub title: &'a str,
    pub segments: &'a [TextSegment],
    pub chunks: &'a [Chunk],
    pub translations: &'a [Translation],
    pub layout: Layout,
    pub formats: &'a [OutputFormat],
    pub source_format: DocumentFormat,
    /// 原始文件，原位回写格式需要
    pub source_bytes: &'a [u8],
}

/// 渲染完成的输出
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedOutput {
    pub format: OutputFormat,
    pub layout: Layout,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// 文档重建器
#[derive(Debug, Clone, Default)]
pub struct DocumentRebuilder {
    pdf_font_path: Option<String>,
}

impl From<&PipelineConfig> for DocumentRebuilder {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            pdf_font_path: config.pdf_font_path.clone(),
        }
    }
}

impl DocumentRebuilder {
    pub fn new(pdf_font_path: Option<String>) -> Self {
        Self { pdf_font_path }
    }

    /// 回填译文并渲染所有请求的格式
    pub fn rebuild(&self, request: &RebuildRequest<'_>) -> TranslationResult<Vec<RenderedOutput>> {
        let aligned = align(request.segments, request.chunks, request.translations)?;
        if aligned.len() != request.segments.len() {
            return Err(TranslationError::RebuildError(format!(
                "回填后片段数 {} 与解析片段数 {} 不一致",
                aligned.len(),
                request.segments.len()
            )));
        }

        let outputs = request
            .formats
            .par_iter()
            .map(|format| self.render(*format, &aligned, request))
            .collect::<TranslationResult<Vec<_>>>()?;

        for output in &outputs {
            tracing::info!("已生成 {} ({} 字节)", output.filename, output.bytes.len());
        }
        Ok(outputs)
    }

    fn render(
        &self,
        format: OutputFormat,
        aligned: &[AlignedSegment],
        request: &RebuildRequest<'_>,
    ) -> TranslationResult<RenderedOutput> {
        let layout = request.layout;
        let bytes = match format {
            OutputFormat::Text => text::render_text(aligned, layout).into_bytes(),
            OutputFormat::Markdown => text::render_markdown(aligned, layout).into_bytes(),
            OutputFormat::Html => text::render_html(request.title, aligned, layout).into_bytes(),
            OutputFormat::Docx => docx::render_docx(request.title, aligned, layout)?,
            OutputFormat::Pdf => pdf::render_pdf(request.title, aligned, layout, self.pdf_font_path.as_deref())?,
            OutputFormat::Pptx => {
                if request.source_format != DocumentFormat::Pptx {
                    return Err(TranslationError::RebuildError(format!(
                        "PPTX 输出只支持 PPTX 输入，当前输入为 {}",
                        request.source_format
                    )));
                }
                pptx::rewrite_pptx(request.source_bytes, aligned, layout)?
            }
        };

        Ok(RenderedOutput {
            format,
            layout,
            filename: format!("{}_translated.{}", request.title, format.extension()),
            bytes,
        })
    }
}
