//! PDF 输出
//!
//! 以 A4 版面重新排版文本，不尝试还原原文坐标。字体优先使用配置的
//! 字体文件，其次查找系统中文字体，都不可用时退回内置 Helvetica，
//! 此时无法编码的字符以 `?` 代替。

use std::io::{BufWriter, Cursor};
use std::path::Path;

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerIndex, PdfPageIndex};

use super::{group_by_origin, AlignedSegment};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::model::Layout;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;
const COLUMN_GAP: f32 = 6.0;
const TITLE_SIZE: f32 = 16.0;
const BODY_SIZE: f32 = 10.5;
const LINE_FACTOR: f32 = 1.45;
const PT_TO_MM: f32 = 0.3528;

/// 常见系统中文字体位置
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttf",
    "/usr/share/fonts/truetype/arphic/uming.ttf",
    "/usr/share/fonts/truetype/droid/DroidSansFallbackFull.ttf",
    "/usr/share/fonts/opentype/noto/NotoSansCJKsc-Regular.otf",
    "/usr/share/fonts/noto-cjk/NotoSansCJKsc-Regular.otf",
    "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\simhei.ttf",
];

/// 字体来源
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FontSource {
    /// 外部字体文件
    External(Vec<u8>),
    /// 内置 Helvetica，仅支持 Latin-1
    Builtin,
}

impl FontSource {
    /// 按配置路径、系统候选、内置字体的顺序选择
    pub(crate) fn discover(configured: Option<&str>) -> Self {
        if let Some(path) = configured {
            let expanded = shellexpand::tilde(path).to_string();
            match std::fs::read(&expanded) {
                Ok(bytes) => return FontSource::External(bytes),
                Err(e) => tracing::warn!("无法读取 PDF 字体 {}: {}，尝试系统字体", expanded, e),
            }
        }

        FONT_CANDIDATES
            .iter()
            .filter(|path| Path::new(path).is_file())
            .find_map(|path| std::fs::read(path).ok())
            .map(FontSource::External)
            .unwrap_or(FontSource::Builtin)
    }
}

/// 估算字符宽度（毫米）
fn char_width(c: char, size: f32) -> f32 {
    let em = size * PT_TO_MM;
    if c.is_ascii() {
        if c.is_ascii_uppercase() || c == 'm' || c == 'w' {
            em * 0.66
        } else {
            em * 0.5
        }
    } else if (c as u32) < 0x2E80 {
        em * 0.6
    } else {
        em
    }
}

/// 按列宽折行，优先在空白处断开
pub(crate) fn wrap_text(text: &str, width: f32, size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_width = 0.0f32;
        let mut last_space: Option<usize> = None;

        for c in paragraph.chars() {
            if c.is_whitespace() && line.is_empty() {
                continue;
            }
            let w = char_width(c, size);
            if line_width + w > width && !line.is_empty() {
                match last_space {
                    Some(cut) if cut > 0 => {
                        let rest = line[cut..].trim_start().to_string();
                        line.truncate(cut);
                        lines.push(line.trim_end().to_string());
                        line_width = rest.chars().map(|r| char_width(r, size)).sum();
                        line = rest;
                    }
                    _ => {
                        lines.push(std::mem::take(&mut line));
                        line_width = 0.0;
                    }
                }
                last_space = None;
            }
            if c.is_whitespace() {
                last_space = Some(line.len());
            }
            line.push(c);
            line_width += w;
        }
        lines.push(line);
    }
    lines
}

/// Latin-1 之外的字符替换为 `?`
fn latin1(text: &str) -> String {
    text.chars().map(|c| if (c as u32) < 0x100 { c } else { '?' }).collect()
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    builtin: bool,
    page: PdfPageIndex,
    layer: PdfLayerIndex,
    page_count: usize,
    cursor_y: f32,
}

impl PdfWriter {
    fn new(title: &str, source: FontSource) -> TranslationResult<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let (font, builtin) = match source {
            FontSource::External(bytes) => match doc.add_external_font(Cursor::new(bytes)) {
                Ok(font) => (font, false),
                Err(e) => {
                    tracing::warn!("外部字体加载失败: {}，改用内置字体", e);
                    (Self::builtin_font(&doc)?, true)
                }
            },
            FontSource::Builtin => (Self::builtin_font(&doc)?, true),
        };

        Ok(Self {
            doc,
            font,
            builtin,
            page,
            layer,
            page_count: 1,
            cursor_y: PAGE_HEIGHT - MARGIN,
        })
    }

    fn builtin_font(doc: &PdfDocumentReference) -> TranslationResult<IndirectFontRef> {
        doc.add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| TranslationError::RebuildError(format!("PDF 字体加载失败: {}", e)))
    }

    fn line_height(size: f32) -> f32 {
        size * PT_TO_MM * LINE_FACTOR
    }

    fn new_page(&mut self) {
        self.page_count += 1;
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Layer {}", self.page_count));
        self.page = page;
        self.layer = layer;
        self.cursor_y = PAGE_HEIGHT - MARGIN;
    }

    fn ensure_space(&mut self, height: f32) {
        if self.cursor_y - height < MARGIN {
            self.new_page();
        }
    }

    fn draw_line(&self, text: &str, size: f32, x: f32, y: f32) {
        if text.is_empty() {
            return;
        }
        let text = if self.builtin { latin1(text) } else { text.to_string() };
        let layer = self.doc.get_page(self.page).get_layer(self.layer);
        layer.use_text(text, size, Mm(x), Mm(y), &self.font);
    }

    /// 单列书写一段文本
    fn write_block(&mut self, text: &str, size: f32) {
        let line_height = Self::line_height(size);
        for line in wrap_text(text, PAGE_WIDTH - 2.0 * MARGIN, size) {
            self.ensure_space(line_height);
            self.cursor_y -= line_height;
            self.draw_line(&line, size, MARGIN, self.cursor_y);
        }
    }

    /// 两列并排书写，行数取两侧较多者
    fn write_columns(&mut self, left: &str, right: &str, size: f32) {
        let column = (PAGE_WIDTH - 2.0 * MARGIN - COLUMN_GAP) / 2.0;
        let line_height = Self::line_height(size);
        let left_lines = wrap_text(left, column, size);
        let right_lines = wrap_text(right, column, size);

        for index in 0..left_lines.len().max(right_lines.len()) {
            self.ensure_space(line_height);
            self.cursor_y -= line_height;
            if let Some(line) = left_lines.get(index) {
                self.draw_line(line, size, MARGIN, self.cursor_y);
            }
            if let Some(line) = right_lines.get(index) {
                self.draw_line(line, size, MARGIN + column + COLUMN_GAP, self.cursor_y);
            }
        }
    }

    fn gap(&mut self, height: f32) {
        self.cursor_y -= height;
    }

    fn finish(self) -> TranslationResult<Vec<u8>> {
        let mut buffer = Vec::new();
        {
            let mut writer = BufWriter::new(&mut buffer);
            self.doc
                .save(&mut writer)
                .map_err(|e| TranslationError::RebuildError(format!("PDF 写入失败: {}", e)))?;
        }
        Ok(buffer)
    }
}

pub fn render_pdf(
    title: &str,
    aligned: &[AlignedSegment],
    layout: Layout,
    font_path: Option<&str>,
) -> TranslationResult<Vec<u8>> {
    render_with_font(title, aligned, layout, FontSource::discover(font_path))
}

pub(crate) fn render_with_font(
    title: &str,
    aligned: &[AlignedSegment],
    layout: Layout,
    font: FontSource,
) -> TranslationResult<Vec<u8>> {
    let mut writer = PdfWriter::new(title, font)?;
    let paragraph_gap = PdfWriter::line_height(BODY_SIZE) * 0.5;

    writer.write_block(title, TITLE_SIZE);
    writer.gap(paragraph_gap * 2.0);

    match layout {
        Layout::TranslationOnly => {
            for item in aligned {
                let size = item
                    .segment
                    .style
                    .as_ref()
                    .and_then(|style| style.font_size)
                    .map_or(BODY_SIZE, |size| size.clamp(6.0, 28.0));
                writer.write_block(item.translation(), size);
                writer.gap(paragraph_gap);
            }
        }
        Layout::SideBySide => {
            writer.write_columns("原文", "译文", BODY_SIZE);
            writer.gap(paragraph_gap);
            for item in aligned {
                writer.write_columns(item.original(), item.translation(), BODY_SIZE);
                writer.gap(paragraph_gap);
            }
        }
        Layout::ParagraphByParagraph => {
            for group in group_by_origin(aligned) {
                for item in group {
                    writer.write_block(item.original(), BODY_SIZE);
                }
                writer.gap(paragraph_gap);
                for item in group {
                    writer.write_block(item.translation(), BODY_SIZE);
                }
                writer.gap(paragraph_gap * 2.0);
            }
        }
    }

    writer.finish()
}
