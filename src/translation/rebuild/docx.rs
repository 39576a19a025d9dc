//! DOCX 输出
//!
//! 并排对照使用两列表格，逐段对照按页/段分组先原文后译文，
//! 仅译文时沿用原片段的粗体、斜体与字号。

use std::io::Cursor;

use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};

use super::{group_by_origin, AlignedSegment};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::model::{Layout, TextStyle};

const TRANSLATION_COLOR: &str = "1F4E79";
const UNTRANSLATED_COLOR: &str = "C55A11";
/// A4 版心宽度的一半（twip）
const COLUMN_WIDTH: usize = 4819;

/// 按样式构造文本段，换行拆为多行
fn styled_run(text: &str, style: Option<&TextStyle>) -> Run {
    let mut run = Run::new();
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            run = run.add_break(docx_rs::BreakType::TextWrapping);
        }
        run = run.add_text(line);
    }
    if let Some(style) = style {
        if style.bold {
            run = run.bold();
        }
        if style.italic {
            run = run.italic();
        }
        if let Some(size) = style.font_size {
            run = run.size((size * 2.0).round().max(1.0) as usize);
        }
    }
    run
}

fn translation_paragraph(item: &AlignedSegment, keep_style: bool) -> Paragraph {
    let style = if keep_style { item.segment.style.as_ref() } else { None };
    let color = if item.succeeded { TRANSLATION_COLOR } else { UNTRANSLATED_COLOR };
    let run = styled_run(item.translation(), style);
    Paragraph::new().add_run(if keep_style { run } else { run.color(color) })
}

fn original_paragraph(item: &AlignedSegment) -> Paragraph {
    Paragraph::new().add_run(styled_run(item.original(), item.segment.style.as_ref()))
}

fn heading(text: &str) -> Paragraph {
    Paragraph::new().add_run(Run::new().add_text(text).bold().size(32))
}

pub fn render_docx(title: &str, aligned: &[AlignedSegment], layout: Layout) -> TranslationResult<Vec<u8>> {
    let mut docx = Docx::new().add_paragraph(heading(title));

    match layout {
        Layout::TranslationOnly => {
            for item in aligned {
                docx = docx.add_paragraph(translation_paragraph(item, true));
            }
        }
        Layout::SideBySide => {
            let header = TableRow::new(vec![
                TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("原文").bold())),
                TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("译文").bold())),
            ]);
            let mut rows = vec![header];
            for item in aligned {
                rows.push(TableRow::new(vec![
                    TableCell::new().add_paragraph(original_paragraph(item)),
                    TableCell::new().add_paragraph(translation_paragraph(item, false)),
                ]));
            }
            docx = docx.add_table(Table::new(rows).set_grid(vec![COLUMN_WIDTH, COLUMN_WIDTH]));
        }
        Layout::ParagraphByParagraph => {
            for group in group_by_origin(aligned) {
                for item in group {
                    docx = docx.add_paragraph(original_paragraph(item));
                }
                for item in group {
                    docx = docx.add_paragraph(translation_paragraph(item, false));
                }
                docx = docx.add_paragraph(Paragraph::new());
            }
        }
    }

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| TranslationError::RebuildError(format!("DOCX 打包失败: {}", e)))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::model::TextSegment;
    use std::io::Read;

    fn document_xml(bytes: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    fn sample() -> Vec<AlignedSegment> {
        vec![AlignedSegment {
            segment: TextSegment::new(0, 0, 0, "Hello world\n"),
            translated: "你好，世界".into(),
            succeeded: true,
        }]
    }

    #[test]
    fn test_side_by_side_builds_table() {
        let bytes = render_docx("demo", &sample(), Layout::SideBySide).unwrap();
        let xml = document_xml(&bytes);
        assert!(xml.contains("<w:tbl>"));
        assert!(xml.contains("Hello world"));
        assert!(xml.contains("你好，世界"));
    }

    #[test]
    fn test_translation_only_omits_original() {
        let bytes = render_docx("demo", &sample(), Layout::TranslationOnly).unwrap();
        let xml = document_xml(&bytes);
        assert!(!xml.contains("Hello world"));
        assert!(xml.contains("你好，世界"));
    }
}
