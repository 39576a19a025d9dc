//! DOCX 解析器
//!
//! 读取 `word/document.xml`，每个非空 `w:p` 段落（含表格单元格中的段落）
//! 生成一个片段，`origin_index` 为段落序号。

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::xml::{attr, flag, open_archive, read_entry};
use super::{DocumentParser, ParsedDocument, SegmentCollector};
use crate::translation::error::TranslationResult;
use crate::translation::model::{DocumentFormat, TextStyle};

pub struct DocxParser;

#[derive(Default)]
struct Paragraph {
    ordinal: usize,
    text: String,
    style: Option<TextStyle>,
    in_run_props: bool,
    unreadable: bool,
}

impl Paragraph {
    fn style_mut(&mut self) -> Option<&mut TextStyle> {
        if self.in_run_props {
            Some(self.style.get_or_insert_with(TextStyle::default))
        } else {
            None
        }
    }

    fn apply_property(&mut self, element: &BytesStart<'_>) {
        let name = element.name();
        let Some(style) = self.style_mut() else {
            return;
        };
        match name.as_ref() {
            b"w:b" => style.bold = flag(element, b"w:val"),
            b"w:i" => style.italic = flag(element, b"w:val"),
            b"w:sz" => {
                style.font_size = attr(element, b"w:val")
                    .and_then(|value| value.parse::<f32>().ok())
                    .map(|half_points| half_points / 2.0);
            }
            b"w:color" => style.color = attr(element, b"w:val"),
            b"w:rFonts" => style.font_name = attr(element, b"w:ascii"),
            _ => {}
        }
    }
}

impl DocumentParser for DocxParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn parse(&self, bytes: &[u8]) -> TranslationResult<ParsedDocument> {
        let mut archive = open_archive(bytes)?;
        let xml = read_entry(&mut archive, "word/document.xml")?;

        let mut reader = Reader::from_reader(xml.as_slice());
        reader.trim_text(false);

        let mut collector = SegmentCollector::new();
        let mut stack: Vec<Paragraph> = Vec::new();
        let mut ordinal = 0usize;
        let mut in_text = false;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.name().as_ref() {
                    b"w:p" => {
                        stack.push(Paragraph {
                            ordinal,
                            ..Paragraph::default()
                        });
                        ordinal += 1;
                    }
                    b"w:rPr" => {
                        if let Some(paragraph) = stack.last_mut() {
                            paragraph.in_run_props = paragraph.style.is_none();
                        }
                    }
                    b"w:t" => in_text = true,
                    _ => {
                        if let Some(paragraph) = stack.last_mut() {
                            paragraph.apply_property(&e);
                        }
                    }
                },
                Event::Empty(e) => {
                    if let Some(paragraph) = stack.last_mut() {
                        match e.name().as_ref() {
                            b"w:tab" => paragraph.text.push('\t'),
                            b"w:br" | b"w:cr" => paragraph.text.push('\n'),
                            _ => paragraph.apply_property(&e),
                        }
                    }
                }
                Event::Text(e) if in_text => {
                    if let Some(paragraph) = stack.last_mut() {
                        match e.unescape() {
                            Ok(text) => paragraph.text.push_str(&text),
                            Err(_) => paragraph.unreadable = true,
                        }
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"w:t" => in_text = false,
                    b"w:rPr" => {
                        if let Some(paragraph) = stack.last_mut() {
                            paragraph.in_run_props = false;
                        }
                    }
                    b"w:p" => {
                        if let Some(paragraph) = stack.pop() {
                            if paragraph.unreadable {
                                collector.warn(format!("第 {} 段文本无法解码，已跳过", paragraph.ordinal + 1));
                            } else {
                                collector.push_block(paragraph.ordinal, 0, &paragraph.text, None, paragraph.style);
                            }
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(collector.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn docx(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="w"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_paragraphs_tabs_and_styles() {
        let bytes = docx(concat!(
            r#"<w:p><w:r><w:rPr><w:b/><w:sz w:val="28"/></w:rPr><w:t>Title</w:t></w:r></w:p>"#,
            r#"<w:p></w:p>"#,
            r#"<w:p><w:r><w:t xml:space="preserve">a</w:t><w:tab/><w:t>b &amp; c</w:t></w:r></w:p>"#,
        ));
        let parsed = DocxParser.parse(&bytes).unwrap();

        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.segments[0].text, "Title\n");
        let style = parsed.segments[0].style.as_ref().unwrap();
        assert!(style.bold);
        assert_eq!(style.font_size, Some(14.0));

        assert_eq!(parsed.segments[1].text, "a\tb & c\n");
        assert_eq!(parsed.segments[1].origin_index, 2);
    }

    #[test]
    fn test_bad_entity_skips_paragraph() {
        let bytes = docx(r#"<w:p><w:r><w:t>ok</w:t></w:r></w:p><w:p><w:r><w:t>&nope;</w:t></w:r></w:p>"#);
        let parsed = DocxParser.parse(&bytes).unwrap();
        assert_eq!(parsed.segments.len(), 1);
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn test_missing_document_part_is_parse_error() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer.start_file("other.xml", zip::write::FileOptions::default()).unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        assert!(matches!(
            DocxParser.parse(&bytes),
            Err(crate::translation::error::TranslationError::ParseError(_))
        ));
    }
}
