//! PPTX 解析器
//!
//! 按幻灯片编号顺序遍历 `ppt/slides/slideN.xml`，每个非空的 `a:p` 段落
//! 生成一个片段。`origin_index` 为幻灯片编号，`sub_index` 为段落在该
//! 幻灯片中的序号（所有 `a:p` 开始标签计数），原位回写时以此定位。
//!
//! 位置取自所在形状的 `a:off`/`a:ext`（EMU），样式取自段落中第一个 `a:rPr`。
//! 形状内任意文本无法解码时，整个形状记录警告后跳过。

use quick_xml::events::Event;
use quick_xml::Reader;

use super::xml::{attr, open_archive, read_entry, OfficeArchive};
use super::{DocumentParser, ParsedDocument, SegmentCollector};
use crate::translation::error::TranslationResult;
use crate::translation::model::{DocumentFormat, Position, TextStyle};

pub struct PptxParser;

/// 解析幻灯片文件名中的编号
pub(crate) fn slide_number(name: &str) -> Option<usize> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// 按编号排序的幻灯片 `(编号, 文件名)`
pub(crate) fn slide_entries(archive: &OfficeArchive<'_>) -> Vec<(usize, String)> {
    let mut slides: Vec<(usize, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|number| (number, name.to_string())))
        .collect();
    slides.sort();
    slides
}

pub(crate) fn is_shape(name: &[u8]) -> bool {
    matches!(name, b"p:sp" | b"p:graphicFrame")
}

#[derive(Default)]
struct ShapeState {
    ordinal: usize,
    offset: Option<(f64, f64)>,
    extent: Option<(f64, f64)>,
    paragraphs: Vec<(usize, String, Option<TextStyle>)>,
    unreadable: Option<String>,
}

impl ShapeState {
    fn position(&self) -> Option<Position> {
        let (x, y) = self.offset?;
        let (width, height) = self.extent.unwrap_or((0.0, 0.0));
        Some(Position { x, y, width, height })
    }
}

struct ParagraphState {
    ordinal: usize,
    text: String,
    style: Option<TextStyle>,
}

fn number_attr(element: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<f64> {
    attr(element, key).and_then(|value| value.parse().ok())
}

fn run_style(element: &quick_xml::events::BytesStart<'_>) -> TextStyle {
    TextStyle {
        font_size: attr(element, b"sz")
            .and_then(|value| value.parse::<f32>().ok())
            .map(|size| size / 100.0),
        bold: attr(element, b"b").as_deref() == Some("1"),
        italic: attr(element, b"i").as_deref() == Some("1"),
        ..TextStyle::default()
    }
}

fn parse_slide(slide: usize, xml: &[u8], collector: &mut SegmentCollector) -> TranslationResult<()> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(false);

    let mut buf = Vec::new();
    let mut shape: Option<ShapeState> = None;
    let mut paragraph: Option<ParagraphState> = None;
    let mut shape_count = 0usize;
    let mut paragraph_count = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                name if is_shape(name) => {
                    shape_count += 1;
                    shape = Some(ShapeState {
                        ordinal: shape_count,
                        ..ShapeState::default()
                    });
                }
                b"a:off" => {
                    if let Some(state) = shape.as_mut().filter(|s| s.offset.is_none()) {
                        state.offset = number_attr(&e, b"x").zip(number_attr(&e, b"y"));
                    }
                }
                b"a:ext" => {
                    if let Some(state) = shape.as_mut().filter(|s| s.extent.is_none()) {
                        state.extent = number_attr(&e, b"cx").zip(number_attr(&e, b"cy"));
                    }
                }
                b"a:p" => {
                    paragraph = Some(ParagraphState {
                        ordinal: paragraph_count,
                        text: String::new(),
                        style: None,
                    });
                    paragraph_count += 1;
                }
                b"a:rPr" => {
                    if let Some(state) = paragraph.as_mut().filter(|p| p.style.is_none()) {
                        state.style = Some(run_style(&e));
                    }
                }
                b"a:t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"a:off" => {
                    if let Some(state) = shape.as_mut().filter(|s| s.offset.is_none()) {
                        state.offset = number_attr(&e, b"x").zip(number_attr(&e, b"y"));
                    }
                }
                b"a:ext" => {
                    if let Some(state) = shape.as_mut().filter(|s| s.extent.is_none()) {
                        state.extent = number_attr(&e, b"cx").zip(number_attr(&e, b"cy"));
                    }
                }
                b"a:rPr" => {
                    if let Some(state) = paragraph.as_mut().filter(|p| p.style.is_none()) {
                        state.style = Some(run_style(&e));
                    }
                }
                b"a:latin" => {
                    if let Some(style) = paragraph.as_mut().and_then(|p| p.style.as_mut()) {
                        if style.font_name.is_none() {
                            style.font_name = attr(&e, b"typeface");
                        }
                    }
                }
                b"a:br" => {
                    if let Some(state) = paragraph.as_mut() {
                        state.text.push('\n');
                    }
                }
                _ => {}
            },
            Event::Text(e) if in_text => match e.unescape() {
                Ok(text) => {
                    if let Some(state) = paragraph.as_mut() {
                        state.text.push_str(&text);
                    }
                }
                Err(err) => {
                    if let Some(state) = shape.as_mut() {
                        state.unreadable.get_or_insert_with(|| err.to_string());
                    }
                }
            },
            Event::End(e) => match e.name().as_ref() {
                b"a:t" => in_text = false,
                b"a:p" => {
                    if let (Some(finished), Some(state)) = (paragraph.take(), shape.as_mut()) {
                        state
                            .paragraphs
                            .push((finished.ordinal, finished.text, finished.style));
                    }
                }
                name if is_shape(name) => {
                    if let Some(finished) = shape.take() {
                        flush_shape(slide, finished, collector);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn flush_shape(slide: usize, shape: ShapeState, collector: &mut SegmentCollector) {
    if let Some(reason) = &shape.unreadable {
        collector.warn(format!(
            "幻灯片 {} 的第 {} 个形状无法读取，已跳过: {}",
            slide, shape.ordinal, reason
        ));
        return;
    }

    let position = shape.position();
    for (ordinal, text, style) in shape.paragraphs {
        collector.push_block(slide, ordinal, &text, position, style);
    }
}

impl DocumentParser for PptxParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pptx
    }

    fn parse(&self, bytes: &[u8]) -> TranslationResult<ParsedDocument> {
        let mut archive = open_archive(bytes)?;
        let mut collector = SegmentCollector::new();

        for (number, name) in slide_entries(&archive) {
            let xml = read_entry(&mut archive, &name)?;
            if let Err(e) = parse_slide(number, &xml, &mut collector) {
                collector.warn(format!("幻灯片 {} 结构损坏，已跳过剩余内容: {}", number, e));
            }
        }

        Ok(collector.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;

    fn slide_xml(shapes: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree>{}</p:spTree></p:cSld></p:sld>"#,
            shapes
        )
    }

    fn shape(x: u32, paragraphs: &[&str]) -> String {
        let body: String = paragraphs
            .iter()
            .map(|text| format!(r#"<a:p><a:r><a:rPr sz="2400" b="1"/><a:t>{}</a:t></a:r></a:p>"#, text))
            .collect();
        format!(
            r#"<p:sp><p:spPr><a:xfrm><a:off x="{}" y="20"/><a:ext cx="300" cy="40"/></a:xfrm></p:spPr><p:txBody>{}</p:txBody></p:sp>"#,
            x, body
        )
    }

    fn deck(slides: &[(usize, String)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (number, xml) in slides {
            writer
                .start_file(format!("ppt/slides/slide{}.xml", number), FileOptions::default())
                .unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_slides_sorted_numerically() {
        let bytes = deck(&[
            (10, slide_xml(&shape(1, &["tenth"]))),
            (2, slide_xml(&shape(1, &["second"]))),
        ]);
        let parsed = PptxParser.parse(&bytes).unwrap();
        let texts: Vec<&str> = parsed.segments.iter().map(|s| s.content()).collect();
        assert_eq!(texts, vec!["second", "tenth"]);
        assert_eq!(parsed.segments[0].origin_index, 2);
    }

    #[test]
    fn test_position_and_style_extracted() {
        let bytes = deck(&[(1, slide_xml(&shape(100, &["Hello", "", "World"])))]);
        let parsed = PptxParser.parse(&bytes).unwrap();

        assert_eq!(parsed.segments.len(), 2);
        let first = &parsed.segments[0];
        assert_eq!(first.text, "Hello\n");
        assert_eq!(first.sub_index, 0);
        assert_eq!(parsed.segments[1].sub_index, 2, "空段落仍占用序号");

        let position = first.position.unwrap();
        assert_eq!((position.x, position.y, position.width), (100.0, 20.0, 300.0));
        let style = first.style.as_ref().unwrap();
        assert_eq!(style.font_size, Some(24.0));
        assert!(style.bold);
    }

    #[test]
    fn test_unreadable_shape_skipped_with_warning() {
        let shapes = format!("{}{}{}", shape(1, &["Before"]), shape(2, &["Bad &bogus; run"]), shape(3, &["After"]));
        let bytes = deck(&[(1, slide_xml(&shapes))]);
        let parsed = PptxParser.parse(&bytes).unwrap();

        let texts: Vec<&str> = parsed.segments.iter().map(|s| s.content()).collect();
        assert_eq!(texts, vec!["Before", "After"]);
        assert_eq!(parsed.warnings.len(), 1);
        assert!(parsed.warnings[0].contains("第 2 个形状"));
    }

    #[test]
    fn test_empty_deck_and_corrupt_container() {
        let parsed = PptxParser.parse(&deck(&[])).unwrap();
        assert!(parsed.is_empty());
        assert!(PptxParser.parse(b"not a zip").is_err());
    }
}
