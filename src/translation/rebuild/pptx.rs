//! PPTX 原位回写
//!
//! 复制原始压缩包的全部条目，只改写含有译文的幻灯片。段落通过
//! `(幻灯片编号, a:p 序号)` 定位，与解析阶段的编号方式一致。
//!
//! - 仅译文：第一个 `a:t` 写入译文，其余 `a:t` 清空，`a:br` 移除
//! - 双语排版（并排与逐段相同）：原文保持不动，在段落末尾追加换行和一个译文文本段

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use zip::write::FileOptions;
use zip::ZipWriter;

use super::AlignedSegment;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::model::Layout;
use crate::translation::parsers::pptx::{is_shape, slide_number};
use crate::translation::parsers::xml::open_archive;

fn rebuild_error(context: &str, e: impl std::fmt::Display) -> TranslationError {
    TranslationError::RebuildError(format!("{}: {}", context, e))
}

/// 单张幻灯片的改写
struct SlideRewriter<'a> {
    replacements: &'a HashMap<usize, String>,
    replace: bool,
}

#[derive(Default)]
struct ParagraphRewrite {
    text: String,
    written: bool,
    appended: bool,
}

impl SlideRewriter<'_> {
    fn rewrite(&self, xml: &[u8]) -> TranslationResult<Vec<u8>> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(false);
        let mut writer = Writer::new(Vec::with_capacity(xml.len() + 1024));
        let mut buf = Vec::new();

        let mut paragraph_count = 0usize;
        let mut current: Option<ParagraphRewrite> = None;
        let mut in_text = false;
        let mut shape_depth = 0usize;

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|e| rebuild_error("幻灯片 XML 解析失败", e))?;

            match event {
                Event::Eof => break,
                Event::Start(ref e) if is_shape(e.name().as_ref()) => {
                    shape_depth += 1;
                    self.write(&mut writer, event)?;
                }
                Event::End(ref e) if is_shape(e.name().as_ref()) => {
                    shape_depth = shape_depth.saturating_sub(1);
                    self.write(&mut writer, event)?;
                }
                Event::Start(ref e) if e.name().as_ref() == b"a:p" => {
                    let ordinal = paragraph_count;
                    paragraph_count += 1;
                    current = if shape_depth > 0 {
                        self.replacements.get(&ordinal).map(|text| ParagraphRewrite {
                            text: text.replace('\n', " "),
                            ..ParagraphRewrite::default()
                        })
                    } else {
                        None
                    };
                    self.write(&mut writer, event)?;
                }
                _ if current.is_none() => self.write(&mut writer, event)?,
                _ => {
                    let mut paragraph = current.take().unwrap_or_default();
                    let keep = self.rewrite_event(&mut writer, event, &mut paragraph, &mut in_text)?;
                    if keep {
                        current = Some(paragraph);
                    }
                }
            }
            buf.clear();
        }

        Ok(writer.into_inner())
    }

    /// 处理替换段落内的事件，返回段落是否仍未结束
    fn rewrite_event(
        &self,
        writer: &mut Writer<Vec<u8>>,
        event: Event<'_>,
        paragraph: &mut ParagraphRewrite,
        in_text: &mut bool,
    ) -> TranslationResult<bool> {
        match event {
            Event::Start(ref e) if e.name().as_ref() == b"a:t" => {
                *in_text = true;
                self.write(writer, event)?;
            }
            Event::Text(_) if *in_text && self.replace => {
                if !paragraph.written {
                    self.write(writer, Event::Text(BytesText::new(&paragraph.text)))?;
                    paragraph.written = true;
                }
            }
            Event::End(ref e) if e.name().as_ref() == b"a:t" => {
                if self.replace && !paragraph.written {
                    self.write(writer, Event::Text(BytesText::new(&paragraph.text)))?;
                    paragraph.written = true;
                }
                *in_text = false;
                self.write(writer, event)?;
            }
            Event::Empty(ref e) if self.replace && e.name().as_ref() == b"a:t" && !paragraph.written => {
                self.write_text_element(writer, &paragraph.text)?;
                paragraph.written = true;
            }
            Event::Empty(ref e) if self.replace && e.name().as_ref() == b"a:br" => {}
            Event::Empty(ref e) | Event::Start(ref e)
                if !self.replace && !paragraph.appended && e.name().as_ref() == b"a:endParaRPr" =>
            {
                self.append_translation(writer, paragraph)?;
                self.write(writer, event)?;
            }
            Event::End(ref e) if e.name().as_ref() == b"a:p" => {
                if !self.replace && !paragraph.appended {
                    self.append_translation(writer, paragraph)?;
                }
                self.write(writer, event)?;
                return Ok(false);
            }
            _ => self.write(writer, event)?,
        }
        Ok(true)
    }

    fn append_translation(&self, writer: &mut Writer<Vec<u8>>, paragraph: &mut ParagraphRewrite) -> TranslationResult<()> {
        self.write(writer, Event::Empty(BytesStart::new("a:br")))?;
        self.write(writer, Event::Start(BytesStart::new("a:r")))?;
        self.write_text_element(writer, &paragraph.text)?;
        self.write(writer, Event::End(BytesEnd::new("a:r")))?;
        paragraph.appended = true;
        Ok(())
    }

    fn write_text_element(&self, writer: &mut Writer<Vec<u8>>, text: &str) -> TranslationResult<()> {
        self.write(writer, Event::Start(BytesStart::new("a:t")))?;
        self.write(writer, Event::Text(BytesText::new(text)))?;
        self.write(writer, Event::End(BytesEnd::new("a:t")))
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> TranslationResult<()> {
        writer
            .write_event(event)
            .map_err(|e| rebuild_error("幻灯片 XML 写入失败", e))
    }
}

/// 按幻灯片编号整理替换文本
fn collect_replacements(aligned: &[AlignedSegment]) -> HashMap<usize, HashMap<usize, String>> {
    let mut slides: HashMap<usize, HashMap<usize, String>> = HashMap::new();
    for item in aligned {
        slides
            .entry(item.segment.origin_index)
            .or_default()
            .insert(item.segment.sub_index, item.translation().to_string());
    }
    slides
}

pub fn rewrite_pptx(source: &[u8], aligned: &[AlignedSegment], layout: Layout) -> TranslationResult<Vec<u8>> {
    let mut archive = open_archive(source)?;
    let replacements = collect_replacements(aligned);
    let mut output = ZipWriter::new(Cursor::new(Vec::new()));

    for index in 0..archive.len() {
        let mut file = archive
            .by_index(index)
            .map_err(|e| rebuild_error("读取 PPTX 条目失败", e))?;
        let name = file.name().to_string();
        let options = FileOptions::default().compression_method(file.compression());

        if file.is_dir() {
            output
                .add_directory(name, options)
                .map_err(|e| rebuild_error("写入 PPTX 目录失败", e))?;
            continue;
        }

        let mut contents = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut contents)?;

        let slide = slide_number(&name).and_then(|number| replacements.get(&number));
        if let Some(slide_replacements) = slide {
            let rewriter = SlideRewriter {
                replacements: slide_replacements,
                replace: layout == Layout::TranslationOnly,
            };
            contents = rewriter.rewrite(&contents)?;
        }

        output
            .start_file(name, options)
            .map_err(|e| rebuild_error("写入 PPTX 条目失败", e))?;
        output.write_all(&contents)?;
    }

    let cursor = output
        .finish()
        .map_err(|e| rebuild_error("PPTX 打包失败", e))?;
    Ok(cursor.into_inner())
}
