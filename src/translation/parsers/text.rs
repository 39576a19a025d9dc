//! 纯文本与 Markdown 解析器
//!
//! 以空行分段，片段是原文的精确切片：段落后的空行归入前一片段，
//! 文档开头的空白归入第一个片段。Markdown 额外把标题、列表项与引用
//! 作为独立片段，围栏代码块整体保留在一个片段中。

use encoding_rs::{Encoding, GB18030};
use regex::Regex;

use super::{DocumentParser, ParsedDocument, SegmentCollector};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::model::DocumentFormat;

/// 解码文本字节：优先 BOM，其次 UTF-8，否则按 GB18030 解码
pub(crate) fn decode_text(bytes: &[u8]) -> (String, Option<String>) {
    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        return (text.into_owned(), None);
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), None),
        Err(_) => {
            let (text, _, had_errors) = GB18030.decode(bytes);
            let warning = if had_errors {
                "文本不是有效的 UTF-8，按 GB18030 解码时存在无法识别的字节".to_string()
            } else {
                "文本不是 UTF-8，已按 GB18030 解码".to_string()
            };
            (text.into_owned(), Some(warning))
        }
    }
}

fn markdown_block_pattern() -> TranslationResult<Regex> {
    Regex::new(r"^ {0,3}(#{1,6}\s|[-*+]\s|\d{1,9}[.)]\s|>)")
        .map_err(|e| TranslationError::InternalError(format!("Markdown 块模式无效: {}", e)))
}

fn split_blocks(text: &str, block_start: Option<&Regex>, collector: &mut SegmentCollector) {
    let mut start = 0usize;
    let mut offset = 0usize;
    let mut index = 0usize;
    let mut previous_blank = false;
    let mut has_content = false;
    let mut in_fence = false;

    for line in text.split_inclusive('\n') {
        let blank = line.trim().is_empty();
        let is_fence = block_start.is_some() && line.trim_start().starts_with("```");

        let opens_block = !in_fence
            && !blank
            && (previous_blank
                || (is_fence && !in_fence)
                || block_start.map_or(false, |pattern| pattern.is_match(line)));

        if has_content && opens_block {
            collector.push_raw(index, 0, text[start..offset].to_string(), None, None);
            index += 1;
            start = offset;
            has_content = false;
        }

        if is_fence {
            in_fence = !in_fence;
        }
        has_content |= !blank;
        previous_blank = blank;
        offset += line.len();
    }

    if has_content {
        collector.push_raw(index, 0, text[start..].to_string(), None, None);
    } else if start < text.len() {
        collector.append_to_last(&text[start..]);
    }
}

fn parse_text(bytes: &[u8], block_start: Option<&Regex>) -> ParsedDocument {
    let (text, warning) = decode_text(bytes);
    let mut collector = SegmentCollector::new();
    if let Some(warning) = warning {
        collector.warn(warning);
    }
    split_blocks(&text, block_start, &mut collector);
    collector.finish()
}

pub struct PlainTextParser;

impl DocumentParser for PlainTextParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Text
    }

    fn parse(&self, bytes: &[u8]) -> TranslationResult<ParsedDocument> {
        Ok(parse_text(bytes, None))
    }
}

pub struct MarkdownParser;

impl DocumentParser for MarkdownParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Markdown
    }

    fn parse(&self, bytes: &[u8]) -> TranslationResult<ParsedDocument> {
        let pattern = markdown_block_pattern()?;
        Ok(parse_text(bytes, Some(&pattern)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(parsed: &ParsedDocument) -> String {
        parsed.segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_plain_text_exact_slices() {
        let input = "\n\nFirst paragraph\nstill first.\n\n\nSecond.\n\n";
        let parsed = PlainTextParser.parse(input.as_bytes()).unwrap();

        assert_eq!(parsed.segments.len(), 2);
        assert_eq!(parsed.segments[0].text, "\n\nFirst paragraph\nstill first.\n\n\n");
        assert_eq!(parsed.segments[1].text, "Second.\n\n");
        assert_eq!(joined(&parsed), input);
    }

    #[test]
    fn test_whitespace_only_text_is_empty_document() {
        let parsed = PlainTextParser.parse(b"  \n\n\t").unwrap();
        assert!(parsed.is_empty());
        assert!(PlainTextParser.parse(b"").unwrap().is_empty());
    }

    #[test]
    fn test_markdown_blocks() {
        let input = "# Title\nIntro line.\n- one\n- two\n\n```\ncode\n\n# not a heading\n```\nTail";
        let parsed = MarkdownParser.parse(input.as_bytes()).unwrap();
        let texts: Vec<&str> = parsed.segments.iter().map(|s| s.text.as_str()).collect();

        assert_eq!(
            texts,
            vec![
                "# Title\nIntro line.\n",
                "- one\n",
                "- two\n\n",
                "```\ncode\n\n# not a heading\n```\nTail",
            ]
        );
        assert_eq!(joined(&parsed), input);
    }

    #[test]
    fn test_decode_bom_and_gb18030() {
        let mut utf16 = vec![0xFF, 0xFE];
        utf16.extend("hi".encode_utf16().flat_map(|unit| unit.to_le_bytes()));
        assert_eq!(decode_text(&utf16).0, "hi");

        let (encoded, _, _) = GB18030.encode("你好");
        let (text, warning) = decode_text(&encoded);
        assert_eq!(text, "你好");
        assert!(warning.is_some());
    }
}
