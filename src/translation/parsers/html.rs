//! HTML 解析器
//!
//! 用 html5ever 构建 DOM，按块级元素切分文本；`script`、`style` 等
//! 不可见内容被忽略，块内空白折叠为单个空格。

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use super::text::decode_text;
use super::{DocumentParser, ParsedDocument, SegmentCollector};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::model::DocumentFormat;

pub struct HtmlParser;

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "dd", "div", "dt",
    "figcaption", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "li", "main",
    "nav", "ol", "p", "pre", "section", "table", "td", "th", "title", "tr", "ul",
];

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// 将 HTML 字节转换为 DOM
pub(crate) fn html_to_dom(html: &str) -> TranslationResult<RcDom> {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| TranslationError::ParseError(format!("HTML 解析失败: {}", e)))
}

struct BlockWalker<'a> {
    collector: &'a mut SegmentCollector,
    buffer: String,
    blocks: usize,
}

impl BlockWalker<'_> {
    fn flush(&mut self) {
        let text = self.buffer.split_whitespace().collect::<Vec<_>>().join(" ");
        self.buffer.clear();
        if self.collector.push_block(self.blocks, 0, &text, None, None) {
            self.blocks += 1;
        }
    }

    fn walk(&mut self, node: &Handle) {
        match &node.data {
            NodeData::Text { contents } => {
                self.buffer.push_str(&contents.borrow());
            }
            NodeData::Element { name, .. } => {
                let tag: &str = &name.local;
                if tag == "title" {
                    // title 位于 head 中，单独处理
                    self.flush();
                    self.walk_children(node);
                    self.flush();
                    return;
                }
                if SKIPPED_ELEMENTS.contains(&tag) {
                    for child in node.children.borrow().iter() {
                        if let NodeData::Element { name, .. } = &child.data {
                            if &*name.local == "title" {
                                self.walk(child);
                            }
                        }
                    }
                    return;
                }
                if tag == "br" {
                    self.buffer.push(' ');
                    return;
                }

                let is_block = BLOCK_ELEMENTS.contains(&tag);
                if is_block {
                    self.flush();
                }
                self.walk_children(node);
                if is_block {
                    self.flush();
                }
            }
            NodeData::Document => self.walk_children(node),
            _ => {}
        }
    }

    fn walk_children(&mut self, node: &Handle) {
        for child in node.children.borrow().iter() {
            self.walk(child);
        }
    }
}

impl DocumentParser for HtmlParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Html
    }

    fn parse(&self, bytes: &[u8]) -> TranslationResult<ParsedDocument> {
        let (html, warning) = decode_text(bytes);
        let dom = html_to_dom(&html)?;

        let mut collector = SegmentCollector::new();
        if let Some(warning) = warning {
            collector.warn(warning);
        }

        let mut walker = BlockWalker {
            collector: &mut collector,
            buffer: String::new(),
            blocks: 0,
        };
        walker.walk(&dom.document);
        walker.flush();

        Ok(collector.finish())
    }
}
