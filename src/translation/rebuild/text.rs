//! 纯文本、Markdown 与 HTML 输出
//!
//! 流式格式按阅读顺序线性输出，忽略原文的位置信息。
//! 仅译文模式保留原文片段的首尾空白，因此回显翻译器能还原输入文本。

use super::{group_by_origin, AlignedSegment};
use crate::translation::model::Layout;

pub fn render_text(aligned: &[AlignedSegment], layout: Layout) -> String {
    let mut output = String::new();
    match layout {
        Layout::TranslationOnly => {
            for item in aligned {
                output.push_str(&item.translation_in_place());
            }
        }
        Layout::SideBySide => {
            for item in aligned {
                output.push_str(item.original());
                output.push('\n');
                output.push_str(item.translation());
                output.push_str("\n\n");
            }
        }
        Layout::ParagraphByParagraph => {
            for group in group_by_origin(aligned) {
                for item in group {
                    output.push_str(item.original());
                    output.push('\n');
                }
                output.push('\n');
                for item in group {
                    output.push_str(item.translation());
                    output.push('\n');
                }
                output.push('\n');
            }
        }
    }
    output
}

fn escape_table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', "<br>")
}

pub fn render_markdown(aligned: &[AlignedSegment], layout: Layout) -> String {
    match layout {
        Layout::TranslationOnly => render_text(aligned, layout),
        Layout::SideBySide => {
            let mut output = String::from("| 原文 | 译文 |\n| --- | --- |\n");
            for item in aligned {
                output.push_str(&format!(
                    "| {} | {} |\n",
                    escape_table_cell(item.original()),
                    escape_table_cell(item.translation())
                ));
            }
            output
        }
        Layout::ParagraphByParagraph => {
            let mut output = String::new();
            for group in group_by_origin(aligned) {
                for item in group {
                    output.push_str(item.original());
                    output.push_str("\n\n");
                }
                for item in group {
                    for line in item.translation().lines() {
                        output.push_str("> ");
                        output.push_str(line);
                        output.push('\n');
                    }
                    output.push('\n');
                }
            }
            output
        }
    }
}

/// 转义 HTML 特殊字符
pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn html_block(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}

pub fn render_html(title: &str, aligned: &[AlignedSegment], layout: Layout) -> String {
    let mut body = String::new();
    match layout {
        Layout::TranslationOnly => {
            for item in aligned {
                body.push_str(&format!("<p>{}</p>\n", html_block(item.translation())));
            }
        }
        Layout::SideBySide => {
            body.push_str("<table class=\"bilingual\">\n<thead><tr><th>原文</th><th>译文</th></tr></thead>\n<tbody>\n");
            for item in aligned {
                let class = if item.succeeded { "" } else { " class=\"untranslated\"" };
                body.push_str(&format!(
                    "<tr{}><td>{}</td><td>{}</td></tr>\n",
                    class,
                    html_block(item.original()),
                    html_block(item.translation())
                ));
            }
            body.push_str("</tbody>\n</table>\n");
        }
        Layout::ParagraphByParagraph => {
            for group in group_by_origin(aligned) {
                body.push_str("<section>\n");
                for item in group {
                    body.push_str(&format!("<p class=\"original\">{}</p>\n", html_block(item.original())));
                }
                for item in group {
                    body.push_str(&format!(
                        "<p class=\"translation\">{}</p>\n",
                        html_block(item.translation())
                    ));
                }
                body.push_str("</section>\n");
            }
        }
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<style>\
table.bilingual{{border-collapse:collapse;width:100%}}\
table.bilingual td,table.bilingual th{{border:1px solid #ccc;padding:6px;vertical-align:top;width:50%}}\
.translation{{color:#1f4e79}}.untranslated td{{background:#fff4e5}}\
</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        body
    )
}
