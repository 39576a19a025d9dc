//! 翻译报告
//!
//! 任务完成后可选生成的 DOCX 摘要：状态、翻译服务、片段数量、耗时、
//! 字符统计与全部警告。批量翻译多个文件时另有纯文本汇总报告。

use std::fmt::Write as _;

use std::io::Cursor;

use chrono::{DateTime, Utc};
use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};
use serde::{Deserialize, Serialize};

use super::AlignedSegment;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::model::ProcessingResult;

/// 报告内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub document_name: String,
    pub status: String,
    pub provider: String,
    pub source_language: String,
    pub target_language: String,
    pub segment_count: usize,
    pub translated_count: usize,
    pub degraded_count: usize,
    pub processing_time_secs: f64,
    pub timestamp: DateTime<Utc>,
    pub source_chars: usize,
    pub translated_chars: usize,
    pub warnings: Vec<String>,
}

impl ReportData {
    /// 从处理结果与回填后的片段汇总
    pub fn from_result(
        document_name: &str,
        source_language: &str,
        target_language: &str,
        result: &ProcessingResult,
        aligned: &[AlignedSegment],
        warnings: &[String],
    ) -> Self {
        Self {
            document_name: document_name.to_string(),
            status: if result.degraded_count == 0 { "成功" } else { "部分成功" }.to_string(),
            provider: result.provider.clone(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            segment_count: result.original_text_count,
            translated_count: result.translated_text_count,
            degraded_count: result.degraded_count,
            processing_time_secs: result.processing_time_secs,
            timestamp: result.timestamp,
            source_chars: aligned.iter().map(|item| item.original().chars().count()).sum(),
            translated_chars: aligned.iter().map(|item| item.translation().chars().count()).sum(),
            warnings: warnings.to_vec(),
        }
    }

    /// 译文与原文的字符比
    pub fn char_ratio(&self) -> f64 {
        if self.source_chars == 0 {
            0.0
        } else {
            self.translated_chars as f64 / self.source_chars as f64
        }
    }
}

pub struct ReportGenerator;

impl ReportGenerator {
    fn row(label: &str, value: String) -> TableRow {
        TableRow::new(vec![
            TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(label).bold())),
            TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(value))),
        ])
    }

    pub fn generate(data: &ReportData) -> TranslationResult<Vec<u8>> {
        let rows = vec![
            Self::row("文档", data.document_name.clone()),
            Self::row("状态", data.status.clone()),
            Self::row("翻译服务", data.provider.clone()),
            Self::row("语言", format!("{} → {}", data.source_language, data.target_language)),
            Self::row("片段数", data.segment_count.to_string()),
            Self::row("已翻译片段", data.translated_count.to_string()),
            Self::row("降级分块", data.degraded_count.to_string()),
            Self::row("耗时", format!("{:.2} 秒", data.processing_time_secs)),
            Self::row("完成时间", data.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            Self::row("原文字符数", data.source_chars.to_string()),
            Self::row("译文字符数", data.translated_chars.to_string()),
            Self::row("字符比", format!("{:.2}", data.char_ratio())),
        ];

        let mut docx = Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("翻译报告").bold().size(36)))
            .add_table(Table::new(rows).set_grid(vec![3000, 6600]));

        if !data.warnings.is_empty() {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text("警告").bold().size(28)));
            for warning in &data.warnings {
                docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(format!("• {}", warning))));
            }
        }

        let mut buffer = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buffer)
            .map_err(|e| TranslationError::RebuildError(format!("报告打包失败: {}", e)))?;
        Ok(buffer.into_inner())
    }
}

/// 批量翻译中单个文件的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub document_name: String,
    pub processing_time_secs: f64,
    pub outcome: BatchOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Succeeded {
        original_text_count: usize,
        translated_text_count: usize,
        output_files: Vec<String>,
    },
    Failed {
        error: String,
    },
}

impl BatchEntry {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Succeeded { .. })
    }
}

/// 批量翻译汇总报告
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    pub fn new(entries: Vec<BatchEntry>) -> Self {
        Self { entries }
    }

    pub fn succeeded_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.succeeded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.len() - self.succeeded_count()
    }

    pub fn total_time_secs(&self) -> f64 {
        self.entries.iter().map(|entry| entry.processing_time_secs).sum()
    }

    /// 报告文件名，带生成时间
    pub fn filename(at: DateTime<Utc>) -> String {
        format!("batch_report_{}.txt", at.format("%Y%m%d_%H%M%S"))
    }

    /// 渲染为纯文本
    pub fn render(&self) -> String {
        let mut out = String::new();
        let total = self.entries.len();
        let average = if total == 0 { 0.0 } else { self.total_time_secs() / total as f64 };

        let _ = writeln!(out, "批量翻译处理报告");
        let _ = writeln!(out, "{}\n", "=".repeat(50));
        let _ = writeln!(out, "处理统计:");
        let _ = writeln!(out, "  总文件数: {}", total);
        let _ = writeln!(out, "  成功文件数: {}", self.succeeded_count());
        let _ = writeln!(out, "  失败文件数: {}", self.failed_count());
        let _ = writeln!(out, "  总处理时间: {:.2}秒", self.total_time_secs());
        let _ = writeln!(out, "  平均处理时间: {:.2}秒/文件\n", average);
        let _ = writeln!(out, "详细结果:");
        let _ = writeln!(out, "{}", "-".repeat(30));

        for (index, entry) in self.entries.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", index + 1, entry.document_name);
            let _ = writeln!(out, "   状态: {}", if entry.succeeded() { "成功" } else { "失败" });
            let _ = writeln!(out, "   处理时间: {:.2}秒", entry.processing_time_secs);
            match &entry.outcome {
                BatchOutcome::Succeeded {
                    original_text_count,
                    translated_text_count,
                    output_files,
                } => {
                    let _ = writeln!(out, "   原文片段数: {}", original_text_count);
                    let _ = writeln!(out, "   译文片段数: {}", translated_text_count);
                    let _ = writeln!(out, "   输出文件: {}", output_files.join(", "));
                }
                BatchOutcome::Failed { error } => {
                    let _ = writeln!(out, "   错误信息: {}", error);
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::model::TextSegment;
    use std::io::Read;

    fn result(degraded: usize) -> ProcessingResult {
        ProcessingResult {
            processing_time_secs: 1.5,
            original_text_count: 2,
            translated_text_count: 2 - degraded,
            degraded_count: degraded,
            provider: "openai".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_ratio_and_status() {
        let aligned = vec![AlignedSegment {
            segment: TextSegment::new(0, 0, 0, "abcd\n"),
            translated: "甲乙".into(),
            succeeded: true,
        }];
        let data = ReportData::from_result("demo.txt", "en", "zh-CN", &result(0), &aligned, &[]);
        assert_eq!(data.source_chars, 4);
        assert_eq!(data.translated_chars, 2);
        assert!((data.char_ratio() - 0.5).abs() < f64::EPSILON);
        assert_eq!(data.status, "成功");

        let partial = ReportData::from_result("demo.txt", "en", "zh-CN", &result(1), &aligned, &[]);
        assert_eq!(partial.status, "部分成功");
    }

    #[test]
    fn test_report_lists_warnings() {
        let data = ReportData::from_result(
            "demo.txt",
            "en",
            "zh-CN",
            &result(0),
            &[],
            &["第 2 页无法读取".to_string()],
        );
        assert_eq!(data.char_ratio(), 0.0);

        let bytes = ReportGenerator::generate(&data).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert!(xml.contains("翻译报告"));
        assert!(xml.contains("第 2 页无法读取"));
    }

    #[test]
    fn test_batch_report_counts_and_details() {
        let report = BatchReport::new(vec![
            BatchEntry {
                document_name: "a.txt".into(),
                processing_time_secs: 1.0,
                outcome: BatchOutcome::Succeeded {
                    original_text_count: 3,
                    translated_text_count: 3,
                    output_files: vec!["a_translated.txt".into(), "a_translated.md".into()],
                },
            },
            BatchEntry {
                document_name: "b.xlsx".into(),
                processing_time_secs: 2.0,
                outcome: BatchOutcome::Failed {
                    error: "不支持的文件格式".into(),
                },
            },
        ]);
        assert_eq!(report.succeeded_count(), 1);
        assert_eq!(report.failed_count(), 1);

        let text = report.render();
        assert!(text.contains("总文件数: 2"));
        assert!(text.contains("平均处理时间: 1.50秒/文件"));
        assert!(text.contains("输出文件: a_translated.txt, a_translated.md"));
        assert!(text.contains("2. b.xlsx\n   状态: 失败"));
        assert!(text.contains("错误信息: 不支持的文件格式"));

        assert!(BatchReport::default().render().contains("平均处理时间: 0.00秒/文件"));
    }

    #[test]
    fn test_batch_report_filename() {
        let at = DateTime::parse_from_rfc3339("2024-03-05T07:08:09Z").unwrap().with_timezone(&Utc);
        assert_eq!(BatchReport::filename(at), "batch_report_20240305_070809.txt");
    }
}
