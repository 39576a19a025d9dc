//! 文本分块器
//!
//! 把按阅读顺序排列的片段拼接成连续文本流，切分为不超过
//! `max_chars` 的翻译单元。
//!
//! ## 切分规则
//!
//! 1. 文本流剩余部分超过上限时，在上限位置向后查找切分点，
//!    查找窗口为 `max(max_chars * 0.3, 8)` 个字符
//! 2. 启用 `preserve_sentences` 时优先句末标点后的空白或换行，
//!    否则在启用 `preserve_paragraphs` 时只取换行
//! 3. 窗口内没有切分点时恰好在上限处切开（按字符，不会切断多字节字符）
//! 4. 切分点不早于 `min_chars`，因此除最后一块外都满足上下限；
//!    过短的最后一块并入前一块
//! 5. `overlap_chars > 0` 时，上一块末尾的字符作为下一块的语境前缀，
//!    不计入字符数，也不参与回写
//!
//! 每个分块记录精确的片段字节区间，所有区间首尾相接覆盖全部片段文本一次。

use crate::translation::config::{constants, PipelineConfig};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::model::{Chunk, SegmentSpan, TextSegment};

/// 分块配置
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkerConfig {
    pub max_chars: usize,
    pub min_chars: usize,
    pub overlap_chars: usize,
    pub preserve_sentences: bool,
    pub preserve_paragraphs: bool,
    /// 关闭时每个片段单独成块
    pub smart: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: constants::DEFAULT_MAX_CHUNK_CHARS,
            min_chars: constants::DEFAULT_MIN_CHUNK_CHARS,
            overlap_chars: constants::DEFAULT_OVERLAP_CHARS,
            preserve_sentences: true,
            preserve_paragraphs: true,
            smart: true,
        }
    }
}

impl From<&PipelineConfig> for ChunkerConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_chars: config.max_chunk_chars,
            min_chars: config.min_chunk_chars,
            overlap_chars: config.overlap_chars,
            preserve_sentences: config.preserve_sentences,
            preserve_paragraphs: config.preserve_paragraphs,
            smart: config.use_smart_chunking,
        }
    }
}

impl ChunkerConfig {
    fn lookback(&self) -> usize {
        let by_ratio = (self.max_chars as f32 * constants::BOUNDARY_LOOKBACK_RATIO).ceil() as usize;
        by_ratio.max(constants::MIN_BOUNDARY_LOOKBACK)
    }
}

fn is_sentence_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '。' | '！' | '？' | '…')
}

fn is_cjk_terminal(c: char) -> bool {
    matches!(c, '。' | '！' | '？')
}

fn is_closing_mark(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '”' | '’' | '」' | '』' | '）')
}

/// 文本流：所有片段文本拼接后的字符序列
struct TextStream<'a> {
    text: String,
    chars: Vec<char>,
    /// 每个字符的起始字节偏移，末尾追加总长度
    byte_offsets: Vec<usize>,
    /// 每个片段在文本流中的字节区间
    segment_ranges: Vec<(usize, usize)>,
    segments: &'a [TextSegment],
}

impl<'a> TextStream<'a> {
    fn new(segments: &'a [TextSegment]) -> Self {
        let mut text = String::new();
        let mut segment_ranges = Vec::with_capacity(segments.len());
        for segment in segments {
            let start = text.len();
            text.push_str(&segment.text);
            segment_ranges.push((start, text.len()));
        }

        let mut chars = Vec::with_capacity(text.len());
        let mut byte_offsets = Vec::with_capacity(text.len() + 1);
        for (offset, c) in text.char_indices() {
            chars.push(c);
            byte_offsets.push(offset);
        }
        byte_offsets.push(text.len());

        Self {
            text,
            chars,
            byte_offsets,
            segment_ranges,
            segments,
        }
    }

    fn len(&self) -> usize {
        self.chars.len()
    }

    /// `position` 处（字符下标）是否为句子边界
    fn is_sentence_boundary(&self, position: usize) -> bool {
        if position == 0 || position >= self.len() || self.chars[position].is_whitespace() {
            return false;
        }
        let previous = self.chars[position - 1];
        if is_cjk_terminal(previous) {
            return true;
        }
        if previous == '\n' {
            return true;
        }
        if !previous.is_whitespace() {
            return false;
        }

        let mut index = position - 1;
        while index > 0 && self.chars[index].is_whitespace() {
            index -= 1;
        }
        while index > 0 && is_closing_mark(self.chars[index]) {
            index -= 1;
        }
        is_sentence_terminal(self.chars[index])
    }

    /// `position` 处是否为段落边界（换行之后）
    fn is_paragraph_boundary(&self, position: usize) -> bool {
        position > 0
            && position < self.len()
            && self.chars[position - 1] == '\n'
            && !self.chars[position].is_whitespace()
    }

    /// 字符区间对应的片段区间
    fn spans(&self, start: usize, end: usize) -> Vec<SegmentSpan> {
        let (byte_start, byte_end) = (self.byte_offsets[start], self.byte_offsets[end]);
        self.segment_ranges
            .iter()
            .zip(self.segments)
            .filter(|((seg_start, seg_end), _)| *seg_start < byte_end && *seg_end > byte_start)
            .map(|((seg_start, seg_end), segment)| SegmentSpan {
                segment_id: segment.id,
                start: byte_start.max(*seg_start) - seg_start,
                end: byte_end.min(*seg_end) - seg_start,
            })
            .filter(|span| !span.is_empty())
            .collect()
    }

    fn slice(&self, start: usize, end: usize) -> &str {
        &self.text[self.byte_offsets[start]..self.byte_offsets[end]]
    }
}

/// 文本分块器
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// 将片段分块并校验映射
    pub fn chunk(&self, segments: &[TextSegment]) -> TranslationResult<Vec<Chunk>> {
        if self.config.max_chars == 0 || self.config.min_chars > self.config.max_chars {
            return Err(TranslationError::ConfigError(format!(
                "分块上下限无效: min={}, max={}",
                self.config.min_chars, self.config.max_chars
            )));
        }

        let chunks = if self.config.smart {
            self.chunk_stream(segments)
        } else {
            self.chunk_per_segment(segments)
        };

        validate_chunks(segments, &chunks, &self.config)?;
        tracing::info!(
            "分块完成: {} 个片段 -> {} 个分块 (上限 {} 字符)",
            segments.len(),
            chunks.len(),
            self.config.max_chars
        );
        Ok(chunks)
    }

    fn chunk_per_segment(&self, segments: &[TextSegment]) -> Vec<Chunk> {
        let mut ranges = Vec::with_capacity(segments.len());
        let mut start = 0;
        for segment in segments {
            let end = start + segment.char_count();
            ranges.push((start, end));
            start = end;
        }
        self.build_chunks(segments, &ranges)
    }

    fn chunk_stream(&self, segments: &[TextSegment]) -> Vec<Chunk> {
        let stream = TextStream::new(segments);
        let total = stream.len();
        if total == 0 {
            return Vec::new();
        }

        let max = self.config.max_chars;
        let min = self.config.min_chars.max(1);
        let lookback = self.config.lookback();

        let mut ranges: Vec<(usize, usize)> = Vec::new();
        let mut start = 0;
        while total - start > max {
            let limit = start + max;
            let lowest = (start + min).max(limit.saturating_sub(lookback)).max(start + 1);
            let cut = self.find_boundary(&stream, lowest, limit).unwrap_or(limit);
            ranges.push((start, cut));
            start = cut;
        }
        ranges.push((start, total));

        // 过短的最后一块并入前一块
        if ranges.len() > 1 {
            let (last_start, last_end) = ranges[ranges.len() - 1];
            if last_end - last_start < min {
                ranges.pop();
                if let Some(previous) = ranges.last_mut() {
                    previous.1 = last_end;
                }
            }
        }

        self.build_chunks(segments, &ranges)
    }

    fn find_boundary(&self, stream: &TextStream<'_>, lowest: usize, limit: usize) -> Option<usize> {
        if lowest > limit {
            return None;
        }
        if self.config.preserve_sentences {
            if let Some(position) = (lowest..=limit).rev().find(|&p| stream.is_sentence_boundary(p)) {
                return Some(position);
            }
        }
        if self.config.preserve_paragraphs {
            return (lowest..=limit).rev().find(|&p| stream.is_paragraph_boundary(p));
        }
        None
    }

    fn build_chunks(&self, segments: &[TextSegment], ranges: &[(usize, usize)]) -> Vec<Chunk> {
        let stream = TextStream::new(segments);
        let overlap = self.config.overlap_chars;

        ranges
            .iter()
            .enumerate()
            .map(|(id, &(start, end))| {
                let overlap_text = if overlap > 0 && id > 0 {
                    let (previous_start, previous_end) = ranges[id - 1];
                    let from = previous_end.saturating_sub(overlap).max(previous_start);
                    stream.slice(from, previous_end).to_string()
                } else {
                    String::new()
                };

                Chunk {
                    id,
                    spans: stream.spans(start, end),
                    text: stream.slice(start, end).to_string(),
                    overlap: overlap_text,
                    char_count: end - start,
                }
            })
            .collect()
    }
}

/// 校验分块与片段之间的映射
///
/// 区间必须按顺序首尾相接、恰好覆盖每个片段文本一次，
/// 分块文本必须等于其区间文本的拼接。启用智能分块时还检查字符数上下限。
pub fn validate_chunks(
    segments: &[TextSegment],
    chunks: &[Chunk],
    config: &ChunkerConfig,
) -> TranslationResult<()> {
    let violation = |message: String| Err(TranslationError::ChunkingInvariantViolation(message));

    let mut segment_index = 0usize;
    let mut offset = 0usize;

    for chunk in chunks {
        let mut expected_text = String::new();

        for span in &chunk.spans {
            let Some(segment) = segments.get(segment_index) else {
                return violation(format!("分块 {} 引用了多余的片段 {}", chunk.id, span.segment_id));
            };
            if span.segment_id != segment.id || span.start != offset || span.is_empty() {
                return violation(format!(
                    "分块 {} 的区间 {}[{}..{}] 与期望位置 {}[{}..] 不一致",
                    chunk.id, span.segment_id, span.start, span.end, segment.id, offset
                ));
            }
            let Some(piece) = segment.text.get(span.start..span.end) else {
                return violation(format!("分块 {} 的区间越界或不在字符边界上", chunk.id));
            };
            expected_text.push_str(piece);

            offset = span.end;
            if offset == segment.text.len() {
                segment_index += 1;
                offset = 0;
            }
        }

        if expected_text != chunk.text {
            return violation(format!("分块 {} 的文本与其区间不一致", chunk.id));
        }
        if chunk.char_count != chunk.text.chars().count() {
            return violation(format!("分块 {} 的字符数记录错误", chunk.id));
        }
    }

    if segment_index != segments.len() || offset != 0 {
        return violation(format!(
            "分块只覆盖了 {}/{} 个片段",
            segment_index,
            segments.len()
        ));
    }

    if config.smart && chunks.len() > 1 {
        for chunk in &chunks[..chunks.len() - 1] {
            if chunk.char_count < config.min_chars || chunk.char_count > config.max_chars {
                return violation(format!(
                    "分块 {} 字符数 {} 超出范围 [{}, {}]",
                    chunk.id, chunk.char_count, config.min_chars, config.max_chars
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(texts: &[&str]) -> Vec<TextSegment> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| TextSegment::new(i, i, 0, *text))
            .collect()
    }

    fn config(max: usize, min: usize) -> ChunkerConfig {
        ChunkerConfig {
            max_chars: max,
            min_chars: min,
            ..ChunkerConfig::default()
        }
    }

    #[test]
    fn test_sentence_scenario() {
        let input = segments(&["Sentence one. Sentence two. Sentence three."]);
        let chunks = Chunker::new(config(20, 5)).chunk(&input).unwrap();

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.trim()).collect();
        assert_eq!(texts, vec!["Sentence one.", "Sentence two.", "Sentence three."]);
        assert!(chunks.iter().all(|c| c.char_count <= 20));
    }

    #[test]
    fn test_force_cut_respects_char_boundaries() {
        let text = "数据".repeat(30);
        let input = segments(&[text.as_str()]);
        let chunks = Chunker::new(config(25, 5)).chunk(&input).unwrap();

        assert_eq!(chunks[0].char_count, 25);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_cjk_terminal_is_boundary() {
        let input = segments(&["第一句话。第二句话比较长一些。第三句"]);
        let chunks = Chunker::new(config(12, 2)).chunk(&input).unwrap();
        assert_eq!(chunks[0].text, "第一句话。");
    }

    #[test]
    fn test_chunks_span_segments_exactly() {
        let input = segments(&["Alpha beta gamma.\n", "Delta epsilon.\n", "Zeta eta theta iota kappa.\n"]);
        let chunks = Chunker::new(config(24, 4)).chunk(&input).unwrap();

        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        let original: String = input.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(joined, original);
        assert_eq!(chunks[0].text, "Alpha beta gamma.\n");
    }

    #[test]
    fn test_short_tail_merged_into_previous() {
        let input = segments(&["aaaa bbbb cccc. dd"]);
        let chunks = Chunker::new(config(16, 5)).chunk(&input).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "aaaa bbbb cccc. dd");
    }

    #[test]
    fn test_overlap_is_context_only() {
        let input = segments(&["One two three. Four five six. Seven eight nine."]);
        let mut cfg = config(16, 4);
        cfg.overlap_chars = 5;
        let chunks = Chunker::new(cfg).chunk(&input).unwrap();

        assert!(chunks[0].overlap.is_empty());
        assert_eq!(chunks[1].overlap, "ree. ");
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, input[0].text);
    }

    #[test]
    fn test_per_segment_mode() {
        let input = segments(&["a very long first segment that exceeds the limit\n", "b\n"]);
        let mut cfg = config(10, 5);
        cfg.smart = false;
        let chunks = Chunker::new(cfg).chunk(&input).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].segment_ids(), vec![1]);
    }

    #[test]
    fn test_empty_input() {
        assert!(Chunker::default().chunk(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_validation_detects_gap() {
        let input = segments(&["Hello world.\n"]);
        let mut chunks = Chunker::new(config(50, 1)).chunk(&input).unwrap();
        chunks[0].spans[0].end -= 1;
        chunks[0].text.pop();
        chunks[0].char_count -= 1;
        assert!(matches!(
            validate_chunks(&input, &chunks, &config(50, 1)),
            Err(TranslationError::ChunkingInvariantViolation(_))
        ));
    }
}
