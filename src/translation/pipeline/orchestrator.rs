//! 批次调度器
//!
//! 驱动一个任务所有分块的翻译：
//!
//! - **分组**: 按动态批次大小把相邻分块组成批次，不超过翻译器单次上限
//! - **并发**: `max_workers == 1` 时严格顺序执行，否则由信号量限制并发批次数
//! - **限速**: 同一翻译器实例的相邻两次调用至少间隔 `delay_between_requests`
//! - **重试**: 每次调用都带超时，瞬时错误按 [`RetryPolicy`] 退避重试
//! - **降级**: 重试耗尽后按 [`FailurePolicy`] 保留原文或终止任务
//! - **进度**: 每个分块完成后更新 [`ProgressTracker`]，批次之间检查取消标志

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};

use super::progress::ProgressTracker;
use crate::translation::config::{FailurePolicy, PipelineConfig};
use crate::translation::core::{dynamic_batch_size, ProviderKind, RetryPolicy, TranslationUnit, Translator};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::model::{Chunk, Translation};

/// 调度配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub source_language: String,
    pub target_language: String,
    pub batch_size: usize,
    pub max_workers: usize,
    pub delay_between_requests: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub failure_policy: FailurePolicy,
}

impl From<&PipelineConfig> for OrchestratorConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            source_language: config.source_language.clone(),
            target_language: config.target_language.clone(),
            batch_size: config.batch_size,
            max_workers: config.max_workers,
            delay_between_requests: config.delay_between_requests(),
            request_timeout: config.request_timeout(),
            retry: RetryPolicy::from(config),
            failure_policy: config.failure_policy,
        }
    }
}

/// 请求间隔闸门
///
/// 持有锁期间等待，因此并发的调用方也会被依次放行。
struct RequestGate {
    delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RequestGate {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_call: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

/// 批次调度器
pub struct BatchOrchestrator {
    config: OrchestratorConfig,
    tracker: Arc<ProgressTracker>,
    cancel_flag: Option<Arc<AtomicBool>>,
}

struct RunContext<'a> {
    task_id: &'a str,
    translator: &'a dyn Translator,
    gate: RequestGate,
    aborted: AtomicBool,
}

impl BatchOrchestrator {
    pub fn new(config: OrchestratorConfig, tracker: Arc<ProgressTracker>) -> Self {
        Self {
            config,
            tracker,
            cancel_flag: None,
        }
    }

    /// 设置协作式取消标志，批次之间检查
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    /// 计算批次划分（每个批次为分块下标区间）
    pub fn plan_batches(&self, chunks: &[Chunk], translator: &dyn Translator) -> Vec<std::ops::Range<usize>> {
        let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        let sized = match ProviderKind::from_id(translator.provider_id()) {
            Ok(kind) => dynamic_batch_size(kind, self.config.batch_size, &texts),
            Err(_) => self.config.batch_size.max(1),
        };
        let size = sized.min(translator.max_batch_size().max(1)).max(1);

        (0..chunks.len())
            .step_by(size)
            .map(|start| start..(start + size).min(chunks.len()))
            .collect()
    }

    /// 翻译全部分块，返回按分块顺序排列的翻译记录
    pub async fn run(
        &self,
        task_id: &str,
        chunks: &[Chunk],
        translator: Arc<dyn Translator>,
    ) -> TranslationResult<Vec<Translation>> {
        translator.check_languages(&self.config.source_language, &self.config.target_language)?;
        self.tracker.set_total_units(task_id, chunks.len())?;

        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let batches = self.plan_batches(chunks, translator.as_ref());
        let workers = self.config.max_workers.max(1);
        tracing::info!(
            "开始翻译 {} 个分块: {} 个批次, 并发 {}, 提供商 {}",
            chunks.len(),
            batches.len(),
            workers,
            translator.provider_id()
        );

        let context = RunContext {
            task_id,
            translator: translator.as_ref(),
            gate: RequestGate::new(self.config.delay_between_requests),
            aborted: AtomicBool::new(false),
        };

        let mut translations: Vec<Translation> = Vec::with_capacity(chunks.len());

        if workers == 1 {
            for range in batches {
                let batch = self.process_batch(&context, &chunks[range]).await?;
                translations.extend(batch);
            }
        } else {
            let semaphore = Semaphore::new(workers);
            let futures = batches.into_iter().map(|range| {
                let semaphore = &semaphore;
                let context = &context;
                async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|e| TranslationError::InternalError(format!("并发信号量已关闭: {}", e)))?;
                    self.process_batch(context, &chunks[range]).await
                }
            });

            for result in futures::future::join_all(futures).await {
                translations.extend(result?);
            }
        }

        translations.sort_by_key(|translation| translation.chunk_id);
        let degraded = translations.iter().filter(|t| !t.succeeded).count();
        tracing::info!(
            "翻译阶段完成: {} 个分块成功, {} 个降级为原文",
            translations.len() - degraded,
            degraded
        );
        Ok(translations)
    }

    async fn process_batch(
        &self,
        context: &RunContext<'_>,
        batch: &[Chunk],
    ) -> TranslationResult<Vec<Translation>> {
        if context.aborted.load(Ordering::SeqCst) {
            return Err(TranslationError::Cancelled("其他批次已失败，停止后续翻译".to_string()));
        }
        if self.is_cancelled() {
            context.aborted.store(true, Ordering::SeqCst);
            return Err(TranslationError::Cancelled(format!("任务 {} 已被取消", context.task_id)));
        }

        let (result, attempts) = self.translate_with_retry(context, batch).await;

        let translations = match result {
            Ok(texts) => batch
                .iter()
                .zip(texts)
                .map(|(chunk, translated)| Translation {
                    chunk_id: chunk.id,
                    source_text: chunk.text.clone(),
                    translated_text: translated,
                    provider: context.translator.provider_id().to_string(),
                    succeeded: true,
                    attempts,
                })
                .collect(),
            Err(e) if e.is_retryable() && batch.len() > 1 => {
                tracing::warn!("批次翻译失败，改为逐个分块重试: {}", e);
                let mut translations = Vec::with_capacity(batch.len());
                for chunk in batch {
                    let (single, single_attempts) =
                        self.translate_with_retry(context, std::slice::from_ref(chunk)).await;
                    let single = single.and_then(|mut texts| {
                        texts.pop().ok_or_else(|| {
                            TranslationError::ProviderPermanent("翻译器返回空结果".to_string())
                        })
                    });
                    translations.push(self.settle(context, chunk, single, attempts + single_attempts)?);
                }
                translations
            }
            Err(e) => {
                let mut translations = Vec::with_capacity(batch.len());
                for chunk in batch {
                    translations.push(self.settle(context, chunk, Err(e.clone()), attempts)?);
                }
                translations
            }
        };

        for translation in &translations {
            if translation.succeeded {
                metrics::counter!("doctrans_chunks_translated_total").increment(1);
            }
            self.tracker.complete_unit(context.task_id)?;
        }

        Ok(translations)
    }

    async fn translate_with_retry(
        &self,
        context: &RunContext<'_>,
        batch: &[Chunk],
    ) -> (TranslationResult<Vec<String>>, u32) {
        let uses_context = context.translator.uses_context();
        let units: Vec<TranslationUnit> = batch
            .iter()
            .map(|chunk| {
                let unit = TranslationUnit::new(chunk.text.clone());
                if uses_context {
                    unit.with_context(chunk.overlap.clone())
                } else {
                    unit
                }
            })
            .collect();

        let label = match (batch.first(), batch.last()) {
            (Some(first), Some(last)) if first.id != last.id => format!("分块 {}-{}", first.id, last.id),
            (Some(first), _) => format!("分块 {}", first.id),
            _ => "空批次".to_string(),
        };

        let translator = context.translator;
        let gate = &context.gate;
        let units = &units;
        let source = self.config.source_language.as_str();
        let target = self.config.target_language.as_str();
        let request_timeout = self.config.request_timeout;

        let outcome = self
            .config
            .retry
            .run(&label, |_attempt| async move {
                if translator.needs_request(units, source, target) {
                    gate.wait().await;
                }
                match tokio::time::timeout(request_timeout, translator.translate_units(units, source, target)).await {
                    Ok(result) => result,
                    Err(elapsed) => Err(elapsed.into()),
                }
            })
            .await;

        (outcome.result, outcome.attempts)
    }

    /// 单个分块最终结果：成功、降级为原文或终止任务
    ///
    /// 只有提供商错误可以降级，其余错误总是终止任务。
    fn settle(
        &self,
        context: &RunContext<'_>,
        chunk: &Chunk,
        result: TranslationResult<String>,
        attempts: u32,
    ) -> TranslationResult<Translation> {
        let provider = context.translator.provider_id().to_string();
        match result {
            Ok(translated) => Ok(Translation {
                chunk_id: chunk.id,
                source_text: chunk.text.clone(),
                translated_text: translated,
                provider,
                succeeded: true,
                attempts,
            }),
            Err(e) => match self.config.failure_policy {
                FailurePolicy::DegradeToSource if !e.is_fatal() => {
                    let warning = format!("分块 {} 翻译失败，已保留原文: {}", chunk.id, e);
                    tracing::warn!("{}", warning);
                    metrics::counter!("doctrans_chunks_degraded_total").increment(1);
                    self.tracker.add_warning(context.task_id, warning)?;
                    Ok(Translation {
                        chunk_id: chunk.id,
                        source_text: chunk.text.clone(),
                        translated_text: chunk.text.clone(),
                        provider,
                        succeeded: false,
                        attempts,
                    })
                }
                _ => {
                    context.aborted.store(true, Ordering::SeqCst);
                    tracing::error!("分块 {} 翻译失败，终止任务: {}", chunk.id, e);
                    Err(e.with_context(format!("分块 {}", chunk.id)))
                }
            },
        }
    }
}
