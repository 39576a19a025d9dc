//! 流水线服务
//!
//! 对外暴露 `start` / `get_progress` / `cancel` 三个操作，把解析、分块、
//! 翻译、重建与存储串成一个后台任务。
//!
//! ## 核心功能
//!
//! - **启动前校验**: 配置、文件大小与输出格式在返回任务标识前检查
//! - **文档互斥**: 以输入内容的 SHA-256 作为文档标识，同一文档同一时刻只允许一个未结束的任务
//! - **阶段推进**: 解析 → 分块 → 翻译 → 重建，每个阶段只在前一阶段成功后开始
//! - **协作式取消**: 取消标记在阶段之间和每个批次开始前检查
//! - **统计**: 原子计数器记录任务与分块数量，可随时取快照
//!
//! 后台任务运行在 tokio 运行时上，CPU 密集的解析与重建通过 `spawn_blocking` 执行。

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

use super::{create_translator, CachedTranslator, Translator};
use crate::translation::config::PipelineConfig;
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::model::{
    DocumentFormat, OutputFile, OutputFormat, ProcessingResult, Task, TaskStatus,
};
use crate::translation::parsers::ParserRegistry;
use crate::translation::pipeline::{BatchOrchestrator, Chunker, OrchestratorConfig, ProgressTracker};
use crate::translation::rebuild::{self, DocumentRebuilder, RebuildRequest, ReportData, ReportGenerator};
use crate::translation::storage::{FileStorage, TranslationCache};

/// 按配置构造翻译器的工厂
pub type TranslatorFactory =
    Arc<dyn Fn(&PipelineConfig) -> TranslationResult<Arc<dyn Translator>> + Send + Sync>;

/// 服务统计
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub tasks_started: AtomicUsize,
    pub tasks_completed: AtomicUsize,
    pub tasks_failed: AtomicUsize,
    pub tasks_rejected: AtomicUsize,
    pub segments_parsed: AtomicUsize,
    pub chunks_translated: AtomicUsize,
    pub chunks_degraded: AtomicUsize,
    pub output_bytes: AtomicUsize,
    /// 累计处理时间（微秒）
    pub processing_time: AtomicU64,
}

impl ServiceStats {
    fn add_processing_time(&self, duration: Duration) {
        self.processing_time
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            tasks_started: self.tasks_started.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
            segments_parsed: self.segments_parsed.load(Ordering::Relaxed),
            chunks_translated: self.chunks_translated.load(Ordering::Relaxed),
            chunks_degraded: self.chunks_degraded.load(Ordering::Relaxed),
            output_bytes: self.output_bytes.load(Ordering::Relaxed),
            processing_time: Duration::from_micros(self.processing_time.load(Ordering::Relaxed)),
        }
    }
}

/// 统计快照
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ServiceStatsSnapshot {
    pub tasks_started: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub tasks_rejected: usize,
    pub segments_parsed: usize,
    pub chunks_translated: usize,
    pub chunks_degraded: usize,
    pub output_bytes: usize,
    pub processing_time: Duration,
}

/// 单个任务的执行参数
struct Job {
    task_id: String,
    document_id: String,
    title: String,
    format: DocumentFormat,
    bytes: Arc<Vec<u8>>,
    config: PipelineConfig,
    cancel: Arc<AtomicBool>,
}

/// 文档翻译流水线服务
#[derive(Clone)]
pub struct PipelineService {
    storage: Arc<dyn FileStorage>,
    tracker: Arc<ProgressTracker>,
    parsers: Arc<ParserRegistry>,
    /// 文档标识 → 未结束的任务标识
    active_documents: Arc<DashMap<String, String>>,
    cancel_flags: Arc<DashMap<String, Arc<AtomicBool>>>,
    /// 任务标识 → 由 `submit` 保存的上传文件引用
    uploads: Arc<DashMap<String, String>>,
    translator_factory: TranslatorFactory,
    cache: Arc<OnceLock<Arc<TranslationCache>>>,
    stats: Arc<ServiceStats>,
}

impl PipelineService {
    pub fn new(storage: Arc<dyn FileStorage>) -> TranslationResult<Self> {
        Ok(Self {
            storage,
            tracker: Arc::new(ProgressTracker::new()),
            parsers: Arc::new(ParserRegistry::with_defaults()?),
            active_documents: Arc::new(DashMap::new()),
            cancel_flags: Arc::new(DashMap::new()),
            uploads: Arc::new(DashMap::new()),
            translator_factory: Arc::new(create_translator),
            cache: Arc::new(OnceLock::new()),
            stats: Arc::new(ServiceStats::default()),
        })
    }

    /// 替换翻译器工厂
    pub fn with_translator_factory(mut self, factory: TranslatorFactory) -> Self {
        self.translator_factory = factory;
        self
    }

    pub fn storage(&self) -> &Arc<dyn FileStorage> {
        &self.storage
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    pub fn stats(&self) -> ServiceStatsSnapshot {
        self.stats.snapshot()
    }

    /// 文档标识：输入内容的 SHA-256
    pub fn document_id(bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        digest.iter().map(|byte| format!("{:02x}", byte)).collect()
    }

    /// 保存上传内容并启动任务
    ///
    /// 格式与大小在写入存储之前检查；启动失败时删除已保存的上传文件。
    pub fn submit(&self, bytes: &[u8], filename: &str, config: PipelineConfig) -> TranslationResult<String> {
        let checked = config
            .validate()
            .and_then(|_| self.check_input(filename, bytes.len(), &config));
        if let Err(e) = checked {
            self.stats.tasks_rejected.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }

        let file_ref = self.storage.store(bytes, filename)?;
        match self.start(&file_ref, config) {
            Ok(task_id) => {
                self.uploads.insert(task_id.clone(), file_ref);
                Ok(task_id)
            }
            Err(e) => {
                self.discard(&file_ref);
                Err(e)
            }
        }
    }

    /// 清理结束时间早于 `retention` 的终态任务及其文件，返回清理数量
    pub fn prune_finished(&self, retention: Duration) -> usize {
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return 0;
        };
        let cutoff = Utc::now() - retention;

        let mut removed = 0;
        for task in self.tracker.list() {
            if !task.is_terminal() || task.updated_at > cutoff {
                continue;
            }
            if self.tracker.remove(&task.id).is_none() {
                continue;
            }
            for output in &task.outputs {
                self.discard(&output.content_ref);
            }
            if let Some((_, upload)) = self.uploads.remove(&task.id) {
                self.discard(&upload);
            }
            removed += 1;
        }

        if removed > 0 {
            tracing::info!("已清理 {} 个过期任务", removed);
        }
        removed
    }

    fn discard(&self, file_ref: &str) {
        if let Err(e) = self.storage.delete(file_ref) {
            tracing::warn!("无法删除文件 {}: {}", file_ref, e);
        }
    }

    /// 仅凭文件名、大小与配置即可判定的拒绝条件
    fn check_input(&self, filename: &str, size: usize, config: &PipelineConfig) -> TranslationResult<DocumentFormat> {
        let format = DocumentFormat::from_filename(filename)?;
        if !self.parsers.supports(format) {
            return Err(TranslationError::UnsupportedFormat(format.to_string()));
        }

        if config.output_formats.contains(&OutputFormat::Pptx) && format != DocumentFormat::Pptx {
            return Err(TranslationError::InvalidInput(format!(
                "PPTX 输出只支持 PPTX 输入，当前输入为 {}",
                format
            )));
        }

        if size > config.max_file_size {
            return Err(TranslationError::InvalidInput(format!(
                "文件大小 {} 字节超过上限 {} 字节",
                size, config.max_file_size
            )));
        }
        Ok(format)
    }

    /// 启动翻译任务，返回任务标识
    ///
    /// 所有可在启动前发现的问题都在这里返回错误，此时不会创建任务。
    pub fn start(&self, file_ref: &str, config: PipelineConfig) -> TranslationResult<String> {
        let result = self.prepare(file_ref, config);
        if result.is_err() {
            self.stats.tasks_rejected.fetch_add(1, Ordering::Relaxed);
        }
        let job = result?;
        let task_id = job.task_id.clone();

        self.stats.tasks_started.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            "任务 {} 已创建: {} ({}, {} 字节)",
            task_id,
            job.title,
            job.format,
            job.bytes.len()
        );

        let service = self.clone();
        tokio::spawn(async move {
            service.execute(job).await;
        });

        Ok(task_id)
    }

    fn prepare(&self, file_ref: &str, config: PipelineConfig) -> TranslationResult<Job> {
        config.validate()?;

        let filename = self
            .storage
            .file_name(file_ref)
            .ok_or_else(|| TranslationError::StorageError(format!("文件引用不存在: {}", file_ref)))?;
        let bytes = self.storage.read(file_ref)?;
        let format = self.check_input(&filename, bytes.len(), &config)?;

        let document_id = Self::document_id(&bytes);
        let task_id = uuid::Uuid::new_v4().to_string();

        match self.active_documents.entry(document_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                return Err(TranslationError::DocumentBusy(format!(
                    "文档 {} 已有进行中的任务 {}",
                    filename,
                    existing.get()
                )));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(task_id.clone());
            }
        }

        self.tracker.create(&task_id, &document_id);
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel_flags.insert(task_id.clone(), cancel.clone());

        let title = filename
            .rsplit_once('.')
            .map_or(filename.as_str(), |(stem, _)| stem)
            .to_string();

        Ok(Job {
            task_id,
            document_id,
            title,
            format,
            bytes: Arc::new(bytes),
            config,
            cancel,
        })
    }

    /// 查询任务进度
    pub fn get_progress(&self, task_id: &str) -> TranslationResult<Task> {
        self.tracker.get(task_id)
    }

    /// 请求取消任务，任务已结束时返回 `false`
    pub fn cancel(&self, task_id: &str) -> TranslationResult<bool> {
        let task = self.tracker.get(task_id)?;
        if task.is_terminal() {
            return Ok(false);
        }
        match self.cancel_flags.get(task_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                tracing::info!("任务 {} 已请求取消", task_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 运行任务直到结束
    ///
    /// 文档占用在写入终态之前释放，观察到终态的调用方可以立即重新提交。
    async fn execute(&self, job: Job) {
        let started = Instant::now();
        let task_id = job.task_id.as_str();
        let outcome = self.run_stages(&job, started).await;

        self.stats.add_processing_time(started.elapsed());
        self.cancel_flags.remove(task_id);
        self.active_documents
            .remove_if(&job.document_id, |_, active| active == task_id);

        let finished = match outcome {
            Ok((outputs, result)) => {
                self.stats.tasks_completed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("doctrans_tasks_completed_total").increment(1);
                tracing::info!("任务 {} 完成，用时 {:.2} 秒", task_id, started.elapsed().as_secs_f64());
                self.tracker.complete(task_id, outputs, result)
            }
            Err(e) => {
                self.stats.tasks_failed.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("doctrans_tasks_failed_total").increment(1);
                helpers::log_error(&format!("任务 {} 失败", task_id), &e);
                self.tracker.fail(task_id, &e)
            }
        };

        if let Err(update) = finished {
            tracing::error!("无法更新任务 {} 状态: {}", task_id, update);
        }
    }

    fn check_cancelled(job: &Job) -> TranslationResult<()> {
        if job.cancel.load(Ordering::SeqCst) {
            return Err(TranslationError::Cancelled(format!("任务 {}", job.task_id)));
        }
        Ok(())
    }

    fn translator_for(&self, config: &PipelineConfig) -> TranslationResult<Arc<dyn Translator>> {
        let translator = (self.translator_factory)(config)?;
        if !config.cache_enabled {
            return Ok(translator);
        }
        let cache = self
            .cache
            .get_or_init(|| Arc::new(TranslationCache::new(config.cache_size)))
            .clone();
        Ok(Arc::new(CachedTranslator::new(translator, cache)))
    }

    async fn run_stages(
        &self,
        job: &Job,
        started: Instant,
    ) -> TranslationResult<(Vec<OutputFile>, ProcessingResult)> {
        let task_id = job.task_id.as_str();
        let config = &job.config;

        // 解析
        self.tracker.transition(task_id, TaskStatus::Parsing)?;
        let parsers = self.parsers.clone();
        let bytes = job.bytes.clone();
        let format = job.format;
        let parsed = tokio::task::spawn_blocking(move || parsers.parse(format, &bytes))
            .await
            .map_err(|e| TranslationError::InternalError(format!("解析线程异常: {}", e)))??;
        self.tracker.add_warnings(task_id, &parsed.warnings)?;
        self.stats
            .segments_parsed
            .fetch_add(parsed.segments.len(), Ordering::Relaxed);
        Self::check_cancelled(job)?;

        // 分块
        self.tracker.transition(task_id, TaskStatus::Chunking)?;
        let chunker = Chunker::new(config.into());
        let chunks = chunker.chunk(&parsed.segments)?;
        tracing::info!("任务 {}: {} 个片段切分为 {} 个分块", task_id, parsed.segments.len(), chunks.len());
        Self::check_cancelled(job)?;

        // 翻译
        self.tracker.transition(task_id, TaskStatus::Translating)?;
        let translator = self.translator_for(config)?;
        let provider = translator.provider_id().to_string();
        if !translator.is_available().await {
            return Err(TranslationError::ProviderPermanent(format!("翻译服务 {} 不可用", provider)));
        }
        let orchestrator = BatchOrchestrator::new(OrchestratorConfig::from(config), self.tracker.clone())
            .with_cancel_flag(job.cancel.clone());
        let translations = orchestrator.run(task_id, &chunks, translator).await?;

        let degraded = translations.iter().filter(|t| !t.succeeded).count();
        self.stats
            .chunks_translated
            .fetch_add(translations.len() - degraded, Ordering::Relaxed);
        self.stats.chunks_degraded.fetch_add(degraded, Ordering::Relaxed);
        Self::check_cancelled(job)?;

        // 重建
        self.tracker.transition(task_id, TaskStatus::Rebuilding)?;
        let aligned = rebuild::align(&parsed.segments, &chunks, &translations)?;
        let translated_count = aligned.iter().filter(|item| item.succeeded).count();
        let result = ProcessingResult {
            processing_time_secs: started.elapsed().as_secs_f64(),
            original_text_count: parsed.segments.len(),
            translated_text_count: translated_count,
            degraded_count: degraded,
            provider,
            timestamp: Utc::now(),
        };

        let rebuilder = DocumentRebuilder::from(config);
        let rendered = {
            let title = job.title.clone();
            let layout = config.layout;
            let formats = config.output_formats.clone();
            let source_format = job.format;
            let source_bytes = job.bytes.clone();
            let segments = parsed.segments.clone();
            tokio::task::spawn_blocking(move || {
                rebuilder.rebuild(&RebuildRequest {
                    title: &title,
                    segments: &segments,
                    chunks: &chunks,
                    translations: &translations,
                    layout,
                    formats: &formats,
                    source_format,
                    source_bytes: &source_bytes,
                })
            })
            .await
            .map_err(|e| TranslationError::InternalError(format!("重建线程异常: {}", e)))??
        };

        self.tracker
            .set_step(task_id, format!("保存 {} 个输出文件", rendered.len()))?;
        let mut outputs = Vec::with_capacity(rendered.len() + 1);
        for output in rendered {
            let content_ref = self.storage.store(&output.bytes, &output.filename)?;
            self.stats
                .output_bytes
                .fetch_add(output.bytes.len(), Ordering::Relaxed);
            outputs.push(OutputFile {
                format: output.format,
                layout: output.layout,
                filename: output.filename,
                content_ref,
                size_bytes: output.bytes.len(),
            });
        }

        if config.generate_report {
            self.tracker.set_step(task_id, "生成翻译报告")?;
            let warnings = self.tracker.get(task_id)?.warnings;
            let data = ReportData::from_result(
                &job.title,
                &config.source_language,
                &config.target_language,
                &result,
                &aligned,
                &warnings,
            );
            let bytes = ReportGenerator::generate(&data)?;
            let filename = format!("{}_report.docx", job.title);
            let content_ref = self.storage.store(&bytes, &filename)?;
            outputs.push(OutputFile {
                format: OutputFormat::Docx,
                layout: config.layout,
                filename,
                content_ref,
                size_bytes: bytes.len(),
            });
        }

        Ok((outputs, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::core::TranslationUnit;
    use crate::translation::model::Layout;
    use crate::translation::storage::MemoryStorage;
    use async_trait::async_trait;

    struct EchoTranslator;

    #[async_trait]
    impl Translator for EchoTranslator {
        fn provider_id(&self) -> &str {
            "echo"
        }

        fn check_languages(&self, _: &str, _: &str) -> TranslationResult<()> {
            Ok(())
        }

        async fn translate_non_empty(
            &self,
            units: &[TranslationUnit],
            _: &str,
            _: &str,
        ) -> TranslationResult<Vec<String>> {
            Ok(units.iter().map(|unit| unit.text.clone()).collect())
        }
    }

    fn service() -> PipelineService {
        PipelineService::new(Arc::new(MemoryStorage::new()))
            .unwrap()
            .with_translator_factory(Arc::new(|_: &PipelineConfig| Ok(Arc::new(EchoTranslator) as Arc<dyn Translator>)))
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            source_language: "en".into(),
            output_formats: vec![OutputFormat::Text],
            layout: Layout::TranslationOnly,
            delay_between_requests_ms: 0,
            ..PipelineConfig::default()
        }
    }

    async fn wait_terminal(service: &PipelineService, task_id: &str) -> Task {
        for _ in 0..500 {
            let task = service.get_progress(task_id).unwrap();
            if task.is_terminal() {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("任务 {} 未在预期时间内结束", task_id);
    }

    #[test]
    fn test_document_id_is_sha256() {
        assert_eq!(
            PipelineService::document_id(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_echo_pipeline_round_trips_text() {
        let service = service();
        let source = "First paragraph.\n\nSecond paragraph.\n";
        let task_id = service.submit(source.as_bytes(), "notes.txt", config()).unwrap();

        let task = wait_terminal(&service, &task_id).await;
        assert_eq!(task.status, TaskStatus::Completed, "错误: {:?}", task.error);
        assert_eq!(task.progress_percent, 100.0);
        assert_eq!(task.outputs.len(), 1);

        let output = &task.outputs[0];
        assert_eq!(output.filename, "notes_translated.txt");
        let bytes = service.storage().read(&output.content_ref).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), source);

        let result = task.result.unwrap();
        assert_eq!(result.original_text_count, 2);
        assert_eq!(result.provider, "echo");
        assert_eq!(service.stats().tasks_completed, 1);
    }

    #[tokio::test]
    async fn test_rejections_happen_before_task_creation() {
        let service = service();

        let mut too_small = config();
        too_small.max_file_size = 4;
        assert!(matches!(
            service.submit(b"longer than four", "a.txt", too_small),
            Err(TranslationError::InvalidInput(_))
        ));

        let mut pptx_out = config();
        pptx_out.output_formats = vec![OutputFormat::Pptx];
        assert!(matches!(
            service.submit(b"text", "a.txt", pptx_out),
            Err(TranslationError::InvalidInput(_))
        ));

        assert!(matches!(
            service.submit(b"text", "a.xlsx", config()),
            Err(TranslationError::UnsupportedFormat(_))
        ));

        assert!(service.tracker().is_empty());
        assert_eq!(service.stats().tasks_rejected, 3);
    }

    struct OfflineTranslator;

    #[async_trait]
    impl Translator for OfflineTranslator {
        fn provider_id(&self) -> &str {
            "offline"
        }

        async fn is_available(&self) -> bool {
            false
        }

        fn check_languages(&self, _: &str, _: &str) -> TranslationResult<()> {
            Ok(())
        }

        async fn translate_non_empty(&self, _: &[TranslationUnit], _: &str, _: &str) -> TranslationResult<Vec<String>> {
            panic!("不可用的后端不应被调用");
        }
    }

    #[tokio::test]
    async fn test_unavailable_provider_fails_task() {
        let service = PipelineService::new(Arc::new(MemoryStorage::new()))
            .unwrap()
            .with_translator_factory(Arc::new(|_: &PipelineConfig| Ok(Arc::new(OfflineTranslator) as Arc<dyn Translator>)));
        let task_id = service.submit(b"Hello there.\n", "hello.txt", config()).unwrap();

        let task = wait_terminal(&service, &task_id).await;
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().contains("offline 不可用"));
        assert!(task.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_report_is_stored_when_requested() {
        let service = service();
        let mut config = config();
        config.generate_report = true;
        let task_id = service.submit(b"Hello there.\n", "hello.md", config).unwrap();

        let task = wait_terminal(&service, &task_id).await;
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.outputs.iter().any(|o| o.filename == "hello_report.docx"));
    }

    #[tokio::test]
    async fn test_rejected_upload_not_stored() {
        let storage = Arc::new(MemoryStorage::new());
        let service = PipelineService::new(storage.clone())
            .unwrap()
            .with_translator_factory(Arc::new(|_: &PipelineConfig| Ok(Arc::new(EchoTranslator) as Arc<dyn Translator>)));

        assert!(service.submit(b"cells", "sheet.xlsx", config()).is_err());
        let mut tiny = config();
        tiny.max_file_size = 2;
        assert!(service.submit(b"too big", "a.txt", tiny).is_err());
        assert!(storage.is_empty(), "被拒绝的上传不应写入存储");

        let source = b"Same document.\n";
        let first = service.submit(source, "a.txt", config()).unwrap();
        let busy = service.submit(source, "b.txt", config());
        assert!(matches!(busy, Err(TranslationError::DocumentBusy(_))));
        wait_terminal(&service, &first).await;
        assert_eq!(storage.len(), 2, "只保留第一次上传和它的输出");
    }

    #[tokio::test]
    async fn test_prune_finished_removes_task_and_files() {
        let storage = Arc::new(MemoryStorage::new());
        let service = PipelineService::new(storage.clone())
            .unwrap()
            .with_translator_factory(Arc::new(|_: &PipelineConfig| Ok(Arc::new(EchoTranslator) as Arc<dyn Translator>)));

        let task_id = service.submit(b"Prune me.\n", "old.txt", config()).unwrap();
        let task = wait_terminal(&service, &task_id).await;
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(storage.len(), 2);

        assert_eq!(service.prune_finished(Duration::from_secs(3600)), 0, "未过期的任务保留");
        assert_eq!(service.prune_finished(Duration::ZERO), 1);
        assert!(service.tracker().is_empty());
        assert!(storage.is_empty());
        assert!(matches!(service.get_progress(&task_id), Err(TranslationError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_unknown_task() {
        let service = service();
        assert!(matches!(service.cancel("missing"), Err(TranslationError::TaskNotFound(_))));
    }
}
