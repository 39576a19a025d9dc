//! 命令行入口
//!
//! 在本地完成文档翻译，并把输出文件写入指定目录。传入多个文件时依次翻译，
//! 单个文件失败不影响其余文件，最后写出批量汇总报告。

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use doc_translator::env::{self, core::LogLevel, EnvVar};
use doc_translator::translation::rebuild::{BatchEntry, BatchOutcome, BatchReport};
use doc_translator::translation::{
    supported_providers, ConfigManager, Layout, MemoryStorage, OutputFormat, PipelineConfig,
    PipelineService, TaskStatus, TranslationError, TranslationResult,
};

#[derive(Parser, Debug)]
#[command(name = "doc-translator", version)]
#[command(about = "翻译 PDF / PPTX / DOCX / HTML / 文本文档并按所选排版输出")]
struct Args {
    /// 待翻译的文件，可传入多个
    #[arg(required_unless_present_any = ["list_providers", "env_help", "show_config"])]
    input: Vec<PathBuf>,

    /// 输出目录
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// 配置文件路径（TOML / JSON）
    #[arg(short, long)]
    config: Option<String>,

    /// 翻译提供商
    #[arg(short, long)]
    provider: Option<String>,

    /// 源语言，`auto` 表示自动检测
    #[arg(short, long)]
    source_lang: Option<String>,

    /// 目标语言
    #[arg(short, long)]
    target_lang: Option<String>,

    /// 输出格式，逗号分隔，`both` 表示 docx + pdf
    #[arg(short, long)]
    format: Option<String>,

    /// 排版方式: side_by_side / paragraph_by_paragraph / translation_only
    #[arg(short, long)]
    layout: Option<Layout>,

    /// 远程提供商的 API 密钥
    #[arg(long)]
    api_key: Option<String>,

    /// 并发工作者数量
    #[arg(long)]
    workers: Option<usize>,

    /// 每批分块数量
    #[arg(long)]
    batch_size: Option<usize>,

    /// 同时生成翻译报告
    #[arg(long)]
    report: bool,

    /// 关闭翻译缓存
    #[arg(long)]
    no_cache: bool,

    /// 列出支持的翻译提供商
    #[arg(long)]
    list_providers: bool,

    /// 显示环境变量说明
    #[arg(long)]
    env_help: bool,

    /// 以 TOML 输出合并后的生效配置
    #[arg(long)]
    show_config: bool,
}

impl Args {
    fn build_config(&self) -> TranslationResult<PipelineConfig> {
        let mut config = ConfigManager::load_unvalidated(self.config.as_deref())?;

        if let Some(provider) = &self.provider {
            config.provider = provider.clone();
        }
        if let Some(source) = &self.source_lang {
            config.source_language = source.clone();
        }
        if let Some(target) = &self.target_lang {
            config.target_language = target.clone();
        }
        if let Some(formats) = &self.format {
            config.output_formats = OutputFormat::parse_list(formats)?;
        }
        if let Some(layout) = self.layout {
            config.layout = layout;
        }
        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if self.report {
            config.generate_report = true;
        }
        if self.no_cache {
            config.cache_enabled = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_logging() {
    let level = LogLevel::get().unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::try_new(format!("doc_translator={}", level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 翻译单个文件并把输出写入目录
async fn translate_file(
    service: &PipelineService,
    input: &Path,
    output_dir: &Path,
    config: PipelineConfig,
) -> TranslationResult<BatchOutcome> {
    let bytes = tokio::fs::read(input).await?;
    let filename = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| TranslationError::InvalidInput(format!("无效的输入路径: {}", input.display())))?;

    let task_id = service.submit(&bytes, &filename, config)?;

    let mut last_step = String::new();
    let task = loop {
        let task = service.get_progress(&task_id)?;
        if task.current_step != last_step {
            eprintln!("[{:>5.1}%] {}", task.progress_percent, task.current_step);
            last_step = task.current_step.clone();
        }
        if task.is_terminal() {
            break task;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    };

    for warning in &task.warnings {
        eprintln!("⚠️  {}", warning);
    }

    if task.status != TaskStatus::Completed {
        return Err(TranslationError::InternalError(
            task.error.unwrap_or_else(|| "任务未完成".to_string()),
        ));
    }

    tokio::fs::create_dir_all(output_dir).await?;
    let mut output_files = Vec::with_capacity(task.outputs.len());
    for output in &task.outputs {
        let content = service.storage().read(&output.content_ref)?;
        let path = output_dir.join(&output.filename);
        tokio::fs::write(&path, content).await?;
        println!("{} ({} 字节)", path.display(), output.size_bytes);
        output_files.push(output.filename.clone());
    }

    let (original_text_count, translated_text_count) = match &task.result {
        Some(result) => {
            eprintln!(
                "✅ 完成: {} 个片段, {} 个已翻译, 用时 {:.2} 秒, 提供商 {}",
                result.original_text_count,
                result.translated_text_count,
                result.processing_time_secs,
                result.provider
            );
            (result.original_text_count, result.translated_text_count)
        }
        None => (0, 0),
    };

    Ok(BatchOutcome::Succeeded {
        original_text_count,
        translated_text_count,
        output_files,
    })
}

async fn run(args: Args) -> TranslationResult<()> {
    if args.input.is_empty() {
        return Err(TranslationError::InvalidInput("缺少输入文件".to_string()));
    }
    let config = args.build_config()?;
    let service = PipelineService::new(Arc::new(MemoryStorage::new()))?;

    if let [input] = args.input.as_slice() {
        translate_file(&service, input, &args.output_dir, config).await?;
        return Ok(());
    }

    let total = args.input.len();
    let mut entries = Vec::with_capacity(total);
    for (index, input) in args.input.iter().enumerate() {
        eprintln!("处理进度: {}/{} - {}", index + 1, total, input.display());
        let started = std::time::Instant::now();
        let outcome = match translate_file(&service, input, &args.output_dir, config.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("❌ {}: {}", input.display(), e);
                BatchOutcome::Failed { error: e.to_string() }
            }
        };
        entries.push(BatchEntry {
            document_name: input
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| input.display().to_string()),
            processing_time_secs: started.elapsed().as_secs_f64(),
            outcome,
        });
    }

    let report = BatchReport::new(entries);
    tokio::fs::create_dir_all(&args.output_dir).await?;
    let path = args.output_dir.join(BatchReport::filename(chrono::Utc::now()));
    tokio::fs::write(&path, report.render()).await?;
    println!("{}", path.display());

    if report.failed_count() > 0 {
        return Err(TranslationError::InternalError(format!(
            "{} 个文件中有 {} 个翻译失败",
            total,
            report.failed_count()
        )));
    }
    Ok(())
}

fn show_config(args: &Args) -> TranslationResult<String> {
    ConfigManager::from(args.build_config()?).to_toml_string()
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.list_providers {
        for provider in supported_providers() {
            println!("{}", provider);
        }
        return ExitCode::SUCCESS;
    }

    if args.env_help {
        println!("{}", env::generate_env_docs());
        return ExitCode::SUCCESS;
    }

    if args.show_config {
        return match show_config(&args) {
            Ok(text) => {
                print!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ {}", e);
                ExitCode::FAILURE
            }
        };
    }

    init_logging();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
