// 集成测试公共模块
//
// 提供模拟翻译器、测试文档构造、模拟 HTTP 服务和断言辅助工具

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use zip::write::FileOptions;
use zip::ZipWriter;

use doc_translator::translation::core::TranslationUnit;
use doc_translator::translation::{
    FailurePolicy, Layout, MemoryStorage, OutputFormat, PipelineConfig, PipelineService, Task,
    TranslationError, TranslationResult, Translator,
};

/// 原样返回输入的翻译器
pub struct IdentityTranslator;

#[async_trait]
impl Translator for IdentityTranslator {
    fn provider_id(&self) -> &str {
        "identity"
    }

    fn max_batch_size(&self) -> usize {
        8
    }

    fn check_languages(&self, _source: &str, _target: &str) -> TranslationResult<()> {
        Ok(())
    }

    async fn translate_non_empty(
        &self,
        units: &[TranslationUnit],
        _source: &str,
        _target: &str,
    ) -> TranslationResult<Vec<String>> {
        Ok(units.iter().map(|unit| unit.text.clone()).collect())
    }
}

/// 转为大写并统计调用次数的翻译器
#[derive(Default)]
pub struct UppercaseTranslator {
    pub calls: AtomicUsize,
    pub units: AtomicUsize,
}

#[async_trait]
impl Translator for UppercaseTranslator {
    fn provider_id(&self) -> &str {
        "uppercase"
    }

    fn max_batch_size(&self) -> usize {
        4
    }

    fn check_languages(&self, _source: &str, target: &str) -> TranslationResult<()> {
        if target == "xx" {
            return Err(TranslationError::UnsupportedLanguage(target.to_string()));
        }
        Ok(())
    }

    async fn translate_non_empty(
        &self,
        units: &[TranslationUnit],
        _source: &str,
        _target: &str,
    ) -> TranslationResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.units.fetch_add(units.len(), Ordering::SeqCst);
        Ok(units.iter().map(|unit| unit.text.to_uppercase()).collect())
    }
}

/// 去除首尾空白后转为大写，与远程服务回复的形态一致
pub struct TrimmingTranslator;

#[async_trait]
impl Translator for TrimmingTranslator {
    fn provider_id(&self) -> &str {
        "trimming"
    }

    fn check_languages(&self, _source: &str, _target: &str) -> TranslationResult<()> {
        Ok(())
    }

    async fn translate_non_empty(
        &self,
        units: &[TranslationUnit],
        _source: &str,
        _target: &str,
    ) -> TranslationResult<Vec<String>> {
        Ok(units.iter().map(|unit| unit.text.trim().to_uppercase()).collect())
    }
}

/// 总是失败的翻译器
pub struct FailingTranslator {
    pub transient: bool,
    pub calls: AtomicUsize,
}

impl FailingTranslator {
    pub fn transient() -> Self {
        Self {
            transient: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn permanent() -> Self {
        Self {
            transient: false,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Translator for FailingTranslator {
    fn provider_id(&self) -> &str {
        "failing"
    }

    fn check_languages(&self, _source: &str, _target: &str) -> TranslationResult<()> {
        Ok(())
    }

    async fn translate_non_empty(
        &self,
        _units: &[TranslationUnit],
        _source: &str,
        _target: &str,
    ) -> TranslationResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.transient {
            Err(TranslationError::ProviderTransient("HTTP 503: 服务繁忙".to_string()))
        } else {
            Err(TranslationError::ProviderPermanent("认证失败 HTTP 401".to_string()))
        }
    }
}

/// 含有指定文本的单元失败，其余原样返回
pub struct SelectiveTranslator {
    pub poison: String,
}

#[async_trait]
impl Translator for SelectiveTranslator {
    fn provider_id(&self) -> &str {
        "selective"
    }

    fn check_languages(&self, _source: &str, _target: &str) -> TranslationResult<()> {
        Ok(())
    }

    async fn translate_non_empty(
        &self,
        units: &[TranslationUnit],
        _source: &str,
        _target: &str,
    ) -> TranslationResult<Vec<String>> {
        if units.iter().any(|unit| unit.text.contains(&self.poison)) {
            return Err(TranslationError::ProviderTransient("模拟超时".to_string()));
        }
        Ok(units.iter().map(|unit| format!("[译]{}", unit.text.trim())).collect())
    }
}

/// 每次调用前等待的翻译器，用于观察进行中的任务
pub struct SlowTranslator {
    pub delay: Duration,
}

#[async_trait]
impl Translator for SlowTranslator {
    fn provider_id(&self) -> &str {
        "slow"
    }

    fn check_languages(&self, _source: &str, _target: &str) -> TranslationResult<()> {
        Ok(())
    }

    async fn translate_non_empty(
        &self,
        units: &[TranslationUnit],
        _source: &str,
        _target: &str,
    ) -> TranslationResult<Vec<String>> {
        tokio::time::sleep(self.delay).await;
        Ok(units.iter().map(|unit| unit.text.clone()).collect())
    }
}

/// 测试配置构建器
pub struct TestConfigBuilder {
    config: PipelineConfig,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = PipelineConfig::for_provider("nllb", "zh-CN");
        config.source_language = "en".to_string();
        config.output_formats = vec![OutputFormat::Text];
        config.layout = Layout::TranslationOnly;
        config.delay_between_requests_ms = 0;
        config.retry_delay_ms = 1;
        config.max_retries = 2;
        config.request_timeout_secs = 5;
        config.cache_enabled = false;
        Self { config }
    }

    pub fn formats(mut self, formats: &[OutputFormat]) -> Self {
        self.config.output_formats = formats.to_vec();
        self
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn chunk_chars(mut self, min: usize, max: usize) -> Self {
        self.config.min_chunk_chars = min;
        self.config.max_chunk_chars = max;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.max_workers = workers;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    pub fn max_file_size(mut self, bytes: usize) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn report(mut self) -> Self {
        self.config.generate_report = true;
        self
    }

    pub fn cache(mut self, enabled: bool) -> Self {
        self.config.cache_enabled = enabled;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

/// 使用指定翻译器的内存服务
pub fn service_with(translator: Arc<dyn Translator>) -> PipelineService {
    PipelineService::new(Arc::new(MemoryStorage::new()))
        .expect("服务创建失败")
        .with_translator_factory(Arc::new(move |_: &PipelineConfig| Ok(translator.clone())))
}

/// 轮询直到任务结束
pub async fn wait_terminal(service: &PipelineService, task_id: &str) -> Task {
    for _ in 0..1000 {
        let task = service.get_progress(task_id).expect("任务应存在");
        if task.is_terminal() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("任务 {} 未在预期时间内结束", task_id);
}

/// 读取任务中指定文件名的输出
pub fn output_bytes(service: &PipelineService, task: &Task, filename: &str) -> Vec<u8> {
    let output = task
        .outputs
        .iter()
        .find(|output| output.filename == filename)
        .unwrap_or_else(|| panic!("缺少输出 {}，实际为 {:?}", filename, task.outputs));
    service.storage().read(&output.content_ref).expect("输出应可读取")
}

/// 测试文档构造器
pub struct DocumentBuilder;

impl DocumentBuilder {
    fn archive(entries: &[(String, String)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(name.as_str(), FileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// 以空行分隔的纯文本
    pub fn text(paragraphs: &[&str]) -> Vec<u8> {
        let mut text = paragraphs.join("\n\n");
        text.push('\n');
        text.into_bytes()
    }

    pub fn slide_shape(x: u32, paragraphs: &[&str]) -> String {
        let body: String = paragraphs
            .iter()
            .map(|text| format!(r#"<a:p><a:r><a:rPr sz="2000"/><a:t>{}</a:t></a:r></a:p>"#, text))
            .collect();
        format!(
            r#"<p:sp><p:spPr><a:xfrm><a:off x="{}" y="100"/><a:ext cx="5000" cy="800"/></a:xfrm></p:spPr><p:txBody>{}</p:txBody></p:sp>"#,
            x, body
        )
    }

    /// 每张幻灯片由若干形状组成
    pub fn pptx(slides: &[Vec<String>]) -> Vec<u8> {
        let mut entries = vec![(
            "ppt/presentation.xml".to_string(),
            r#"<?xml version="1.0" encoding="UTF-8"?><p:presentation xmlns:p="p"/>"#.to_string(),
        )];
        for (index, shapes) in slides.iter().enumerate() {
            entries.push((
                format!("ppt/slides/slide{}.xml", index + 1),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><p:sld xmlns:a="a" xmlns:p="p"><p:cSld><p:spTree>{}</p:spTree></p:cSld></p:sld>"#,
                    shapes.concat()
                ),
            ));
        }
        Self::archive(&entries)
    }

    pub fn docx(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|text| format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, text))
            .collect();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="w"><w:body>{}</w:body></w:document>"#,
            body
        );
        Self::archive(&[("word/document.xml".to_string(), xml)])
    }

    /// 读取压缩包中的文本条目
    pub fn read_entry(bytes: &[u8], name: &str) -> String {
        use std::io::Read;
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("应为有效压缩包");
        let mut content = String::new();
        archive
            .by_name(name)
            .expect("条目应存在")
            .read_to_string(&mut content)
            .expect("条目应为 UTF-8");
        content
    }
}

/// 模拟的对话补全服务
///
/// 按顺序返回预设响应，响应用完后重复最后一个。
pub struct MockChatServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockChatServer {
    pub async fn start(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定端口失败");
        let address = listener.local_addr().expect("读取地址失败");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            let mut served = 0usize;
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let request = read_request(&mut socket).await;
                recorded.lock().unwrap().push(request);

                let (status, body) = responses
                    .get(served)
                    .or_else(|| responses.last())
                    .cloned()
                    .unwrap_or((500, String::new()));
                served += 1;

                let reply = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        Self {
            base_url: format!("http://{}", address),
            requests,
        }
    }

    /// 成功响应体
    pub fn reply(content: &str) -> (u16, String) {
        let body = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        });
        (200, body.to_string())
    }

    pub fn error(status: u16, message: &str) -> (u16, String) {
        (status, serde_json::json!({ "error": { "message": message } }).to_string())
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];

    loop {
        let read = match socket.read(&mut buffer).await {
            Ok(0) | Err(_) => break,
            Ok(read) => read,
        };
        data.extend_from_slice(&buffer[..read]);

        let text = String::from_utf8_lossy(&data);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.trim()
                        .eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if data.len() >= header_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&data).into_owned()
}

/// 性能测试辅助工具
pub struct PerformanceHelper;

impl PerformanceHelper {
    /// 测量执行时间
    pub fn measure_time<F, R>(f: F) -> (R, Duration)
    where
        F: FnOnce() -> R,
    {
        let start = std::time::Instant::now();
        let result = f();
        (result, start.elapsed())
    }

    /// 测量异步执行时间
    pub async fn measure_async_time<F, Fut, R>(f: F) -> (R, Duration)
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = R>,
    {
        let start = std::time::Instant::now();
        let result = f().await;
        (result, start.elapsed())
    }

    /// 创建性能断言
    pub fn assert_performance<F, R>(f: F, max_duration: Duration, description: &str) -> R
    where
        F: FnOnce() -> R,
    {
        let (result, duration) = Self::measure_time(f);
        assert!(
            duration <= max_duration,
            "{} took {:?}, expected <= {:?}",
            description,
            duration,
            max_duration
        );
        result
    }
}

/// 断言辅助工具
pub struct AssertionHelper;

impl AssertionHelper {
    /// 断言文本包含所有期望片段
    pub fn assert_contains_items(text: &str, expected: &[&str]) {
        for item in expected {
            assert!(text.contains(item), "Expected '{}' in output:\n{}", item, text);
        }
    }

    /// 断言文本不包含任何片段
    pub fn assert_excludes_items(text: &str, unexpected: &[&str]) {
        for item in unexpected {
            assert!(!text.contains(item), "Unexpected '{}' in output:\n{}", item, text);
        }
    }

    /// 断言大小在范围内
    pub fn assert_size_in_range(actual: usize, min: usize, max: usize, description: &str) {
        assert!(
            actual >= min && actual <= max,
            "{} size {} not in range [{}, {}]",
            description,
            actual,
            min,
            max
        );
    }
}
