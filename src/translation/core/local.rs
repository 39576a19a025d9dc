//! 本地神经网络翻译器
//!
//! 多语言序列到序列模型在每个进程中只加载一次（首次使用时加载并缓存），
//! 推理为同步调用，统一放到 `spawn_blocking` 中执行。
//!
//! 随库提供的后端 [`HttpSeq2SeqModel`] 调用本机的 NLLB 推理服务
//! （`POST {model, source, src_lang, tgt_lang}` → `{translation}`）。
//! 首选模型加载失败时按配置依次尝试回退模型。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{languages, ProviderKind, TranslationUnit, Translator};
use crate::translation::config::{constants, PipelineConfig};
use crate::translation::error::{TranslationError, TranslationResult};

/// 序列到序列模型
pub trait Seq2SeqModel: Send + Sync {
    fn name(&self) -> &str;

    /// 同步推理，`source_code`/`target_code` 为模型语言代码
    fn generate(
        &self,
        texts: &[String],
        source_code: &str,
        target_code: &str,
    ) -> TranslationResult<Vec<String>>;
}

/// 模型加载函数
pub type ModelLoader = Arc<dyn Fn() -> TranslationResult<Arc<dyn Seq2SeqModel>> + Send + Sync>;

type ModelRegistry = Mutex<HashMap<String, Arc<dyn Seq2SeqModel>>>;

fn registry() -> &'static ModelRegistry {
    static MODELS: OnceLock<ModelRegistry> = OnceLock::new();
    MODELS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// 获取已加载的模型，未加载时调用 `loader` 加载并缓存
///
/// 加载过程持有注册表锁，同一模型不会被并发加载两次。
fn get_or_load(key: &str, loader: &ModelLoader) -> TranslationResult<Arc<dyn Seq2SeqModel>> {
    let mut models = registry()
        .lock()
        .map_err(|_| TranslationError::InternalError("模型注册表锁已损坏".to_string()))?;

    if let Some(model) = models.get(key) {
        return Ok(Arc::clone(model));
    }

    tracing::info!("首次加载本地翻译模型: {}", key);
    let model = loader()?;
    models.insert(key.to_string(), Arc::clone(&model));
    Ok(model)
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    model: &'a str,
    source: &'a [String],
    src_lang: &'a str,
    tgt_lang: &'a str,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    translation: Vec<String>,
}

/// 通过本机推理服务运行的 NLLB 模型
pub struct HttpSeq2SeqModel {
    name: String,
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpSeq2SeqModel {
    /// 创建模型句柄并让推理服务预先加载模型，必须在阻塞线程中调用
    pub fn connect(name: &str, endpoint: &str, timeout: std::time::Duration) -> TranslationResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建本地模型客户端失败: {}", e)))?;

        let model = Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            client,
        };
        model.infer(&[], WARMUP_LANGUAGE, WARMUP_LANGUAGE)?;
        Ok(model)
    }

    fn infer(&self, texts: &[String], source_code: &str, target_code: &str) -> TranslationResult<Vec<String>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&InferenceRequest {
                model: &self.name,
                source: texts,
                src_lang: source_code,
                tgt_lang: target_code,
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(super::remote::classify_status(status, &body));
        }

        let body: InferenceResponse = response.json()?;
        Ok(body.translation)
    }
}

const WARMUP_LANGUAGE: &str = "eng_Latn";

impl Seq2SeqModel for HttpSeq2SeqModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(
        &self,
        texts: &[String],
        source_code: &str,
        target_code: &str,
    ) -> TranslationResult<Vec<String>> {
        self.infer(texts, source_code, target_code)
    }
}

/// 候选模型
#[derive(Clone)]
struct ModelCandidate {
    key: String,
    loader: ModelLoader,
}

/// 按顺序加载候选模型，返回第一个成功的
fn load_first(candidates: &[ModelCandidate]) -> TranslationResult<Arc<dyn Seq2SeqModel>> {
    let mut last_error = None;
    for (index, candidate) in candidates.iter().enumerate() {
        match get_or_load(&candidate.key, &candidate.loader) {
            Ok(model) => {
                if index > 0 {
                    tracing::info!("成功加载回退模型: {}", candidate.key);
                }
                return Ok(model);
            }
            Err(e) => {
                tracing::warn!("模型 {} 加载失败: {}", candidate.key, e);
                last_error = Some(e);
            }
        }
    }

    Err(TranslationError::ProviderPermanent(match last_error {
        Some(e) => format!("所有模型（包括回退模型）都加载失败: {}", e),
        None => "没有可用的本地模型".to_string(),
    }))
}

/// 本地神经网络翻译器
pub struct LocalNeuralTranslator {
    candidates: Vec<ModelCandidate>,
    active: Arc<OnceLock<Arc<dyn Seq2SeqModel>>>,
    batch_size: usize,
}

impl LocalNeuralTranslator {
    /// 按配置创建，模型在首次翻译时才加载
    pub fn from_config(config: &PipelineConfig) -> TranslationResult<Self> {
        let endpoint = config.local_model_endpoint.clone();
        url::Url::parse(&endpoint).map_err(|e| {
            TranslationError::ConfigError(format!("本地模型地址无效 '{}': {}", endpoint, e))
        })?;

        let primary = config
            .model
            .clone()
            .unwrap_or_else(|| constants::DEFAULT_LOCAL_MODEL.to_string());
        let timeout = config.request_timeout();
        let http_loader = |name: String| -> ModelLoader {
            let endpoint = endpoint.clone();
            Arc::new(move || {
                let model = HttpSeq2SeqModel::connect(&name, &endpoint, timeout)?;
                Ok(Arc::new(model) as Arc<dyn Seq2SeqModel>)
            })
        };

        let mut translator = Self::with_loader(
            format!("{}@{}", primary, endpoint),
            http_loader(primary.clone()),
            config.batch_size,
        );
        for name in &config.fallback_models {
            if *name != primary {
                translator = translator.with_fallback(format!("{}@{}", name, endpoint), http_loader(name.clone()));
            }
        }
        Ok(translator)
    }

    /// 使用自定义加载函数，`model_key` 相同的翻译器共享同一个模型实例
    pub fn with_loader(model_key: impl Into<String>, loader: ModelLoader, batch_size: usize) -> Self {
        Self {
            candidates: vec![ModelCandidate {
                key: model_key.into(),
                loader,
            }],
            active: Arc::new(OnceLock::new()),
            batch_size: batch_size.max(1),
        }
    }

    /// 追加回退模型
    pub fn with_fallback(mut self, model_key: impl Into<String>, loader: ModelLoader) -> Self {
        self.candidates.push(ModelCandidate {
            key: model_key.into(),
            loader,
        });
        self
    }

    /// 首选模型的注册表键
    pub fn model_key(&self) -> &str {
        self.candidates.first().map(|c| c.key.as_str()).unwrap_or_default()
    }

    pub fn fallback_keys(&self) -> Vec<&str> {
        self.candidates.iter().skip(1).map(|c| c.key.as_str()).collect()
    }

    /// 首选模型是否已在本进程中加载
    pub fn is_loaded(&self) -> bool {
        registry()
            .lock()
            .map(|models| models.contains_key(self.model_key()))
            .unwrap_or(false)
    }

    fn resolve(
        candidates: &[ModelCandidate],
        active: &OnceLock<Arc<dyn Seq2SeqModel>>,
    ) -> TranslationResult<Arc<dyn Seq2SeqModel>> {
        if let Some(model) = active.get() {
            return Ok(Arc::clone(model));
        }
        let model = load_first(candidates)?;
        Ok(Arc::clone(active.get_or_init(|| model)))
    }

    /// 在阻塞线程中确定要使用的模型
    async fn active_model(&self) -> TranslationResult<Arc<dyn Seq2SeqModel>> {
        if let Some(model) = self.active.get() {
            return Ok(Arc::clone(model));
        }
        let candidates = self.candidates.clone();
        let active = Arc::clone(&self.active);
        tokio::task::spawn_blocking(move || Self::resolve(&candidates, &active))
            .await
            .map_err(|e| TranslationError::InternalError(format!("模型加载线程异常退出: {}", e)))?
    }
}

#[async_trait]
impl Translator for LocalNeuralTranslator {
    fn provider_id(&self) -> &str {
        ProviderKind::Nllb.id()
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }

    fn check_languages(&self, source_language: &str, target_language: &str) -> TranslationResult<()> {
        languages::check_language_pair(ProviderKind::Nllb, source_language, target_language)
    }

    async fn is_available(&self) -> bool {
        match self.active_model().await {
            Ok(model) => {
                tracing::debug!("本地模型可用: {}", model.name());
                true
            }
            Err(e) => {
                tracing::error!("本地模型不可用: {}", e);
                false
            }
        }
    }

    async fn translate_non_empty(
        &self,
        units: &[TranslationUnit],
        source_language: &str,
        target_language: &str,
    ) -> TranslationResult<Vec<String>> {
        let source_code = languages::nllb_code(source_language)?;
        let target_code = languages::nllb_code(target_language)?;

        let model = self.active_model().await?;
        let mut results = Vec::with_capacity(units.len());
        for batch in units.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|unit| unit.text.clone()).collect();
            let expected = texts.len();
            let model = Arc::clone(&model);

            let translated = tokio::task::spawn_blocking(move || model.generate(&texts, source_code, target_code))
                .await
                .map_err(|e| TranslationError::InternalError(format!("推理线程异常退出: {}", e)))??;

            if translated.len() != expected {
                return Err(TranslationError::ProviderPermanent(format!(
                    "本地模型返回 {} 条译文，期望 {} 条",
                    translated.len(),
                    expected
                )));
            }

            tracing::debug!("本地模型完成批次翻译: {} 条", expected);
            results.extend(translated);
        }

        Ok(results)
    }
}
