//! 远程对话模型翻译器
//!
//! 通过 OpenAI 兼容的 `chat/completions` 接口翻译文本，每个单元一次调用。
//!
//! ## 错误分类
//!
//! - 401/403/400/404/422 → 永久错误，不重试
//! - 408、429、5xx、网络错误 → 瞬时错误，由重试策略处理

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{languages, ProviderKind, TranslationUnit, Translator};
use crate::translation::config::PipelineConfig;
use crate::translation::error::{TranslationError, TranslationResult};

/// 远程提供商的默认参数
#[derive(Debug, Clone, Copy)]
struct ProviderProfile {
    base_url: &'static str,
    model: &'static str,
    max_tokens: u32,
    system_prompt: &'static str,
}

const STANDARD_SYSTEM_PROMPT: &str = "你是一个专业的翻译助手，能够准确翻译各种语言。";
const REASONER_SYSTEM_PROMPT: &str = "你是一个具有深度推理能力的专业翻译专家，能够理解复杂语境并提供高质量的翻译。你会仔细分析文本的含义、语境和文化背景，然后提供准确、流畅、自然的翻译。";

fn profile(kind: ProviderKind) -> ProviderProfile {
    match kind {
        ProviderKind::OpenAi => ProviderProfile {
            base_url: "https://api.openai.com/v1",
            model: "gpt-3.5-turbo",
            max_tokens: 2000,
            system_prompt: STANDARD_SYSTEM_PROMPT,
        },
        ProviderKind::DeepSeekReasoner => ProviderProfile {
            base_url: "https://api.deepseek.com",
            model: "deepseek-reasoner",
            max_tokens: 6000,
            system_prompt: REASONER_SYSTEM_PROMPT,
        },
        // 本地模型不会走到这里，按 deepseek 处理
        ProviderKind::DeepSeek | ProviderKind::Nllb => ProviderProfile {
            base_url: "https://api.deepseek.com",
            model: "deepseek-chat",
            max_tokens: 2000,
            system_prompt: STANDARD_SYSTEM_PROMPT,
        },
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// 远程对话翻译器
pub struct RemoteChatTranslator {
    kind: ProviderKind,
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    system_prompt: &'static str,
}

impl RemoteChatTranslator {
    /// 创建远程翻译器
    pub fn new(kind: ProviderKind, config: &PipelineConfig) -> TranslationResult<Self> {
        if !kind.is_remote() {
            return Err(TranslationError::ConfigError(format!(
                "{} 不是远程提供商",
                kind
            )));
        }

        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                TranslationError::ConfigError(format!("提供商 {} 需要配置 API 密钥", kind))
            })?;

        let profile = profile(kind);
        let base_url = config
            .api_base_url
            .as_deref()
            .unwrap_or(profile.base_url)
            .trim_end_matches('/');

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建 HTTP 客户端失败: {}", e)))?;

        tracing::info!("{} 客户端初始化完成: {}", kind, base_url);

        Ok(Self {
            kind,
            client,
            endpoint: format!("{}/chat/completions", base_url),
            api_key,
            model: config.model.clone().unwrap_or_else(|| profile.model.to_string()),
            temperature: config.temperature,
            max_tokens: profile.max_tokens,
            system_prompt: profile.system_prompt,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// 构造翻译提示词
    pub fn build_prompt(
        &self,
        unit: &TranslationUnit,
        source_language: &str,
        target_language: &str,
    ) -> TranslationResult<String> {
        let target_name = languages::language_name(target_language)?;
        let source_name = languages::language_name(source_language)?;
        let auto_detect = source_language.eq_ignore_ascii_case("auto");

        let mut prompt = String::new();
        if let Some(context) = &unit.context {
            prompt.push_str("以下是上文内容，仅用于理解语境，不要翻译也不要输出：\n");
            prompt.push_str(context);
            prompt.push_str("\n\n");
        }

        if self.kind == ProviderKind::DeepSeekReasoner {
            let source_line = if auto_detect { "请自动识别" } else { source_name };
            prompt.push_str(&format!(
                "作为一个专业的翻译专家，请仔细分析以下文本并进行高质量翻译：\n\n\
                 原文语言：{}\n目标语言：{}\n\n\
                 请按照以下步骤进行翻译：\n\
                 1. 首先理解原文的核心含义、语境和语调\n\
                 2. 识别专业术语、习语或文化特定表达\n\
                 3. 考虑目标语言的表达习惯和文化背景\n\
                 4. 确保翻译的准确性、流畅性和自然性\n\
                 5. 保持原文的格式和结构\n\n\
                 原文：\n{}\n\n请只输出最终的翻译结果：",
                source_line, target_name, unit.text
            ));
        } else if auto_detect {
            prompt.push_str(&format!(
                "请将以下文本翻译成{}，保持原文的格式和含义，只输出译文：\n\n{}",
                target_name, unit.text
            ));
        } else {
            prompt.push_str(&format!(
                "请将以下{}文本翻译成{}，保持原文的格式和含义，只输出译文：\n\n{}",
                source_name, target_name, unit.text
            ));
        }

        Ok(prompt)
    }

    async fn call_once(&self, prompt: &str) -> TranslationResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let body: ChatResponse = response.json().await?;
        extract_reply(body)
    }
}

/// 按 HTTP 状态码区分瞬时与永久错误
pub(crate) fn classify_status(status: StatusCode, body: &str) -> TranslationError {
    let snippet: String = body.chars().take(200).collect();
    let message = format!("HTTP {}: {}", status.as_u16(), snippet);

    if status == StatusCode::TOO_MANY_REQUESTS {
        TranslationError::ProviderTransient(format!("请求速率受限 {}", message))
    } else if status == StatusCode::REQUEST_TIMEOUT {
        TranslationError::TimeoutError(message)
    } else if status.is_server_error() {
        TranslationError::ProviderTransient(message)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        TranslationError::ProviderPermanent(format!("认证失败 {}", message))
    } else {
        TranslationError::ProviderPermanent(message)
    }
}

/// 去除推理模型回复中的 `<think>` 段落
fn strip_reasoning(content: &str) -> String {
    let mut output = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find("<think>") {
        output.push_str(&rest[..start]);
        rest = match rest[start..].find("</think>") {
            Some(end) => &rest[start + end + "</think>".len()..],
            None => "",
        };
    }
    output.push_str(rest);
    output
}

fn extract_reply(response: ChatResponse) -> TranslationResult<String> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();

    let cleaned = strip_reasoning(&content);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Err(TranslationError::ProviderTransient("提供商返回空译文".to_string()));
    }
    Ok(cleaned.to_string())
}

#[async_trait]
impl Translator for RemoteChatTranslator {
    fn provider_id(&self) -> &str {
        self.kind.id()
    }

    fn uses_context(&self) -> bool {
        true
    }

    fn check_languages(&self, source_language: &str, target_language: &str) -> TranslationResult<()> {
        languages::check_language_pair(self.kind, source_language, target_language)
    }

    async fn translate_non_empty(
        &self,
        units: &[TranslationUnit],
        source_language: &str,
        target_language: &str,
    ) -> TranslationResult<Vec<String>> {
        let mut results = Vec::with_capacity(units.len());
        for unit in units {
            let prompt = self.build_prompt(unit, source_language, target_language)?;
            let translated = self.call_once(&prompt).await?;
            tracing::debug!(
                "{} 翻译完成: {} → {} 字符",
                self.kind,
                unit.text.chars().count(),
                translated.chars().count()
            );
            results.push(translated);
        }
        Ok(results)
    }
}
