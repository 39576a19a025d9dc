//! 语言代码映射表
//!
//! 本地模型使用 NLLB 语言代码，远程对话模型使用提示词中的语言名称。
//! 不在表中的语言一律拒绝，不做静默回退。

use super::ProviderKind;
use crate::translation::error::{TranslationError, TranslationResult};

/// 面向用户的语言代码 → NLLB 语言代码
const NLLB_CODES: &[(&str, &str)] = &[
    ("zh-CN", "zho_Hans"),
    ("zh", "zho_Hans"),
    ("zh-TW", "zho_Hant"),
    ("en", "eng_Latn"),
    ("en-US", "eng_Latn"),
    ("ja", "jpn_Jpan"),
    ("ko", "kor_Hang"),
    ("fr", "fra_Latn"),
    ("de", "deu_Latn"),
    ("es", "spa_Latn"),
    // 本地模型无法自动检测，沿用中文作为默认源语言
    ("auto", "zho_Hans"),
];

/// 面向用户的语言代码 → 提示词中的语言名称
const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("zh-CN", "中文"),
    ("zh", "中文"),
    ("zh-TW", "繁体中文"),
    ("en", "英文"),
    ("en-US", "英文"),
    ("ja", "日文"),
    ("ko", "韩文"),
    ("fr", "法文"),
    ("de", "德文"),
    ("es", "西班牙文"),
    ("auto", "自动检测"),
];

fn lookup(table: &'static [(&'static str, &'static str)], code: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(code))
        .map(|(_, value)| *value)
}

/// 获取 NLLB 语言代码
pub fn nllb_code(code: &str) -> TranslationResult<&'static str> {
    lookup(NLLB_CODES, code).ok_or_else(|| {
        TranslationError::UnsupportedLanguage(format!("本地模型不支持语言 '{}'", code))
    })
}

/// 获取提示词中使用的语言名称
pub fn language_name(code: &str) -> TranslationResult<&'static str> {
    lookup(LANGUAGE_NAMES, code).ok_or_else(|| {
        TranslationError::UnsupportedLanguage(format!("远程提供商不支持语言 '{}'", code))
    })
}

/// 提供商支持的语言代码列表
pub fn supported_languages(provider: ProviderKind) -> Vec<&'static str> {
    let table = if provider.is_remote() { LANGUAGE_NAMES } else { NLLB_CODES };
    table.iter().map(|(code, _)| *code).collect()
}

/// 检查语言对是否受提供商支持
///
/// `auto` 只能作为源语言。
pub fn check_language_pair(
    provider: ProviderKind,
    source_language: &str,
    target_language: &str,
) -> TranslationResult<()> {
    if target_language.eq_ignore_ascii_case("auto") {
        return Err(TranslationError::UnsupportedLanguage(
            "目标语言不能为 auto".to_string(),
        ));
    }

    let check = |code: &str| -> TranslationResult<()> {
        if provider.is_remote() {
            language_name(code).map(|_| ())
        } else {
            nllb_code(code).map(|_| ())
        }
    };

    check(source_language)?;
    check(target_language)?;
    Ok(())
}
