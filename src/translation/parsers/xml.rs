//! Office Open XML 辅助函数

use std::io::{Cursor, Read};

use quick_xml::events::BytesStart;
use zip::ZipArchive;

use crate::translation::error::{TranslationError, TranslationResult};

pub(crate) type OfficeArchive<'a> = ZipArchive<Cursor<&'a [u8]>>;

pub(crate) fn open_archive(bytes: &[u8]) -> TranslationResult<OfficeArchive<'_>> {
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| TranslationError::ParseError(format!("无法打开 Office 压缩包: {}", e)))
}

/// 读取压缩包内的文件
pub(crate) fn read_entry(archive: &mut OfficeArchive<'_>, name: &str) -> TranslationResult<Vec<u8>> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| TranslationError::ParseError(format!("缺少 {}: {}", name, e)))?;
    let mut buffer = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// 读取属性值，解码失败视为缺失
pub(crate) fn attr(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attribute| attribute.key.as_ref() == key)
        .and_then(|attribute| attribute.unescape_value().ok())
        .map(|value| value.into_owned())
}

/// OOXML 布尔属性，缺省为真
pub(crate) fn flag(element: &BytesStart<'_>, key: &[u8]) -> bool {
    match attr(element, key) {
        Some(value) => !matches!(value.as_str(), "0" | "false" | "off"),
        None => true,
    }
}
