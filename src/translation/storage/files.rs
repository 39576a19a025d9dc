//! 文件存储
//!
//! 流水线通过 [`FileStorage`] 读取上传的原始文件并写出生成的文档，
//! 引用是不透明字符串，不假设具体的存储介质。

use std::path::{Path, PathBuf};

use dashmap::DashMap;

use crate::translation::error::{TranslationError, TranslationResult};

/// 文件存储接口
pub trait FileStorage: Send + Sync {
    /// 保存内容，返回引用
    fn store(&self, bytes: &[u8], name: &str) -> TranslationResult<String>;

    /// 按引用读取内容
    fn read(&self, reference: &str) -> TranslationResult<Vec<u8>>;

    /// 引用对应的原始文件名
    fn file_name(&self, reference: &str) -> Option<String>;

    /// 删除内容，引用不存在时不报错
    fn delete(&self, reference: &str) -> TranslationResult<()>;
}

/// 清理文件名，只保留最后一段路径
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|') { '_' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "document".to_string()
    } else {
        cleaned
    }
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStorage {
    files: DashMap<String, (String, Vec<u8>)>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileStorage for MemoryStorage {
    fn store(&self, bytes: &[u8], name: &str) -> TranslationResult<String> {
        let name = sanitize_file_name(name);
        let reference = format!("mem://{}/{}", uuid::Uuid::new_v4(), name);
        self.files.insert(reference.clone(), (name, bytes.to_vec()));
        Ok(reference)
    }

    fn read(&self, reference: &str) -> TranslationResult<Vec<u8>> {
        self.files
            .get(reference)
            .map(|entry| entry.value().1.clone())
            .ok_or_else(|| TranslationError::StorageError(format!("文件不存在: {}", reference)))
    }

    fn file_name(&self, reference: &str) -> Option<String> {
        self.files.get(reference).map(|entry| entry.value().0.clone())
    }

    fn delete(&self, reference: &str) -> TranslationResult<()> {
        self.files.remove(reference);
        Ok(())
    }
}

/// 本地文件系统存储
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl AsRef<Path>) -> TranslationResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| {
            TranslationError::StorageError(format!("无法创建存储目录 {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, reference: &str) -> TranslationResult<PathBuf> {
        let valid = !reference.is_empty()
            && !reference.contains(['/', '\\'])
            && reference != "."
            && reference != "..";
        if !valid {
            return Err(TranslationError::StorageError(format!("非法的文件引用: {}", reference)));
        }
        Ok(self.root.join(reference))
    }
}

impl FileStorage for FsStorage {
    fn store(&self, bytes: &[u8], name: &str) -> TranslationResult<String> {
        let reference = format!("{}-{}", uuid::Uuid::new_v4().simple(), sanitize_file_name(name));
        let path = self.resolve(&reference)?;
        std::fs::write(&path, bytes)?;
        tracing::debug!("已写入文件 {} ({} 字节)", path.display(), bytes.len());
        Ok(reference)
    }

    fn read(&self, reference: &str) -> TranslationResult<Vec<u8>> {
        let path = self.resolve(reference)?;
        std::fs::read(&path)
            .map_err(|e| TranslationError::StorageError(format!("读取 {} 失败: {}", reference, e)))
    }

    fn file_name(&self, reference: &str) -> Option<String> {
        self.resolve(reference).ok()?;
        reference.split_once('-').map(|(_, name)| name.to_string())
    }

    fn delete(&self, reference: &str) -> TranslationResult<()> {
        let path = self.resolve(reference)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TranslationError::StorageError(format!("删除 {} 失败: {}", reference, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\slides.pptx"), "slides.pptx");
        assert_eq!(sanitize_file_name("a?b.txt"), "a_b.txt");
        assert_eq!(sanitize_file_name(".."), "document");
    }

    #[test]
    fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        let reference = storage.store(b"hello", "greeting.txt").unwrap();
        assert_eq!(storage.read(&reference).unwrap(), b"hello");
        assert_eq!(storage.file_name(&reference).as_deref(), Some("greeting.txt"));
        assert!(storage.read("mem://missing").is_err());

        storage.delete(&reference).unwrap();
        assert!(storage.is_empty());
        storage.delete(&reference).unwrap();
    }

    #[test]
    fn test_fs_storage_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path()).unwrap();

        let reference = storage.store(b"%PDF", "report.pdf").unwrap();
        assert_eq!(storage.read(&reference).unwrap(), b"%PDF");
        assert_eq!(storage.file_name(&reference).as_deref(), Some("report.pdf"));

        assert!(matches!(
            storage.read("../secret"),
            Err(TranslationError::StorageError(_))
        ));
    }

    #[test]
    fn test_fs_storage_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new(dir.path()).unwrap();
        let reference = storage.store(b"bytes", "out.txt").unwrap();

        storage.delete(&reference).unwrap();
        assert!(storage.read(&reference).is_err());
        assert!(storage.delete(&reference).is_ok(), "重复删除不报错");
        assert!(storage.delete("../escape").is_err());
    }
}
