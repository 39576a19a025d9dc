//! Web 服务器配置
//!
//! 使用类型安全的环境变量系统进行配置管理

use std::time::Duration;

use crate::env::{core as core_env, web as web_env, EnvError, EnvResult, EnvVar};

/// 上传文件大小上限的默认值
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Web 服务器配置
#[derive(Debug, Clone)]
pub struct WebConfig {
    pub bind_addr: String,
    pub port: u16,
    /// 上传文件与生成文件的存放目录
    pub storage_dir: String,
    pub max_upload_bytes: usize,
    /// 已结束任务的保留时长，超过后删除任务记录与文件
    pub task_retention: Duration,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 7080,
            storage_dir: "doctrans-data".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            task_retention: Duration::from_secs(86400),
        }
    }
}

impl WebConfig {
    /// 从环境变量创建配置
    pub fn from_env() -> EnvResult<Self> {
        let config = Self {
            bind_addr: web_env::BindAddress::get()?,
            port: web_env::Port::get()?,
            storage_dir: core_env::StorageDir::get()?,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            task_retention: web_env::TaskRetention::get()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> EnvResult<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(EnvError {
                variable: web_env::BindAddress::NAME.to_string(),
                message: "Bind address cannot be empty".to_string(),
            });
        }

        if self.storage_dir.trim().is_empty() {
            return Err(EnvError {
                variable: core_env::StorageDir::NAME.to_string(),
                message: "Storage directory cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}
