//! 提供商调用重试策略
//!
//! 瞬时错误（超时、限流、5xx）按指数退避重试，永久错误立即返回。

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::translation::config::{constants, PipelineConfig};
use crate::translation::error::TranslationResult;

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// 首次调用之后的最大重试次数
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(constants::DEFAULT_RETRY_DELAY_MS),
            max_delay: constants::MAX_RETRY_DELAY,
        }
    }
}

impl From<&PipelineConfig> for RetryPolicy {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_delay(),
            max_delay: constants::MAX_RETRY_DELAY,
        }
    }
}

/// 带尝试次数的调用结果
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: TranslationResult<T>,
    pub attempts: u32,
}

impl RetryPolicy {
    /// 不重试
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// 第 `attempt` 次失败后的等待时间（从 0 开始）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// 执行操作，失败时按策略重试
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = TranslationResult<T>>,
    {
        let max_attempts = self.max_retries + 1;
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!("{} 在第 {} 次尝试后成功", label, attempt + 1);
                    }
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt + 1,
                    };
                }
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{} 失败，{}ms后重试 (尝试 {}/{}): {}",
                        label,
                        delay.as_millis(),
                        attempt + 1,
                        max_attempts,
                        e
                    );
                    metrics::counter!("doctrans_provider_retries_total").increment(1);
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!("{} 重试 {} 次后仍失败: {}", label, max_attempts, e);
                    } else {
                        tracing::error!("{} 遇到不可重试错误: {}", label, e);
                    }
                    return RetryOutcome {
                        result: Err(e),
                        attempts: attempt + 1,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::error::TranslationError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let outcome = fast_policy(3)
            .run("测试", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TranslationError::ProviderTransient("503".into()))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(outcome.result.unwrap(), "done");
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<()> = fast_policy(3)
            .run("测试", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TranslationError::ProviderPermanent("401".into())) }
            })
            .await;

        assert!(matches!(outcome.result, Err(TranslationError::ProviderPermanent(_))));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let outcome: RetryOutcome<()> = fast_policy(2)
            .run("测试", |_| async { Err(TranslationError::TimeoutError("slow".into())) })
            .await;

        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 3, "首次调用加两次重试");
    }
}
