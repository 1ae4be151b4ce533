use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};
use crate::actions::ChatSession;
use crate::error::{ChannelError, ModelError};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// 退避等待接口 (测试中可替换为计数实现)
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// 带限流重试的调用通道。无内部状态，可在一次运行的各步骤间复用。
#[derive(Clone)]
pub struct CallChannel {
    model: String,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl CallChannel {
    pub fn new(model: impl Into<String>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(model, policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(model: impl Into<String>, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            model: model.into(),
            policy,
            sleeper,
        }
    }

    pub async fn send(&self, session: &mut dyn ChatSession, message: &str) -> Result<String, ChannelError> {
        let max = self.policy.max_attempts.max(1);

        for attempt in 1..=max {
            match session.send_message(message).await {
                Ok(text) => return Ok(text),
                Err(ModelError::RateLimited(detail)) => {
                    if attempt == max {
                        warn!(attempt, max, "Rate limit on final attempt: {}", detail);
                        break;
                    }
                    warn!(
                        attempt,
                        max,
                        "Rate limit. Wait {}s... (Attempt {}/{})",
                        self.policy.delay.as_secs(),
                        attempt,
                        max
                    );
                    self.sleeper.sleep(self.policy.delay).await;
                }
                Err(ModelError::NotFound(detail)) => {
                    error!(model = %self.model, "Model not found. Please check the model name.");
                    return Err(ChannelError::ModelUnavailable {
                        model: self.model.clone(),
                        detail,
                    });
                }
                Err(other) => return Err(ChannelError::Backend(other)),
            }
        }

        Err(ChannelError::MaxRetriesExceeded { attempts: max })
    }
}
