use async_trait::async_trait;
use crate::error::ModelError;
use std::fmt::Debug;

pub mod gemini;
pub mod wordpress;

/// 持久对话会话：每次发送都会带上此前的全部历史
#[async_trait]
pub trait ChatSession: Send + Debug {
    async fn send_message(&mut self, content: &str) -> Result<String, ModelError>;
}

/// 对话后端：以给定的系统指令开启新的会话
pub trait ChatBackend: Send + Sync {
    fn model_name(&self) -> &str;
    fn start_chat(&self, system_instruction: &str) -> Box<dyn ChatSession>;
}

/// 草稿发布接口
#[async_trait]
pub trait Publisher: Send + Sync + Debug {
    /// Creates a draft item and returns its link, or `None` when the call failed.
    async fn post_draft(&self, title: &str, content: &str, slug: &str) -> Option<String>;
}
