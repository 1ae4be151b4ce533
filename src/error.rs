use thiserror::Error;

/// 模型后端返回的错误分类
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// 限流 / 配额耗尽，可以等待后重试
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// 模型标识被后端拒绝 (404 / not found)
    #[error("model not found: {0}")]
    NotFound(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// 重试通道的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("model '{model}' is unavailable: {detail}")]
    ModelUnavailable { model: String, detail: String },

    #[error("max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },

    #[error(transparent)]
    Backend(ModelError),
}

/// 模板格式化错误 (占位符与参数不匹配)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("unmatched '{brace}' at byte {offset}")]
    UnmatchedBrace { brace: char, offset: usize },

    #[error("positional placeholder at byte {0}")]
    Positional(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Initial,
    Draft,
    Refine,
}

impl std::fmt::Display for StepPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepPhase::Initial => write!(f, "initial"),
            StepPhase::Draft => write!(f, "draft"),
            StepPhase::Refine => write!(f, "refine"),
        }
    }
}

/// 单个步骤执行失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("step '{step}' failed during {phase}: {source}")]
pub struct StepExecutionError {
    pub step: String,
    pub phase: StepPhase,
    #[source]
    pub source: ChannelError,
}

/// 步骤脚本结构错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("step script must be a mapping")]
    NotAMapping,

    #[error("no 'Initial' prompt found")]
    MissingInitial,

    #[error("invalid mappings entry for '{step}': {reason}")]
    InvalidMapping { step: String, reason: String },
}

/// 任务存储读写错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to write row {row} column {column}: {reason}")]
    Write { row: usize, column: usize, reason: String },

    #[error("worksheet '{0}' not found")]
    WorksheetNotFound(String),

    #[error("store request failed: {0}")]
    Request(String),
}
