//! 错误类型
//!
//! - ResearchError：控制器边界上对调用方可见的错误（输入错误、取消、会话级致命错误）
//! - CollaboratorError：协作方（查询生成 / 检索 / 反思 / 合成）调用失败，只在控制器内部流转，
//!   由各组件的降级策略吸收，不会原样暴露给调用方
//! - RegistryError：会话注册表冲突

use std::time::Duration;

use thiserror::Error;

/// 研究会话对外错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResearchError {
    #[error("Error: Research topic cannot be empty.")]
    InvalidTopic,

    #[error("Error: Research topic is too long ({len} characters, maximum {max}).")]
    TopicTooLong { len: usize, max: usize },

    #[error("Error: Unknown effort level '{0}'. Expected one of: low, medium, high.")]
    InvalidEffort(String),

    #[error("Research for topic '{topic}' was cancelled.")]
    Cancelled { topic: String },

    /// 控制器流程中的意外失败（协作方 panic、会话 ID 无法分配等）
    #[error("Research failed for topic '{topic}': {reason}. Please try again.")]
    SessionFailed { topic: String, reason: String },
}

/// 协作方单次调用的失败原因；超时与普通失败在降级策略中同等对待
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),

    /// 协作方返回了无法解析 / 不符合约定的内容
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// 注册表错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("session id collision: {0}")]
    Collision(String),
}
