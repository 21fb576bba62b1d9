//! Scout - 分级预算的迭代式研究会话引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 档位预算、会话账本、会话注册表、控制器状态机、错误类型
//! - **research**: 引用解析、检索执行（重试/退避）、反思闸门、报告渲染
//! - **collaborators**: 查询生成 / 检索 / 反思 / 合成 的协作方接口与基于 LLM 的实现
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）
//! - **service**: 对外研究入口 conduct_research
//! - **observability**: 日志初始化

pub mod collaborators;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod research;
pub mod service;

pub use crate::core::{EffortTier, ResearchError, SessionController, SessionRegistry};
pub use service::ResearchService;
