//! 外部协作方接口：查询生成 / 检索 / 反思 / 答案合成
//!
//! 每个协作方是一个 trait，调用结果显式为 `Result<_, CollaboratorError>`，
//! 降级策略由调用方（控制器、检索执行器、反思闸门）按结果分支决定。
//! 各自有一个基于 LlmClient 的实现；测试中可替换为确定性的假实现。

pub mod json;
pub mod queries;
pub mod reflection;
pub mod search;
pub mod synthesis;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{CitationSegment, CollaboratorError, EffortTier, SearchResult};
use crate::llm::LlmClient;

pub use queries::LlmQueryGenerator;
pub use reflection::LlmReflector;
pub use search::LlmSearchProvider;
pub use synthesis::LlmSynthesizer;

/// 单条生成的查询及其理由
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub query: String,
    #[serde(default)]
    pub rationale: String,
}

impl GeneratedQuery {
    pub fn new(query: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            rationale: rationale.into(),
        }
    }
}

/// 查询生成结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    #[serde(default)]
    pub queries: Vec<GeneratedQuery>,
    #[serde(default)]
    pub rationale: String,
}

/// 检索方返回的原始来源引用（未校验）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingReference {
    #[serde(default, alias = "uri")]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
}

/// 单次检索调用的原始响应
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub text: String,
    pub references: Vec<GroundingReference>,
}

/// 反思结论
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    #[serde(alias = "is_sufficient")]
    pub sufficient: bool,
    #[serde(default, alias = "knowledge_gap")]
    pub gap: String,
    #[serde(default, alias = "follow_up_queries")]
    pub follow_ups: Vec<String>,
    #[serde(default = "default_confidence", alias = "confidence_score")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

/// 查询生成：prior 为已有结果（初始阶段为空）
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate(
        &self,
        topic: &str,
        count: usize,
        prior: &[SearchResult],
    ) -> Result<QueryPlan, CollaboratorError>;
}

/// 检索：单次调用，不做重试（重试由 SearchExecutor 负责）
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse, CollaboratorError>;
}

/// 反思：context 为已裁剪的最近结果摘要
#[async_trait]
pub trait Reflector: Send + Sync {
    async fn reflect(
        &self,
        topic: &str,
        context: &str,
        tier: EffortTier,
    ) -> Result<Reflection, CollaboratorError>;
}

/// 最终答案合成
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        topic: &str,
        results: &[SearchResult],
        citations: &[CitationSegment],
        tier: EffortTier,
    ) -> Result<String, CollaboratorError>;
}

/// 四个协作方的集合，控制器持有
#[derive(Clone)]
pub struct Collaborators {
    pub queries: Arc<dyn QueryGenerator>,
    pub search: Arc<dyn SearchProvider>,
    pub reflector: Arc<dyn Reflector>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl Collaborators {
    pub fn new(
        queries: Arc<dyn QueryGenerator>,
        search: Arc<dyn SearchProvider>,
        reflector: Arc<dyn Reflector>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            queries,
            search,
            reflector,
            synthesizer,
        }
    }

    pub fn from_role_llms(llms: RoleLlms) -> Self {
        Self {
            queries: Arc::new(LlmQueryGenerator::new(llms.query)),
            search: Arc::new(LlmSearchProvider::new(llms.search)),
            reflector: Arc::new(LlmReflector::new(llms.reflection)),
            synthesizer: Arc::new(LlmSynthesizer::new(llms.answer)),
        }
    }
}

/// 各角色使用的 LLM（可分别配置模型）
pub struct RoleLlms {
    pub query: Arc<dyn LlmClient>,
    pub search: Arc<dyn LlmClient>,
    pub reflection: Arc<dyn LlmClient>,
    pub answer: Arc<dyn LlmClient>,
}

/// 当前日期（提示词与报告页脚用）
pub fn current_date() -> String {
    chrono::Local::now().format("%B %d, %Y").to_string()
}

/// 按字符截断，超出时追加 "..."
pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}
