//! 基于 LLM 的查询生成

use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::json::parse_json;
use crate::collaborators::{current_date, excerpt, QueryGenerator, QueryPlan};
use crate::core::{CollaboratorError, SearchResult};
use crate::llm::{LlmClient, Message};

/// 作为上下文的最近结果条数
const PRIOR_WINDOW: usize = 3;
const PRIOR_EXCERPT_CHARS: usize = 200;

pub struct LlmQueryGenerator {
    llm: Arc<dyn LlmClient>,
}

impl LlmQueryGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn prior_context(prior: &[SearchResult]) -> String {
        if prior.is_empty() {
            return String::new();
        }
        let start = prior.len().saturating_sub(PRIOR_WINDOW);
        let mut context = String::from("\n\nPrevious research context:\n");
        for r in &prior[start..] {
            context.push_str(&format!("- Query: {}\n", r.query));
            context.push_str(&format!("  Key findings: {}\n", excerpt(&r.content, PRIOR_EXCERPT_CHARS)));
        }
        context
    }

    fn prompt(topic: &str, count: usize, prior: &[SearchResult]) -> String {
        format!(
            r#"You are a research query specialist. Generate {count} sophisticated and diverse web search queries for comprehensive research on: {topic}

Current date: {date}

Instructions:
- Create queries that explore different aspects and perspectives of the topic
- Ensure queries are specific enough to find relevant, authoritative sources
- Include queries for recent developments, expert opinions, and factual data
- Avoid duplicate or overly similar queries
- Each query should have a clear rationale explaining its purpose
{context}
Output format (JSON object only):
{{"queries": [{{"query": "...", "rationale": "..."}}], "rationale": "overall strategy"}}

Topic: {topic}"#,
            date = current_date(),
            context = Self::prior_context(prior),
        )
    }
}

#[async_trait]
impl QueryGenerator for LlmQueryGenerator {
    async fn generate(
        &self,
        topic: &str,
        count: usize,
        prior: &[SearchResult],
    ) -> Result<QueryPlan, CollaboratorError> {
        let messages = vec![Message::user(Self::prompt(topic, count, prior))];
        let response = self.llm.complete(&messages).await?;
        let plan: QueryPlan = parse_json(&response)?;
        if plan.queries.iter().all(|q| q.query.trim().is_empty()) {
            return Err(CollaboratorError::Malformed("no queries generated".to_string()));
        }
        Ok(plan)
    }
}
