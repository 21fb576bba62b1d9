//! 基于 LLM 的研究反思

use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::json::parse_json;
use crate::collaborators::{current_date, Reflection, Reflector};
use crate::core::{CollaboratorError, EffortTier};
use crate::llm::{LlmClient, Message};

pub struct LlmReflector {
    llm: Arc<dyn LlmClient>,
}

impl LlmReflector {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn prompt(topic: &str, context: &str, tier: EffortTier) -> String {
        format!(
            r#"Analyze the current research progress and determine if we have sufficient information or need additional research.

Research Topic: {topic}
Research Effort Level: {tier} ({description})
Current Date: {date}

Current Research Findings:
{context}

Please evaluate:
1. Are the current findings comprehensive enough to answer the research topic?
2. What specific knowledge gaps or areas need more investigation?
3. What follow-up queries (at most 5) would address these gaps most effectively?
4. Rate your confidence in the current research completeness (0-1 scale)

Output format (JSON object only):
{{"is_sufficient": false, "knowledge_gap": "...", "follow_up_queries": ["..."], "confidence_score": 0.5}}"#,
            description = tier.budget().description,
            date = current_date(),
        )
    }
}

#[async_trait]
impl Reflector for LlmReflector {
    async fn reflect(
        &self,
        topic: &str,
        context: &str,
        tier: EffortTier,
    ) -> Result<Reflection, CollaboratorError> {
        let messages = vec![Message::user(Self::prompt(topic, context, tier))];
        let response = self.llm.complete(&messages).await?;
        parse_json(&response)
    }
}
