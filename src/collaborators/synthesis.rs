//! 基于 LLM 的最终答案合成

use std::sync::Arc;

use async_trait::async_trait;

use crate::collaborators::{current_date, Synthesizer};
use crate::core::{CitationSegment, CollaboratorError, EffortTier, SearchResult};
use crate::llm::{LlmClient, Message};
use crate::research::report::combined_research;

pub struct LlmSynthesizer {
    llm: Arc<dyn LlmClient>,
}

impl LlmSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn prompt(topic: &str, results: &[SearchResult], citations: &[CitationSegment], tier: EffortTier) -> String {
        let sources = citations
            .iter()
            .map(|c| format!("- {} {} ({})", c.short_url, c.title, c.url))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            r#"Based on the comprehensive research conducted, provide a detailed, well-structured answer to the research topic.

Research Topic: {topic}
Research Effort: {tier} ({description})
Current Date: {date}
Total Research Queries: {total}

Research Content:
{content}

Known Sources:
{sources}

Instructions:
- Synthesize all research findings into a comprehensive, coherent answer
- Structure your response with clear headings and sections
- Include key facts, statistics, expert opinions, and recent developments
- Maintain objectivity and cite multiple perspectives where relevant
- Ensure accuracy and avoid speculation beyond the research findings
- Keep the response informative yet accessible

Generate a comprehensive research report that fully addresses the topic."#,
            description = tier.budget().description,
            date = current_date(),
            total = results.len(),
            content = combined_research(results),
        )
    }
}

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    async fn synthesize(
        &self,
        topic: &str,
        results: &[SearchResult],
        citations: &[CitationSegment],
        tier: EffortTier,
    ) -> Result<String, CollaboratorError> {
        let messages = vec![
            Message::system("You are a meticulous research analyst who writes well-sourced reports."),
            Message::user(Self::prompt(topic, results, citations, tier)),
        ];
        Ok(self.llm.complete(&messages).await?)
    }
}
