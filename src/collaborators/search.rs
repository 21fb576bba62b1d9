//! 基于 LLM 的检索：让模型针对查询给出归纳结果与来源列表
//!
//! 未接入真实检索：来源 URL 由模型给出，能通过格式校验但不保证真实存在。
//!
//! 期望输出 JSON：{"text": "...", "sources": [{"url": "...", "title": "...", "snippet": "..."}]}；
//! 模型只返回纯文本时将其作为内容、来源为空。sources 中单条格式不对时跳过，不影响其余条目。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::collaborators::json::extract_json;
use crate::collaborators::{current_date, GroundingReference, SearchProvider, SearchResponse};
use crate::core::CollaboratorError;
use crate::llm::{LlmClient, Message};

pub struct LlmSearchProvider {
    llm: Arc<dyn LlmClient>,
}

impl LlmSearchProvider {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn prompt(query: &str) -> String {
        format!(
            r#"Conduct a comprehensive web search on "{query}" and provide a detailed, well-structured summary.

Instructions:
- Current date: {date}
- Search for the most recent, credible, and authoritative information
- Provide a comprehensive summary with key findings, facts, and insights
- Focus on factual information from reliable sources
- Only include information that can be verified from search results

Output format (JSON object only):
{{"text": "summary", "sources": [{{"url": "https://...", "title": "...", "snippet": "..."}}]}}

Search Query: {query}"#,
            date = current_date(),
        )
    }
}

/// 解析模型输出为 SearchResponse
pub fn parse_search_output(output: &str) -> Result<SearchResponse, CollaboratorError> {
    let parsed = extract_json(output).and_then(|json| serde_json::from_str::<Value>(json).ok());
    let Some(Value::Object(obj)) = parsed else {
        let text = output.trim();
        if text.is_empty() {
            return Err(CollaboratorError::Malformed("empty search response".to_string()));
        }
        return Ok(SearchResponse {
            text: text.to_string(),
            references: Vec::new(),
        });
    };

    let text = obj
        .get("text")
        .or_else(|| obj.get("summary"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let references = obj
        .get("sources")
        .or_else(|| obj.get("references"))
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|v| serde_json::from_value::<GroundingReference>(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    Ok(SearchResponse { text, references })
}

#[async_trait]
impl SearchProvider for LlmSearchProvider {
    async fn search(&self, query: &str) -> Result<SearchResponse, CollaboratorError> {
        let messages = vec![Message::user(Self::prompt(query))];
        let response = self.llm.complete(&messages).await?;
        parse_search_output(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_with_sources() {
        let out = r#"{"text": "Qubits are...", "sources": [{"url": "https://a.com", "title": "A"}, 42, {"title": "no url"}]}"#;
        let resp = parse_search_output(out).unwrap();
        assert_eq!(resp.text, "Qubits are...");
        assert_eq!(resp.references.len(), 2);
        assert_eq!(resp.references[0].url.as_deref(), Some("https://a.com"));
        assert!(resp.references[1].url.is_none());
    }

    #[test]
    fn test_plain_text_becomes_content() {
        let resp = parse_search_output("Just prose, no sources.").unwrap();
        assert_eq!(resp.text, "Just prose, no sources.");
        assert!(resp.references.is_empty());
    }

    #[test]
    fn test_empty_output_is_malformed() {
        assert!(matches!(parse_search_output("   "), Err(CollaboratorError::Malformed(_))));
    }
}
