//! 引用解析：原始 grounding 引用 → 校验、规范化、去重后的 CitationSegment
//!
//! 单条引用缺少 URL 或 URL 不合法时跳过，不中断整批处理。

use std::collections::HashSet;

use url::Url;

use crate::collaborators::GroundingReference;
use crate::core::CitationSegment;

const MAX_TITLE_CHARS: usize = 100;
const TRUNCATED_TITLE_CHARS: usize = 97;
const UNKNOWN_TITLE: &str = "Unknown Source";

/// URL 必须能解析且 scheme 与 host 均非空
pub fn validate_url(raw: &str) -> bool {
    match Url::parse(raw.trim()) {
        Ok(url) => !url.scheme().is_empty() && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// 折叠空白、去首尾空白；超过 100 字符时截为 97 字符 + "..."
pub fn normalize_title(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_TITLE_CHARS {
        let mut truncated: String = collapsed.chars().take(TRUNCATED_TITLE_CHARS).collect();
        truncated.push_str("...");
        truncated
    } else {
        collapsed
    }
}

/// 将一次检索返回的原始引用解析为引用列表；index 为本次调用中被接受条目的序号（从 0 开始）
pub fn resolve(references: &[GroundingReference], search_id: u64) -> Vec<CitationSegment> {
    let mut citations = Vec::with_capacity(references.len());
    for (position, reference) in references.iter().enumerate() {
        let Some(url) = reference.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) else {
            tracing::debug!(search_id, position, "skipping grounding reference without url");
            continue;
        };
        if !validate_url(url) {
            tracing::warn!(search_id, position, url = %url, "skipping grounding reference with invalid url");
            continue;
        }
        let title = reference
            .title
            .as_deref()
            .map(normalize_title)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        citations.push(CitationSegment {
            url: url.to_string(),
            short_url: format!("[{}-{}]", search_id, citations.len()),
            title,
            snippet: reference.snippet.clone(),
        });
    }
    citations
}

/// 按 url 去重，保留首次出现顺序
pub fn dedupe_citations<I>(citations: I) -> Vec<CitationSegment>
where
    I: IntoIterator<Item = CitationSegment>,
{
    let mut seen = HashSet::new();
    citations
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .collect()
}

/// 单次检索结果末尾的来源块
pub fn render_sources_block(citations: &[CitationSegment]) -> String {
    if citations.is_empty() {
        return String::new();
    }
    let mut block = String::from("\n\n**Sources:**\n");
    for c in citations {
        block.push_str(&format!("- {} [{}]({})\n", c.short_url, c.title, c.url));
    }
    block
}

/// 最终答案的引用附录（编号 Markdown 链接）
pub fn render_appendix(citations: &[CitationSegment]) -> String {
    if citations.is_empty() {
        return String::new();
    }
    let mut appendix = String::from("\n\n## Sources\n");
    for (i, c) in citations.iter().enumerate() {
        appendix.push_str(&format!("{}. [{}]({})\n", i + 1, c.title, c.url));
    }
    appendix
}
