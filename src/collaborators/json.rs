//! 从 LLM 文本输出中提取 JSON 对象并反序列化
//!
//! 支持 ```json ... ``` 代码块，或取第一个 '{' 到最后一个 '}' 之间的片段。

use serde::de::DeserializeOwned;

use crate::core::CollaboratorError;

/// 提取 JSON 片段；找不到对象时返回 None
pub fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let body = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest).trim();
        return (!body.is_empty()).then_some(body);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// 提取并解析为 T；失败时返回 Malformed
pub fn parse_json<T: DeserializeOwned>(output: &str) -> Result<T, CollaboratorError> {
    let json = extract_json(output)
        .ok_or_else(|| CollaboratorError::Malformed("no JSON object in response".to_string()))?;
    serde_json::from_str(json).map_err(|e| CollaboratorError::Malformed(format!("{e}: {json}")))
}
