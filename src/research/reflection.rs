//! 反思闸门：判断已有结果是否足够，并给出后续查询
//!
//! - 无结果时不调用协作方，直接返回以 topic 为唯一后续查询的种子结论
//! - 协作方失败（含超时）时返回保守结论：结果数 >= 3 视为足够，置信度 0.5，一条通用后续查询

use std::sync::Arc;
use std::time::Duration;

use crate::collaborators::{excerpt, Reflection, Reflector};
use crate::core::{EffortTier, SearchResult};
use crate::research::with_timeout;

/// 单次反思最多保留的后续查询数
pub const MAX_FOLLOW_UPS: usize = 5;

/// 失败降级时视为「足够」的最少结果数
const FALLBACK_SUFFICIENT_RESULTS: usize = 3;

pub struct ReflectionGate {
    reflector: Arc<dyn Reflector>,
    call_timeout: Duration,
    window: usize,
    excerpt_chars: usize,
}

impl ReflectionGate {
    pub fn new(reflector: Arc<dyn Reflector>, call_timeout: Duration) -> Self {
        Self {
            reflector,
            call_timeout,
            window: 5,
            excerpt_chars: 400,
        }
    }

    /// 设置上下文窗口（最近结果条数）与单条内容截断长度
    pub fn with_context_limits(mut self, window: usize, excerpt_chars: usize) -> Self {
        self.window = window.max(1);
        self.excerpt_chars = excerpt_chars;
        self
    }

    pub async fn reflect(&self, topic: &str, results: &[SearchResult], tier: EffortTier) -> Reflection {
        if results.is_empty() {
            return Reflection {
                sufficient: false,
                gap: "No research results available yet".to_string(),
                follow_ups: vec![topic.to_string()],
                confidence: 0.0,
            };
        }

        let context = self.build_context(results);
        match with_timeout(self.call_timeout, self.reflector.reflect(topic, &context, tier)).await {
            Ok(reflection) => {
                let reflection = normalize(reflection);
                tracing::info!(
                    sufficient = reflection.sufficient,
                    confidence = reflection.confidence,
                    follow_ups = reflection.follow_ups.len(),
                    "research reflection completed"
                );
                reflection
            }
            Err(e) => {
                tracing::error!(error = %e, "reflection failed, using conservative fallback");
                Reflection {
                    sufficient: results.len() >= FALLBACK_SUFFICIENT_RESULTS,
                    gap: "Unable to analyze research completeness due to processing error".to_string(),
                    follow_ups: vec![format!("{topic} additional information")],
                    confidence: 0.5,
                }
            }
        }
    }

    /// 最近 window 条结果，每条内容截断
    pub fn build_context(&self, results: &[SearchResult]) -> String {
        let start = results.len().saturating_sub(self.window);
        results[start..]
            .iter()
            .map(|r| format!("Query: {}\nFindings: {}", r.query, excerpt(&r.content, self.excerpt_chars)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// 清理协作方返回：去空白、丢弃空查询、最多 5 条；置信度夹到 [0, 1]，NaN 视为 0.5
fn normalize(mut reflection: Reflection) -> Reflection {
    reflection.follow_ups = reflection
        .follow_ups
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .take(MAX_FOLLOW_UPS)
        .collect();
    reflection.confidence = if reflection.confidence.is_nan() {
        0.5
    } else {
        reflection.confidence.clamp(0.0, 1.0)
    };
    reflection
}
