//! 检索执行器：单条查询 + 重试 + 指数退避 + 单次超时
//!
//! execute 永不失败：所有尝试都失败时返回降级 SearchResult（内容说明查询与最后一次错误，引用为空），
//! 控制器对它与成功结果同等计数。

use std::sync::Arc;
use std::time::Duration;

use crate::collaborators::{SearchProvider, SearchResponse};
use crate::core::{CollaboratorError, SearchResult};
use crate::research::citation::{render_sources_block, resolve};
use crate::research::with_timeout;

/// 重试策略：最多 max_attempts 次，第 n 次（从 0 计）失败后等待 base * 2^n
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// 第 attempt 次失败后的等待时长；指数不超过重试上限
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(self.max_attempts).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

pub struct SearchExecutor {
    provider: Arc<dyn SearchProvider>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl SearchExecutor {
    pub fn new(provider: Arc<dyn SearchProvider>, retry: RetryPolicy, call_timeout: Duration) -> Self {
        Self {
            provider,
            retry,
            call_timeout,
        }
    }

    pub async fn execute(&self, query: &str, search_id: u64) -> SearchResult {
        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = CollaboratorError::Failed("no attempt made".to_string());

        for attempt in 0..attempts {
            match with_timeout(self.call_timeout, self.provider.search(query)).await {
                Ok(response) => {
                    let result = Self::grounded_result(query, search_id, response);
                    tracing::info!(
                        search_id,
                        attempt = attempt + 1,
                        citations = result.citations.len(),
                        query = %query,
                        "search completed"
                    );
                    return result;
                }
                Err(e) => {
                    tracing::warn!(
                        search_id,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %e,
                        query = %query,
                        "search attempt failed"
                    );
                    last_error = e;
                    if attempt + 1 < attempts {
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    }
                }
            }
        }

        tracing::error!(search_id, query = %query, error = %last_error, "search degraded after retries");
        SearchResult::new(
            query,
            search_id,
            format!("Search failed for query: {query}. Error: {last_error}"),
            Vec::new(),
        )
    }

    fn grounded_result(query: &str, search_id: u64, response: SearchResponse) -> SearchResult {
        let citations = resolve(&response.references, search_id);
        let text = if response.text.trim().is_empty() {
            "No content retrieved".to_string()
        } else {
            response.text
        };
        let content = text + &render_sources_block(&citations);
        SearchResult::new(query, search_id, content, citations)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::collaborators::GroundingReference;

    /// 前 failures 次失败，之后成功
    struct FlakyProvider {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for FlakyProvider {
        async fn search(&self, query: &str) -> Result<SearchResponse, CollaboratorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(CollaboratorError::Failed(format!("unreachable #{n}")));
            }
            Ok(SearchResponse {
                text: format!("findings about {query}"),
                references: vec![
                    GroundingReference {
                        url: Some("https://a.com".to_string()),
                        title: Some("A".to_string()),
                        snippet: None,
                    },
                    GroundingReference::default(),
                ],
            })
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl SearchProvider for SlowProvider {
        async fn search(&self, _query: &str) -> Result<SearchResponse, CollaboratorError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(SearchResponse::default())
        }
    }

    fn executor(provider: Arc<dyn SearchProvider>) -> SearchExecutor {
        SearchExecutor::new(provider, RetryPolicy::new(3, Duration::ZERO), Duration::from_secs(5))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let delays: Vec<Duration> = (0..6).map(|n| policy.delay_for(n)).collect();
        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(200));
        assert_eq!(delays[2], Duration::from_millis(400));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(delays[5], policy.delay_for(3));
    }

    #[tokio::test]
    async fn test_success_resolves_citations() {
        let provider = Arc::new(FlakyProvider { failures: 0, calls: AtomicUsize::new(0) });
        let result = executor(provider.clone()).execute("rust async", 4).await;
        assert_eq!(result.search_id, 4);
        assert_eq!(result.citations.len(), 1);
        assert_eq!(result.citations[0].short_url, "[4-0]");
        assert!(result.content.starts_with("findings about rust async"));
        assert!(result.content.contains("**Sources:**"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let provider = Arc::new(FlakyProvider { failures: 2, calls: AtomicUsize::new(0) });
        let result = executor(provider.clone()).execute("q", 0).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.citations.len(), 1);
    }

    #[tokio::test]
    async fn test_degrades_after_exact_attempt_ceiling() {
        let provider = Arc::new(FlakyProvider { failures: usize::MAX, calls: AtomicUsize::new(0) });
        let result = executor(provider.clone()).execute("dark matter", 9).await;
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.search_id, 9);
        assert!(result.citations.is_empty());
        assert!(result.content.contains("dark matter"));
        assert!(result.content.contains("unreachable #2"));
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let exec = SearchExecutor::new(
            Arc::new(SlowProvider),
            RetryPolicy::new(2, Duration::ZERO),
            Duration::from_millis(20),
        );
        let result = exec.execute("slow", 1).await;
        assert!(result.citations.is_empty());
        assert!(result.content.starts_with("Search failed for query: slow."));
        assert!(result.content.contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_text_becomes_placeholder() {
        struct Empty;
        #[async_trait]
        impl SearchProvider for Empty {
            async fn search(&self, _q: &str) -> Result<SearchResponse, CollaboratorError> {
                Ok(SearchResponse::default())
            }
        }
        let result = executor(Arc::new(Empty)).execute("q", 0).await;
        assert_eq!(result.content, "No content retrieved");
    }
}
