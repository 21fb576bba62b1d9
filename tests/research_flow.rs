//! 端到端研究流程测试：用确定性的假协作方驱动 ResearchService

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use scout::collaborators::{
    Collaborators, GeneratedQuery, GroundingReference, QueryGenerator, QueryPlan, Reflection,
    Reflector, SearchProvider, SearchResponse, Synthesizer,
};
use scout::core::{
    CitationSegment, CollaboratorError, EffortTier, ResearchSettings, SearchResult,
    SessionController, SessionRegistry,
};
use scout::research::RetryPolicy;
use scout::ResearchService;

// ---------------------------------------------------------------------------
// 假协作方
// ---------------------------------------------------------------------------

enum QueryMode {
    Numbered,
    Empty,
    Fail,
}

struct FakeQueries {
    calls: AtomicUsize,
    mode: QueryMode,
}

#[async_trait]
impl QueryGenerator for FakeQueries {
    async fn generate(
        &self,
        topic: &str,
        count: usize,
        _prior: &[SearchResult],
    ) -> Result<QueryPlan, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            QueryMode::Numbered => Ok(QueryPlan {
                queries: (0..count)
                    .map(|i| GeneratedQuery::new(format!("{topic} aspect {i}"), "coverage"))
                    .collect(),
                rationale: "spread".to_string(),
            }),
            QueryMode::Empty => Ok(QueryPlan::default()),
            QueryMode::Fail => Err(CollaboratorError::Failed("generator offline".to_string())),
        }
    }
}

enum SearchMode {
    Grounded,
    Fail,
    Panic,
    Hang,
}

struct FakeSearch {
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
    mode: SearchMode,
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, query: &str) -> Result<SearchResponse, CollaboratorError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        match self.mode {
            SearchMode::Grounded => Ok(SearchResponse {
                text: format!("Findings about {query}"),
                references: vec![
                    GroundingReference {
                        url: Some("https://shared.example.com/a".to_string()),
                        title: Some("Shared Source".to_string()),
                        snippet: None,
                    },
                    GroundingReference {
                        url: Some(format!("https://unique.example.com/{n}")),
                        title: Some(format!("Unique {n}")),
                        snippet: None,
                    },
                    GroundingReference {
                        url: Some("not a url".to_string()),
                        title: Some("Broken".to_string()),
                        snippet: None,
                    },
                ],
            }),
            SearchMode::Fail => Err(CollaboratorError::Failed("quota exceeded".to_string())),
            SearchMode::Panic => panic!("search backend exploded"),
            SearchMode::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(SearchResponse::default())
            }
        }
    }
}

struct FakeReflector {
    calls: AtomicUsize,
    answer: Reflection,
}

#[async_trait]
impl Reflector for FakeReflector {
    async fn reflect(
        &self,
        _topic: &str,
        _context: &str,
        _tier: EffortTier,
    ) -> Result<Reflection, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

struct FakeSynthesizer {
    calls: AtomicUsize,
    fail: bool,
    registry: Arc<SessionRegistry>,
    active_sessions: AtomicUsize,
    search_ids: Mutex<Vec<u64>>,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        topic: &str,
        results: &[SearchResult],
        _citations: &[CitationSegment],
        _tier: EffortTier,
    ) -> Result<String, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.active_sessions.store(self.registry.len(), Ordering::SeqCst);
        *self.search_ids.lock().unwrap() = results.iter().map(|r| r.search_id).collect();
        if self.fail {
            return Err(CollaboratorError::Timeout(Duration::from_secs(60)));
        }
        Ok(format!("# Answer on {topic}"))
    }
}

// ---------------------------------------------------------------------------
// 组装
// ---------------------------------------------------------------------------

struct Harness {
    service: ResearchService,
    registry: Arc<SessionRegistry>,
    queries: Arc<FakeQueries>,
    search: Arc<FakeSearch>,
    reflector: Arc<FakeReflector>,
    synthesizer: Arc<FakeSynthesizer>,
}

struct Setup {
    queries: QueryMode,
    search: SearchMode,
    reflection: Reflection,
    synthesis_fails: bool,
    parallel_searches: usize,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            queries: QueryMode::Numbered,
            search: SearchMode::Grounded,
            reflection: insufficient(vec!["follow up"]),
            synthesis_fails: false,
            parallel_searches: 1,
        }
    }
}

fn insufficient(follow_ups: Vec<&str>) -> Reflection {
    Reflection {
        sufficient: false,
        gap: "more depth needed".to_string(),
        follow_ups: follow_ups.into_iter().map(String::from).collect(),
        confidence: 0.3,
    }
}

fn harness(setup: Setup) -> Harness {
    let registry = Arc::new(SessionRegistry::new());
    let queries = Arc::new(FakeQueries {
        calls: AtomicUsize::new(0),
        mode: setup.queries,
    });
    let search = Arc::new(FakeSearch {
        calls: AtomicUsize::new(0),
        queries: Mutex::new(Vec::new()),
        mode: setup.search,
    });
    let reflector = Arc::new(FakeReflector {
        calls: AtomicUsize::new(0),
        answer: setup.reflection,
    });
    let synthesizer = Arc::new(FakeSynthesizer {
        calls: AtomicUsize::new(0),
        fail: setup.synthesis_fails,
        registry: registry.clone(),
        active_sessions: AtomicUsize::new(0),
        search_ids: Mutex::new(Vec::new()),
    });

    let settings = ResearchSettings {
        retry: RetryPolicy::new(3, Duration::ZERO),
        call_timeout: Duration::from_secs(5),
        confidence_threshold: 0.8,
        parallel_searches: setup.parallel_searches,
        reflection_window: 5,
        reflection_excerpt_chars: 400,
    };
    let collaborators = Collaborators::new(
        queries.clone(),
        search.clone(),
        reflector.clone(),
        synthesizer.clone(),
    );
    let controller = SessionController::new(collaborators, registry.clone(), settings);

    Harness {
        service: ResearchService::new(controller),
        registry,
        queries,
        search,
        reflector,
        synthesizer,
    }
}

fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_low_tier_stays_within_budget() {
    let h = harness(Setup::default());

    let report = h.service.conduct_research("quantum computing", "low").await;

    assert_eq!(count(&h.queries.calls), 1);
    assert_eq!(count(&h.search.calls), 2);
    assert_eq!(count(&h.reflector.calls), 1);
    assert_eq!(count(&h.synthesizer.calls), 1);
    assert!(report.starts_with("# Answer on quantum computing"));
    assert!(report.contains("using low effort level with 2 queries*"));
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_session_is_registered_while_running() {
    let h = harness(Setup::default());
    h.service.conduct_research("solar sails", "low").await;

    assert_eq!(count(&h.synthesizer.active_sessions), 1);
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_blank_topic_is_rejected_without_calls() {
    let h = harness(Setup::default());

    for topic in ["", "   \t\n"] {
        let report = h.service.conduct_research(topic, "medium").await;
        assert_eq!(report, "Error: Research topic cannot be empty.");
    }
    // 空 topic 优先于非法档位
    let report = h.service.conduct_research(" ", "extreme").await;
    assert_eq!(report, "Error: Research topic cannot be empty.");

    assert_eq!(count(&h.queries.calls), 0);
    assert_eq!(count(&h.search.calls), 0);
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_overlong_topic_is_rejected_without_calls() {
    let h = harness(Setup::default());

    let report = h.service.conduct_research(&"x".repeat(5000), "low").await;
    assert_eq!(
        report,
        "Error: Research topic is too long (5000 characters, maximum 500)."
    );
    // 长度校验先于档位解析
    let report = h.service.conduct_research(&"x".repeat(501), "extreme").await;
    assert!(report.contains("too long (501 characters"));

    assert_eq!(count(&h.queries.calls), 0);
    assert_eq!(count(&h.search.calls), 0);
    assert_eq!(count(&h.synthesizer.calls), 0);
    assert!(h.registry.is_empty());

    // 恰好 500 字符（去首尾空白后）仍可研究
    let topic = format!("  {}  ", "y".repeat(500));
    let report = h.service.conduct_research(&topic, "low").await;
    assert!(report.contains("using low effort level with 2 queries*"));
}

#[tokio::test]
async fn test_invalid_effort_is_rejected() {
    let h = harness(Setup::default());

    let report = h.service.conduct_research("fusion", "extreme").await;

    assert!(report.contains("Unknown effort level 'extreme'"));
    assert_eq!(count(&h.queries.calls), 0);
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_effort_is_case_insensitive() {
    let h = harness(Setup::default());
    let report = h.service.conduct_research("fusion", " HIGH ").await;
    assert!(report.contains("using high effort level"));
}

#[tokio::test]
async fn test_failing_search_degrades_and_still_counts() {
    let h = harness(Setup {
        search: SearchMode::Fail,
        synthesis_fails: true,
        ..Setup::default()
    });

    let report = h.service.conduct_research("quantum computing", "low").await;

    // 两条初始查询，每条三次尝试
    assert_eq!(count(&h.search.calls), 6);
    assert!(report.starts_with("Research Summary for: quantum computing"));
    assert!(report.contains("Search failed for query: quantum computing aspect 0. Error: quota exceeded"));
    assert!(report.contains("with 2 queries*"));
    assert!(!report.contains("## Sources"));
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_high_confidence_stops_after_one_loop() {
    let h = harness(Setup {
        reflection: Reflection {
            sufficient: false,
            gap: String::new(),
            follow_ups: vec!["ignored".to_string()],
            confidence: 0.95,
        },
        ..Setup::default()
    });

    let report = h.service.conduct_research("fusion", "medium").await;

    assert_eq!(count(&h.reflector.calls), 1);
    assert_eq!(count(&h.search.calls), 4);
    assert!(!h.search.queries.lock().unwrap().contains(&"ignored".to_string()));
    assert!(report.contains("using medium effort level with 4 queries*"));
}

#[tokio::test]
async fn test_follow_ups_capped_per_loop_and_by_loops() {
    let h = harness(Setup {
        reflection: insufficient(vec!["f1", "f2", "f3", "f4", "f5", "f6", "f7"]),
        ..Setup::default()
    });

    let report = h.service.conduct_research("fusion", "medium").await;

    // 4 条初始 + 两轮各 5 条；第三轮开始后不再派发
    assert_eq!(count(&h.reflector.calls), 3);
    assert_eq!(count(&h.search.calls), 14);
    assert!(!h.search.queries.lock().unwrap().contains(&"f6".to_string()));
    assert!(report.contains("with 14 queries*"));
}

#[tokio::test]
async fn test_empty_initial_plan_seeds_topic() {
    let h = harness(Setup {
        queries: QueryMode::Empty,
        reflection: Reflection {
            sufficient: true,
            gap: String::new(),
            follow_ups: Vec::new(),
            confidence: 0.9,
        },
        ..Setup::default()
    });

    let report = h.service.conduct_research("tidal energy", "medium").await;

    // 第一轮反思没有结果可看，直接以 topic 作为后续查询
    assert_eq!(*h.search.queries.lock().unwrap(), vec!["tidal energy".to_string()]);
    assert_eq!(count(&h.reflector.calls), 1);
    assert!(report.contains("with 1 queries*"));
}

#[tokio::test]
async fn test_low_tier_without_queries_reports_no_results() {
    let h = harness(Setup {
        queries: QueryMode::Empty,
        ..Setup::default()
    });

    let report = h.service.conduct_research("tidal energy", "low").await;

    assert_eq!(count(&h.search.calls), 0);
    assert_eq!(count(&h.synthesizer.calls), 0);
    assert!(report.starts_with("No research results were obtained for the topic: tidal energy"));
    assert!(report.contains("using low effort level with 0 queries*"));
}

#[tokio::test]
async fn test_generator_failure_uses_fallback_queries() {
    let h = harness(Setup {
        queries: QueryMode::Fail,
        ..Setup::default()
    });

    h.service.conduct_research("fusion", "low").await;

    assert_eq!(
        *h.search.queries.lock().unwrap(),
        vec!["fusion".to_string(), "fusion recent developments".to_string()]
    );
}

#[tokio::test]
async fn test_citations_are_deduplicated_in_appendix() {
    let h = harness(Setup::default());

    let report = h.service.conduct_research("fusion", "low").await;

    let appendix = report.split("## Sources\n").nth(1).unwrap();
    assert_eq!(appendix.matches("(https://shared.example.com/a)").count(), 1);
    assert!(appendix.starts_with("1. [Shared Source](https://shared.example.com/a)\n"));
    assert!(appendix.contains("2. [Unique 0](https://unique.example.com/0)\n"));
    assert!(appendix.contains("3. [Unique 1](https://unique.example.com/1)\n"));
    assert!(!appendix.contains("not a url"));
}

#[tokio::test]
async fn test_synthesis_failure_falls_back_to_raw_summary() {
    let h = harness(Setup {
        synthesis_fails: true,
        ..Setup::default()
    });

    let report = h.service.conduct_research("fusion", "low").await;

    assert!(report.starts_with("Research Summary for: fusion\n\nResearch Query: fusion aspect 0\nFindings about fusion aspect 0"));
    assert!(report.contains("**Sources:**\n- [0-0] [Shared Source](https://shared.example.com/a)"));
    assert!(report.contains("\n\n## Sources\n1. [Shared Source]"));
    assert!(report.contains("\n\n---\n*Research completed on "));
}

#[tokio::test]
async fn test_panicking_collaborator_fails_session() {
    let h = harness(Setup {
        search: SearchMode::Panic,
        ..Setup::default()
    });

    let report = h.service.conduct_research("fusion", "low").await;

    assert!(report.starts_with("Research failed for topic 'fusion': unexpected failure: search backend exploded"));
    assert!(report.ends_with("Please try again."));
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_cancellation_releases_session() {
    let h = harness(Setup {
        search: SearchMode::Hang,
        ..Setup::default()
    });
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let report = h
        .service
        .conduct_research_with_cancel("fusion", "medium", cancel)
        .await;

    assert_eq!(report, "Research for topic 'fusion' was cancelled.");
    assert_eq!(count(&h.synthesizer.calls), 0);
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_parallel_dispatch_keeps_ids_unique_and_ordered() {
    let h = harness(Setup {
        parallel_searches: 4,
        reflection: insufficient(vec!["a", "b", "c", "d", "e"]),
        ..Setup::default()
    });

    let report = h.service.conduct_research("fusion", "high").await;

    // 6 条初始 + 四轮各 5 条
    assert_eq!(count(&h.search.calls), 26);
    let ids = h.synthesizer.search_ids.lock().unwrap().clone();
    assert_eq!(ids, (0..26).collect::<Vec<u64>>());
    assert!(report.contains("using high effort level with 26 queries*"));
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let h = Arc::new(harness(Setup::default()));

    let tasks: Vec<_> = ["alpha", "beta", "gamma"]
        .into_iter()
        .map(|topic| {
            let h = h.clone();
            tokio::spawn(async move { h.service.conduct_research(topic, "low").await })
        })
        .collect();

    for task in tasks {
        let report = task.await.unwrap();
        assert!(report.contains("with 2 queries*"));
    }
    assert_eq!(count(&h.search.calls), 6);
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn test_status_and_tiers_reports() {
    let h = harness(Setup::default());

    let status = h.service.status();
    assert!(status.contains("**Active Sessions**: 0"));
    assert!(status.contains("**Medium**: 100 searches, 3 loops"));

    let tiers = h.service.effort_levels();
    assert!(tiers.contains("## Low Effort\n- **Max Searches**: 10"));
    assert!(tiers.contains("- **Initial Queries**: 6"));
}
