//! 会话控制器：按档位预算驱动一次研究
//!
//! 状态机：INIT → INITIAL_SEARCH → REFLECT_LOOP → FINALIZE → {COMPLETE | FAILED}
//!
//! - 协作方失败全部在各组件内降级吸收，控制器只对输入错误、取消与意外 panic 返回 Err
//! - 注册表中的会话由 RegistrationGuard 持有，任何退出路径（含 future 被 drop）都会注销
//! - 同一阶段内的检索可按 parallel_searches 并发派发；searchId 与预算占用统一走
//!   SessionLedger::try_reserve_search 的单次 CAS，结果按派发顺序写回

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{stream, FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::collaborators::{Collaborators, QueryPlan};
use crate::config::ResearchSection;
use crate::core::{
    derive_session_id, EffortTier, RegistrationGuard, ResearchError, ResearchSession, SessionLedger,
    SessionPhase, SessionRegistry,
};
use crate::research::citation::render_appendix;
use crate::research::report::{fallback_summary, metadata_footer, no_results_body};
use crate::research::{with_timeout, ReflectionGate, RetryPolicy, SearchExecutor};

/// 单条查询最大长度（字符）
const MAX_QUERY_CHARS: usize = 500;

/// 研究主题最大长度（字符）
pub const MAX_TOPIC_CHARS: usize = 500;

/// 会话 ID 冲突时的最大重新生成次数
const MAX_ID_ATTEMPTS: usize = 8;

/// 查询生成失败时按序使用的角度
const FALLBACK_ANGLES: [&str; 6] = [
    "",
    "recent developments",
    "expert analysis",
    "statistics and data",
    "challenges and limitations",
    "future outlook",
];

/// 控制器运行参数
#[derive(Debug, Clone)]
pub struct ResearchSettings {
    pub retry: RetryPolicy,
    pub call_timeout: Duration,
    pub confidence_threshold: f64,
    pub parallel_searches: usize,
    pub reflection_window: usize,
    pub reflection_excerpt_chars: usize,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self::from(&ResearchSection::default())
    }
}

impl From<&ResearchSection> for ResearchSettings {
    fn from(section: &ResearchSection) -> Self {
        Self {
            retry: RetryPolicy::new(section.max_attempts, Duration::from_millis(section.backoff_base_ms)),
            call_timeout: Duration::from_secs(section.call_timeout_secs.max(1)),
            confidence_threshold: section.confidence_threshold,
            parallel_searches: section.parallel_searches.max(1),
            reflection_window: section.reflection_window,
            reflection_excerpt_chars: section.reflection_excerpt_chars,
        }
    }
}

pub struct SessionController {
    collaborators: Collaborators,
    registry: Arc<SessionRegistry>,
    executor: SearchExecutor,
    gate: ReflectionGate,
    settings: ResearchSettings,
}

impl SessionController {
    pub fn new(collaborators: Collaborators, registry: Arc<SessionRegistry>, settings: ResearchSettings) -> Self {
        let executor = SearchExecutor::new(collaborators.search.clone(), settings.retry, settings.call_timeout);
        let gate = ReflectionGate::new(collaborators.reflector.clone(), settings.call_timeout)
            .with_context_limits(settings.reflection_window, settings.reflection_excerpt_chars);
        Self {
            collaborators,
            registry,
            executor,
            gate,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub async fn run_research(&self, topic: &str, tier: EffortTier) -> Result<String, ResearchError> {
        self.run_research_with_cancel(topic, tier, CancellationToken::new()).await
    }

    /// 运行一次研究；取消令牌触发时放弃当前阶段并返回 Cancelled（注册表照常清理）
    pub async fn run_research_with_cancel(
        &self,
        topic: &str,
        tier: EffortTier,
        cancel: CancellationToken,
    ) -> Result<String, ResearchError> {
        let topic = validate_topic(topic)?;

        let (guard, ledger) = self.allocate(topic, tier)?;
        tracing::info!(
            session_id = %guard.id(),
            topic = %topic,
            effort = %tier,
            "starting research session"
        );

        let run = AssertUnwindSafe(self.drive(ResearchSession::new(ledger.clone()))).catch_unwind();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ResearchError::Cancelled { topic: topic.to_string() }),
            finished = run => finished.map_err(|panic| ResearchError::SessionFailed {
                topic: topic.to_string(),
                reason: panic_reason(panic.as_ref()),
            }),
        };

        ledger.mark_complete();
        match &outcome {
            Ok(_) => {
                Self::enter(&ledger, SessionPhase::Complete);
                tracing::info!(
                    session_id = %ledger.id(),
                    searches = ledger.search_count(),
                    loops = ledger.loop_count(),
                    "research completed"
                );
            }
            Err(e) => {
                Self::enter(&ledger, SessionPhase::Failed);
                tracing::error!(session_id = %ledger.id(), error = %e, "research session aborted");
            }
        }
        drop(guard);
        outcome
    }

    /// INIT：分配唯一会话 ID 并注册
    fn allocate(&self, topic: &str, tier: EffortTier) -> Result<(RegistrationGuard, Arc<SessionLedger>), ResearchError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let ledger = Arc::new(SessionLedger::new(derive_session_id(topic, tier), topic, tier));
            match self.registry.register(ledger.clone()) {
                Ok(guard) => {
                    Self::enter(&ledger, SessionPhase::Init);
                    return Ok((guard, ledger));
                }
                Err(e) => tracing::warn!(error = %e, "regenerating session id"),
            }
        }
        Err(ResearchError::SessionFailed {
            topic: topic.to_string(),
            reason: "could not allocate a unique session id".to_string(),
        })
    }

    async fn drive(&self, mut session: ResearchSession) -> String {
        let ledger = session.ledger().clone();
        let topic = ledger.topic().to_string();
        let tier = ledger.tier();

        Self::enter(&ledger, SessionPhase::InitialSearch);
        let queries = self.initial_queries(&topic, tier.budget().initial_queries).await;
        self.run_batch(&mut session, queries).await;

        Self::enter(&ledger, SessionPhase::ReflectLoop);
        while ledger.can_continue() {
            let Some(round) = ledger.begin_loop() else {
                break;
            };
            let reflection = self.gate.reflect(&topic, session.results(), tier).await;
            if reflection.sufficient || reflection.confidence > self.settings.confidence_threshold {
                tracing::info!(
                    session_id = %ledger.id(),
                    loops = round,
                    confidence = reflection.confidence,
                    "research deemed sufficient"
                );
                break;
            }

            let mut follow_ups = reflection.follow_ups;
            let remaining = ledger.searches_remaining();
            if follow_ups.len() > remaining {
                tracing::debug!(
                    session_id = %ledger.id(),
                    dropped = follow_ups.len() - remaining,
                    "follow-up queries beyond remaining budget dropped"
                );
                follow_ups.truncate(remaining);
            }
            self.run_batch(&mut session, follow_ups).await;
        }

        Self::enter(&ledger, SessionPhase::Finalize);
        self.finalize(&mut session).await
    }

    /// 向查询生成方要 count 条查询；失败时使用由 topic 派生的确定性查询
    async fn initial_queries(&self, topic: &str, count: usize) -> Vec<String> {
        match with_timeout(
            self.settings.call_timeout,
            self.collaborators.queries.generate(topic, count, &[]),
        )
        .await
        {
            Ok(plan) => {
                let queries = sanitize_plan(plan, count);
                tracing::info!(count = queries.len(), topic = %topic, "generated search queries");
                queries
            }
            Err(e) => {
                tracing::error!(error = %e, "query generation failed, using fallback queries");
                fallback_queries(topic, count)
            }
        }
    }

    /// 派发一批查询：每条派发前预留预算与 searchId，预留失败立即停止
    async fn run_batch(&self, session: &mut ResearchSession, queries: Vec<String>) {
        let ledger = session.ledger().clone();
        let executor = &self.executor;
        let dispatches = queries
            .into_iter()
            .map_while(|query| ledger.try_reserve_search().map(|search_id| (query, search_id)));

        let mut completed = stream::iter(dispatches)
            .map(|(query, search_id)| async move { executor.execute(&query, search_id).await })
            .buffered(self.settings.parallel_searches.max(1));

        while let Some(result) = completed.next().await {
            session.record(result);
        }
    }

    /// FINALIZE：去重引用、合成答案（失败时拼接原始内容）、追加引用附录与页脚
    async fn finalize(&self, session: &mut ResearchSession) -> String {
        let citations = session.finalize();
        let ledger = session.ledger().clone();
        let topic = ledger.topic();
        let tier = ledger.tier();
        let results = session.results();

        let body = if results.is_empty() {
            no_results_body(topic)
        } else {
            match with_timeout(
                self.settings.call_timeout,
                self.collaborators.synthesizer.synthesize(topic, results, &citations, tier),
            )
            .await
            {
                Ok(text) if !text.trim().is_empty() => text,
                Ok(_) => {
                    tracing::warn!(session_id = %ledger.id(), "synthesis returned empty text, using raw summary");
                    fallback_summary(topic, results)
                }
                Err(e) => {
                    tracing::error!(session_id = %ledger.id(), error = %e, "synthesis failed, using raw summary");
                    fallback_summary(topic, results)
                }
            }
        };

        tracing::info!(
            session_id = %ledger.id(),
            citations = citations.len(),
            "finalized research answer"
        );
        body + &render_appendix(&citations) + &metadata_footer(tier, ledger.search_count())
    }

    fn enter(ledger: &SessionLedger, phase: SessionPhase) {
        tracing::debug!(session_id = %ledger.id(), phase = %phase, "session phase");
    }
}

/// 去首尾空白后校验主题：不能为空，不能超过 MAX_TOPIC_CHARS 个字符
pub fn validate_topic(topic: &str) -> Result<&str, ResearchError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(ResearchError::InvalidTopic);
    }
    let len = topic.chars().count();
    if len > MAX_TOPIC_CHARS {
        return Err(ResearchError::TopicTooLong {
            len,
            max: MAX_TOPIC_CHARS,
        });
    }
    Ok(topic)
}

/// 清理生成的查询：去空白、丢弃空串、截断到 500 字符、最多 count 条
fn sanitize_plan(plan: QueryPlan, count: usize) -> Vec<String> {
    plan.queries
        .into_iter()
        .map(|q| q.query.trim().chars().take(MAX_QUERY_CHARS).collect::<String>())
        .filter(|q| !q.is_empty())
        .take(count)
        .collect()
}

/// 由 topic 派生 count 条确定性查询
pub fn fallback_queries(topic: &str, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let angle = FALLBACK_ANGLES[i % FALLBACK_ANGLES.len()];
            let round = i / FALLBACK_ANGLES.len();
            let base = if angle.is_empty() {
                topic.to_string()
            } else {
                format!("{topic} {angle}")
            };
            if round == 0 {
                base
            } else {
                format!("{base} (part {})", round + 1)
            }
        })
        .collect()
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("unexpected failure: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("unexpected failure: {s}")
    } else {
        "unexpected failure".to_string()
    }
}
