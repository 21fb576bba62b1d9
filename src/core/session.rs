//! 研究会话：单次研究运行的全部中间状态
//!
//! 计数器放在 SessionLedger（原子量，Arc 共享给注册表做状态快照）；
//! 检索结果与引用只由控制器持有，追加写入。

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::core::EffortTier;
use crate::research::citation::dedupe_citations;

/// 会话 ID
pub type SessionId = String;

/// 单条引用（按 url 去重）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationSegment {
    pub url: String,
    /// 展示标签，形如 `[searchId-index]`
    pub short_url: String,
    pub title: String,
    pub snippet: Option<String>,
}

/// 一次查询执行的结果（可能是降级结果）
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub content: String,
    pub citations: Vec<CitationSegment>,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub search_id: u64,
}

impl SearchResult {
    pub fn new(query: impl Into<String>, search_id: u64, content: String, citations: Vec<CitationSegment>) -> Self {
        Self {
            content,
            citations,
            query: query.into(),
            timestamp: Utc::now(),
            search_id,
        }
    }
}

/// 控制器状态机阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Init,
    InitialSearch,
    ReflectLoop,
    Finalize,
    Complete,
    Failed,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionPhase::Init => "init",
            SessionPhase::InitialSearch => "initial_search",
            SessionPhase::ReflectLoop => "reflect_loop",
            SessionPhase::Finalize => "finalize",
            SessionPhase::Complete => "complete",
            SessionPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 会话计数账本：检索预算预留、反思轮数、完成标记
///
/// `dispatched` 既是 searchId 分配器也是预算占用：一次 CAS 同时完成「检查预算 + 分配 ID」，
/// 同一阶段内并发派发时 ID 不重复、不跳号。
#[derive(Debug)]
pub struct SessionLedger {
    id: SessionId,
    topic: String,
    tier: EffortTier,
    started_at: DateTime<Utc>,
    started: Instant,
    dispatched: AtomicUsize,
    completed: AtomicUsize,
    loops: AtomicUsize,
    complete: AtomicBool,
}

impl SessionLedger {
    pub fn new(id: SessionId, topic: impl Into<String>, tier: EffortTier) -> Self {
        Self {
            id,
            topic: topic.into(),
            tier,
            started_at: Utc::now(),
            started: Instant::now(),
            dispatched: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            loops: AtomicUsize::new(0),
            complete: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn tier(&self) -> EffortTier {
        self.tier
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// 已完成（成功或降级）的检索次数
    pub fn search_count(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    pub fn loop_count(&self) -> usize {
        self.loops.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub fn searches_remaining(&self) -> usize {
        self.tier
            .budget()
            .max_searches
            .saturating_sub(self.dispatched.load(Ordering::Acquire))
    }

    pub fn can_continue(&self) -> bool {
        let budget = self.tier.budget();
        self.dispatched.load(Ordering::Acquire) < budget.max_searches
            && self.loop_count() < budget.max_loops
            && !self.is_complete()
    }

    /// 预留一次检索：可继续时返回新的 searchId，否则返回 None
    pub fn try_reserve_search(&self) -> Option<u64> {
        let budget = self.tier.budget();
        loop {
            if self.is_complete() || self.loop_count() >= budget.max_loops {
                return None;
            }
            let current = self.dispatched.load(Ordering::Acquire);
            if current >= budget.max_searches {
                return None;
            }
            if self
                .dispatched
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(current as u64);
            }
        }
    }

    pub(crate) fn record_completion(&self) -> usize {
        self.completed.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// 开始新一轮反思，返回本轮序号（从 1 开始）；已达上限时返回 None
    pub(crate) fn begin_loop(&self) -> Option<usize> {
        let max_loops = self.tier.budget().max_loops;
        self.loops
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max_loops).then_some(n + 1))
            .ok()
            .map(|prev| prev + 1)
    }

    /// 标记完成；只有第一次调用返回 true
    pub(crate) fn mark_complete(&self) -> bool {
        !self.complete.swap(true, Ordering::AcqRel)
    }
}

/// 控制器独占的会话：账本 + 有序结果 + 累积引用
#[derive(Debug)]
pub struct ResearchSession {
    ledger: Arc<SessionLedger>,
    results: Vec<SearchResult>,
    citations: Vec<CitationSegment>,
}

impl ResearchSession {
    pub fn new(ledger: Arc<SessionLedger>) -> Self {
        Self {
            ledger,
            results: Vec::new(),
            citations: Vec::new(),
        }
    }

    pub fn ledger(&self) -> &Arc<SessionLedger> {
        &self.ledger
    }

    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn citations(&self) -> &[CitationSegment] {
        &self.citations
    }

    /// 追加一次检索结果并合并其引用；会话完成后忽略
    pub fn record(&mut self, result: SearchResult) {
        if self.ledger.is_complete() {
            tracing::warn!(
                session_id = %self.ledger.id(),
                search_id = result.search_id,
                "ignoring result recorded after completion"
            );
            return;
        }
        self.citations.extend(result.citations.iter().cloned());
        self.results.push(result);
        self.ledger.record_completion();
    }

    /// 标记完成并返回按 url 去重（保留首次出现顺序）的引用列表
    pub fn finalize(&mut self) -> Vec<CitationSegment> {
        self.ledger.mark_complete();
        dedupe_citations(self.citations.iter().cloned())
    }
}

/// 由 topic + tier + 纳秒时间戳 + 随机 nonce 派生 12 位十六进制会话 ID
pub fn derive_session_id(topic: &str, tier: EffortTier) -> SessionId {
    let nonce = uuid::Uuid::new_v4();
    let stamp = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
    let mut hasher = Sha256::new();
    hasher.update(format!("{topic}_{tier}_{stamp}_{nonce}").as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}
