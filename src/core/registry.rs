//! 会话注册表：进程内唯一的共享可变状态
//!
//! 控制器通过注入的 `Arc<SessionRegistry>` 句柄注册/注销会话，测试中每个用例用一份新的注册表。
//! 注册返回 RegistrationGuard，guard 被 drop（正常返回、出错、panic 或 future 被取消）时自动注销。
//! 使用同步 RwLock：Drop 中需要同步移除，临界区内只有 HashMap 操作，不跨 await。

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::{EffortTier, RegistryError, SessionId, SessionLedger};

/// 注册表中会话的只读快照（状态报告用）
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub topic: String,
    pub tier: EffortTier,
    pub search_count: usize,
    pub loop_count: usize,
    pub elapsed_secs: u64,
}

/// 进行中会话：session_id -> 共享账本
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<SessionLedger>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入会话；ID 已存在时返回 Collision（不覆盖）
    pub fn insert(&self, ledger: Arc<SessionLedger>) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let id = ledger.id().to_string();
        if sessions.contains_key(&id) {
            return Err(RegistryError::Collision(id));
        }
        sessions.insert(id, ledger);
        Ok(())
    }

    /// 注册并返回 guard；guard drop 时注销
    pub fn register(self: &Arc<Self>, ledger: Arc<SessionLedger>) -> Result<RegistrationGuard, RegistryError> {
        let id = ledger.id().to_string();
        self.insert(ledger)?;
        Ok(RegistrationGuard {
            registry: Arc::clone(self),
            id,
        })
    }

    /// 移除会话；幂等，已移除时返回 false
    pub fn remove(&self, id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 所有进行中会话的快照，按开始时间排序
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        let mut ledgers: Vec<&Arc<SessionLedger>> = sessions.values().collect();
        ledgers.sort_by_key(|l| l.started_at());
        ledgers
            .into_iter()
            .map(|l| SessionSnapshot {
                id: l.id().to_string(),
                topic: l.topic().to_string(),
                tier: l.tier(),
                search_count: l.search_count(),
                loop_count: l.loop_count(),
                elapsed_secs: l.elapsed_secs(),
            })
            .collect()
    }
}

/// 会话注册凭证：drop 时从注册表移除对应会话
#[derive(Debug)]
pub struct RegistrationGuard {
    registry: Arc<SessionRegistry>,
    id: SessionId,
}

impl RegistrationGuard {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if self.registry.remove(&self.id) {
            tracing::debug!(session_id = %self.id, "session retired from registry");
        }
    }
}
