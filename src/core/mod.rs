//! 核心层：档位预算、会话账本、注册表、控制器状态机与错误类型

pub mod controller;
pub mod error;
pub mod registry;
pub mod session;
pub mod tier;

pub use controller::{fallback_queries, validate_topic, ResearchSettings, SessionController, MAX_TOPIC_CHARS};
pub use error::{CollaboratorError, RegistryError, ResearchError};
pub use registry::{RegistrationGuard, SessionRegistry, SessionSnapshot};
pub use session::{
    derive_session_id, CitationSegment, ResearchSession, SearchResult, SessionId, SessionLedger,
    SessionPhase,
};
pub use tier::{EffortTier, TierBudget};
