//! 研究流程组件：引用解析、检索执行、反思闸门、报告渲染

pub mod citation;
pub mod executor;
pub mod reflection;
pub mod report;

use std::future::Future;
use std::time::Duration;

use crate::core::CollaboratorError;

pub use citation::{dedupe_citations, normalize_title, resolve, validate_url};
pub use executor::{RetryPolicy, SearchExecutor};
pub use reflection::{ReflectionGate, MAX_FOLLOW_UPS};
pub use report::{effort_levels_report, status_report};

/// 为一次协作方调用加超时；超时与失败同样映射为 CollaboratorError
pub(crate) async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(outcome) => outcome,
        Err(_) => Err(CollaboratorError::Timeout(limit)),
    }
}
