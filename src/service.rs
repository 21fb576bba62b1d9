//! 对外入口：研究服务
//!
//! conduct_research(topic, effort) 是唯一的研究入口，任何情况下都返回一段文本：
//! 成功时为带引用的报告，输入错误 / 取消 / 会话失败时为明确标注的错误信息。
//! 主题校验（非空、不超过 500 字符）先于档位解析，失败时不创建会话也不调用任何协作方。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::collaborators::{Collaborators, RoleLlms};
use crate::config::AppConfig;
use crate::core::{
    validate_topic, EffortTier, ResearchError, ResearchSettings, SessionController, SessionRegistry,
};
use crate::llm::{create_llm_from_config, LlmRole};
use crate::research::{effort_levels_report, status_report};

pub struct ResearchService {
    controller: SessionController,
}

impl ResearchService {
    pub fn new(controller: SessionController) -> Self {
        Self { controller }
    }

    /// 按配置为每个角色创建 LLM 并组装控制器
    pub fn from_config(cfg: &AppConfig, registry: Arc<SessionRegistry>) -> Self {
        let collaborators = Collaborators::from_role_llms(RoleLlms {
            query: create_llm_from_config(cfg, LlmRole::Query),
            search: create_llm_from_config(cfg, LlmRole::Search),
            reflection: create_llm_from_config(cfg, LlmRole::Reflection),
            answer: create_llm_from_config(cfg, LlmRole::Answer),
        });
        let settings = ResearchSettings::from(&cfg.research);
        Self::new(SessionController::new(collaborators, registry, settings))
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.controller.registry()
    }

    pub async fn conduct_research(&self, topic: &str, effort: &str) -> String {
        self.conduct_research_with_cancel(topic, effort, CancellationToken::new())
            .await
    }

    pub async fn conduct_research_with_cancel(
        &self,
        topic: &str,
        effort: &str,
        cancel: CancellationToken,
    ) -> String {
        match self.try_conduct(topic, effort, cancel).await {
            Ok(report) => report,
            Err(e) => e.to_string(),
        }
    }

    async fn try_conduct(
        &self,
        topic: &str,
        effort: &str,
        cancel: CancellationToken,
    ) -> Result<String, ResearchError> {
        validate_topic(topic)?;
        let tier: EffortTier = effort.parse()?;
        self.controller.run_research_with_cancel(topic, tier, cancel).await
    }

    pub fn effort_levels(&self) -> String {
        effort_levels_report()
    }

    pub fn status(&self) -> String {
        status_report(self.registry())
    }
}
