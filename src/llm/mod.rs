//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock），以及按配置选择后端

pub mod deepseek;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;

pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT};
pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
pub use traits::{LlmClient, LlmError};

/// 研究流程中的 LLM 角色；各角色可配置不同模型与温度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmRole {
    Query,
    Search,
    Reflection,
    Answer,
}

impl LlmRole {
    fn temperature(self) -> f32 {
        match self {
            LlmRole::Query => 0.7,
            LlmRole::Search => 0.1,
            LlmRole::Reflection => 0.3,
            LlmRole::Answer => 0.2,
        }
    }
}

/// 按配置创建某一角色的 LLM：有 DeepSeek Key 走 DeepSeek，有 OpenAI Key 走 OpenAI 兼容端点，否则 Mock
pub fn create_llm_from_config(cfg: &AppConfig, role: LlmRole) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "mock" {
        return Arc::new(MockLlmClient::new());
    }

    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";
    let model = cfg.llm.model_for(role);

    if use_deepseek {
        tracing::info!(role = ?role, model = %model, "Using DeepSeek LLM");
        Arc::new(create_deepseek_client(Some(&model)).with_temperature(role.temperature()))
    } else if use_openai {
        let base = cfg.llm.base_url.as_deref();
        tracing::info!(role = ?role, model = %model, "Using OpenAI LLM");
        Arc::new(
            OpenAiClient::new(base, &model, std::env::var("OPENAI_API_KEY").ok().as_deref())
                .with_temperature(role.temperature()),
        )
    } else {
        tracing::warn!(role = ?role, "No API key set or provider unknown, using Mock LLM");
        Arc::new(MockLlmClient::new())
    }
}
