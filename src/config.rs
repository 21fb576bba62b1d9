//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SCOUT__*` 覆盖（双下划线表示嵌套，如 `SCOUT__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::llm::LlmRole;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub research: ResearchSection,
}

/// [llm] 段：后端选择、默认模型与各角色模型覆盖
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    /// 查询生成模型（未设置时用 model）
    pub query_model: Option<String>,
    /// 检索/归纳模型
    pub search_model: Option<String>,
    /// 反思模型
    pub reflection_model: Option<String>,
    /// 最终答案模型
    pub answer_model: Option<String>,
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            query_model: None,
            search_model: None,
            reflection_model: None,
            answer_model: None,
        }
    }
}

impl LlmSection {
    pub fn model_for(&self, role: LlmRole) -> String {
        let specific = match role {
            LlmRole::Query => &self.query_model,
            LlmRole::Search => &self.search_model,
            LlmRole::Reflection => &self.reflection_model,
            LlmRole::Answer => &self.answer_model,
        };
        specific.clone().unwrap_or_else(|| self.model.clone())
    }
}

/// [research] 段：重试、退避、单次调用超时、反思阈值与并发
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchSection {
    /// 单次检索最多尝试次数
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 退避基数（毫秒），第 n 次失败后等待 base * 2^n
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// 每次协作方调用的超时（秒）
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// 反思置信度超过该值即停止
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// 同一阶段内并发派发的检索数（1 为串行）
    #[serde(default = "default_parallel_searches")]
    pub parallel_searches: usize,
    /// 反思时参考的最近结果条数
    #[serde(default = "default_reflection_window")]
    pub reflection_window: usize,
    /// 反思上下文中每条结果内容的截断长度（字符）
    #[serde(default = "default_reflection_excerpt_chars")]
    pub reflection_excerpt_chars: usize,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_call_timeout_secs() -> u64 {
    60
}

fn default_confidence_threshold() -> f64 {
    0.8
}

fn default_parallel_searches() -> usize {
    1
}

fn default_reflection_window() -> usize {
    5
}

fn default_reflection_excerpt_chars() -> usize {
    400
}

impl Default for ResearchSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            call_timeout_secs: default_call_timeout_secs(),
            confidence_threshold: default_confidence_threshold(),
            parallel_searches: default_parallel_searches(),
            reflection_window: default_reflection_window(),
            reflection_excerpt_chars: default_reflection_excerpt_chars(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 SCOUT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SCOUT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SCOUT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
