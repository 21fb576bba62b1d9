//! 研究强度分级（Effort Tier）与只读预算
//!
//! 每个档位对应一份不可变预算：最大检索次数、最大反思轮数、初始查询数。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::ResearchError;

/// 单个档位的预算（只读配置，运行期从不修改）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierBudget {
    pub max_searches: usize,
    pub max_loops: usize,
    pub initial_queries: usize,
    pub description: &'static str,
}

const LOW: TierBudget = TierBudget {
    max_searches: 10,
    max_loops: 1,
    initial_queries: 2,
    description: "Quick research with up to 10 searches and 1 research loop",
};

const MEDIUM: TierBudget = TierBudget {
    max_searches: 100,
    max_loops: 3,
    initial_queries: 4,
    description: "Balanced research with up to 100 searches and 3 research loops",
};

const HIGH: TierBudget = TierBudget {
    max_searches: 1000,
    max_loops: 5,
    initial_queries: 6,
    description: "Comprehensive research with up to 1000 searches and 5 research loops",
};

/// 研究强度档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortTier {
    Low,
    #[default]
    Medium,
    High,
}

impl EffortTier {
    pub const ALL: [EffortTier; 3] = [EffortTier::Low, EffortTier::Medium, EffortTier::High];

    pub fn budget(self) -> &'static TierBudget {
        match self {
            EffortTier::Low => &LOW,
            EffortTier::Medium => &MEDIUM,
            EffortTier::High => &HIGH,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EffortTier::Low => "low",
            EffortTier::Medium => "medium",
            EffortTier::High => "high",
        }
    }

    /// 首字母大写的展示名（报告标题用）
    pub fn title(self) -> &'static str {
        match self {
            EffortTier::Low => "Low",
            EffortTier::Medium => "Medium",
            EffortTier::High => "High",
        }
    }
}

impl fmt::Display for EffortTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffortTier {
    type Err = ResearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(EffortTier::Low),
            "medium" => Ok(EffortTier::Medium),
            "high" => Ok(EffortTier::High),
            other => Err(ResearchError::InvalidEffort(other.to_string())),
        }
    }
}
