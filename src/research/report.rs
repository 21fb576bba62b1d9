//! 报告渲染：档位说明、运行状态、最终答案页脚与合成失败时的降级摘要

use crate::collaborators::current_date;
use crate::core::{EffortTier, SearchResult, SessionRegistry};

/// 状态报告中 topic 的展示长度
const STATUS_TOPIC_CHARS: usize = 50;

/// 档位说明（Markdown）
pub fn effort_levels_report() -> String {
    let mut info = String::from("# Research Effort Levels\n\n");
    info.push_str("Three effort levels are available for different research needs:\n\n");

    for tier in EffortTier::ALL {
        let budget = tier.budget();
        info.push_str(&format!("## {} Effort\n", tier.title()));
        info.push_str(&format!("- **Max Searches**: {}\n", budget.max_searches));
        info.push_str(&format!("- **Max Research Loops**: {}\n", budget.max_loops));
        info.push_str(&format!("- **Initial Queries**: {}\n", budget.initial_queries));
        info.push_str(&format!("- **Description**: {}\n\n", budget.description));
    }

    info.push_str("## Recommendations\n");
    info.push_str("- **Low**: Quick fact-checking, simple questions, time-sensitive research\n");
    info.push_str("- **Medium**: Most general research needs, balanced depth and speed\n");
    info.push_str("- **High**: Complex topics, academic research, comprehensive analysis\n\n");
    info.push_str(&format!("*Last Updated: {}*", current_date()));
    info
}

/// 当前进行中会话与档位配置
pub fn status_report(registry: &SessionRegistry) -> String {
    let sessions = registry.snapshot();
    let mut status = String::from("# Research Server Status\n\n");
    status.push_str(&format!(
        "**Server Time**: {}\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
    status.push_str(&format!("**Active Sessions**: {}\n\n", sessions.len()));

    if !sessions.is_empty() {
        status.push_str("## Active Research Sessions\n");
        for s in &sessions {
            let budget = s.tier.budget();
            let topic: String = s.topic.chars().take(STATUS_TOPIC_CHARS).collect();
            let ellipsis = if s.topic.chars().count() > STATUS_TOPIC_CHARS { "..." } else { "" };
            status.push_str(&format!("- **{}**: {}{}\n", s.id, topic, ellipsis));
            status.push_str(&format!("  - Effort: {}\n", s.tier));
            status.push_str(&format!("  - Searches: {}/{}\n", s.search_count, budget.max_searches));
            status.push_str(&format!("  - Loops: {}/{}\n", s.loop_count, budget.max_loops));
            status.push_str(&format!("  - Elapsed: {}s\n", s.elapsed_secs));
        }
    }

    status.push_str("\n## Configuration\n");
    for tier in EffortTier::ALL {
        let budget = tier.budget();
        status.push_str(&format!(
            "**{}**: {} searches, {} loops\n",
            tier.title(),
            budget.max_searches,
            budget.max_loops
        ));
    }
    status
}

/// 最终答案页脚：完成日期、档位、查询数
pub fn metadata_footer(tier: EffortTier, queries: usize) -> String {
    format!(
        "\n\n---\n*Research completed on {} using {} effort level with {} queries*",
        current_date(),
        tier,
        queries
    )
}

/// 各结果拼接为「Research Query: q\ncontent」块
pub fn combined_research(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("Research Query: {}\n{}", r.query, r.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 合成失败时的降级正文
pub fn fallback_summary(topic: &str, results: &[SearchResult]) -> String {
    format!("Research Summary for: {}\n\n{}", topic, combined_research(results))
}

/// 没有任何结果时的正文
pub fn no_results_body(topic: &str) -> String {
    format!("No research results were obtained for the topic: {topic}")
}
