//! Scout 命令行入口
//!
//! 用法：
//!   scout research <topic...> [--effort low|medium|high] [--config path]
//!   scout tiers

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use scout::{config::load_config, observability, ResearchService, SessionRegistry};
use tokio_util::sync::CancellationToken;

const USAGE: &str = "Usage:\n  scout research <topic...> [--effort low|medium|high] [--config <path>]\n  scout tiers";

struct ResearchArgs {
    topic: String,
    effort: String,
    config: Option<PathBuf>,
}

fn parse_research_args(args: &[String]) -> anyhow::Result<ResearchArgs> {
    let mut topic_words = Vec::new();
    let mut effort = "medium".to_string();
    let mut config = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--effort" | "-e" => {
                effort = iter.next().context("--effort requires a value")?.clone();
            }
            "--config" | "-c" => {
                config = Some(PathBuf::from(iter.next().context("--config requires a path")?));
            }
            _ => topic_words.push(arg.clone()),
        }
    }
    Ok(ResearchArgs {
        topic: topic_words.join(" "),
        effort,
        config,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!("{USAGE}");
    };

    match command.as_str() {
        "research" => {
            let research = parse_research_args(&args[1..])?;
            let cfg = load_config(research.config).context("Failed to load config")?;
            let service = ResearchService::from_config(&cfg, Arc::new(SessionRegistry::new()));

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, cancelling research");
                    on_signal.cancel();
                }
            });

            let report = service
                .conduct_research_with_cancel(&research.topic, &research.effort, cancel)
                .await;
            println!("{report}");
        }
        "tiers" => {
            println!("{}", scout::research::effort_levels_report());
        }
        other => bail!("Unknown command '{other}'\n{USAGE}"),
    }

    Ok(())
}
