use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;
use services::Services;
use std::path::PathBuf;
use veracity_common::observability::init_logging;
use veracity_config::{VeracityConfig, VeracityConfigLoader};
use veracity_llm::build_client;
use veracity_social::reddit::RedditSort;
use veracity_social::youtube::YouTubeOrder;
mod services;

const DEFAULT_CONFIG: &str = "veracity.yaml";

#[derive(Parser)]
#[command(name = "veracity", version, about = "Misinformation analysis for text, Reddit and YouTube")]
struct Cli {
    /// YAML configuration file (default: ./veracity.yaml if present)
    #[arg(long, short, env = "VERACITY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a piece of text and print the verdict as JSON.
    Analyze {
        text: Option<String>,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    /// Fetch and analyze Reddit posts, then detect narrative clusters.
    Reddit {
        #[arg(long)]
        subreddit: Option<String>,
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value = "hot")]
        sort: RedditSort,
        #[arg(long, default_value_t = 25)]
        limit: u32,
    },
    /// Search and analyze YouTube videos, then detect narrative clusters.
    Youtube {
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 10)]
        max_results: u32,
        #[arg(long, default_value = "relevance")]
        order: YouTubeOrder,
    },
    /// Ping the configured oracle providers and report which ones answer.
    Check,
}

fn load_config(path: Option<&PathBuf>) -> Result<VeracityConfig> {
    let loader = VeracityConfigLoader::new();
    let loader = match path {
        Some(p) => loader.with_file(p),
        None => loader.with_optional_file(DEFAULT_CONFIG),
    };
    loader.load().context("failed to load configuration")
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn log_progress(done: usize, total: usize) {
    tracing::info!(done, total, "batch.progress");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_ref())?;

    let log_path = init_logging(cfg.logging.to_log_config("veracity"))?;
    tracing::debug!(path = %log_path.display(), "app.logging");

    match cli.command {
        Command::Check => check_providers(&cfg).await,
        command => run(Services::build(cfg)?, command).await,
    }
}

async fn run(services: Services, command: Command) -> Result<()> {
    match command {
        Command::Analyze { text, file } => {
            let text = match (text, file) {
                (Some(t), _) => t,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => bail!("provide TEXT or --file"),
            };
            let record = services.dispatcher().submit(&text).await?;
            print_json(&record)?;
        }
        Command::Reddit {
            subreddit,
            query,
            sort,
            limit,
        } => {
            let monitor = services.reddit_monitor()?;
            let posts = match (query.as_deref(), subreddit.as_deref()) {
                (Some(q), sub) => monitor.api().search_posts(q, sub, limit).await?,
                (None, Some(sub)) => monitor.api().fetch_subreddit_posts(sub, sort, limit).await?,
                (None, None) => bail!("provide --subreddit and/or --query"),
            };
            tracing::info!(count = posts.len(), "reddit.fetched");
            let mut results = monitor.analyze_posts(posts, Some(&log_progress)).await;
            let clusters = monitor.detect_clusters(&mut results);
            print_json(&json!({ "results": results, "clusters": clusters }))?;
        }
        Command::Youtube {
            query,
            max_results,
            order,
        } => {
            let monitor = services.youtube_monitor()?;
            let videos = monitor.api().search_videos(&query, max_results, order).await?;
            tracing::info!(count = videos.len(), "youtube.fetched");
            let mut results = monitor.analyze_videos(videos, Some(&log_progress)).await;
            let clusters = monitor.detect_clusters(&mut results);
            let trending = monitor.trending_topics(&results);
            print_json(&json!({
                "results": results,
                "clusters": clusters,
                "trending": trending,
            }))?;
        }
        Command::Check => check_providers(&services.config).await?,
    }
    Ok(())
}

async fn check_providers(cfg: &VeracityConfig) -> Result<()> {
    let configs = std::iter::once(&cfg.oracle.primary).chain(cfg.oracle.secondary.as_ref());
    let mut report = Vec::new();
    for provider in configs {
        let client = build_client(provider)?;
        let healthy = client.health_check().await?;
        tracing::info!(provider = client.provider_name(), healthy, "oracle.health");
        report.push(json!({
            "provider": client.provider_name(),
            "model": client.model_name(),
            "healthy": healthy,
        }));
    }
    print_json(&report)
}
