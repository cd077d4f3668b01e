use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use feedpost::core::{llm, news, podcast, sources};
use feedpost::{FeedSpec, NewsConfig, PodcastConfig};

const DEFAULT_MIN_PUBDATE: &str = "2026-02-01";

#[derive(Debug, Parser)]
#[command(name = "feedpost", version, about = "Posts RSS news and podcast episode summaries to a Discord webhook")]
struct Cli {
    /// Log messages instead of posting to the webhook
    #[arg(long, global = true)]
    dry_run: bool,

    /// Replace the built-in feed list with a JSON or OPML file
    #[arg(long, global = true, value_name = "FILE")]
    feeds: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Post news items published within the recency window
    News {
        /// Recency window in hours
        #[arg(long, default_value_t = 24)]
        window_hours: i64,
    },
    /// Announce and summarize new podcast episodes
    Podcasts {
        /// Path of the persisted seen-episodes file
        #[arg(long, default_value = "seen_episodes.json", value_name = "FILE")]
        seen_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let dry_run = cli.dry_run || env_flag("DRY_RUN");
    if dry_run {
        info!("dry run mode, nothing will be posted");
    }

    let webhook_url = non_empty_env("DISCORD_WEBHOOK_URL");
    if webhook_url.is_none() && !dry_run {
        bail!("DISCORD_WEBHOOK_URL is not set");
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(20))
        .build()
        .context("failed to build http client")?;

    match cli.command {
        Commands::News { window_hours } => {
            let config = NewsConfig {
                feeds: resolve_feeds(cli.feeds.as_deref(), sources::default_news_feeds)?,
                webhook_url,
                window: chrono::Duration::hours(window_hours),
                dry_run,
                post_pause: Duration::from_secs(2),
            };
            let report = news::run(&client, &config).await?;
            info!(
                feeds_polled = report.feeds_polled,
                feeds_failed = report.feeds_failed,
                items_posted = report.items_posted,
                post_failures = report.post_failures,
                "news run finished"
            );
        }
        Commands::Podcasts { seen_file } => {
            let llm_config = llm::config_from_env();
            if llm_config.is_none() && !dry_run {
                bail!("CLAUDE_API_KEY is not set");
            }
            let config = PodcastConfig {
                feeds: resolve_feeds(cli.feeds.as_deref(), sources::default_podcast_feeds)?,
                webhook_url,
                llm: llm_config,
                cutoff: Some(min_pubdate_from_env()?),
                seen_path: seen_file,
                dry_run,
                post_pause: Duration::from_secs(3),
            };
            let report = podcast::run(&client, &config).await?;
            info!(
                feeds_polled = report.feeds_polled,
                feeds_failed = report.feeds_failed,
                new_episodes = report.new_episodes,
                episodes_posted = report.episodes_posted,
                post_failures = report.post_failures,
                summary_failures = report.summary_failures,
                "podcast run finished"
            );
        }
    }

    Ok(())
}

fn resolve_feeds(
    path: Option<&Path>,
    defaults: fn() -> Vec<FeedSpec>,
) -> Result<Vec<FeedSpec>> {
    match path {
        Some(path) => sources::load_feed_file(path)
            .with_context(|| format!("failed to load feed file {}", path.display())),
        None => Ok(defaults()),
    }
}

fn min_pubdate_from_env() -> Result<DateTime<Utc>> {
    let raw = non_empty_env("FEEDPOST_MIN_PUBDATE")
        .unwrap_or_else(|| DEFAULT_MIN_PUBDATE.to_string());
    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .with_context(|| format!("FEEDPOST_MIN_PUBDATE is not a YYYY-MM-DD date: {raw}"))?;
    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|value| value.eq_ignore_ascii_case("true") || value == "1")
        .unwrap_or(false)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
