use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::core::feed::fetcher::fetch_feed_with_retry;
use crate::core::feed::parser::{entry_key, parse_feed_bytes};
use crate::core::feed::types::ParsedEntry;
use crate::core::llm::{summarize_episode, LlmConfig};
use crate::core::seen::{SeenStore, SeenStoreError};
use crate::core::sources::FeedSpec;
use crate::core::webhook::{WebhookClient, WebhookError};

/// Only the newest episodes are candidates; the seen-set covers the rest.
pub const MAX_EPISODES_PER_FEED: usize = 5;
const FETCH_RETRIES: usize = 2;
const SUMMARY_UNAVAILABLE: &str = "⚠️ Summary generation failed";
const DRY_RUN_SUMMARY: &str = "(dry run) summary skipped";

#[derive(Debug, Clone)]
pub struct PodcastConfig {
    pub feeds: Vec<FeedSpec>,
    pub webhook_url: Option<String>,
    pub llm: Option<LlmConfig>,
    /// Episodes published before this instant are never announced, a
    /// backstop against announcing a feed's whole archive on first run.
    pub cutoff: Option<DateTime<Utc>>,
    pub seen_path: PathBuf,
    pub dry_run: bool,
    pub post_pause: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodcastRunReport {
    pub feeds_polled: usize,
    pub feeds_failed: usize,
    pub new_episodes: usize,
    pub episodes_posted: usize,
    pub post_failures: usize,
    pub summary_failures: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PodcastJobError {
    #[error("webhook url is required unless running with --dry-run")]
    MissingWebhookUrl,
    #[error("llm config is required unless running with --dry-run")]
    MissingLlmConfig,
    #[error(transparent)]
    Seen(#[from] SeenStoreError),
}

pub fn is_announcable(
    entry: &ParsedEntry,
    cutoff: Option<DateTime<Utc>>,
    seen: &SeenStore,
    show: &str,
) -> bool {
    if let (Some(cutoff), Some(published)) = (cutoff, entry.published_at) {
        if published < cutoff {
            return false;
        }
    }
    !seen.contains(show, &entry_key(entry))
}

pub fn format_announcement(feed: &FeedSpec, entry: &ParsedEntry, summary: &str) -> String {
    let published = entry
        .published_at
        .map(|timestamp| timestamp.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown date".to_string());
    format!(
        "{} **{}** - New Episode!\n\n**{}**\n\n{}\n\n🔗 {}\n📅 {}",
        feed.emoji, feed.name, entry.title, summary, entry.link, published
    )
}

pub async fn run(
    client: &reqwest::Client,
    config: &PodcastConfig,
) -> Result<PodcastRunReport, PodcastJobError> {
    let webhook = match (&config.webhook_url, config.dry_run) {
        (Some(url), _) => Some(WebhookClient::new(client.clone(), url.clone())),
        (None, true) => None,
        (None, false) => return Err(PodcastJobError::MissingWebhookUrl),
    };
    if config.llm.is_none() && !config.dry_run {
        return Err(PodcastJobError::MissingLlmConfig);
    }

    let mut seen = SeenStore::load(&config.seen_path)?;
    info!(known_episodes = seen.total_ids(), "seen-set loaded");

    let mut report = PodcastRunReport::default();
    let mut posts_sent = 0_usize;

    for feed in &config.feeds {
        info!(show = %feed.name, url = %feed.url, "fetching podcast feed");
        report.feeds_polled += 1;

        let body = match fetch_feed_with_retry(client, &feed.url, FETCH_RETRIES).await {
            Ok(body) => body,
            Err(error) => {
                warn!(show = %feed.name, %error, "feed fetch failed, skipping");
                report.feeds_failed += 1;
                continue;
            }
        };
        let parsed = match parse_feed_bytes(&body) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(show = %feed.name, %error, "feed parse failed, skipping");
                report.feeds_failed += 1;
                continue;
            }
        };

        for entry in parsed.entries.iter().take(MAX_EPISODES_PER_FEED) {
            if !is_announcable(entry, config.cutoff, &seen, &feed.name) {
                continue;
            }
            report.new_episodes += 1;
            info!(show = %feed.name, title = %entry.title, "new episode");

            let summary = build_summary(client, config, feed, entry, &mut report).await;
            let announcement = format_announcement(feed, entry, &summary);

            if posts_sent > 0 {
                tokio::time::sleep(config.post_pause).await;
            }
            posts_sent += 1;
            match post_announcement(webhook.as_ref(), config.dry_run, &announcement).await {
                Ok(()) => {
                    report.episodes_posted += 1;
                    // Only a delivered announcement is marked seen, so a
                    // failed post is retried on the next run.
                    seen.insert(&feed.name, &entry_key(entry));
                }
                Err(error) => {
                    warn!(show = %feed.name, %error, "webhook post failed, will retry next run");
                    report.post_failures += 1;
                }
            }
        }
    }

    if seen.is_dirty() {
        seen.save()?;
        info!(known_episodes = seen.total_ids(), "seen-set saved");
    }

    Ok(report)
}

async fn build_summary(
    client: &reqwest::Client,
    config: &PodcastConfig,
    feed: &FeedSpec,
    entry: &ParsedEntry,
    report: &mut PodcastRunReport,
) -> String {
    if config.dry_run {
        return DRY_RUN_SUMMARY.to_string();
    }
    let Some(llm) = &config.llm else {
        return DRY_RUN_SUMMARY.to_string();
    };
    let notes = entry
        .summary
        .as_deref()
        .or(entry.content.as_deref())
        .unwrap_or_default();
    match summarize_episode(llm, client, &feed.name, &entry.title, notes).await {
        Ok(summary) => summary,
        Err(error) => {
            warn!(show = %feed.name, %error, "summary generation failed");
            report.summary_failures += 1;
            SUMMARY_UNAVAILABLE.to_string()
        }
    }
}

async fn post_announcement(
    webhook: Option<&WebhookClient>,
    dry_run: bool,
    announcement: &str,
) -> Result<(), WebhookError> {
    if dry_run {
        info!(%announcement, "dry run, not posting");
        return Ok(());
    }
    match webhook {
        Some(webhook) => webhook.post(announcement).await,
        // Guarded by the config check in run().
        None => Ok(()),
    }
}
