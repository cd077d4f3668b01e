use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::core::feed::fetcher::fetch_feed_with_retry;
use crate::core::feed::parser::parse_feed_bytes;
use crate::core::feed::types::ParsedEntry;
use crate::core::sources::FeedSpec;
use crate::core::webhook::{WebhookClient, WebhookError};

/// Only the head of each feed is considered; older items were either posted
/// by a previous run or have aged out of the window anyway.
pub const MAX_ITEMS_PER_FEED: usize = 10;
/// Cap on messages per run to keep the channel readable.
pub const MAX_POSTS_PER_RUN: usize = 15;
const FETCH_RETRIES: usize = 2;

#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub feeds: Vec<FeedSpec>,
    pub webhook_url: Option<String>,
    pub window: chrono::Duration,
    pub dry_run: bool,
    pub post_pause: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsRunReport {
    pub feeds_polled: usize,
    pub feeds_failed: usize,
    pub items_posted: usize,
    pub post_failures: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum NewsJobError {
    #[error("webhook url is required unless running with --dry-run")]
    MissingWebhookUrl,
}

/// An item with no parseable date counts as recent, matching the original
/// feed behavior where missing dates are common.
pub fn is_recent(
    published: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> bool {
    match published {
        Some(timestamp) => now - timestamp < window,
        None => true,
    }
}

pub fn select_recent<'a>(
    entries: &'a [ParsedEntry],
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> Vec<&'a ParsedEntry> {
    entries
        .iter()
        .take(MAX_ITEMS_PER_FEED)
        .filter(|entry| is_recent(entry.published_at, now, window))
        .collect()
}

pub fn format_item(feed: &FeedSpec, entry: &ParsedEntry) -> String {
    format!(
        "{} **{}** | {}\n{}",
        feed.emoji, feed.name, entry.title, entry.link
    )
}

pub async fn run(
    client: &reqwest::Client,
    config: &NewsConfig,
) -> Result<NewsRunReport, NewsJobError> {
    let webhook = match (&config.webhook_url, config.dry_run) {
        (Some(url), _) => Some(WebhookClient::new(client.clone(), url.clone())),
        (None, true) => None,
        (None, false) => return Err(NewsJobError::MissingWebhookUrl),
    };

    let now = Utc::now();
    let mut report = NewsRunReport::default();
    let mut messages = Vec::new();

    for feed in &config.feeds {
        info!(feed = %feed.name, url = %feed.url, "fetching news feed");
        report.feeds_polled += 1;

        let body = match fetch_feed_with_retry(client, &feed.url, FETCH_RETRIES).await {
            Ok(body) => body,
            Err(error) => {
                warn!(feed = %feed.name, %error, "feed fetch failed, skipping");
                report.feeds_failed += 1;
                continue;
            }
        };
        let parsed = match parse_feed_bytes(&body) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(feed = %feed.name, %error, "feed parse failed, skipping");
                report.feeds_failed += 1;
                continue;
            }
        };

        let recent = select_recent(&parsed.entries, now, config.window);
        info!(feed = %feed.name, count = recent.len(), "recent items found");
        for entry in recent {
            messages.push(format_item(feed, entry));
        }
    }

    for (index, message) in messages.iter().take(MAX_POSTS_PER_RUN).enumerate() {
        if index > 0 {
            tokio::time::sleep(config.post_pause).await;
        }
        match post_message(webhook.as_ref(), config.dry_run, message).await {
            Ok(()) => report.items_posted += 1,
            Err(error) => {
                warn!(%error, "webhook post failed, skipping item");
                report.post_failures += 1;
            }
        }
    }

    Ok(report)
}

async fn post_message(
    webhook: Option<&WebhookClient>,
    dry_run: bool,
    message: &str,
) -> Result<(), WebhookError> {
    if dry_run {
        info!(%message, "dry run, not posting");
        return Ok(());
    }
    match webhook {
        Some(webhook) => webhook.post(message).await,
        // Guarded by the config check in run().
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chrono::TimeZone;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CaptureState {
        contents: Arc<Mutex<Vec<String>>>,
    }

    async fn hook_handler(
        State(state): State<CaptureState>,
        Json(payload): Json<serde_json::Value>,
    ) -> StatusCode {
        let content = payload["content"].as_str().unwrap_or_default().to_string();
        state
            .contents
            .lock()
            .expect("lock should not be poisoned")
            .push(content);
        StatusCode::NO_CONTENT
    }

    fn rss_feed(items: &[(String, String, String)]) -> String {
        let body: String = items
            .iter()
            .map(|(title, link, pub_date)| {
                format!(
                    "<item><title>{title}</title><link>{link}</link>\
                     <pubDate>{pub_date}</pubDate></item>"
                )
            })
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <rss version=\"2.0\"><channel><title>Test Feed</title>\
             <link>https://example.com</link><description>test</description>\
             {body}</channel></rss>"
        )
    }

    async fn spawn_servers(feed_xml: String) -> (NewsConfig, CaptureState, Vec<tokio::task::JoinHandle<()>>) {
        let feed_app = Router::new().route(
            "/feed.xml",
            get(move || {
                let body = feed_xml.clone();
                async move { body }
            }),
        );
        let feed_listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let feed_address = feed_listener.local_addr().expect("local addr should exist");
        let feed_task = tokio::spawn(async move {
            axum::serve(feed_listener, feed_app)
                .await
                .expect("server should run");
        });

        let capture = CaptureState::default();
        let hook_app = Router::new()
            .route("/hook", post(hook_handler))
            .with_state(capture.clone());
        let hook_listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let hook_address = hook_listener.local_addr().expect("local addr should exist");
        let hook_task = tokio::spawn(async move {
            axum::serve(hook_listener, hook_app)
                .await
                .expect("server should run");
        });

        let config = NewsConfig {
            feeds: vec![FeedSpec::new(
                "Test Feed",
                &format!("http://{feed_address}/feed.xml"),
                "📰",
            )],
            webhook_url: Some(format!("http://{hook_address}/hook")),
            window: chrono::Duration::hours(24),
            dry_run: false,
            post_pause: Duration::ZERO,
        };
        (config, capture, vec![feed_task, hook_task])
    }

    fn entry(published_at: Option<DateTime<Utc>>) -> ParsedEntry {
        ParsedEntry {
            id: "id".to_string(),
            title: "title".to_string(),
            link: "https://example.com/post".to_string(),
            summary: None,
            content: None,
            published_at,
        }
    }

    #[test]
    fn window_filter_excludes_old_items() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let window = chrono::Duration::hours(24);

        let fresh = entry(Some(now - chrono::Duration::hours(2)));
        let stale = entry(Some(now - chrono::Duration::hours(30)));
        let undated = entry(None);
        let entries = vec![fresh, stale, undated];

        let selected = select_recent(&entries, now, window);
        assert_eq!(selected.len(), 2);
        assert!(selected.iter().all(|entry| entry
            .published_at
            .map(|ts| now - ts < window)
            .unwrap_or(true)));
    }

    #[test]
    fn per_feed_head_cap_applies_before_window() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let entries: Vec<ParsedEntry> = (0..30)
            .map(|_| entry(Some(now - chrono::Duration::minutes(5))))
            .collect();

        let selected = select_recent(&entries, now, chrono::Duration::hours(24));
        assert_eq!(selected.len(), MAX_ITEMS_PER_FEED);
    }

    #[test]
    fn item_format_matches_channel_layout() {
        let feed = FeedSpec::new("TC: VC", "https://techcrunch.com/feed", "💰");
        let message = format_item(&feed, &entry(None));
        assert_eq!(message, "💰 **TC: VC** | title\nhttps://example.com/post");
    }

    #[tokio::test]
    async fn run_posts_only_items_inside_window() {
        let now = Utc::now();
        let feed_xml = rss_feed(&[
            (
                "Fresh story".to_string(),
                "https://example.com/fresh".to_string(),
                (now - chrono::Duration::hours(1)).to_rfc2822(),
            ),
            (
                "Stale story".to_string(),
                "https://example.com/stale".to_string(),
                (now - chrono::Duration::days(3)).to_rfc2822(),
            ),
        ]);
        let (config, capture, tasks) = spawn_servers(feed_xml).await;

        let report = run(&reqwest::Client::new(), &config)
            .await
            .expect("run should succeed");

        let contents = capture
            .contents
            .lock()
            .expect("lock should not be poisoned")
            .clone();
        assert_eq!(report.items_posted, 1);
        assert_eq!(report.feeds_failed, 0);
        assert_eq!(contents.len(), 1);
        assert!(contents[0].contains("Fresh story"));

        for task in tasks {
            task.abort();
        }
    }

    #[tokio::test]
    async fn run_caps_total_posts() {
        let now = Utc::now();
        let items: Vec<(String, String, String)> = (0..MAX_ITEMS_PER_FEED)
            .map(|index| {
                (
                    format!("Story {index}"),
                    format!("https://example.com/{index}"),
                    (now - chrono::Duration::minutes(10)).to_rfc2822(),
                )
            })
            .collect();
        let feed_xml = rss_feed(&items);
        let (mut config, capture, tasks) = spawn_servers(feed_xml).await;
        // Same feed twice: 20 candidate items, capped at 15 posts.
        let duplicate = config.feeds[0].clone();
        config.feeds.push(duplicate);

        let report = run(&reqwest::Client::new(), &config)
            .await
            .expect("run should succeed");

        let contents = capture
            .contents
            .lock()
            .expect("lock should not be poisoned")
            .clone();
        assert_eq!(report.items_posted, MAX_POSTS_PER_RUN);
        assert_eq!(contents.len(), MAX_POSTS_PER_RUN);

        for task in tasks {
            task.abort();
        }
    }

    #[tokio::test]
    async fn failing_feed_is_skipped_not_fatal() {
        let (mut config, capture, tasks) = spawn_servers(rss_feed(&[(
            "Only story".to_string(),
            "https://example.com/only".to_string(),
            Utc::now().to_rfc2822(),
        )]))
        .await;
        config.feeds.insert(
            0,
            FeedSpec::new("Broken", "http://127.0.0.1:1/feed.xml", "❌"),
        );

        let report = run(&reqwest::Client::new(), &config)
            .await
            .expect("run should succeed despite broken feed");

        assert_eq!(report.feeds_polled, 2);
        assert_eq!(report.feeds_failed, 1);
        assert_eq!(report.items_posted, 1);
        assert_eq!(
            capture
                .contents
                .lock()
                .expect("lock should not be poisoned")
                .len(),
            1
        );

        for task in tasks {
            task.abort();
        }
    }

    #[tokio::test]
    async fn missing_webhook_without_dry_run_is_an_error() {
        let config = NewsConfig {
            feeds: vec![],
            webhook_url: None,
            window: chrono::Duration::hours(24),
            dry_run: false,
            post_pause: Duration::ZERO,
        };
        let err = run(&reqwest::Client::new(), &config)
            .await
            .expect_err("missing webhook must fail");
        assert!(matches!(err, NewsJobError::MissingWebhookUrl));
    }
}
