use std::path::Path;

use serde::{Deserialize, Serialize};

const DEFAULT_EMOJI: &str = "📡";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedSpec {
    pub name: String,
    pub url: String,
    pub emoji: String,
}

impl FeedSpec {
    pub fn new(name: &str, url: &str, emoji: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            emoji: emoji.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourcesError {
    #[error("failed to read feed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid OPML content: {0}")]
    Opml(String),
    #[error("invalid JSON feed list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported feed file format: {0}")]
    UnsupportedFormat(String),
    #[error("feed file contains no feeds")]
    EmptyFeedList,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum JsonFeedItem {
    Url(String),
    Object {
        url: String,
        name: Option<String>,
        emoji: Option<String>,
    },
}

/// The VC news feeds monitored by the news job.
pub fn default_news_feeds() -> Vec<FeedSpec> {
    vec![
        FeedSpec::new("플래텀", "https://platum.kr/feed", "🇰🇷"),
        FeedSpec::new("StrictlyVC", "https://rss.buzzsprout.com/850276.rss", "💼"),
        FeedSpec::new(
            "TC: VC",
            "https://techcrunch.com/tag/venture-capital/feed/",
            "💰",
        ),
        FeedSpec::new(
            "VentureBeat",
            "https://feeds.feedburner.com/venturebeat/SZYF",
            "🚀",
        ),
    ]
}

/// The podcast feeds monitored by the podcast job.
pub fn default_podcast_feeds() -> Vec<FeedSpec> {
    vec![
        FeedSpec::new(
            "Lenny's Podcast",
            "https://www.lennysnewsletter.com/feed",
            "🎙️",
        ),
        FeedSpec::new("20VC", "http://thetwentyminutevc.libsyn.com/rss", "💰"),
        FeedSpec::new("a16z Podcast", "https://feeds.simplecast.com/JGE3yC0V", "🚀"),
        FeedSpec::new("Acquired", "https://feeds.transistor.fm/acquired", "📈"),
    ]
}

/// Loads a replacement feed list from a JSON or OPML file, dispatching on
/// the file extension.
pub fn load_feed_file(path: &Path) -> Result<Vec<FeedSpec>, SourcesError> {
    let content = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let feeds = match extension.as_str() {
        "json" => parse_json_feeds(&content)?,
        "opml" | "xml" => parse_opml_feeds(&content)?,
        other => return Err(SourcesError::UnsupportedFormat(other.to_string())),
    };
    if feeds.is_empty() {
        return Err(SourcesError::EmptyFeedList);
    }
    Ok(feeds)
}

pub fn parse_json_feeds(input: &str) -> Result<Vec<FeedSpec>, SourcesError> {
    let items: Vec<JsonFeedItem> = serde_json::from_str(input)?;
    let feeds = items
        .into_iter()
        .map(|item| match item {
            JsonFeedItem::Url(url) => FeedSpec {
                name: url.clone(),
                url,
                emoji: DEFAULT_EMOJI.to_string(),
            },
            JsonFeedItem::Object { url, name, emoji } => FeedSpec {
                name: name.unwrap_or_else(|| url.clone()),
                url,
                emoji: emoji.unwrap_or_else(|| DEFAULT_EMOJI.to_string()),
            },
        })
        .collect();
    Ok(feeds)
}

pub fn parse_opml_feeds(input: &str) -> Result<Vec<FeedSpec>, SourcesError> {
    let doc = roxmltree::Document::parse(input)
        .map_err(|error| SourcesError::Opml(error.to_string()))?;
    let mut feeds = Vec::new();

    for node in doc.descendants().filter(|node| node.has_tag_name("outline")) {
        let Some(url) = node.attribute("xmlUrl") else {
            continue;
        };
        if url.trim().is_empty() {
            continue;
        }

        let name = node
            .attribute("title")
            .or_else(|| node.attribute("text"))
            .unwrap_or(url)
            .to_string();
        feeds.push(FeedSpec {
            name,
            url: url.to_string(),
            emoji: DEFAULT_EMOJI.to_string(),
        });
    }

    Ok(feeds)
}
