use feed_rs::model::Entry;

use super::types::{ParsedEntry, ParsedFeed};

#[derive(Debug, thiserror::Error)]
pub enum FeedParseError {
    #[error("feed payload is empty")]
    EmptyPayload,
    #[error("feed parse error: {0}")]
    Xml(#[from] feed_rs::parser::ParseFeedError),
}

pub fn parse_feed_bytes(raw: &[u8]) -> Result<ParsedFeed, FeedParseError> {
    let trimmed = trim_leading_ascii_whitespace(raw);
    if trimmed.is_empty() {
        return Err(FeedParseError::EmptyPayload);
    }

    let feed = feed_rs::parser::parse(trimmed)?;
    let title = feed
        .title
        .as_ref()
        .map(|text| text.content.clone())
        .unwrap_or_else(|| "Untitled Feed".to_string());
    let entries = feed.entries.iter().map(entry_from_xml).collect();

    Ok(ParsedFeed { title, entries })
}

/// Stable identifier for an entry: trimmed GUID, else link, else a
/// title/date fallback. Used as the seen-set member for episodes.
pub fn entry_key(entry: &ParsedEntry) -> String {
    if !entry.id.trim().is_empty() {
        return entry.id.trim().to_string();
    }
    if !entry.link.trim().is_empty() {
        return entry.link.trim().to_string();
    }
    format!(
        "{}::{}",
        entry.title.trim(),
        entry
            .published_at
            .map(|published| published.to_rfc3339())
            .unwrap_or_default()
    )
}

fn entry_from_xml(entry: &Entry) -> ParsedEntry {
    let id = if entry.id.trim().is_empty() {
        entry
            .links
            .first()
            .map(|link| link.href.clone())
            .unwrap_or_default()
    } else {
        entry.id.clone()
    };
    let title = entry
        .title
        .as_ref()
        .map(|text| text.content.clone())
        .unwrap_or_else(|| "Untitled Entry".to_string());
    let link = entry
        .links
        .first()
        .map(|entry_link| entry_link.href.clone())
        .unwrap_or_default();
    let summary = entry.summary.as_ref().map(|text| text.content.clone());
    let content = entry
        .content
        .as_ref()
        .and_then(|content| content.body.clone());
    let published_at = entry.published.or(entry.updated);

    ParsedEntry {
        id,
        title,
        link,
        summary,
        content,
        published_at,
    }
}

fn trim_leading_ascii_whitespace(raw: &[u8]) -> &[u8] {
    let mut index = 0;
    while index < raw.len() && raw[index].is_ascii_whitespace() {
        index += 1;
    }
    &raw[index..]
}
