//! Aggregation of external blog feeds for the front page and news.xml.
//!
//! Fetching and parsing are delegated to reqwest and feed-rs; this module
//! supplies the URL list and cache directory and performs post-fetch
//! normalization (strip HTML, truncate, author fallback).

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::FeedConfig;
use crate::digest;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] feed_rs::parser::ParseFeedError),
}

/// One normalized feed item, ordered by recency when aggregated.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub title: String,
    /// Author name, or `"unknown"` when the feed carries none.
    pub author: String,
    pub published: DateTime<Utc>,
    /// Plain text, HTML stripped, capped at the configured length.
    pub description: String,
    pub link: String,
    pub source_title: Option<String>,
    pub source_link: Option<String>,
}

pub struct FeedAggregator {
    urls: Vec<String>,
    cache_dir: PathBuf,
    description_limit: usize,
    client: reqwest::Client,
}

impl FeedAggregator {
    pub fn new(config: &FeedConfig, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            urls: config.urls.clone(),
            cache_dir: cache_dir.into(),
            description_limit: config.description_limit,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch and merge all configured feeds, freshest first, truncated to
    /// `max_items`. Unreachable sources are skipped with a warning; they
    /// never fail the whole aggregation.
    pub async fn fetch(&self, max_items: usize) -> Vec<FeedItem> {
        let mut items = self.fetch_all().await;
        items.truncate(max_items);
        items
    }

    /// Fetch and merge all configured feeds without an item cap.
    pub async fn fetch_all(&self) -> Vec<FeedItem> {
        let mut items = Vec::new();
        for url in &self.urls {
            match self.fetch_one(url).await {
                Ok(mut feed_items) => items.append(&mut feed_items),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Skipping unreachable feed");
                }
            }
        }
        items.sort_by(|a, b| b.published.cmp(&a.published));
        items
    }

    async fn fetch_one(&self, url: &str) -> Result<Vec<FeedItem>, FeedError> {
        let body = self.fetch_body(url).await?;
        let feed = feed_rs::parser::parse(body.as_slice())?;

        let source_title = feed.title.as_ref().map(|t| t.content.clone());
        let source_link = feed.links.first().map(|l| l.href.clone());

        Ok(feed
            .entries
            .into_iter()
            .map(|entry| self.normalize(entry, &source_title, &source_link))
            .collect())
    }

    fn normalize(
        &self,
        entry: feed_rs::model::Entry,
        source_title: &Option<String>,
        source_link: &Option<String>,
    ) -> FeedItem {
        let author = entry
            .authors
            .first()
            .map(|a| a.name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let raw_description = entry
            .summary
            .map(|t| t.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();

        FeedItem {
            title: entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "(untitled)".to_string()),
            author,
            published: entry
                .published
                .or(entry.updated)
                .unwrap_or(DateTime::UNIX_EPOCH),
            description: truncate(&strip_tags(&raw_description), self.description_limit),
            link: entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_default(),
            source_title: source_title.clone(),
            source_link: source_link.clone(),
        }
    }

    /// Fetch a feed body, falling back to the last cached copy when the
    /// source is unreachable.
    async fn fetch_body(&self, url: &str) -> Result<Vec<u8>, FeedError> {
        let cache_path = self
            .cache_dir
            .join(format!("feed-{}.xml", digest::sha256_hex(url.as_bytes())));

        let fetched = async {
            self.client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await
        }
        .await;

        match fetched {
            Ok(bytes) => {
                if let Some(dir) = cache_path.parent() {
                    let _ = std::fs::create_dir_all(dir);
                }
                if let Err(e) = std::fs::write(&cache_path, &bytes) {
                    tracing::warn!(url = %url, error = %e, "Failed to cache feed body");
                }
                Ok(bytes.to_vec())
            }
            Err(e) => match std::fs::read(&cache_path) {
                Ok(cached) => {
                    tracing::warn!(url = %url, error = %e, "Feed unreachable, serving cached copy");
                    Ok(cached)
                }
                Err(_) => Err(e.into()),
            },
        }
    }
}

/// Remove HTML tags, leaving the text content.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Cap `text` at `limit` characters, appending the truncation marker when
/// anything was cut.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit).collect();
    out.push_str(" [...]");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_tags_removes_markup_and_keeps_text() {
        assert_eq!(
            strip_tags("<p>Hello <a href=\"x\">world</a>!</p>"),
            "Hello world!"
        );
        assert_eq!(strip_tags("no markup"), "no markup");
        assert_eq!(strip_tags("<br/><br/>"), "");
    }

    #[test]
    fn truncate_only_marks_when_text_was_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly ten", 11), "exactly ten");
        assert_eq!(truncate("a longer sentence", 8), "a longer [...]");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate("héllo wörld", 11), "héllo wörld");
        assert_eq!(truncate("héllo wörld", 5), "héllo [...]");
    }
}
