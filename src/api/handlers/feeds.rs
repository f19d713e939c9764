//! RSS endpoints: aggregated blog news and the release history feed.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::api::response::ApiError;
use crate::changelog::ReleaseParser;
use crate::{rss, AppState};

const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

pub async fn news_feed(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let items = state.feeds.fetch_all().await;
    let self_url = absolute(&state, "/news.xml");
    let xml = rss::render_news_feed(&self_url, &items)
        .map_err(|e| ApiError::internal_verbose("Error rendering the news feed.", e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, RSS_CONTENT_TYPE)], xml).into_response())
}

pub async fn releases_feed(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let mut parser = ReleaseParser::open(&state.config.site.changelog_file)
        .map_err(|e| ApiError::internal_verbose("Error opening the changelog.", e.to_string()))?;
    let releases = parser
        .parse_releases(state.config.site.release_feed_count)
        .map_err(|e| ApiError::internal_verbose("Error parsing the changelog.", e.to_string()))?;

    let self_url = absolute(&state, "/releases.xml");
    let xml = rss::render_releases_feed(&self_url, &releases).map_err(|e| {
        ApiError::internal_verbose("Error rendering the releases feed.", e.to_string())
    })?;
    Ok(([(header::CONTENT_TYPE, RSS_CONTENT_TYPE)], xml).into_response())
}

fn absolute(state: &AppState, path: &str) -> String {
    format!(
        "{}{path}",
        state.config.site.base_url.trim_end_matches('/')
    )
}
