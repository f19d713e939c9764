//! Public HTML pages (front page, download listings) and file serving for
//! release packages and per-project uploads.

use std::sync::Arc;

use axum::extract::{Path as UrlPath, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;

use super::{basename, safe_project};
use crate::api::response::{ApiError, AppQuery};
use crate::AppState;
use serde::Serialize;

pub async fn index_page(State(state): State<Arc<AppState>>) -> Html<String> {
    let items = state.feeds.fetch(state.config.feeds.item_count).await;

    let mut body = String::from("<h1 class=\"intheblogs\">Monotone in the blogs</h1>\n");
    if items.is_empty() {
        body.push_str("<p>No blog posts found.</p>\n");
    } else {
        for item in &items {
            body.push_str(&format!(
                "<div class=\"feed-msg\">\n\
                 <h2>{title}</h2>\n\
                 <h3>by {author}, {date}</h3>\n\
                 <p>{description} <a href=\"{link}\">&#187; read more</a></p>\n\
                 </div>\n",
                title = escape(&item.title),
                author = escape(&item.author),
                date = item.published.format("%e %B %Y"),
                description = escape(&item.description),
                link = escape(&item.link),
            ));
        }
    }

    Html(page("monotone: distributed version control", &body))
}

pub async fn downloads_page(State(state): State<Arc<AppState>>) -> Result<Html<String>, ApiError> {
    let platforms = state
        .downloads
        .latest_per_platform()
        .map_err(|e| ApiError::internal(format!("Error reading the download area: {e}")))?;

    let mut cache = state
        .metadata
        .lock()
        .map_err(|_| ApiError::internal("Download metadata cache is unavailable."))?;

    let mut body = String::from("<h1>Latest downloads</h1>\n<dl>\n");
    for platform in &platforms {
        body.push_str(&format!(
            "<dt>{} <a href=\"{}\">(older versions)</a></dt>\n",
            escape(&platform.platform),
            escape(&archive_href(&platform.platform)),
        ));
        for file in &platform.files {
            body.push_str(&format!(
                "<dd><a href=\"/downloads/files/{path}\">{name}</a>",
                path = escape(file),
                name = escape(basename(file)),
            ));
            match cache.metadata(file) {
                Ok(meta) => body.push_str(&format!(
                    " ({}, SHA-256 <code>{}</code>)",
                    format_size(meta.size),
                    meta.checksum
                )),
                Err(e) => {
                    tracing::warn!(file = %file, error = %e, "No metadata for download")
                }
            }
            body.push_str("</dd>\n");
        }
    }
    body.push_str("</dl>\n");

    if let Err(e) = cache.flush() {
        tracing::warn!(error = %e, "Failed to flush download metadata cache");
    }

    Ok(Html(page("monotone: downloads", &body)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ArchiveParams {
    pub platform: String,
}

/// Archive link for one platform label. The query value is encoded with the
/// same codec `AppQuery` decodes with, so labels with spaces or slashes
/// survive the round trip.
fn archive_href(platform: &str) -> String {
    let params = ArchiveParams {
        platform: platform.to_string(),
    };
    // Serializing a single string field cannot fail.
    let query = serde_qs::to_string(&params).unwrap_or_default();
    format!("/downloads/archive?{query}")
}

pub async fn downloads_archive_page(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ArchiveParams>,
) -> Result<Html<String>, ApiError> {
    let files = match state.downloads.all_files(&params.platform) {
        Ok(files) => files,
        Err(crate::downloads::DownloadError::UnknownPlatform(p)) => {
            return Err(ApiError::not_found(format!("Unknown platform: {p}")))
        }
        Err(e) => {
            return Err(ApiError::internal(format!(
                "Error reading the download area: {e}"
            )))
        }
    };

    let mut body = format!(
        "<h1>All downloads for {}</h1>\n<ul>\n",
        escape(&params.platform)
    );
    for file in &files {
        body.push_str(&format!(
            "<li><a href=\"/downloads/files/{path}\">{path}</a></li>\n",
            path = escape(file),
        ));
    }
    body.push_str("</ul>\n");

    Ok(Html(page("monotone: download archive", &body)))
}

/// Serve one release package from the download tree.
pub async fn serve_package(
    State(state): State<Arc<AppState>>,
    UrlPath(path): UrlPath<String>,
) -> Result<Response, ApiError> {
    let rel = std::path::Path::new(&path);
    let plain = rel
        .components()
        .all(|c| matches!(c, std::path::Component::Normal(_)));
    if path.is_empty() || !plain {
        return Err(ApiError::not_found("File not found."));
    }

    let full = std::path::Path::new(&state.config.site.downloads_dir).join(rel);
    serve_file(&full, basename(&path), None)
}

/// Serve one uploaded project file, exposing its sidecar description in a
/// response header.
pub async fn serve_project_file(
    State(state): State<Arc<AppState>>,
    UrlPath((project, name)): UrlPath<(String, String)>,
) -> Result<Response, ApiError> {
    let project = safe_project(&project).map_err(|_| ApiError::not_found("File not found."))?;
    let name = basename(&name);
    if name.is_empty() {
        return Err(ApiError::not_found("File not found."));
    }

    let www = state.config.project_www_dir(project);
    let description = std::fs::read_to_string(www.join("files-about").join(name)).ok();
    serve_file(&www.join("files").join(name), name, description.as_deref())
}

fn serve_file(
    path: &std::path::Path,
    name: &str,
    description: Option<&str>,
) -> Result<Response, ApiError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found."))
        }
        Err(e) => return Err(ApiError::internal_verbose("Error reading file.", e.to_string())),
    };

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{name}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Some(description) = description {
        let one_line = description.replace(['\r', '\n'], " ");
        if let Ok(value) = HeaderValue::from_str(one_line.trim()) {
            headers.insert("x-file-description", value);
        }
    }

    Ok((headers, data).into_response())
}

/// Minimal page chrome shared by the HTML handlers.
fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n\
         <meta charset=\"utf-8\" />\n\
         <title>{title}</title>\n\
         <link rel=\"alternate\" type=\"application/rss+xml\" title=\"monotone news\" href=\"/news.xml\" />\n\
         <link rel=\"alternate\" type=\"application/rss+xml\" title=\"monotone releases\" href=\"/releases.xml\" />\n\
         </head>\n<body>\n{body}</body>\n</html>\n",
        title = escape(title),
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Human-readable size, binary units.
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["bytes", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} bytes")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_href_encodes_awkward_platform_labels() {
        let href = archive_href("Linux x86/glibc 2.3");

        let (path, query) = href.split_once('?').expect("href has a query");
        assert_eq!(path, "/downloads/archive");
        assert!(!query.contains(' '), "raw space in {query:?}");

        // The extractor must recover the exact label.
        let params: ArchiveParams = serde_qs::from_str(query).unwrap();
        assert_eq!(params.platform, "Linux x86/glibc 2.3");
    }

    #[test]
    fn archive_href_leaves_plain_labels_readable() {
        let href = archive_href("Tarball");
        assert_eq!(href, "/downloads/archive?platform=Tarball");
    }

    #[test]
    fn escape_covers_the_html_special_characters() {
        assert_eq!(
            escape("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn format_size_picks_sensible_units() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
    }
}
