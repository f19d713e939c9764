pub mod admin;
mod feeds;
mod pages;
mod session;
mod uploads;

use std::sync::OnceLock;

use regex::Regex;

use crate::api::response::ApiError;
use crate::storage::DatabaseError;

pub use admin::admin_api;
pub use feeds::{news_feed, releases_feed};
pub use pages::{downloads_archive_page, downloads_page, index_page, serve_package, serve_project_file};
pub use session::{change_password, login, logout, register};
pub use uploads::{change_homepage, upload_files};

/// Map a storage failure to the admin protocol's opaque server error.
fn storage_error(e: DatabaseError) -> ApiError {
    tracing::error!(error = %e, "Storage operation failed");
    ApiError::internal("Internal server error.")
}

/// Validate a project name before it is used as a path component. Only
/// letters, numbers and dash are allowed, which rules out traversal.
fn safe_project(project: &str) -> Result<&str, ApiError> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9-]+$").expect("valid project-name regex"));
    if re.is_match(project) {
        Ok(project)
    } else {
        Err(ApiError::bad_request(
            "Only letters, numbers, and dash are allowed in a project name.",
        ))
    }
}

/// Strip any directory part from a client-supplied file name.
fn basename(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or("")
}
