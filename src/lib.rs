//! mtn-web - the monotone project website and hosting control panel
//!
//! This crate serves the public site and the project-hosting admin panel:
//! - Front page aggregating external blog feeds
//! - Download listings over a directory-per-release tree, with a persisted
//!   size/checksum cache
//! - RSS feeds for news and for releases parsed out of the flat changelog
//! - JSON admin protocol for maintainers, resources and server control
//! - Multipart uploads of project files with description sidecars
//! - redb embedded database for users, projects and permissions

pub mod api;
pub mod auth;
pub mod changelog;
pub mod config;
pub mod daemon;
pub mod digest;
pub mod downloads;
pub mod feeds;
pub mod rss;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Mutex;

use auth::Authenticator;
use config::Config;
use daemon::DaemonClient;
use downloads::{DownloadIndex, MetadataCache};
use feeds::FeedAggregator;
use storage::Database;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub auth: Authenticator,
    pub daemon: DaemonClient,
    pub feeds: FeedAggregator,
    pub downloads: DownloadIndex,
    /// Download size/checksum cache; handlers flush after filling it.
    pub metadata: Mutex<MetadataCache>,
}
