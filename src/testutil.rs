//! Shared test helpers for handler-level tests.

use std::sync::{Arc, Mutex};

use crate::auth::Authenticator;
use crate::config::{Config, DaemonConfig, FeedConfig, ServerConfig, SiteConfig};
use crate::daemon::DaemonClient;
use crate::downloads::{default_matchers, DownloadIndex, MetadataCache};
use crate::feeds::FeedAggregator;
use crate::storage::Database;
use crate::AppState;

/// Create a test AppState rooted in a temporary directory. The daemon
/// address points at a closed port so daemon commands report an inline
/// error instead of hanging.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let downloads_dir = temp_dir.path().join("downloads");
    let cache_dir = temp_dir.path().join("cache");
    std::fs::create_dir_all(&downloads_dir).expect("Failed to create downloads dir");

    let config = Config {
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
        },
        site: SiteConfig {
            base_url: "http://localhost:8080".to_string(),
            changelog_file: temp_dir.path().join("NEWS").to_string_lossy().to_string(),
            downloads_dir: downloads_dir.to_string_lossy().to_string(),
            cache_dir: cache_dir.to_string_lossy().to_string(),
            release_feed_count: 10,
        },
        feeds: FeedConfig::default(),
        daemon: DaemonConfig {
            addr: "127.0.0.1:1".to_string(),
            user: "test".to_string(),
            pass: "test".to_string(),
            connect_timeout_secs: 1,
        },
        session_ttl_secs: 3600,
        max_upload_size: 10 * 1024 * 1024,
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let auth = Authenticator::open(&data_dir, config.session_ttl_secs)
        .expect("Failed to open test authenticator");
    let daemon = DaemonClient::new(&config.daemon);
    let feeds = FeedAggregator::new(&config.feeds, &cache_dir);
    let downloads = DownloadIndex::new(&downloads_dir, default_matchers());
    let metadata = Mutex::new(MetadataCache::new(&downloads_dir, &cache_dir));

    Arc::new(AppState {
        config,
        db,
        auth,
        daemon,
        feeds,
        downloads,
        metadata,
    })
}
