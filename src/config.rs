use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub site: SiteConfig,
    pub feeds: FeedConfig,
    pub daemon: DaemonConfig,
    /// Lifetime of an issued session cookie, in seconds
    pub session_ttl_secs: i64,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Directory for the embedded database, the session secret and project data
    pub data_dir: String,
}

#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Absolute base URL used for self-links in the generated feeds
    pub base_url: String,
    /// Path to the flat changelog file (NEWS)
    pub changelog_file: String,
    /// Root of the directory-per-release download tree
    pub downloads_dir: String,
    /// Directory for the download-metadata cache file and fetched feed bodies
    pub cache_dir: String,
    /// How many releases the releases feed renders
    pub release_feed_count: usize,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// External blog feeds aggregated on the front page and in news.xml
    pub urls: Vec<String>,
    /// How many of the freshest combined items the front page shows
    pub item_count: usize,
    /// Plain-text description cap before the truncation marker
    pub description_limit: usize,
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// host:port of the daemon-control socket
    pub addr: String,
    pub user: String,
    pub pass: String,
    pub connect_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            item_count: 5,
            description_limit: 350,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:12346".to_string(),
            user: String::new(),
            pass: String::new(),
            connect_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let base_url =
            std::env::var("SITE_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        let changelog_file =
            std::env::var("CHANGELOG_FILE").unwrap_or_else(|_| "./NEWS".to_string());

        let downloads_dir =
            std::env::var("DOWNLOADS_DIR").unwrap_or_else(|_| "./downloads".to_string());

        let cache_dir = std::env::var("CACHE_DIR").unwrap_or_else(|_| "./cache".to_string());

        let release_feed_count = std::env::var("RELEASE_FEED_COUNT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let feed_urls: Vec<String> = std::env::var("FEED_URLS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let feed_item_count = std::env::var("FEED_ITEM_COUNT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let feed_description_limit = std::env::var("FEED_DESCRIPTION_LIMIT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(350);

        let daemon_addr =
            std::env::var("DAEMON_ADDR").unwrap_or_else(|_| "127.0.0.1:12346".to_string());
        let daemon_user = std::env::var("DAEMON_USER").unwrap_or_default();
        let daemon_pass = std::env::var("DAEMON_PASS").unwrap_or_default();
        let daemon_timeout = std::env::var("DAEMON_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let session_ttl_secs = std::env::var("SESSION_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60 * 60 * 24 * 7); // one week

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50 * 1024 * 1024); // 50MB

        let config = Config {
            server: ServerConfig {
                bind_address,
                data_dir,
            },
            site: SiteConfig {
                base_url,
                changelog_file,
                downloads_dir,
                cache_dir,
                release_feed_count,
            },
            feeds: FeedConfig {
                urls: feed_urls,
                item_count: feed_item_count,
                description_limit: feed_description_limit,
            },
            daemon: DaemonConfig {
                addr: daemon_addr,
                user: daemon_user,
                pass: daemon_pass,
                connect_timeout_secs: daemon_timeout,
            },
            session_ttl_secs,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind_address.is_empty() {
            return Err(ConfigError::ValidationError(
                "BIND_ADDRESS cannot be empty".to_string(),
            ));
        }

        if !self.site.base_url.starts_with("http://") && !self.site.base_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(
                "SITE_BASE_URL must be an absolute http(s) URL".to_string(),
            ));
        }

        if self.session_ttl_secs <= 0 {
            return Err(ConfigError::ValidationError(
                "SESSION_TTL_SECS must be positive".to_string(),
            ));
        }

        if self.daemon.user.is_empty() || self.daemon.pass.is_empty() {
            tracing::warn!(
                "DAEMON_USER/DAEMON_PASS not set. Daemon-control commands will be rejected \
                 by the control socket."
            );
        }

        Ok(())
    }

    /// Root directory of a project's served files (uploads, homepage).
    pub fn project_www_dir(&self, project: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.server.data_dir)
            .join("www")
            .join("projects")
            .join(project)
    }

    /// Root directory of a project's engine-side state (database, metadata files).
    pub fn project_dir(&self, project: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.server.data_dir)
            .join("projects")
            .join(project)
    }
}
