//! Download index over the directory-per-release layout
//! (`downloads/<release-dir>/<file>`).
//!
//! Release files are classified by matching their names against per-platform
//! regular-expression templates; `%version%` in a template is replaced with
//! the (regex-escaped) release directory name before matching.

mod cache;

pub use cache::{Checksummer, FileMeta, MetadataCache, MetadataCacheError, Sha256Checksummer};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid platform pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),
}

/// A (label, filename-pattern-template) pair classifying release files by
/// target platform/packaging type. Table order is display order.
#[derive(Debug, Clone)]
pub struct PlatformMatcher {
    pub label: String,
    pub pattern: String,
}

impl PlatformMatcher {
    pub fn new(label: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            pattern: pattern.into(),
        }
    }

    /// Compile the template for one release directory name.
    fn regex_for(&self, version: &str) -> Result<Regex, DownloadError> {
        let pattern = self.pattern.replace("%version%", &regex::escape(version));
        Regex::new(&pattern).map_err(|source| DownloadError::Pattern {
            pattern: self.pattern.clone(),
            source,
        })
    }
}

/// The platform naming each released package follows.
pub fn default_matchers() -> Vec<PlatformMatcher> {
    vec![
        PlatformMatcher::new("Tarball", r"monotone-%version%\.tar\.gz"),
        PlatformMatcher::new("Linux x86/glibc 2.3", r"mtn-%version%-linux-x86\.bz2"),
        PlatformMatcher::new("Mac OS X Installer", r"monotone-%version%\.dmg"),
        PlatformMatcher::new("Mac OS X Binary", r"mtn-%version%-osx(-univ)?\.bz2"),
        PlatformMatcher::new("Solaris Package", r"PMmonotone-%version%\.(i386|sparc)\.pkg"),
        PlatformMatcher::new("Windows Installer", r"monotone-%version%-setup\.exe"),
    ]
}

/// Latest matched files for one platform, all from a single release
/// directory (a release may ship multiple files per platform, e.g. 32/64-bit
/// variants).
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformDownloads {
    pub platform: String,
    /// Relative paths `release-dir/file-name`, in directory listing order.
    pub files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DownloadIndex {
    root: PathBuf,
    matchers: Vec<PlatformMatcher>,
}

impl DownloadIndex {
    pub fn new<P: AsRef<Path>>(root: P, matchers: Vec<PlatformMatcher>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            matchers,
        }
    }

    pub fn matchers(&self) -> &[PlatformMatcher] {
        &self.matchers
    }

    /// Scan release directories newest-first (reverse lexicographic by
    /// directory name). The first directory in which a platform's pattern
    /// matches any file wins that platform's slot for good; later (older)
    /// directories are never reconsidered for it. Scanning stops early once
    /// every platform has been matched.
    pub fn latest_per_platform(&self) -> Result<Vec<PlatformDownloads>, DownloadError> {
        let mut matched: HashSet<usize> = HashSet::new();
        let mut files_per_platform: Vec<Vec<String>> = vec![Vec::new(); self.matchers.len()];

        for dir in self.release_dirs()? {
            if matched.len() == self.matchers.len() {
                break;
            }

            let regexes: Vec<Option<Regex>> = self
                .matchers
                .iter()
                .enumerate()
                .map(|(i, m)| {
                    if matched.contains(&i) {
                        Ok(None)
                    } else {
                        m.regex_for(&dir).map(Some)
                    }
                })
                .collect::<Result<_, _>>()?;

            // Platforms matched within this directory keep collecting files
            // from it; they are only sealed once the directory is done.
            let mut newly_matched: HashSet<usize> = HashSet::new();
            for file in self.files_in(&dir)? {
                for (i, regex) in regexes.iter().enumerate() {
                    if let Some(regex) = regex {
                        if regex.is_match(&file) {
                            files_per_platform[i].push(format!("{dir}/{file}"));
                            newly_matched.insert(i);
                        }
                    }
                }
            }
            matched.extend(newly_matched);
        }

        Ok(self
            .matchers
            .iter()
            .zip(files_per_platform)
            .filter(|(_, files)| !files.is_empty())
            .map(|(matcher, files)| PlatformDownloads {
                platform: matcher.label.clone(),
                files,
            })
            .collect())
    }

    /// Every file matching `platform`'s pattern across all release
    /// directories, sorted reverse lexicographically by relative path.
    /// Directory names are compared as plain strings, not as versions.
    pub fn all_files(&self, platform: &str) -> Result<Vec<String>, DownloadError> {
        let matcher = self
            .matchers
            .iter()
            .find(|m| m.label == platform)
            .ok_or_else(|| DownloadError::UnknownPlatform(platform.to_string()))?;

        let mut paths = Vec::new();
        for dir in self.release_dirs()? {
            let regex = matcher.regex_for(&dir)?;
            for file in self.files_in(&dir)? {
                if regex.is_match(&file) {
                    paths.push(format!("{dir}/{file}"));
                }
            }
        }

        paths.sort_by(|a, b| b.cmp(a));
        Ok(paths)
    }

    /// Release directory names, reverse lexicographically sorted.
    /// Non-directory entries are skipped.
    fn release_dirs(&self) -> Result<Vec<String>, DownloadError> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                if !name.starts_with('.') {
                    dirs.push(name);
                }
            }
        }
        dirs.sort_by(|a, b| b.cmp(a));
        Ok(dirs)
    }

    fn files_in(&self, dir: &str) -> Result<Vec<String>, DownloadError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(self.root.join(dir))? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                if !name.starts_with('.') {
                    files.push(name);
                }
            }
        }
        files.sort_by(|a, b| b.cmp(a));
        Ok(files)
    }
}
