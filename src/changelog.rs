//! Parser for the flat, human-edited changelog file (NEWS).
//!
//! The file is a loose sequence of release blocks: a date line, an indented
//! header line, then named sections of `- ` bullet entries. The format has no
//! rigid schema, so the parser is deliberately lenient about everything
//! except the release date, which must resolve to an absolute instant.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChangelogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unparseable release date: '{0}'")]
    UnparseableDate(String),
}

/// The closed set of section headers a release block may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionName {
    Changes,
    NewFeatures,
    BugsFixed,
    Other,
    Internal,
}

impl SectionName {
    /// Match a trimmed line against the section-name whitelist.
    pub fn from_line(line: &str) -> Option<Self> {
        match line {
            "Changes" => Some(SectionName::Changes),
            "New features" => Some(SectionName::NewFeatures),
            "Bugs fixed" => Some(SectionName::BugsFixed),
            "Other" => Some(SectionName::Other),
            "Internal" => Some(SectionName::Internal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionName::Changes => "Changes",
            SectionName::NewFeatures => "New features",
            SectionName::BugsFixed => "Bugs fixed",
            SectionName::Other => "Other",
            SectionName::Internal => "Internal",
        }
    }
}

/// One named section of bullet entries. Entry text may contain embedded
/// newlines denoting paragraph breaks within a single bullet.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: SectionName,
    pub entries: Vec<String>,
}

/// One parsed release block, immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRecord {
    pub timestamp: DateTime<Utc>,
    pub header: String,
    pub sections: Vec<Section>,
}

/// Line reader with single-line lookahead. The changelog grammar needs
/// read-ahead-then-push-back at section and release boundaries; peeking
/// replaces raw stream-position manipulation.
struct LineReader<R> {
    inner: R,
    peeked: Option<Option<String>>,
}

impl<R: BufRead> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            peeked: None,
        }
    }

    fn read_raw(&mut self) -> std::io::Result<Option<String>> {
        let mut buf = String::new();
        if self.inner.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        while buf.ends_with('\n') || buf.ends_with('\r') {
            buf.pop();
        }
        Ok(Some(buf))
    }

    /// Look at the next line without consuming it.
    fn peek_line(&mut self) -> std::io::Result<Option<&str>> {
        if self.peeked.is_none() {
            let line = self.read_raw()?;
            self.peeked = Some(line);
        }
        Ok(self.peeked.as_ref().and_then(|line| line.as_deref()))
    }

    /// Consume and return the next line, without its trailing newline.
    fn next_line(&mut self) -> std::io::Result<Option<String>> {
        match self.peeked.take() {
            Some(line) => Ok(line),
            None => self.read_raw(),
        }
    }
}

pub struct ReleaseParser<R> {
    lines: LineReader<R>,
}

impl ReleaseParser<BufReader<File>> {
    /// Open the changelog file. Fails fatally if the file cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ChangelogError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl ReleaseParser<Cursor<Vec<u8>>> {
    pub fn from_string(text: impl Into<String>) -> Self {
        Self::new(Cursor::new(text.into().into_bytes()))
    }
}

impl<R: BufRead> ReleaseParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: LineReader::new(reader),
        }
    }

    /// Parse at most `max` releases, most-recent-first in file order,
    /// stopping early when the file is exhausted.
    pub fn parse_releases(&mut self, max: usize) -> Result<Vec<ReleaseRecord>, ChangelogError> {
        let mut releases = Vec::new();
        for _ in 0..max {
            match self.next_release()? {
                Some(release) => releases.push(release),
                None => break,
            }
        }
        Ok(releases)
    }

    /// Parse the next release block, or `None` at end of input.
    pub fn next_release(&mut self) -> Result<Option<ReleaseRecord>, ChangelogError> {
        let timestamp = match self.read_timestamp()? {
            Some(ts) => ts,
            None => return Ok(None),
        };
        let header = self.read_header()?;
        let sections = self.read_sections()?;
        Ok(Some(ReleaseRecord {
            timestamp,
            header,
            sections,
        }))
    }

    fn skip_blank_lines(&mut self) -> std::io::Result<()> {
        while let Some(line) = self.lines.peek_line()? {
            if !line.trim().is_empty() {
                break;
            }
            self.lines.next_line()?;
        }
        Ok(())
    }

    fn read_timestamp(&mut self) -> Result<Option<DateTime<Utc>>, ChangelogError> {
        self.skip_blank_lines()?;
        match self.lines.next_line()? {
            Some(line) => parse_release_date(line.trim()).map(Some),
            None => Ok(None),
        }
    }

    fn read_header(&mut self) -> Result<String, ChangelogError> {
        self.skip_blank_lines()?;
        Ok(self
            .lines
            .next_line()?
            .map(|line| line.trim().to_string())
            .unwrap_or_default())
    }

    fn read_sections(&mut self) -> Result<Vec<Section>, ChangelogError> {
        let mut sections = Vec::new();
        while let Some(section) = self.read_section()? {
            sections.push(section);
        }
        Ok(sections)
    }

    /// Read one section, or `None` when the next non-blank line is not a
    /// known section header (end of this release). The unmatched line is
    /// left unconsumed.
    fn read_section(&mut self) -> Result<Option<Section>, ChangelogError> {
        self.skip_blank_lines()?;
        let name = match self.lines.peek_line()? {
            Some(line) => match SectionName::from_line(line.trim()) {
                Some(name) => name,
                None => return Ok(None),
            },
            None => return Ok(None),
        };
        self.lines.next_line()?;
        let entries = self.read_entries()?;
        Ok(Some(Section { name, entries }))
    }

    /// Read bullet entries until a flush-left line (end of release) or a
    /// section header (end of section); either terminator is pushed back.
    /// A malformed section with no entries yields an empty list.
    fn read_entries(&mut self) -> Result<Vec<String>, ChangelogError> {
        let mut entries: Vec<String> = Vec::new();
        // A blank line inside an entry is a paragraph break, but only if
        // more text follows in the same entry; deferring it keeps entries
        // free of trailing newlines.
        let mut pending_break = false;

        loop {
            let line = match self.lines.peek_line()? {
                Some(line) => line,
                None => break,
            };
            let trimmed = line.trim();

            if !trimmed.is_empty()
                && (!line.starts_with(char::is_whitespace)
                    || SectionName::from_line(trimmed).is_some())
            {
                break;
            }

            let mut fragment = trimmed.to_string();
            self.lines.next_line()?;

            if fragment.is_empty() {
                pending_break = !entries.is_empty();
                continue;
            }

            if let Some(rest) = fragment.strip_prefix('-') {
                entries.push(String::new());
                pending_break = false;
                fragment = rest.strip_prefix(' ').unwrap_or(rest).to_string();
            }

            let current = match entries.last_mut() {
                Some(entry) => entry,
                // Continuation text before any bullet marker; drop it.
                None => continue,
            };

            if pending_break {
                current.push('\n');
                pending_break = false;
            } else if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&fragment);
        }

        Ok(entries)
    }
}

/// Resolve a free-form date line to an absolute instant. The changelog has
/// been hand-edited for years, so several shapes are accepted; a line that
/// matches none of them is an error, never a silent default.
pub fn parse_release_date(text: &str) -> Result<DateTime<Utc>, ChangelogError> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    // e.g. "Mon Jun  7 20:00:00 UTC 2010" (the common historical shape)
    for fmt in ["%a %b %e %H:%M:%S UTC %Y", "%a %b %e %H:%M:%S %Y"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    Err(ChangelogError::UnparseableDate(text.to_string()))
}
