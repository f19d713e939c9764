//! RSS 2.0 output: the aggregated news feed and the releases feed rendered
//! from the changelog. Both carry an Atom self-link and the Dublin Core
//! creator extension.

use std::io::Cursor;
use std::sync::OnceLock;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use regex::Regex;
use thiserror::Error;

use crate::changelog::ReleaseRecord;
use crate::feeds::FeedItem;

#[derive(Debug, Error)]
pub enum RssError {
    #[error("XML write error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Encoding error: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Aggregated external blog posts as RSS.
pub fn render_news_feed(self_url: &str, items: &[FeedItem]) -> Result<String, RssError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_preamble(&mut writer, self_url, "monotone news",
        "Aggregated news for the monotone version control system")?;

    for item in items {
        writer.write_event(Event::Start(BytesStart::new("item")))?;
        write_text_element(&mut writer, "title", &item.title)?;
        write_text_element(&mut writer, "link", &item.link)?;

        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "false"));
        writer.write_event(Event::Start(guid))?;
        writer.write_event(Event::Text(BytesText::new(&item.link)))?;
        writer.write_event(Event::End(BytesEnd::new("guid")))?;

        write_text_element(&mut writer, "dc:creator", &item.author)?;
        // Only creators that look like a mailbox qualify for the plain
        // RSS author element.
        if item.author.contains('@') {
            write_text_element(&mut writer, "author", &item.author)?;
        }

        writer.write_event(Event::Start(BytesStart::new("description")))?;
        writer.write_event(Event::CData(BytesCData::new(item.description.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new("description")))?;

        write_text_element(&mut writer, "pubDate", &item.published.to_rfc2822())?;

        if let Some(source_link) = &item.source_link {
            let mut source = BytesStart::new("source");
            source.push_attribute(("url", source_link.as_str()));
            writer.write_event(Event::Start(source))?;
            if let Some(source_title) = &item.source_title {
                writer.write_event(Event::Text(BytesText::new(source_title)))?;
            }
            writer.write_event(Event::End(BytesEnd::new("source")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    finish(writer)
}

/// Changelog releases as RSS items; section entries become HTML lists with
/// bug-number and bare-URL auto-linking.
pub fn render_releases_feed(self_url: &str, releases: &[ReleaseRecord]) -> Result<String, RssError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_preamble(&mut writer, self_url, "monotone - distributed version control",
        "Recent monotone releases")?;

    if let Some(newest) = releases.first() {
        write_text_element(&mut writer, "pubDate", &newest.timestamp.to_rfc2822())?;
    }

    for release in releases {
        writer.write_event(Event::Start(BytesStart::new("item")))?;
        write_text_element(&mut writer, "title", &release.header)?;

        writer.write_event(Event::Start(BytesStart::new("description")))?;
        writer.write_event(Event::CData(BytesCData::new(
            release_description_html(release).as_str(),
        )))?;
        writer.write_event(Event::End(BytesEnd::new("description")))?;

        write_text_element(&mut writer, "pubDate", &release.timestamp.to_rfc2822())?;
        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    finish(writer)
}

/// Rewrite bare URLs and `monotone bug(s) #N[, #N...]` references into HTML
/// links, then render embedded paragraph breaks as `<br />`.
pub fn autolink(entry: &str) -> String {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    static BUGS_RE: OnceLock<Regex> = OnceLock::new();
    static BUG_NUM_RE: OnceLock<Regex> = OnceLock::new();

    let url_re =
        URL_RE.get_or_init(|| Regex::new(r"https?://[^\s)>]+").expect("valid URL regex"));
    let bugs_re = BUGS_RE.get_or_init(|| {
        Regex::new(r"monotone bugs?(?:(?:, |, and | and | )#\d+)+").expect("valid bug-list regex")
    });
    let bug_num_re = BUG_NUM_RE.get_or_init(|| Regex::new(r"#(\d+)").expect("valid bug regex"));

    let linked = url_re.replace_all(entry, r#"<a href="$0">$0</a>"#);
    let linked = bugs_re.replace_all(&linked, |caps: &regex::Captures| {
        bug_num_re
            .replace_all(&caps[0], r##"<a href="https://savannah.nongnu.org/bugs/?$1">#$1</a>"##)
            .into_owned()
    });

    linked.replace('\n', "<br />\n")
}

fn release_description_html(release: &ReleaseRecord) -> String {
    let mut html = String::new();
    for section in &release.sections {
        html.push_str("<h2>");
        html.push_str(section.name.as_str());
        html.push_str("</h2>\n<ul>\n");
        for entry in &section.entries {
            html.push_str("<li>");
            html.push_str(&autolink(entry));
            html.push_str("</li>\n");
        }
        html.push_str("</ul>\n");
    }
    html
}

/// XML declaration, rss/channel opening, channel metadata and Atom
/// self-link shared by both feeds.
fn write_preamble(
    writer: &mut XmlWriter,
    self_url: &str,
    title: &str,
    description: &str,
) -> Result<(), RssError> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:atom", "http://www.w3.org/2005/Atom"));
    rss.push_attribute(("xmlns:dc", "http://purl.org/dc/elements/1.1/"));
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    write_text_element(writer, "title", title)?;

    let mut atom_link = BytesStart::new("atom:link");
    atom_link.push_attribute(("href", self_url));
    atom_link.push_attribute(("rel", "self"));
    atom_link.push_attribute(("type", "application/rss+xml"));
    writer.write_event(Event::Empty(atom_link))?;

    write_text_element(writer, "link", self_url)?;
    write_text_element(writer, "description", description)?;
    write_text_element(writer, "language", "en-us")?;
    Ok(())
}

fn finish(mut writer: XmlWriter) -> Result<String, RssError> {
    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;
    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes)?)
}

fn write_text_element(writer: &mut XmlWriter, tag: &str, text: &str) -> Result<(), RssError> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
