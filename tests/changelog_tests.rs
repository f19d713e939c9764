use chrono::{TimeZone, Utc};
use mtn_web::changelog::{parse_release_date, ChangelogError, ReleaseParser, SectionName};

const TWO_RELEASES: &str = "\
Mon Jun  7 20:00:00 UTC 2010

        0.48.1 release

        Bugs fixed

        - mtn no longer crashes when given an empty
          database argument.

        - netsync handshake timeouts are reported
          properly.

        Other

        - documentation typo fixes.

Sat May 15 12:00:00 UTC 2010

        0.48 release

        New features

        - 'mtn clone' now accepts a branch pattern.
";

#[test]
fn parses_releases_in_file_order() {
    let mut parser = ReleaseParser::from_string(TWO_RELEASES);
    let releases = parser.parse_releases(10).unwrap();

    assert_eq!(releases.len(), 2);
    assert_eq!(releases[0].header, "0.48.1 release");
    assert_eq!(releases[1].header, "0.48 release");
    assert_eq!(
        releases[0].timestamp,
        Utc.with_ymd_and_hms(2010, 6, 7, 20, 0, 0).unwrap()
    );
    assert!(releases[0].timestamp > releases[1].timestamp);
}

#[test]
fn joins_continuation_lines_with_single_spaces() {
    let mut parser = ReleaseParser::from_string(TWO_RELEASES);
    let releases = parser.parse_releases(1).unwrap();

    let bugs = &releases[0].sections[0];
    assert_eq!(bugs.name, SectionName::BugsFixed);
    assert_eq!(
        bugs.entries[0],
        "mtn no longer crashes when given an empty database argument."
    );
    assert_eq!(
        bugs.entries[1],
        "netsync handshake timeouts are reported properly."
    );
}

#[test]
fn section_boundary_line_is_not_swallowed() {
    let mut parser = ReleaseParser::from_string(TWO_RELEASES);
    let releases = parser.parse_releases(10).unwrap();

    // The "Other" header ended the first section and started the second;
    // the next date line ended the release.
    let sections = &releases[0].sections;
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[1].name, SectionName::Other);
    assert_eq!(sections[1].entries, vec!["documentation typo fixes."]);
    assert_eq!(releases[1].sections[0].name, SectionName::NewFeatures);
}

#[test]
fn blank_line_inside_entry_becomes_paragraph_break() {
    let text = "\
2010-06-07

        0.48.1 release

        Changes

        - first paragraph of the entry.

          second paragraph of the same entry.

        - a separate entry.
";
    let mut parser = ReleaseParser::from_string(text);
    let releases = parser.parse_releases(1).unwrap();

    let entries = &releases[0].sections[0].entries;
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[0],
        "first paragraph of the entry.\nsecond paragraph of the same entry."
    );
    assert_eq!(entries[1], "a separate entry.");
}

#[test]
fn entries_never_contain_doubled_whitespace() {
    let mut parser = ReleaseParser::from_string(TWO_RELEASES);
    let releases = parser.parse_releases(10).unwrap();

    for release in &releases {
        for section in &release.sections {
            for entry in &section.entries {
                assert!(!entry.contains("  "), "doubled space in {entry:?}");
                assert!(!entry.ends_with(char::is_whitespace));
                assert!(!entry.starts_with(char::is_whitespace));
            }
        }
    }
}

#[test]
fn empty_section_is_tolerated() {
    let text = "\
2010-06-07

        0.48.1 release

        Changes

        Bugs fixed

        - one real fix.
";
    let mut parser = ReleaseParser::from_string(text);
    let releases = parser.parse_releases(1).unwrap();

    let sections = &releases[0].sections;
    assert_eq!(sections.len(), 2);
    assert_eq!(sections[0].name, SectionName::Changes);
    assert!(sections[0].entries.is_empty());
    assert_eq!(sections[1].entries, vec!["one real fix."]);
}

#[test]
fn max_caps_the_number_of_parsed_releases() {
    let mut parser = ReleaseParser::from_string(TWO_RELEASES);
    let releases = parser.parse_releases(1).unwrap();
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].header, "0.48.1 release");
}

#[test]
fn unparseable_date_is_an_error_not_a_default() {
    let mut parser = ReleaseParser::from_string("not a date at all\n\n        header\n");
    let err = parser.parse_releases(10).unwrap_err();
    assert!(matches!(err, ChangelogError::UnparseableDate(_)));
}

#[test]
fn accepted_date_shapes() {
    // Historical hand-edited shapes all resolve to the same instant.
    let expected = Utc.with_ymd_and_hms(2010, 6, 7, 20, 0, 0).unwrap();
    assert_eq!(
        parse_release_date("Mon Jun  7 20:00:00 UTC 2010").unwrap(),
        expected
    );
    assert_eq!(
        parse_release_date("Mon, 7 Jun 2010 20:00:00 +0000").unwrap(),
        expected
    );
    assert_eq!(
        parse_release_date("2010-06-07").unwrap(),
        Utc.with_ymd_and_hms(2010, 6, 7, 0, 0, 0).unwrap()
    );
    assert!(parse_release_date("June seventh").is_err());
}

#[test]
fn missing_file_is_a_fatal_open_error() {
    assert!(matches!(
        ReleaseParser::open("/nonexistent/NEWS"),
        Err(ChangelogError::Io(_))
    ));
}
