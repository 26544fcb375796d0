//! RSS 2.0 and Atom parsing.
//!
//! Feeds in the wild are loosely structured: double-escaped HTML in
//! descriptions, CDATA everywhere, bare `&` in links, unknown entities,
//! truncated documents. The parser therefore cuts the document into
//! `<item>`/`<entry>` blocks first and reads each block on its own, so a
//! broken block only costs that one entry.
//!
//! Within a block a tolerant [`quick_xml::Reader`] slices out the *raw* inner
//! text of each field. If the block's markup is too broken for the reader
//! (a bare `<` in a description, say), the fields are pulled with patterns
//! instead. Either way the raw text is then cleaned:
//!
//! 1. unwrap `<![CDATA[...]]>` sections
//! 2. decode XML entities (falling back to the five predefined ones)
//! 3. decode HTML entities and strip markup (via [`scraper`])
//! 4. collapse whitespace
//!
//! RSS `<item>`s are tried first; if there are none, Atom `<entry>`s. Blocks
//! left unclosed by a truncated document are ignored. Entries without a
//! title or link are dropped here; entries whose date does not parse are kept
//! with `published_at: None` and dropped by the pipeline.

use crate::models::RawFeedEntry;
use crate::utils::collapse_whitespace;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use scraper::Html;
use tracing::{debug, instrument};

static CDATA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").unwrap());
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static RSS_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<item\b[^>]*>(.*?)</item\s*>").unwrap());
static ATOM_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<entry\b[^>]*>(.*?)</entry\s*>").unwrap());
static LINK_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<link\b([^>]*)>").unwrap());
static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)\b(href|rel)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());

/// Timestamp layouts with an offset, tried after RFC 2822 and RFC 3339.
const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M%z"];
/// Timestamp layouts without an offset, interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

const RSS_SLOTS: &[(&str, Slot)] = &[
    ("title", Slot::Title),
    ("link", Slot::Link),
    ("description", Slot::Description),
    ("pubDate", Slot::PubDate),
    ("dc:date", Slot::DcDate),
];

const ATOM_SLOTS: &[(&str, Slot)] = &[
    ("title", Slot::Title),
    ("summary", Slot::Summary),
    ("content", Slot::Content),
    ("updated", Slot::Updated),
    ("published", Slot::Published),
    ("dc:date", Slot::DcDate),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Rss,
    Atom,
}

impl Flavor {
    fn blocks(self) -> &'static Regex {
        match self {
            Flavor::Rss => &RSS_ITEM,
            Flavor::Atom => &ATOM_ENTRY,
        }
    }

    fn slots(self) -> &'static [(&'static str, Slot)] {
        match self {
            Flavor::Rss => RSS_SLOTS,
            Flavor::Atom => ATOM_SLOTS,
        }
    }

    fn slot(self, tag: &[u8]) -> Option<Slot> {
        self.slots()
            .iter()
            .find(|(name, _)| tag.eq_ignore_ascii_case(name.as_bytes()))
            .map(|(_, slot)| *slot)
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Title,
    Link,
    Description,
    PubDate,
    DcDate,
    Summary,
    Content,
    Updated,
    Published,
}

#[derive(Debug)]
struct AtomLink {
    rel: Option<String>,
    href: String,
}

impl AtomLink {
    fn new(rel: Option<String>, href: Option<String>) -> Option<Self> {
        href.filter(|h| !h.is_empty()).map(|href| Self { rel, href })
    }
}

/// Raw (still escaped) field text collected for one item/entry.
/// The first occurrence of each field wins.
#[derive(Debug, Default)]
struct Fields {
    title: Option<String>,
    link: Option<String>,
    description: Option<String>,
    pub_date: Option<String>,
    dc_date: Option<String>,
    summary: Option<String>,
    content: Option<String>,
    updated: Option<String>,
    published: Option<String>,
    atom_links: Vec<AtomLink>,
}

impl Fields {
    fn set(&mut self, slot: Slot, raw: String) {
        let target = match slot {
            Slot::Title => &mut self.title,
            Slot::Link => &mut self.link,
            Slot::Description => &mut self.description,
            Slot::PubDate => &mut self.pub_date,
            Slot::DcDate => &mut self.dc_date,
            Slot::Summary => &mut self.summary,
            Slot::Content => &mut self.content,
            Slot::Updated => &mut self.updated,
            Slot::Published => &mut self.published,
        };
        if target.is_none() {
            *target = Some(raw);
        }
    }

    fn into_entry(self, flavor: Flavor) -> Option<RawFeedEntry> {
        let title = self.title.as_deref().map(decode_markup).unwrap_or_default();
        let (url, summary, date) = match flavor {
            Flavor::Rss => (
                self.link.as_deref().map(decode_plain).unwrap_or_default(),
                self.description.as_deref().map(decode_markup).unwrap_or_default(),
                first_non_empty(&[&self.pub_date, &self.dc_date]),
            ),
            Flavor::Atom => (
                preferred_link(&self.atom_links),
                first_non_empty_markup(&[&self.summary, &self.content]),
                first_non_empty(&[&self.updated, &self.published, &self.dc_date]),
            ),
        };

        if title.is_empty() || url.is_empty() {
            return None;
        }

        Some(RawFeedEntry {
            title,
            url,
            summary,
            published_at: parse_date(&date),
        })
    }
}

fn first_non_empty(candidates: &[&Option<String>]) -> String {
    candidates
        .iter()
        .filter_map(|raw| raw.as_deref().map(decode_plain))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

fn first_non_empty_markup(candidates: &[&Option<String>]) -> String {
    candidates
        .iter()
        .filter_map(|raw| raw.as_deref().map(decode_markup))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// The `alternate` (or rel-less) link if there is one, else the first link.
fn preferred_link(links: &[AtomLink]) -> String {
    links
        .iter()
        .find(|l| l.rel.as_deref().is_none_or(|rel| rel.eq_ignore_ascii_case("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.clone())
        .unwrap_or_default()
}

fn atom_link(start: &BytesStart<'_>) -> Option<AtomLink> {
    let mut rel = None;
    let mut href = None;
    for attr in start.attributes().flatten() {
        let value = decode_plain(&String::from_utf8_lossy(&attr.value));
        match attr.key.as_ref() {
            b"href" => href = Some(value),
            b"rel" => rel = Some(value),
            _ => {}
        }
    }
    AtomLink::new(rel, href)
}

/// Parse a feed document into entries. RSS first, Atom if RSS yields nothing.
#[instrument(level = "debug", skip_all, fields(bytes = xml.len()))]
pub fn parse_feed(xml: &str) -> Vec<RawFeedEntry> {
    let items = parse_blocks(xml, Flavor::Rss);
    if !items.is_empty() {
        debug!(count = items.len(), "Parsed RSS items");
        return items;
    }
    let entries = parse_blocks(xml, Flavor::Atom);
    debug!(count = entries.len(), "Parsed Atom entries");
    entries
}

fn parse_blocks(xml: &str, flavor: Flavor) -> Vec<RawFeedEntry> {
    flavor
        .blocks()
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .filter_map(|inner| parse_block(inner.as_str(), flavor))
        .collect()
}

fn parse_block(inner: &str, flavor: Flavor) -> Option<RawFeedEntry> {
    let fields = match read_fields(inner, flavor) {
        Ok(fields) => fields,
        Err(e) => {
            debug!(?flavor, error = %e, "Malformed entry markup; extracting fields by pattern");
            scan_fields(inner, flavor)
        }
    };
    fields.into_entry(flavor)
}

/// Walk one block with the XML reader.
fn read_fields(inner: &str, flavor: Flavor) -> Result<Fields, quick_xml::Error> {
    let mut reader = Reader::from_str(inner);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;
    config.allow_dangling_amp = true;

    let mut fields = Fields::default();
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let name = start.name();
                let tag = name.as_ref();
                if flavor == Flavor::Atom && tag.eq_ignore_ascii_case(b"link") {
                    fields.atom_links.extend(atom_link(&start));
                    continue;
                }
                if let Some(slot) = flavor.slot(tag) {
                    let span = reader.read_to_end(name)?;
                    let raw = inner.get(span.start as usize..span.end as usize).unwrap_or_default();
                    fields.set(slot, raw.to_string());
                }
            }
            Event::Empty(start) => {
                if flavor == Flavor::Atom && start.name().as_ref().eq_ignore_ascii_case(b"link") {
                    fields.atom_links.extend(atom_link(&start));
                }
            }
            Event::Eof => return Ok(fields),
            _ => {}
        }
    }
}

/// Pull fields out of one block with patterns, for markup the reader rejects.
fn scan_fields(inner: &str, flavor: Flavor) -> Fields {
    let mut fields = Fields::default();
    for (name, slot) in flavor.slots() {
        let pattern = format!(r"(?is)<{0}\b[^>]*>(.*?)</{0}\s*>", regex::escape(name));
        let Ok(field) = Regex::new(&pattern) else {
            continue;
        };
        if let Some(raw) = field.captures(inner).and_then(|caps| caps.get(1)) {
            fields.set(*slot, raw.as_str().to_string());
        }
    }

    if flavor == Flavor::Atom {
        for tag in LINK_TAG.captures_iter(inner).filter_map(|caps| caps.get(1)) {
            let mut rel = None;
            let mut href = None;
            for attr in ATTRIBUTE.captures_iter(tag.as_str()) {
                let value = attr.get(2).or_else(|| attr.get(3)).map(|v| decode_plain(v.as_str()));
                match attr.get(1).map(|k| k.as_str().to_ascii_lowercase()).as_deref() {
                    Some("href") => href = value,
                    Some("rel") => rel = value,
                    _ => {}
                }
            }
            fields.atom_links.extend(AtomLink::new(rel, href));
        }
    }
    fields
}

/// Clean a text field that may carry markup: CDATA, XML and HTML entities, tags.
fn decode_markup(raw: &str) -> String {
    let unwrapped = CDATA.replace_all(raw, "$1");
    let unescaped = unescape_xml(&unwrapped);
    let fragment = Html::parse_fragment(&unescaped);
    collapse_whitespace(&fragment.root_element().text().join(" "))
}

/// Clean a link or date. HTML entity decoding is skipped on purpose: legacy
/// entities such as `&reg` would otherwise eat query parameters.
fn decode_plain(raw: &str) -> String {
    let unwrapped = CDATA.replace_all(raw, "$1");
    let unescaped = unescape_xml(&unwrapped);
    collapse_whitespace(&TAG.replace_all(&unescaped, " "))
}

fn unescape_xml(text: &str) -> String {
    match unescape(text) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => text
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
    }
}

/// RFC 2822 as feeds actually write it: a spelled-out weekday is dropped
/// (the weekday is optional in the grammar) and a `UTC` zone becomes `+0000`.
fn loosen_rfc2822(value: &str) -> String {
    let text = match value.split_once(',') {
        Some((day, rest)) if day.trim().chars().all(|c| c.is_ascii_alphabetic()) => rest.trim_start(),
        _ => value,
    };
    match text.strip_suffix(" UTC") {
        Some(head) => format!("{head} +0000"),
        None => text.to_string(),
    }
}

/// Parse a feed timestamp. Returns `None` for anything unrecognised.
///
/// Accepts RFC 2822 (RSS `pubDate`, including full weekday names and a `UTC`
/// zone), RFC 3339, ISO-8601 with a compact `+hhmm` offset or without seconds,
/// ISO-8601 without an offset, `YYYY-MM-DD HH:MM:SS`, and bare dates.
/// Offset-less values are taken as UTC.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(&loosen_rfc2822(value)) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    let zulu = match value.strip_suffix(['Z', 'z']) {
        Some(head) => format!("{head}+0000"),
        None => value.to_string(),
    };
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&zulu, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example Feed</title>
    <link>https://example.com/</link>
    <item>
      <title><![CDATA[Rust &amp; <b>WebAssembly</b>]]></title>
      <link>https://example.com/posts/1?utm_source=rss&amp;id=1</link>
      <description>&lt;p&gt;Hello&amp;nbsp;world &lt;a href="x"&gt;link&lt;/a&gt;&lt;/p&gt;</description>
      <pubDate>Tue, 06 May 2025 14:30:00 GMT</pubDate>
    </item>
    <item>
      <title>Second   post</title>
      <link>https://example.com/posts/2</link>
      <dc:date>2025-05-06T10:00:00Z</dc:date>
    </item>
    <item>
      <title>Undated</title>
      <link>https://example.com/posts/3</link>
      <pubDate>not-a-date</pubDate>
    </item>
    <item>
      <title>No link here</title>
      <pubDate>Tue, 06 May 2025 14:30:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <link href="https://blog.example/"/>
  <entry>
    <title type="html">Shipping &lt;em&gt;fast&lt;/em&gt;</title>
    <link rel="self" href="https://blog.example/feed/1"/>
    <link rel="alternate" type="text/html" href="https://blog.example/posts/1/"/>
    <updated>2025-05-06T09:15:00+09:00</updated>
    <content type="html">&lt;p&gt;Body text&lt;/p&gt;</content>
  </entry>
  <entry>
    <title>Only published</title>
    <link href="https://blog.example/posts/2"></link>
    <published>2025-05-05T00:00:00Z</published>
    <summary>Short summary</summary>
    <content>Longer content</content>
  </entry>
</feed>"#;

    #[test]
    fn test_parses_rss_items() {
        let entries = parse_feed(RSS);
        assert_eq!(entries.len(), 3, "entry without a link is dropped");

        let first = &entries[0];
        assert_eq!(first.title, "Rust & WebAssembly");
        assert_eq!(first.url, "https://example.com/posts/1?utm_source=rss&id=1");
        assert_eq!(first.summary, "Hello world link");
        assert_eq!(
            first.published_at,
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 14, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_rss_falls_back_to_dc_date_and_collapses_whitespace() {
        let entries = parse_feed(RSS);
        assert_eq!(entries[1].title, "Second post");
        assert_eq!(entries[1].summary, "");
        assert_eq!(
            entries[1].published_at,
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_unparseable_date_is_none() {
        let entries = parse_feed(RSS);
        assert_eq!(entries[2].title, "Undated");
        assert_eq!(entries[2].published_at, None);
    }

    #[test]
    fn test_parses_atom_entries() {
        let entries = parse_feed(ATOM);
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].title, "Shipping fast");
        assert_eq!(entries[0].url, "https://blog.example/posts/1/");
        assert_eq!(entries[0].summary, "Body text");
        assert_eq!(
            entries[0].published_at,
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 0, 15, 0).unwrap())
        );

        assert_eq!(entries[1].url, "https://blog.example/posts/2");
        assert_eq!(entries[1].summary, "Short summary");
        assert_eq!(
            entries[1].published_at,
            Some(Utc.with_ymd_and_hms(2025, 5, 5, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_truncated_feed_keeps_completed_items() {
        let xml = r#"<rss><channel>
            <item><title>Complete</title><link>https://a.example/1</link>
            <pubDate>Tue, 06 May 2025 14:30:00 GMT</pubDate></item>
            <item><title>Cut off"#;
        let entries = parse_feed(xml);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Complete");
    }

    #[test]
    fn test_garbage_input_yields_nothing() {
        assert!(parse_feed("").is_empty());
        assert!(parse_feed("<html><body>Not a feed</body></html>").is_empty());
        assert!(parse_feed("{\"json\": true}").is_empty());
    }

    #[test]
    fn test_unknown_entities_do_not_abort() {
        let xml = r#"<rss><channel><item>
            <title>Caf&eacute; &mdash; news</title>
            <link>https://a.example/cafe</link>
            <description>AT&amp;T &hellip;</description>
            </item></channel></rss>"#;
        let entries = parse_feed(xml);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Café — news");
        assert_eq!(entries[0].summary, "AT&T …");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 5, 6, 5, 30, 0).unwrap();
        assert_eq!(parse_date("Tue, 06 May 2025 14:30:00 +0900"), Some(expected));
        assert_eq!(parse_date("2025-05-06T05:30:00Z"), Some(expected));
        assert_eq!(parse_date("2025-05-06T05:30:00.000+00:00"), Some(expected));
        assert_eq!(parse_date("2025-05-06T05:30:00"), Some(expected));
        assert_eq!(parse_date("2025-05-06 05:30:00"), Some(expected));
        assert_eq!(
            parse_date("2025-05-06"),
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date("   "), None);
    }

    #[test]
    fn test_parse_date_loose_forms() {
        let expected = Utc.with_ymd_and_hms(2025, 5, 6, 14, 30, 0).unwrap();
        assert_eq!(parse_date("Tue, 06 May 2025 14:30:00 UTC"), Some(expected));
        assert_eq!(parse_date("Tuesday, 06 May 2025 14:30:00 GMT"), Some(expected));
        assert_eq!(parse_date("06 May 2025 14:30:00 GMT"), Some(expected));
        assert_eq!(parse_date("2025-05-06T23:30:00+0900"), Some(expected));
        assert_eq!(parse_date("2025-05-06T14:30Z"), Some(expected));
        assert_eq!(parse_date("2025-05-06T16:30+0200"), Some(expected));
        assert_eq!(parse_date("Someday, 06 May 2025"), None);
    }

    #[test]
    fn test_bare_ampersands_keep_every_item() {
        let xml = r#"<rss><channel>
            <item><title>Good</title><link>https://a.example/1</link></item>
            <item><title>AT&T news</title><link>https://a.example/2?a=1&b=2</link>
              <description>Tom & Jerry</description></item>
            <item><title>Good again</title><link>https://a.example/3</link></item>
            </channel></rss>"#;
        let entries = parse_feed(xml);
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Good", "AT&T news", "Good again"]);
        assert_eq!(entries[1].url, "https://a.example/2?a=1&b=2");
        assert_eq!(entries[1].summary, "Tom & Jerry");
    }

    #[test]
    fn test_broken_markup_only_affects_its_own_item() {
        let xml = r#"<rss><channel>
            <item><title>Compare</title>
              <description>if a < b then</description>
              <link>https://a.example/cmp</link>
              <pubDate>Tue, 06 May 2025 14:30:00 GMT</pubDate></item>
            <item><title>After</title><link>https://a.example/after</link></item>
            </channel></rss>"#;
        let entries = parse_feed(xml);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "Compare");
        assert_eq!(entries[0].url, "https://a.example/cmp");
        assert_eq!(
            entries[0].published_at,
            Some(Utc.with_ymd_and_hms(2025, 5, 6, 14, 30, 0).unwrap())
        );
        assert_eq!(entries[1].title, "After");
    }

    #[test]
    fn test_broken_atom_entry_still_prefers_alternate_link() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <entry>
              <title>Edge cases</title>
              <link rel='self' href='https://blog.example/feed/9'/>
              <link rel="alternate" href="https://blog.example/posts/9"/>
              <summary>x < y</summary>
              <updated>2025-05-06T14:30:00Z</updated>
            </entry>
            </feed>"#;
        let entries = parse_feed(xml);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "https://blog.example/posts/9");
        assert!(entries[0].published_at.is_some());
    }
}
