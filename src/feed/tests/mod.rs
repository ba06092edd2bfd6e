use super::*;
use crate::config::FeedConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RSS_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Releases</title>
    <link>https://example.com</link>
    <description>test</description>
    <item>
      <title>  Ep01  </title>
      <link>https://example.com/view/1</link>
      <author>uploader</author>
      <category>Anime</category>
      <description><![CDATA[First episode]]></description>
      <pubDate>Mon, 06 Jan 2025 10:00:00 +0000</pubDate>
      <enclosure url="magnet:?xt=urn:btih:AAA&amp;dn=Ep01" length="734003200" type="application/x-bittorrent"/>
    </item>
    <item>
      <title>Torrent file only</title>
      <enclosure url="https://example.com/file.torrent" length="100" type="application/x-bittorrent"/>
    </item>
    <item>
      <title>No enclosure</title>
      <link>https://example.com/view/3</link>
    </item>
    <item>
      <title>   </title>
      <enclosure url="magnet:?xt=urn:btih:BLANK" length="1" type="application/x-bittorrent"/>
    </item>
    <item>
      <title>Ep02</title>
      <pubDate>not a date</pubDate>
      <enclosure url="magnet:?xt=urn:btih:BBB" length="" type="application/x-bittorrent"/>
    </item>
  </channel>
</rss>"#;

const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom releases</title>
  <id>urn:feed</id>
  <updated>2025-01-06T10:00:00Z</updated>
  <entry>
    <title>Atom Ep01</title>
    <id>urn:entry:1</id>
    <updated>2025-01-06T10:00:00Z</updated>
    <published>2025-01-05T08:30:00+02:00</published>
    <author><name>atom-uploader</name></author>
    <category term="Drama"/>
    <summary>Summary text</summary>
    <link href="https://example.com/atom/1"/>
    <link rel="enclosure" href="magnet:?xt=urn:btih:CCC" length="2048"/>
  </entry>
  <entry>
    <title>Atom without magnet</title>
    <id>urn:entry:2</id>
    <updated>2025-01-06T10:00:00Z</updated>
    <link href="https://example.com/atom/2"/>
  </entry>
</feed>"#;

fn parser() -> FeedParser {
    FeedParser::new(&FeedConfig::default()).unwrap()
}

#[test]
fn rss_extracts_only_magnet_entries_with_titles() {
    let entries = parse_document(RSS_FEED).unwrap();

    let titles: Vec<&str> = entries.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Ep01", "Ep02"]);

    let first = &entries[0];
    assert_eq!(first.magnet_uri, "magnet:?xt=urn:btih:AAA&dn=Ep01");
    assert_eq!(first.link.as_deref(), Some("https://example.com/view/1"));
    assert_eq!(first.author.as_deref(), Some("uploader"));
    assert_eq!(first.category.as_deref(), Some("Anime"));
    assert_eq!(first.description.as_deref(), Some("First episode"));
    assert_eq!(first.size.as_deref(), Some("734003200"));
    assert_eq!(
        first.published_at.unwrap().to_rfc3339(),
        "2025-01-06T10:00:00+00:00"
    );
}

#[test]
fn unparseable_dates_and_empty_fields_are_omitted() {
    let entries = parse_document(RSS_FEED).unwrap();
    let second = &entries[1];

    assert!(second.published_at.is_none());
    assert!(second.size.is_none());
    assert!(second.link.is_none());
}

#[test]
fn atom_is_used_when_rss_fails() {
    let entries = parse_document(ATOM_FEED).unwrap();

    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.title, "Atom Ep01");
    assert_eq!(entry.magnet_uri, "magnet:?xt=urn:btih:CCC");
    assert_eq!(entry.link.as_deref(), Some("https://example.com/atom/1"));
    assert_eq!(entry.author.as_deref(), Some("atom-uploader"));
    assert_eq!(entry.category.as_deref(), Some("Drama"));
    assert_eq!(entry.description.as_deref(), Some("Summary text"));
    assert_eq!(entry.size.as_deref(), Some("2048"));
    assert_eq!(
        entry.published_at.unwrap().to_rfc3339(),
        "2025-01-05T06:30:00+00:00"
    );
}

#[test]
fn atom_entry_without_published_uses_updated() {
    let feed = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom releases</title>
  <id>urn:feed</id>
  <updated>2025-01-06T10:00:00Z</updated>
  <entry>
    <title>Atom Ep02</title>
    <id>urn:entry:3</id>
    <updated>2025-01-07T23:15:00-05:00</updated>
    <link rel="enclosure" href="magnet:?xt=urn:btih:DDD"/>
  </entry>
</feed>"#;

    let entries = parse_document(feed).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].published_at.unwrap().to_rfc3339(),
        "2025-01-08T04:15:00+00:00"
    );
}

#[test]
fn garbage_is_a_parse_error() {
    let err = parse_document("this is not xml").unwrap_err();
    assert!(matches!(err, FeedError::Parse { .. }));
}

#[test]
fn rfc3339_dates_are_accepted_in_rss() {
    assert!(parse_date("2025-01-06T10:00:00Z").is_some());
    assert!(parse_date("Mon, 06 Jan 2025 10:00:00 GMT").is_some());
    assert!(parse_date("yesterday").is_none());
}

#[tokio::test]
async fn fetch_parses_served_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RSS_FEED))
        .mount(&server)
        .await;

    let entries = parser()
        .fetch(&format!("{}/rss", server.uri()))
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn fetch_reports_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = parser()
        .fetch(&format!("{}/rss", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::HttpStatus { status: 503, .. }));
}

#[tokio::test]
async fn lenient_parse_returns_empty_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<rss><channel>"))
        .mount(&server)
        .await;

    let entries = parser()
        .parse_feed(&format!("{}/broken", server.uri()))
        .await;
    assert!(entries.is_empty());

    // Connection refused
    let entries = parser().parse_feed("http://127.0.0.1:9/rss").await;
    assert!(entries.is_empty());
}
