//! Feed retrieval and normalization.
//!
//! Fetches an RSS 2.0 or Atom document and turns it into [`CandidateEntry`]
//! values. Only entries carrying a `magnet:` enclosure (RSS) or link (Atom) and
//! a non-empty title are candidates; everything else in the feed is ignored.

use crate::config::FeedConfig;
use crate::error::{Error, FeedError, Result};
use crate::types::CandidateEntry;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

const MAGNET_SCHEME: &str = "magnet:";

/// Fetches and parses RSS/Atom feeds into magnet candidates
#[derive(Clone)]
pub struct FeedParser {
    http_client: reqwest::Client,
}

impl FeedParser {
    /// Create a feed parser with its own HTTP client
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }

    /// Fetch and parse a feed, reporting why it failed
    ///
    /// The reconciler uses this form so a failed fetch is recorded as a failed
    /// refresh rather than an empty one.
    pub async fn fetch(&self, url: &str) -> std::result::Result<Vec<CandidateEntry>, FeedError> {
        debug!(url, "fetching feed");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content = response.text().await.map_err(|e| FeedError::Fetch {
            url: url.to_string(),
            reason: format!("failed to read body: {}", e),
        })?;

        let entries = parse_document(&content)?;
        debug!(url, entries = entries.len(), "parsed feed");
        Ok(entries)
    }

    /// Fetch and parse a feed, returning no entries on any failure
    ///
    /// Failures are logged. Feed unavailability never propagates from here.
    pub async fn parse_feed(&self, url: &str) -> Vec<CandidateEntry> {
        match self.fetch(url).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(url, error = %e, "feed unavailable");
                Vec::new()
            }
        }
    }
}

/// Parse feed content, trying RSS first and falling back to Atom
pub fn parse_document(content: &str) -> std::result::Result<Vec<CandidateEntry>, FeedError> {
    match parse_as_rss(content) {
        Ok(entries) => Ok(entries),
        Err(rss_err) => {
            debug!("Failed to parse as RSS: {}, trying Atom", rss_err);
            parse_as_atom(content).map_err(|atom_err| FeedError::Parse {
                rss: rss_err,
                atom: atom_err,
            })
        }
    }
}

fn parse_as_rss(content: &str) -> std::result::Result<Vec<CandidateEntry>, String> {
    let channel = content
        .parse::<rss::Channel>()
        .map_err(|e| e.to_string())?;

    let entries = channel
        .items()
        .iter()
        .filter_map(|item| {
            let enclosure = item.enclosure()?;
            let magnet_uri = enclosure.url().trim();
            let title = item.title().map(str::trim).unwrap_or_default();
            if !magnet_uri.starts_with(MAGNET_SCHEME) || title.is_empty() {
                return None;
            }

            Some(CandidateEntry {
                title: title.to_string(),
                magnet_uri: magnet_uri.to_string(),
                link: non_empty(item.link()),
                author: non_empty(item.author()),
                category: non_empty(item.categories().first().map(|c| c.name())),
                description: non_empty(item.description()),
                size: non_empty(Some(enclosure.length())),
                published_at: item.pub_date().and_then(parse_date),
            })
        })
        .collect();

    Ok(entries)
}

fn parse_as_atom(content: &str) -> std::result::Result<Vec<CandidateEntry>, String> {
    let feed = atom_syndication::Feed::read_from(content.as_bytes()).map_err(|e| e.to_string())?;

    let entries = feed
        .entries()
        .iter()
        .filter_map(|entry| {
            let magnet = entry
                .links()
                .iter()
                .find(|link| link.href().trim().starts_with(MAGNET_SCHEME))?;
            let title = entry.title().as_str().trim();
            if title.is_empty() {
                return None;
            }

            // Prefer published, fall back to updated
            let published_at = entry
                .published()
                .unwrap_or(entry.updated())
                .with_timezone(&Utc);

            let link = entry
                .links()
                .iter()
                .find(|link| !link.href().trim().starts_with(MAGNET_SCHEME))
                .map(|link| link.href());

            let description = entry.summary().map(|s| s.as_str()).or_else(|| {
                entry.content().and_then(|c| c.value())
            });

            Some(CandidateEntry {
                title: title.to_string(),
                magnet_uri: magnet.href().trim().to_string(),
                link: non_empty(link),
                author: non_empty(entry.authors().first().map(|p| p.name())),
                category: non_empty(entry.categories().first().map(|c| c.term())),
                description: non_empty(description),
                size: non_empty(magnet.length()),
                published_at: Some(published_at),
            })
        })
        .collect();

    Ok(entries)
}

/// RFC 2822 (RSS) with an RFC 3339 fallback; unparseable dates are dropped
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| debug!(date = raw, "ignoring unparseable feed date"))
        .ok()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
