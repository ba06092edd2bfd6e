//! Filtering parsed feed entries down to ones not yet stored

use crate::types::CandidateEntry;
use std::collections::HashSet;

/// Entries whose magnet URI is neither in `existing` nor repeated earlier in `entries`
///
/// Fields are normalized first: strings trimmed, empty optionals dropped.
/// Entries that end up without a title or a magnet URI are discarded. Feed
/// order is preserved.
pub fn new_entries(entries: Vec<CandidateEntry>, existing: &HashSet<String>) -> Vec<CandidateEntry> {
    let mut seen = HashSet::new();

    entries
        .into_iter()
        .filter_map(normalize)
        .filter(|entry| !existing.contains(&entry.magnet_uri))
        .filter(|entry| seen.insert(entry.magnet_uri.clone()))
        .collect()
}

fn normalize(entry: CandidateEntry) -> Option<CandidateEntry> {
    let title = entry.title.trim();
    let magnet_uri = entry.magnet_uri.trim();
    if title.is_empty() || magnet_uri.is_empty() {
        return None;
    }

    Some(CandidateEntry {
        title: title.to_string(),
        magnet_uri: magnet_uri.to_string(),
        link: clean(entry.link),
        author: clean(entry.author),
        category: clean(entry.category),
        description: clean(entry.description),
        size: clean(entry.size),
        published_at: entry.published_at,
    })
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
