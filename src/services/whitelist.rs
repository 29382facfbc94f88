//! Permanent whitelist matching and editing.
//!
//! The whitelist is free text: entries are separated by whitespace or
//! newlines. An entry wrapped in slashes (`/pattern/`) is a regular
//! expression, anything else is a plain substring match.

use regex::Regex;

fn entries(whitelist: &str) -> impl Iterator<Item = &str> {
    whitelist.split_whitespace().filter(|e| !e.is_empty())
}

/// Returns true if `entry` matches `url`. Invalid regular expressions never match.
pub fn entry_matches(entry: &str, url: &str) -> bool {
    if entry.is_empty() {
        return false;
    }
    if entry.len() >= 3 && entry.starts_with('/') && entry.ends_with('/') {
        return Regex::new(&entry[1..entry.len() - 1])
            .map(|re| re.is_match(url))
            .unwrap_or(false);
    }
    url.contains(entry)
}

pub fn is_whitelisted(url: &str, whitelist: &str) -> bool {
    entries(whitelist).any(|entry| entry_matches(entry, url))
}

/// Appends `entry` and returns the cleaned list (deduplicated, one per line).
pub fn add_entry(whitelist: &str, entry: &str) -> String {
    let mut items: Vec<&str> = Vec::new();
    for item in entries(whitelist).chain(std::iter::once(entry)) {
        if !item.is_empty() && !items.contains(&item) {
            items.push(item);
        }
    }
    items.join("\n")
}

/// Removes every entry that matches `url`.
pub fn remove_matching(whitelist: &str, url: &str) -> String {
    entries(whitelist)
        .filter(|entry| !entry_matches(entry, url))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strips the scheme, and either everything after the host or just the
/// query string and fragment.
pub fn root_url(url: &str, include_path: bool) -> String {
    let without_scheme = match url.find("//") {
        Some(idx) if idx > 0 => &url[idx + 2..],
        _ => url,
    };
    if include_path {
        let end = without_scheme
            .find(|c| c == '?' || c == '#')
            .unwrap_or(without_scheme.len());
        without_scheme[..end].to_string()
    } else {
        let end = without_scheme
            .find(|c| c == '/' || c == '?' || c == '#')
            .unwrap_or(without_scheme.len());
        without_scheme[..end].to_string()
    }
}
