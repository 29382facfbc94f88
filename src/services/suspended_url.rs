//! URL classification and the suspended-page URL format.
//!
//! A suspended tab shows `<page>#ttl=<title>&pos=<scroll>&uri=<original>`.
//! `uri` is always last and stored unencoded, so everything after `uri=` is
//! the original destination.

use crate::types::tab::{ScrollPosition, TabSnapshot};

/// Prefixes of internal pages that can never be suspended.
const SPECIAL_PREFIXES: &[&str] = &[
    "about:",
    "chrome:",
    "chrome-extension:",
    "chrome-search:",
    "edge:",
    "moz-extension:",
    "view-source:",
    "devtools:",
];

/// Store pages where scripts are not allowed to run.
const SPECIAL_SUBSTRINGS: &[&str] = &["chrome.google.com/webstore", "chromewebstore.google.com"];

/// How the router treats a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabClass {
    Suspended,
    Normal,
    Other,
}

/// Classifies URLs against the configured placeholder page.
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    suspended_page: String,
    page_name: String,
}

impl UrlClassifier {
    pub fn new(suspended_page: &str) -> Self {
        let page_name = suspended_page
            .rsplit('/')
            .next()
            .unwrap_or(suspended_page)
            .to_string();
        Self {
            suspended_page: suspended_page.to_string(),
            page_name,
        }
    }

    pub fn suspended_page(&self) -> &str {
        &self.suspended_page
    }

    /// Strict match: the URL is our own placeholder page.
    pub fn is_suspended_url(&self, url: &str) -> bool {
        url.starts_with(&self.suspended_page)
    }

    /// Loose match: any URL embedding the placeholder page name, which also
    /// covers placeholders restored from a previous install.
    pub fn is_suspended_url_loose(&self, url: &str) -> bool {
        matches!(url.find(&self.page_name), Some(pos) if pos > 0)
    }

    pub fn is_blocked_file(&self, url: &str, file_access_allowed: bool) -> bool {
        url.starts_with("file") && !file_access_allowed
    }

    pub fn is_special_url(&self, url: &str, file_access_allowed: bool) -> bool {
        if self.is_suspended_url(url) {
            return false;
        }
        SPECIAL_PREFIXES.iter().any(|p| url.starts_with(p))
            || SPECIAL_SUBSTRINGS.iter().any(|s| url.contains(s))
            || self.is_blocked_file(url, file_access_allowed)
    }

    pub fn is_suspended_tab(&self, tab: &TabSnapshot) -> bool {
        self.is_suspended_url(&tab.url)
    }

    pub fn is_normal_tab(&self, tab: &TabSnapshot, file_access_allowed: bool) -> bool {
        !self.is_special_url(&tab.url, file_access_allowed) && !self.is_suspended_url_loose(&tab.url)
    }

    pub fn classify(&self, tab: &TabSnapshot, file_access_allowed: bool) -> TabClass {
        if self.is_suspended_url_loose(&tab.url) {
            TabClass::Suspended
        } else if self.is_normal_tab(tab, file_access_allowed) {
            TabClass::Normal
        } else {
            TabClass::Other
        }
    }

    /// Builds the placeholder URL for `original`.
    pub fn encode(&self, original: &str, title: &str, scroll: Option<ScrollPosition>) -> String {
        let mut url = format!("{}#ttl={}", self.suspended_page, urlencoding::encode(title));
        if let Some(pos) = scroll {
            url.push_str(&format!("&pos={}", pos.y));
        }
        url.push_str("&uri=");
        url.push_str(original);
        url
    }
}

/// Extracts a value from the hash fragment of a placeholder URL.
fn hash_variable(url: &str, key: &str) -> Option<String> {
    let (_, hash) = url.split_once('#')?;
    let hash = hash.trim_start_matches('#');
    if hash.is_empty() {
        return None;
    }
    let (head, uri) = match hash.find("uri=") {
        Some(idx) => (&hash[..idx], Some(&hash[idx + 4..])),
        None => (hash, None),
    };
    if key == "uri" {
        return uri.filter(|u| !u.is_empty()).map(str::to_string);
    }
    head.split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, v)| *k == key && !v.is_empty())
        .map(|(_, v)| v.to_string())
}

/// The real destination of a suspended tab.
pub fn original_url(suspended_url: &str) -> Option<String> {
    hash_variable(suspended_url, "uri")
}

pub fn suspended_title(suspended_url: &str) -> Option<String> {
    let raw = hash_variable(suspended_url, "ttl")?;
    Some(
        urlencoding::decode(&raw)
            .map(|s| s.into_owned())
            .unwrap_or(raw),
    )
}

pub fn suspended_scroll_position(suspended_url: &str) -> Option<ScrollPosition> {
    hash_variable(suspended_url, "pos")?
        .parse::<f64>()
        .ok()
        .map(|y| ScrollPosition { y })
}

/// Escapes raw markup so a page title renders as text.
pub fn html_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Favicon service URL used when nothing is cached for `url`.
pub fn generated_favicon_url(url: &str) -> String {
    format!("chrome://favicon/size/16@2x/{}", url)
}
