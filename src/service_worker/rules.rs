//! Runtime caching rules baked into the service worker.
//!
//! | Matcher | Strategy | Cache | Statuses |
//! |---|---|---|---|
//! | `.js` `.json` `.css` | StaleWhileRevalidate | `code` | 0, 200 |
//! | `.jpg` `.png` `.jpeg` `.svg` `.mp3` | CacheFirst | `assets` | 200 |
//! | `.woff2` | StaleWhileRevalidate | `fonts` | 0, 200 |
//! | `""` `/` `/index` `/index.html` | NetworkFirst | runtime default | 0, 200 |
//!
//! Status `0` is an opaque cross-origin response; the image/audio rule
//! refuses to cache those. Matching looks at the URL pathname only, so query
//! strings and fragments never change which rule applies. The same table is
//! serialized into the worker script, and the runtime chunk applies it with
//! identical matching.

use serde::Serialize;
use std::fmt;
use url::Url;

/// How a matched request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Strategy {
    /// Serve from cache; fetch and store only on a miss.
    CacheFirst,
    /// Fetch; fall back to cache when the network fails.
    NetworkFirst,
    /// Serve from cache immediately and refresh the cache in the background.
    StaleWhileRevalidate,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::CacheFirst => "CacheFirst",
            Strategy::NetworkFirst => "NetworkFirst",
            Strategy::StaleWhileRevalidate => "StaleWhileRevalidate",
        };
        f.write_str(name)
    }
}

/// Which request URLs a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UrlMatcher {
    /// Pathname ends in `.` plus one of these (case-sensitive).
    Extensions(&'static [&'static str]),
    /// Pathname equals one of these exactly.
    Paths(&'static [&'static str]),
}

impl UrlMatcher {
    pub fn matches_path(&self, pathname: &str) -> bool {
        match self {
            UrlMatcher::Extensions(exts) => exts.iter().any(|ext| {
                pathname
                    .strip_suffix(ext)
                    .is_some_and(|stem| stem.ends_with('.'))
            }),
            UrlMatcher::Paths(paths) => paths.contains(&pathname),
        }
    }
}

impl fmt::Display for UrlMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlMatcher::Extensions(exts) => {
                let list: Vec<String> = exts.iter().map(|e| format!(".{e}")).collect();
                write!(f, "extension {}", list.join(" "))
            }
            UrlMatcher::Paths(paths) => {
                let list: Vec<String> = paths.iter().map(|p| format!("{p:?}")).collect();
                write!(f, "path {}", list.join(" "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachingRule {
    #[serde(rename = "match")]
    pub matcher: UrlMatcher,
    #[serde(rename = "handler")]
    pub strategy: Strategy,
    /// `None` uses the runtime's default cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_name: Option<&'static str>,
    /// Only responses with one of these statuses are stored.
    pub statuses: &'static [u16],
}

impl CachingRule {
    pub fn is_cacheable(&self, status: u16) -> bool {
        self.statuses.contains(&status)
    }
}

/// Name of the cache used by rules without their own `cache_name`.
pub const DEFAULT_RUNTIME_CACHE: &str = "runtime";

pub static CACHING_RULES: [CachingRule; 4] = [
    CachingRule {
        matcher: UrlMatcher::Extensions(&["js", "json", "css"]),
        strategy: Strategy::StaleWhileRevalidate,
        cache_name: Some("code"),
        statuses: &[0, 200],
    },
    CachingRule {
        matcher: UrlMatcher::Extensions(&["jpg", "png", "jpeg", "svg", "mp3"]),
        strategy: Strategy::CacheFirst,
        cache_name: Some("assets"),
        statuses: &[200],
    },
    CachingRule {
        matcher: UrlMatcher::Extensions(&["woff2"]),
        strategy: Strategy::StaleWhileRevalidate,
        cache_name: Some("fonts"),
        statuses: &[0, 200],
    },
    CachingRule {
        matcher: UrlMatcher::Paths(&["", "/", "/index", "/index.html"]),
        strategy: Strategy::NetworkFirst,
        cache_name: None,
        statuses: &[0, 200],
    },
];

/// Pathname of an absolute or site-relative URL.
///
/// Relative inputs resolve against the site root, so `styles.css` and
/// `https://example.com/styles.css?v=2` both give `/styles.css`. Input that
/// cannot be resolved at all yields `None`.
pub fn url_pathname(input: &str) -> Option<String> {
    let parsed = match Url::parse(input) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse("http://localhost/").ok()?.join(input).ok()?
        }
        Err(_) => return None,
    };
    Some(parsed.path().to_string())
}

/// The rule that applies to `url`, if any.
pub fn resolve_rule(url: &str) -> Option<&'static CachingRule> {
    let pathname = url_pathname(url)?;
    CACHING_RULES
        .iter()
        .find(|rule| rule.matcher.matches_path(&pathname))
}
