//! Watch-route recognition.

use regex::Regex;
use std::sync::LazyLock;

static WATCH_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/watch/(\d+)").unwrap());

/// What a location path means for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// A watch route carrying a video identifier.
    Watch(String),
    /// A watch route whose identifier is not in the path yet.
    WatchPending,
    /// Anything else.
    Other,
}

impl Route {
    pub fn is_watch(&self) -> bool {
        !matches!(self, Route::Other)
    }
}

/// Classify a location pathname.
pub fn parse_route(pathname: &str) -> Route {
    if pathname != "/watch" && !pathname.starts_with("/watch/") {
        return Route::Other;
    }
    match WATCH_ID_RE.captures(pathname) {
        Some(caps) => Route::Watch(caps[1].to_string()),
        None => Route::WatchPending,
    }
}
