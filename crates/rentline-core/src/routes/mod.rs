//! Route classification shared by the route guard and the edge filter.
//!
//! Both layers consult the same `RouteTable`, so a path can never be
//! public to one and protected to the other. Anything the table does not
//! list as public is protected.

pub mod edge;
pub mod guard;
pub mod navigation;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

pub use edge::{EdgeDecision, EdgeFilter};
pub use guard::{GuardView, RouteGuard};
pub use navigation::{History, Navigator};

/// Where unauthenticated users are sent.
pub const DEFAULT_LANDING_ROUTE: &str = "/home";

/// Routes anyone may open.
const DEFAULT_PUBLIC_ROUTES: &[&str] = &[
    "/home",
    "/onboarding",
    "/login",
    "/signup",
    "/about",
    "/contact",
    "/privacy",
    "/terms",
    "/search",
    "/listing/*",
    "/auth/callback",
];

/// Static asset paths the edge filter never touches.
const DEFAULT_ASSET_PREFIXES: &[&str] = &["/_next", "/static", "/assets", "/favicon.ico", "/robots.txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Public,
    Protected,
}

/// One entry of the public-route list.
///
/// Written as a plain path for an exact match (`/home`) or with a trailing
/// `/*` for a prefix match (`/listing/*` covers `/listing` and everything
/// below it, but not `/listings`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RoutePattern {
    Exact(String),
    Prefix(String),
}

impl RoutePattern {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        if !raw.starts_with('/') {
            return Err(format!("route pattern must start with '/': {:?}", raw));
        }
        match raw.strip_suffix("/*") {
            Some(base) => Ok(RoutePattern::Prefix(normalize_path(base))),
            None => Ok(RoutePattern::Exact(normalize_path(raw))),
        }
    }

    /// `path` must already be normalized.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            RoutePattern::Exact(exact) => path == exact,
            RoutePattern::Prefix(base) if base == "/" => true,
            RoutePattern::Prefix(base) => {
                path == base
                    || path
                        .strip_prefix(base.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutePattern::Exact(path) => f.write_str(path),
            RoutePattern::Prefix(base) if base == "/" => f.write_str("/*"),
            RoutePattern::Prefix(base) => write!(f, "{}/*", base),
        }
    }
}

impl TryFrom<String> for RoutePattern {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<RoutePattern> for String {
    fn from(pattern: RoutePattern) -> Self {
        pattern.to_string()
    }
}

/// Strip query and fragment, collapse repeated and trailing slashes, and
/// resolve `.` and `..` segments (never above `/`).
pub fn normalize_path(raw: &str) -> String {
    let path = raw.trim();
    let path = path.split(['?', '#']).next().unwrap_or_default();

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        match dot_segment(segment) {
            Some(DotSegment::Current) => {}
            Some(DotSegment::Parent) => {
                segments.pop();
            }
            None => segments.push(segment),
        }
    }

    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in segments {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

enum DotSegment {
    Current,
    Parent,
}

// Percent-encoded dots count too; a browser resolves `%2e%2e` like `..`.
fn dot_segment(segment: &str) -> Option<DotSegment> {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    match decoded.as_str() {
        "." => Some(DotSegment::Current),
        ".." => Some(DotSegment::Parent),
        _ => None,
    }
}

/// The single source of truth for route classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    landing: String,
    public: Vec<RoutePattern>,
    assets: Vec<String>,
}

impl RouteTable {
    /// Build a table. The landing route is always public, otherwise a
    /// redirect to it would be redirected again.
    pub fn new(landing: &str, mut public: Vec<RoutePattern>, assets: Vec<String>) -> Self {
        let landing = normalize_path(landing);
        if !public.iter().any(|p| p.matches(&landing)) {
            warn!(landing = %landing, "Landing route was not public; adding it");
            public.push(RoutePattern::Exact(landing.clone()));
        }
        let assets = assets.iter().map(|a| normalize_path(a)).collect();
        Self {
            landing,
            public,
            assets,
        }
    }

    pub fn landing(&self) -> &str {
        &self.landing
    }

    pub fn public_routes(&self) -> &[RoutePattern] {
        &self.public
    }

    pub fn asset_prefixes(&self) -> &[String] {
        &self.assets
    }

    pub fn classify(&self, path: &str) -> Classification {
        let path = normalize_path(path);
        if self.public.iter().any(|p| p.matches(&path)) {
            Classification::Public
        } else {
            trace!(path = %path, "No public route matched; protected");
            Classification::Protected
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.classify(path) == Classification::Public
    }

    pub fn is_root(&self, path: &str) -> bool {
        normalize_path(path) == "/"
    }

    pub fn is_asset(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.assets.iter().any(|prefix| {
            path == *prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        let public = DEFAULT_PUBLIC_ROUTES
            .iter()
            .filter_map(|raw| RoutePattern::parse(raw).ok())
            .collect();
        let assets = DEFAULT_ASSET_PREFIXES.iter().map(|s| s.to_string()).collect();
        Self::new(DEFAULT_LANDING_ROUTE, public, assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/home/"), "/home");
        assert_eq!(normalize_path("//listing//42/"), "/listing/42");
        assert_eq!(normalize_path("/home?token=xyz"), "/home");
        assert_eq!(normalize_path("/wishlist#top"), "/wishlist");
        assert_eq!(normalize_path("wishlist"), "/wishlist");
        assert_eq!(normalize_path("/listing/../wishlist"), "/wishlist");
        assert_eq!(normalize_path("/static/../profile"), "/profile");
        assert_eq!(normalize_path("/./home/."), "/home");
        assert_eq!(normalize_path("/../../wishlist"), "/wishlist");
        assert_eq!(normalize_path("/listing/%2E%2e/chats"), "/chats");
        assert_eq!(normalize_path("/listing/..."), "/listing/...");
    }

    #[test]
    fn test_dot_segments_do_not_reach_public_routes() {
        let table = RouteTable::default();
        assert!(!table.is_public("/listing/../wishlist"));
        assert!(!table.is_public("/home/../profile"));
        assert!(!table.is_asset("/static/../profile"));
        assert!(table.is_public("/wishlist/../listing/4"));
    }

    #[test]
    fn test_pattern_parse_and_display() {
        assert_eq!(RoutePattern::parse("/home").unwrap(), RoutePattern::Exact("/home".into()));
        assert_eq!(
            RoutePattern::parse("/listing/*").unwrap(),
            RoutePattern::Prefix("/listing".into())
        );
        assert_eq!(RoutePattern::parse("/listing/*").unwrap().to_string(), "/listing/*");
        assert!(RoutePattern::parse("home").is_err());
    }

    #[test]
    fn test_prefix_respects_segment_boundary() {
        let pattern = RoutePattern::parse("/listing/*").unwrap();
        assert!(pattern.matches("/listing"));
        assert!(pattern.matches("/listing/42"));
        assert!(pattern.matches("/listing/42/photos"));
        assert!(!pattern.matches("/listings"));
        assert!(!pattern.matches("/listingfoo/1"));
    }

    #[test]
    fn test_default_classification() {
        let table = RouteTable::default();
        for public in ["/home", "/home/", "/listing/9", "/search?q=loft", "/about"] {
            assert_eq!(table.classify(public), Classification::Public, "{}", public);
        }
        for protected in ["/wishlist", "/profile", "/host/listings/new", "/chats", "/homeowner"] {
            assert_eq!(table.classify(protected), Classification::Protected, "{}", protected);
        }
    }

    #[test]
    fn test_unknown_paths_fail_closed() {
        let table = RouteTable::default();
        assert!(!table.is_public("/definitely-not-a-route"));
        assert!(!table.is_public("/"));
    }

    #[test]
    fn test_landing_is_forced_public() {
        let table = RouteTable::new("/welcome", vec![], vec![]);
        assert!(table.is_public("/welcome"));
        assert_eq!(table.landing(), "/welcome");
    }

    #[test]
    fn test_assets() {
        let table = RouteTable::default();
        assert!(table.is_asset("/_next/static/chunk.js"));
        assert!(table.is_asset("/favicon.ico"));
        assert!(!table.is_asset("/staticky"));
        assert!(!table.is_asset("/wishlist"));
    }

    #[test]
    fn test_pattern_serde_as_string() {
        let patterns: Vec<RoutePattern> =
            serde_json::from_str(r#"["/home", "/listing/*"]"#).unwrap();
        assert_eq!(patterns[1], RoutePattern::Prefix("/listing".into()));
        let json = serde_json::to_string(&patterns).unwrap();
        assert_eq!(json, r#"["/home","/listing/*"]"#);
        assert!(serde_json::from_str::<Vec<RoutePattern>>(r#"["nope"]"#).is_err());
    }
}
