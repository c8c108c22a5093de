//! Stateless pre-render redirect check.
//!
//! Runs before any in-memory session exists. The only input besides the
//! path is whether the credential marker cookie is present; its value is
//! never validated here. This is a coarse first line of defense and does
//! not replace the route guard.

use std::sync::Arc;

use cookie::Cookie;
use tracing::debug;

use super::RouteTable;
use crate::auth::MARKER_COOKIE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeDecision {
    /// Let the request through to rendering.
    Continue,
    /// Answer with a redirect to `location`.
    Redirect { location: String },
}

#[derive(Debug, Clone)]
pub struct EdgeFilter {
    routes: Arc<RouteTable>,
}

impl EdgeFilter {
    pub fn new(routes: Arc<RouteTable>) -> Self {
        Self { routes }
    }

    pub fn evaluate(&self, path: &str, has_marker: bool) -> EdgeDecision {
        if self.routes.is_root(path) {
            return self.redirect(path, "root");
        }
        if self.routes.is_asset(path) || self.routes.is_public(path) {
            return EdgeDecision::Continue;
        }
        if has_marker {
            EdgeDecision::Continue
        } else {
            self.redirect(path, "no credential marker")
        }
    }

    /// Evaluate a request given its raw `Cookie` header, if any.
    pub fn evaluate_request(&self, path: &str, cookie_header: Option<&str>) -> EdgeDecision {
        let has_marker = cookie_header.is_some_and(has_marker_cookie);
        self.evaluate(path, has_marker)
    }

    fn redirect(&self, path: &str, reason: &str) -> EdgeDecision {
        debug!(path, reason, landing = %self.routes.landing(), "Edge redirect");
        EdgeDecision::Redirect {
            location: self.routes.landing().to_string(),
        }
    }
}

/// Whether a `Cookie` header carries a non-empty credential marker.
pub fn has_marker_cookie(header: &str) -> bool {
    Cookie::split_parse(header)
        .filter_map(Result::ok)
        .any(|c| c.name() == MARKER_COOKIE && !c.value().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> EdgeFilter {
        EdgeFilter::new(Arc::new(RouteTable::default()))
    }

    fn to_home() -> EdgeDecision {
        EdgeDecision::Redirect {
            location: "/home".to_string(),
        }
    }

    #[test]
    fn test_root_always_redirects() {
        let edge = filter();
        assert_eq!(edge.evaluate("/", false), to_home());
        assert_eq!(edge.evaluate("/", true), to_home());
        assert_eq!(edge.evaluate("/?ref=ad", true), to_home());
    }

    #[test]
    fn test_protected_without_marker_redirects() {
        let edge = filter();
        assert_eq!(edge.evaluate("/wishlist", false), to_home());
        assert_eq!(edge.evaluate("/host/listings/12/edit", false), to_home());
    }

    #[test]
    fn test_protected_with_marker_continues() {
        let edge = filter();
        assert_eq!(edge.evaluate("/wishlist", true), EdgeDecision::Continue);
    }

    #[test]
    fn test_public_and_assets_continue() {
        let edge = filter();
        assert_eq!(edge.evaluate("/home", false), EdgeDecision::Continue);
        assert_eq!(edge.evaluate("/listing/42", false), EdgeDecision::Continue);
        assert_eq!(edge.evaluate("/_next/static/app.js", false), EdgeDecision::Continue);
    }

    #[test]
    fn test_cookie_header_parsing() {
        assert!(has_marker_cookie("theme=dark; token=abc"));
        assert!(!has_marker_cookie("theme=dark"));
        assert!(!has_marker_cookie("token="));
        assert!(!has_marker_cookie(""));
        assert!(!has_marker_cookie("tokenx=abc"));
    }

    #[test]
    fn test_evaluate_request_with_headers() {
        let edge = filter();
        assert_eq!(
            edge.evaluate_request("/profile", Some("token=abc")),
            EdgeDecision::Continue
        );
        assert_eq!(edge.evaluate_request("/profile", Some("lang=en")), to_home());
        assert_eq!(edge.evaluate_request("/profile", None), to_home());
    }

    #[test]
    fn test_deep_link_cannot_bypass() {
        let edge = filter();
        for path in [
            "/wishlist/",
            "//wishlist",
            "/wishlist?x=1",
            "/wishlist#a",
            "/listings",
            "/listing/../wishlist",
            "/static/../profile",
            "/_next/%2e%2e/chats",
        ] {
            assert_eq!(edge.evaluate(path, false), to_home(), "{}", path);
        }
    }
}
