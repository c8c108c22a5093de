//! Per-navigation render gate for protected views.
//!
//! A guard only reads the session. When an unauthenticated user lands on
//! a protected route it records the intended path, raises the sign-in
//! prompt and redirects to the landing route, once per navigation.

use std::sync::Arc;

use tracing::{debug, info};

use super::{normalize_path, Classification, Navigator, RouteTable};
use crate::auth::{SessionHandle, SessionState};

/// What the view for a path should do right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardView {
    /// Render the requested content.
    Render,
    /// Show a neutral waiting indicator; the session is still loading.
    Waiting,
    /// The user was sent elsewhere.
    Redirect { to: String },
}

pub struct RouteGuard {
    routes: Arc<RouteTable>,
    session: SessionHandle,
    navigator: Arc<dyn Navigator>,
    // Path whose redirect side effects already ran for this navigation.
    redirected: Option<String>,
}

impl RouteGuard {
    pub fn new(routes: Arc<RouteTable>, session: SessionHandle, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            routes,
            session,
            navigator,
            redirected: None,
        }
    }

    /// Decide from the session as it is now.
    pub fn check(&mut self, path: &str) -> GuardView {
        let key = normalize_path(path);
        if self.redirected.as_deref().is_some_and(|p| p != key) {
            // A new navigation.
            self.redirected = None;
        }

        if self.routes.classify(path) == Classification::Public {
            return GuardView::Render;
        }

        match self.session.state() {
            SessionState::Authenticated(_) => {
                self.redirected = None;
                GuardView::Render
            }
            SessionState::Loading => GuardView::Waiting,
            SessionState::Unauthenticated => self.redirect(path, key),
        }
    }

    /// Wait for startup validation to finish, then decide.
    pub async fn resolve(&mut self, path: &str) -> GuardView {
        if self.routes.classify(path) == Classification::Protected && self.session.loading() {
            debug!(path, "Waiting for session before rendering");
            self.session.wait_until_loaded().await;
        }
        self.check(path)
    }

    // `key` is the normalized path identifying this navigation.
    fn redirect(&mut self, path: &str, key: String) -> GuardView {
        let landing = self.routes.landing().to_string();
        if self.redirected.as_deref() != Some(key.as_str()) {
            info!(path, landing = %landing, "Protected route requires sign-in");
            self.session.remember_return_path(path);
            self.session.request_sign_in();
            self.navigator.push(&landing);
            self.redirected = Some(key);
        }
        GuardView::Redirect { to: landing }
    }
}
