//! Wiring for the session core.
//!
//! `AuthContext` owns one instance of every component and is what a front
//! end passes down to its views. Guards are created per view from it.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::auth::{AuthEvents, CredentialStore, LoginCallback, SessionHandle, SessionManager, MARKER_COOKIE};
use crate::config::{Config, StorageBackend};
use crate::routes::{EdgeFilter, Navigator, RouteGuard, RouteTable};
use crate::storage::{FileStorage, KeyringStorage, Storage};

/// Client state file (file-backed token, return path)
const STORAGE_FILE: &str = "storage.json";

/// Cookie jar consulted by the edge filter
const COOKIE_FILE: &str = "cookies.json";

pub struct AuthContext {
    pub config: Config,
    pub routes: Arc<RouteTable>,
    pub api: ApiClient,
    pub session: Arc<SessionManager>,
    pub callback: LoginCallback,
    pub edge: EdgeFilter,
    cookies: Arc<dyn Storage>,
    navigator: Arc<dyn Navigator>,
}

impl AuthContext {
    /// Build the context with the storage backends `config` asks for.
    pub fn open(config: Config, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let data_dir = config.data_dir()?;
        let prefs: Arc<dyn Storage> = Arc::new(FileStorage::in_dir(&data_dir, STORAGE_FILE));
        let durable: Arc<dyn Storage> = match config.storage {
            StorageBackend::File => Arc::clone(&prefs),
            StorageBackend::Keyring => Arc::new(KeyringStorage::new()),
        };
        let cookies: Arc<dyn Storage> = Arc::new(FileStorage::in_dir(&data_dir, COOKIE_FILE));
        debug!(data_dir = %data_dir.display(), storage = ?config.storage, "Opening auth context");

        Self::with_storage(config, durable, prefs, cookies, navigator)
    }

    /// Build the context on explicit storage.
    pub fn with_storage(
        config: Config,
        durable: Arc<dyn Storage>,
        prefs: Arc<dyn Storage>,
        cookies: Arc<dyn Storage>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let routes = Arc::new(config.route_table());
        let credentials = Arc::new(CredentialStore::open(durable, Arc::clone(&cookies)));
        let api = ApiClient::with_timeout(
            &config.api_base_url,
            credentials,
            AuthEvents::new(),
            config.request_timeout(),
        )?;
        let session = Arc::new(SessionManager::new(
            api.clone(),
            Arc::clone(&navigator),
            prefs,
            routes.landing(),
        ));
        let callback = LoginCallback::new(Arc::clone(&session), Arc::clone(&navigator));
        let edge = EdgeFilter::new(Arc::clone(&routes));

        Ok(Self {
            config,
            routes,
            api,
            session,
            callback,
            edge,
            cookies,
            navigator,
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.session.handle()
    }

    /// A guard for one rendered view.
    pub fn guard(&self) -> RouteGuard {
        RouteGuard::new(
            Arc::clone(&self.routes),
            self.session.handle(),
            Arc::clone(&self.navigator),
        )
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// The `Cookie` header a request from this client would carry.
    pub fn cookie_header(&self) -> Option<String> {
        match self.cookies.get(MARKER_COOKIE) {
            Ok(Some(value)) => Some(format!("{}={}", MARKER_COOKIE, value)),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read cookie jar");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{SessionState, TOKEN_KEY};
    use crate::models::User;
    use crate::routes::{EdgeDecision, GuardView, History};
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context(server_uri: &str, durable: Arc<MemoryStorage>) -> (AuthContext, Arc<History>) {
        let config = Config {
            api_base_url: server_uri.to_string(),
            ..Config::default()
        };
        let history = Arc::new(History::new("/"));
        let ctx = AuthContext::with_storage(
            config,
            durable,
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryStorage::new()),
            history.clone(),
        )
        .unwrap();
        (ctx, history)
    }

    #[tokio::test]
    async fn test_stale_stored_token_scenario() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/user-details"))
            .and(header("authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false})))
            .mount(&server)
            .await;

        let durable = Arc::new(MemoryStorage::new());
        durable.set(TOKEN_KEY, "abc").unwrap();
        let (ctx, _) = context(&server.uri(), durable.clone());

        assert_eq!(ctx.session.restore().await, SessionState::Unauthenticated);
        assert!(durable.get(TOKEN_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_never_logged_in_visits_wishlist() {
        let server = MockServer::start().await;
        let (ctx, history) = context(&server.uri(), Arc::new(MemoryStorage::new()));
        ctx.session.restore().await;

        assert_eq!(
            ctx.edge.evaluate_request("/wishlist", ctx.cookie_header().as_deref()),
            EdgeDecision::Redirect {
                location: "/home".to_string()
            }
        );

        let mut guard = ctx.guard();
        assert_eq!(
            guard.check("/wishlist"),
            GuardView::Redirect {
                to: "/home".to_string()
            }
        );
        assert_eq!(history.current(), "/home");
        assert!(ctx.handle().show_sign_in());
    }

    #[tokio::test]
    async fn test_login_sets_edge_marker_and_logout_removes_it() {
        let server = MockServer::start().await;
        let (ctx, _) = context(&server.uri(), Arc::new(MemoryStorage::new()));
        ctx.session.restore().await;

        ctx.session.login(
            "tok",
            User {
                id: "u1".to_string(),
                name: "Ana".to_string(),
                email: None,
            },
        );
        assert_eq!(ctx.cookie_header().as_deref(), Some("token=tok"));
        assert_eq!(
            ctx.edge.evaluate_request("/wishlist", ctx.cookie_header().as_deref()),
            EdgeDecision::Continue
        );

        ctx.session.logout();
        assert!(ctx.cookie_header().is_none());
    }
}
