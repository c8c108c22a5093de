use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{AuthError, AuthRequired};
use crate::api::ApiClient;
use crate::auth::CredentialStore;
use crate::models::User;
use crate::routes::Navigator;
use crate::storage::Storage;

/// Storage key for the path to return to after signing in.
pub const RETURN_PATH_KEY: &str = "redirect_after_login";

/// Authentication status of this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "status", content = "user", rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    Unauthenticated,
    Authenticated(User),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticated(_) => "authenticated",
        }
    }
}

/// Read-only view of the session, handed to guards and UI collaborators.
///
/// Besides reading, a handle may only raise the sign-in prompt and record
/// where to return after signing in. Session transitions stay with
/// [`SessionManager`].
#[derive(Clone)]
pub struct SessionHandle {
    state: watch::Receiver<SessionState>,
    prompt: Arc<watch::Sender<bool>>,
    prefs: Arc<dyn Storage>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn show_sign_in(&self) -> bool {
        *self.prompt.borrow()
    }

    /// Subscribe to the sign-in prompt flag.
    pub fn sign_in_prompt(&self) -> watch::Receiver<bool> {
        self.prompt.subscribe()
    }

    pub fn request_sign_in(&self) {
        self.prompt.send_replace(true);
    }

    /// Persist `path` so a later sign-in can return to it.
    pub fn remember_return_path(&self, path: &str) {
        if let Err(e) = self.prefs.set(RETURN_PATH_KEY, path) {
            warn!(error = %e, "Failed to persist return path");
        }
    }

    /// Wait for the next session change. Returns false once the session
    /// manager is gone.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Wait until startup validation has finished, then return the state.
    pub async fn wait_until_loaded(&mut self) -> SessionState {
        let loaded = match self.state.wait_for(|s| !s.is_loading()).await {
            Ok(state) => Some(state.clone()),
            Err(_) => None,
        };
        loaded.unwrap_or_else(|| self.state())
    }
}

/// Owner and only writer of the session.
///
/// The four transitions are [`restore`](Self::restore) at startup,
/// [`login`](Self::login), [`logout`](Self::logout) and
/// [`invalidate`](Self::invalidate) when the server rejects the credential.
/// Each replaces the whole state in one step, so readers never see a
/// partial update.
pub struct SessionManager {
    api: ApiClient,
    credentials: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
    prefs: Arc<dyn Storage>,
    landing: String,
    state: watch::Sender<SessionState>,
    prompt: Arc<watch::Sender<bool>>,
}

impl SessionManager {
    pub fn new(
        api: ApiClient,
        navigator: Arc<dyn Navigator>,
        prefs: Arc<dyn Storage>,
        landing: &str,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        let (prompt, _) = watch::channel(false);
        Self {
            credentials: Arc::clone(api.credentials()),
            api,
            navigator,
            prefs,
            landing: landing.to_string(),
            state,
            prompt: Arc::new(prompt),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            state: self.state.subscribe(),
            prompt: Arc::clone(&self.prompt),
            prefs: Arc::clone(&self.prefs),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn show_sign_in(&self) -> bool {
        *self.prompt.borrow()
    }

    pub fn request_sign_in(&self) {
        self.prompt.send_replace(true);
    }

    pub fn dismiss_sign_in(&self) {
        self.prompt.send_replace(false);
    }

    fn transition(&self, next: SessionState) {
        let to = next.label();
        let previous = self.state.send_replace(next);
        debug!(from = previous.label(), to, "Session transition");
    }

    /// Validate a stored credential at startup.
    ///
    /// Without a stored credential this settles on `Unauthenticated`
    /// without touching the network. A result that arrives after the
    /// credential was replaced or cleared is discarded.
    pub async fn restore(&self) -> SessionState {
        let snapshot = self.credentials.snapshot();
        if snapshot.credential.is_none() {
            debug!("No stored credential");
            self.transition(SessionState::Unauthenticated);
            return self.state();
        }

        self.transition(SessionState::Loading);
        let result = self.api.fetch_identity().await;

        let current = self.credentials.snapshot();
        let superseded = current.epoch != snapshot.epoch;

        match result {
            Ok(user) if !superseded => {
                info!(user_id = %user.id, "Stored credential validated");
                self.transition(SessionState::Authenticated(user));
            }
            Ok(_) => {
                debug!("Validation finished after the credential changed; discarded");
            }
            Err(e) if superseded && current.credential.is_some() => {
                debug!(error = %e, "Validation failed for a superseded credential; discarded");
            }
            Err(e) => {
                match AuthError::from(e) {
                    AuthError::CredentialRejected => warn!("Stored credential rejected"),
                    other => warn!(error = %other, "Could not validate stored credential"),
                }
                self.credentials.clear();
                self.transition(SessionState::Unauthenticated);
            }
        }
        self.state()
    }

    /// Install a credential for an identity the server already returned.
    pub fn login(&self, token: &str, user: User) {
        self.credentials.set(token);
        info!(user_id = %user.id, "Logged in");
        self.transition(SessionState::Authenticated(user));
        self.dismiss_sign_in();
    }

    /// Drop the credential and leave for the landing route.
    pub fn logout(&self) {
        self.credentials.clear();
        self.transition(SessionState::Unauthenticated);
        info!("Logged out");
        self.navigator.push(&self.landing);
    }

    /// React to an "authentication required" broadcast.
    ///
    /// If a credential is live again by now, a newer login has happened and
    /// the event is ignored.
    pub fn invalidate(&self, event: &AuthRequired) {
        if self.credentials.is_present() {
            debug!(path = %event.path, "Credential present again; ignoring invalidation");
            return;
        }
        if self.is_authenticated() {
            warn!(path = %event.path, "Session invalidated by server");
            self.transition(SessionState::Unauthenticated);
        }
    }

    /// Listen for pipeline broadcasts and apply them to the session.
    pub fn spawn_invalidation_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut rx = self.api.events().subscribe();
        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                session.invalidate(&event);
            }
        })
    }

    /// Take the path recorded by the route guard, if any.
    pub fn take_return_path(&self) -> Option<String> {
        let path = match self.prefs.get(RETURN_PATH_KEY) {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "Failed to read return path");
                return None;
            }
        };
        if path.is_some() {
            if let Err(e) = self.prefs.remove(RETURN_PATH_KEY) {
                warn!(error = %e, "Failed to remove return path");
            }
        }
        path
    }
}
