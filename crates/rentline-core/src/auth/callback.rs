//! Login completion from an identity-provider redirect.
//!
//! The provider sends the browser back with a one-time token in the
//! `token` query parameter. The token is exchanged for an identity through
//! the identity endpoint, installed as the credential, and then removed
//! from the location with a history replace.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use url::Url;

use super::{AuthError, Credential, SessionManager};
use crate::models::User;
use crate::routes::Navigator;

/// Query parameter carrying the one-time token.
pub const TOKEN_PARAM: &str = "token";

// Base for resolving app-relative locations like `/home?token=x`.
const LOCATION_BASE: &str = "http://localhost";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The location carries no token.
    NoToken,
    /// This token was already handled by this process.
    AlreadyProcessed,
    /// Signed in. `return_to` is where the user was headed before sign-in.
    Authenticated { user: User, return_to: Option<String> },
    /// The exchange succeeded but the credential changed meanwhile.
    Superseded,
}

/// Consumes login tokens from the location, once per token.
pub struct LoginCallback {
    session: Arc<SessionManager>,
    navigator: Arc<dyn Navigator>,
    processed: Mutex<Option<String>>,
}

impl LoginCallback {
    pub fn new(session: Arc<SessionManager>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            session,
            navigator,
            processed: Mutex::new(None),
        }
    }

    fn parse(location: &str) -> Result<Url, AuthError> {
        let base = Url::parse(LOCATION_BASE).map_err(|e| AuthError::InvalidLocation(e.to_string()))?;
        base.join(location)
            .map_err(|e| AuthError::InvalidLocation(format!("{}: {}", location, e)))
    }

    /// The token in `location`, if any.
    pub fn extract_token(location: &str) -> Result<Option<String>, AuthError> {
        let url = Self::parse(location)?;
        Ok(url
            .query_pairs()
            .find(|(k, v)| k == TOKEN_PARAM && !v.is_empty())
            .map(|(_, v)| v.into_owned()))
    }

    /// `location` without the token parameter, as an app-relative location.
    pub fn strip_token(location: &str) -> Result<String, AuthError> {
        let mut url = Self::parse(location)?;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != TOKEN_PARAM)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }

        let mut stripped = url.path().to_string();
        if let Some(query) = url.query() {
            stripped.push('?');
            stripped.push_str(query);
        }
        if let Some(fragment) = url.fragment() {
            stripped.push('#');
            stripped.push_str(fragment);
        }
        Ok(stripped)
    }

    /// Handle the navigator's current location.
    pub async fn handle_current(&self) -> Result<CallbackOutcome, AuthError> {
        let location = self.navigator.current();
        self.handle(&location).await
    }

    /// Consume the token in `location`, if there is one not seen before.
    pub async fn handle(&self, location: &str) -> Result<CallbackOutcome, AuthError> {
        let Some(token) = Self::extract_token(location)? else {
            return Ok(CallbackOutcome::NoToken);
        };

        {
            let mut processed = self.processed.lock().unwrap_or_else(|e| e.into_inner());
            if processed.as_deref() == Some(token.as_str()) {
                debug!("Login token already processed");
                return Ok(CallbackOutcome::AlreadyProcessed);
            }
            *processed = Some(token.clone());
        }

        let stripped = Self::strip_token(location)?;
        let epoch = self.session.api().credentials().epoch();
        let result = self
            .session
            .api()
            .fetch_identity_with(&Credential::new(token.as_str()))
            .await;

        // Drop the token from the location whatever the outcome.
        self.navigator.replace(&stripped);

        let user = match result {
            Ok(user) => user,
            Err(e) => {
                let e = AuthError::from(e);
                warn!(error = %e, "Login token exchange failed");
                self.session.request_sign_in();
                return Err(e);
            }
        };

        if self.session.api().credentials().epoch() != epoch {
            debug!("Credential changed during token exchange; discarding");
            return Ok(CallbackOutcome::Superseded);
        }

        self.session.login(&token, user.clone());
        info!(user_id = %user.id, "Login completed from callback");

        let return_to = self.session.take_return_path();
        if let Some(ref path) = return_to {
            self.navigator.push(path);
        }
        Ok(CallbackOutcome::Authenticated { user, return_to })
    }
}
