//! Request pipeline shared by every call to the rentline API.
//!
//! Outbound, each request is stamped with the credential that is live at
//! send time. Inbound, each response is inspected; a 401 clears the
//! credential it was sent with and broadcasts "authentication required".
//! The pipeline never navigates. Reacting to the broadcast is the job of
//! the session and route guard.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::auth::{AuthEvents, AuthRequired, Credential, CredentialStore, Invalidation};
use crate::models::{IdentityResponse, User};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Identity-validation endpoint, relative to the API base URL.
pub const IDENTITY_PATH: &str = "/auth/user-details";

/// HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Which credential a request carried, and where it came from.
#[derive(Debug, Clone, Copy)]
enum Stamp {
    /// The credential store's credential (or none) at this epoch.
    Store { epoch: u64 },
    /// A credential handed in by the caller that the store never held.
    Explicit,
}

/// API client for rentline.
/// Clone is cheap - reqwest::Client and the store are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: Arc<CredentialStore>,
    events: AuthEvents,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a client with the default request timeout.
    pub fn new(
        base_url: &str,
        credentials: Arc<CredentialStore>,
        events: AuthEvents,
    ) -> Result<Self, ApiError> {
        Self::with_timeout(
            base_url,
            credentials,
            events,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: &str,
        credentials: Arc<CredentialStore>,
        events: AuthEvents,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            events,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first rate-limit backoff delay.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn events(&self) -> &AuthEvents {
        &self.events
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    // ------------------------------------------------------------------------
    // Outbound stage
    // ------------------------------------------------------------------------

    /// Attach the store's current credential, if any.
    fn authorize(&self, builder: RequestBuilder) -> (RequestBuilder, Stamp) {
        let snapshot = self.credentials.snapshot();
        let builder = match snapshot.credential {
            Some(ref credential) => builder.bearer_auth(credential.expose()),
            None => builder,
        };
        (builder, Stamp::Store { epoch: snapshot.epoch })
    }

    // ------------------------------------------------------------------------
    // Inbound stage
    // ------------------------------------------------------------------------

    /// Check a response. Returns Ok(Some(response)) for success, Ok(None)
    /// for rate limit (should retry), or Err for other errors.
    async fn inspect(
        &self,
        response: Response,
        path: &str,
        stamp: Stamp,
    ) -> Result<Option<Response>, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(Some(response));
        }
        if status.as_u16() == 429 {
            return Ok(None);
        }
        if status.as_u16() == 401 {
            self.handle_unauthorized(path, stamp);
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }

    fn handle_unauthorized(&self, path: &str, stamp: Stamp) {
        let Stamp::Store { epoch } = stamp else {
            debug!(path, "Explicit credential rejected; store untouched");
            return;
        };

        match self.credentials.invalidate(epoch) {
            Invalidation::Stale => {
                debug!(path, epoch, "Late 401 for a superseded credential ignored");
            }
            outcome => {
                warn!(path, ?outcome, "Credential rejected by server");
                self.events.notify(AuthRequired {
                    path: path.to_string(),
                    epoch,
                });
            }
        }
    }

    // ------------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------------

    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        explicit: Option<&Credential>,
    ) -> Result<Response, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let mut builder = self
                .client
                .request(method.clone(), &url)
                .header(header::ACCEPT, "application/json");
            if let Some(body) = body {
                builder = builder.json(body);
            }

            // The credential is read fresh on every attempt.
            let (builder, stamp) = match explicit {
                Some(credential) => (builder.bearer_auth(credential.expose()), Stamp::Explicit),
                None => self.authorize(builder),
            };

            debug!(%method, path, "Sending request");
            let response = builder.send().await?;

            match self.inspect(response, path, stamp).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(
                        path,
                        retry = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    /// Send a request through the pipeline and return the raw response.
    pub async fn send(&self, method: Method, path: &str) -> Result<Response, ApiError> {
        self.execute::<()>(method, path, None, None).await
    }

    async fn parse<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse response from {}: {}", path, e))
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.execute::<()>(Method::GET, path, None, None).await?;
        Self::parse(response, path).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.execute(Method::POST, path, Some(body), None).await?;
        Self::parse(response, path).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.execute(Method::PUT, path, Some(body), None).await?;
        Self::parse(response, path).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute::<()>(Method::DELETE, path, None, None).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    fn identity_from(response: IdentityResponse) -> Result<User, ApiError> {
        let message = response.message.clone();
        response.into_user().ok_or_else(|| {
            ApiError::InvalidResponse(
                message.unwrap_or_else(|| "identity endpoint reported failure".to_string()),
            )
        })
    }

    /// Validate the stored credential against the identity endpoint.
    pub async fn fetch_identity(&self) -> Result<User, ApiError> {
        let response: IdentityResponse = self.get(IDENTITY_PATH).await?;
        Self::identity_from(response)
    }

    /// Exchange a credential the store does not hold yet for an identity.
    ///
    /// A rejection here only concerns `credential`; the stored one is left
    /// alone and nothing is broadcast.
    pub async fn fetch_identity_with(&self, credential: &Credential) -> Result<User, ApiError> {
        let response = self
            .execute::<()>(Method::GET, IDENTITY_PATH, None, Some(credential))
            .await?;
        let response: IdentityResponse = Self::parse(response, IDENTITY_PATH).await?;
        Self::identity_from(response)
    }
}
