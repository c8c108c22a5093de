//! Authentication module for the client session.
//!
//! This module provides:
//! - `CredentialStore`: the live bearer token, persisted and epoch-stamped
//! - `AuthEvents`: subscriber list for "authentication required" signals
//! - `SessionManager`: the session state machine and its read-only `SessionHandle`
//! - `LoginCallback`: one-time token consumption after an identity-provider redirect
//!
//! Credentials have no client-side expiry; a token lives until the server
//! rejects it.

pub mod callback;
pub mod credentials;
pub mod error;
pub mod events;
pub mod session;

pub use callback::{CallbackOutcome, LoginCallback, TOKEN_PARAM};
pub use credentials::{
    Credential, CredentialSnapshot, CredentialStore, Invalidation, MARKER_COOKIE, TOKEN_KEY,
};
pub use error::AuthError;
pub use events::{AuthEvents, AuthRequired};
pub use session::{SessionHandle, SessionManager, SessionState, RETURN_PATH_KEY};
