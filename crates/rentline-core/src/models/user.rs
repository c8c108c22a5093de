use serde::{Deserialize, Serialize};

/// Minimal identity record returned by the identity endpoint.
///
/// The client never builds one of these on its own; every `User` in a
/// session came back from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "fullName", alias = "displayName")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    /// Name for display, falling back to the email address.
    pub fn display_name(&self) -> &str {
        if !self.name.trim().is_empty() {
            &self.name
        } else {
            self.email.as_deref().unwrap_or("Unknown user")
        }
    }
}

/// Envelope of `GET /auth/user-details`.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, alias = "data")]
    pub user: Option<User>,
    #[serde(default)]
    pub message: Option<String>,
}

impl IdentityResponse {
    /// The identity, if and only if the server reported success.
    pub fn into_user(self) -> Option<User> {
        if self.success {
            self.user
        } else {
            None
        }
    }
}
