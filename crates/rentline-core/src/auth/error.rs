use thiserror::Error;

use crate::api::ApiError;

/// Failures on the authentication path, as seen by the session.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity endpoint refused the credential.
    #[error("Credential rejected by the identity endpoint")]
    CredentialRejected,

    /// The identity check could not complete (network, server, timeout).
    #[error("Identity validation could not complete: {0}")]
    ValidationNetworkFailure(#[source] ApiError),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),
}

impl From<ApiError> for AuthError {
    fn from(e: ApiError) -> Self {
        match e {
            // A 401, or a 2xx envelope reporting failure, is an explicit no.
            ApiError::Unauthorized | ApiError::InvalidResponse(_) => AuthError::CredentialRejected,
            other => AuthError::ValidationNetworkFailure(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_api_errors() {
        assert!(matches!(
            AuthError::from(ApiError::Unauthorized),
            AuthError::CredentialRejected
        ));
        assert!(matches!(
            AuthError::from(ApiError::InvalidResponse("success=false".into())),
            AuthError::CredentialRejected
        ));
        assert!(matches!(
            AuthError::from(ApiError::ServerError("boom".into())),
            AuthError::ValidationNetworkFailure(_)
        ));
        assert!(matches!(
            AuthError::from(ApiError::RateLimited),
            AuthError::ValidationNetworkFailure(_)
        ));
    }
}
