use crate::auth::AuthError;
use crate::core::credentials::CredentialsError;
use crate::firestore::FirestoreError;
use thiserror::Error;

/// Failures surfaced by console operations.
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Credentials are missing or unusable. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The request cannot be served as asked (bad collection, filter or payload).
    #[error("Query error: {0}")]
    Query(String),
    /// The backing store failed or could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ConsoleError {
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query(message.into())
    }
}

impl From<CredentialsError> for ConsoleError {
    fn from(err: CredentialsError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<FirestoreError> for ConsoleError {
    fn from(err: FirestoreError) -> Self {
        match &err {
            FirestoreError::ApiError(failure) if failure.is_rejected_request() => {
                Self::Query(err.to_string())
            }
            FirestoreError::InvalidQuery(_) | FirestoreError::SerializationError(_) => {
                Self::Query(err.to_string())
            }
            _ => Self::StoreUnavailable(err.to_string()),
        }
    }
}

impl From<AuthError> for ConsoleError {
    fn from(err: AuthError) -> Self {
        match &err {
            AuthError::ApiError(failure) if failure.is_rejected_request() => {
                Self::Query(err.to_string())
            }
            AuthError::InvalidUrl(_) | AuthError::InvalidTenantId(_) => {
                Self::Query(err.to_string())
            }
            _ => Self::StoreUnavailable(err.to_string()),
        }
    }
}
