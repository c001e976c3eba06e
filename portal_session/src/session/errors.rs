use thiserror::Error;

use crate::endpoint::EndpointError;
use crate::storage::StorageError;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// Error from the credential store
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Error from the authentication endpoint
    #[error("Authentication endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    /// A logout happened while the login was waiting for the endpoint
    #[error("Login superseded by a logout")]
    Superseded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_conversion() {
        let error: SessionError = StorageError::Storage("disk full".to_string()).into();

        assert_eq!(error.to_string(), "Storage error: Storage error: disk full");
    }

    #[test]
    fn test_endpoint_error_conversion() {
        let error: SessionError = EndpointError::InvalidCredentials.into();

        assert!(matches!(
            error,
            SessionError::Endpoint(EndpointError::InvalidCredentials)
        ));
    }
}
