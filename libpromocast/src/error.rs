//! Error types for Promocast

use thiserror::Error;

use crate::types::Platform;

pub type Result<T> = std::result::Result<T, PromocastError>;

#[derive(Error, Debug)]
pub enum PromocastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PromocastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PromocastError::InvalidInput(_) => 3,
            PromocastError::OAuth(_) => 2,
            PromocastError::Dispatch(_) => 2,
            PromocastError::Platform(_) => 1,
            PromocastError::Config(_) => 1,
            PromocastError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failures of the OAuth authorization flow and credential lifecycle.
#[derive(Error, Debug, Clone)]
pub enum OAuthError {
    #[error("OAuth client credentials are not configured for platform '{0}'")]
    UnconfiguredPlatform(Platform),

    #[error("Invalid state parameter: unknown, expired, or already consumed")]
    InvalidState,

    #[error("Authorization denied by platform: {0}")]
    AuthorizationDenied(String),

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("No credential found for platform '{0}'")]
    NotFound(Platform),
}

/// Precondition violations detected by the post dispatcher before any
/// platform call is made. The caller must fix state before retrying.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    #[error("Post {id} is not in scheduled status (current: {status})")]
    NotScheduled { id: i64, status: String },

    #[error("No connected profile for account {account_id} on platform '{platform}'")]
    NoConnectedProfile { account_id: i64, platform: Platform },

    #[error("Credential {credential_id} has no access token")]
    MissingAccessToken { credential_id: i64 },

    #[error("Post {0} not found")]
    PostNotFound(i64),
}

/// Upstream publish failures. A `Posting` or `Network` error marks the
/// post `failed`; re-scheduling is a manual operation.
#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = PromocastError::InvalidInput("Empty content".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_oauth_error() {
        let error = PromocastError::OAuth(OAuthError::InvalidState);
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_dispatch_error() {
        let error = PromocastError::Dispatch(DispatchError::PostNotFound(7));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_platform_error() {
        let error = PromocastError::Platform(PlatformError::Posting("X rejected it".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_database_error() {
        let db_error = DbError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));
        let error = PromocastError::Database(db_error);
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_error_message_formatting_unconfigured() {
        let error = PromocastError::OAuth(OAuthError::UnconfiguredPlatform(Platform::Tiktok));
        let message = format!("{}", error);
        assert_eq!(
            message,
            "OAuth error: OAuth client credentials are not configured for platform 'tiktok'"
        );
    }

    #[test]
    fn test_error_message_formatting_not_scheduled() {
        let error = PromocastError::Dispatch(DispatchError::NotScheduled {
            id: 42,
            status: "posted".to_string(),
        });
        let message = format!("{}", error);
        assert!(message.contains("Post 42 is not in scheduled status"));
        assert!(message.contains("posted"));
    }

    #[test]
    fn test_error_message_includes_platform_name() {
        let error = PlatformError::Posting("Failed to post to facebook - Status: 400".to_string());
        assert!(format!("{}", error).contains("facebook"));
    }

    #[test]
    fn test_error_conversion_from_oauth_error() {
        let error: PromocastError = OAuthError::InvalidState.into();
        assert!(matches!(error, PromocastError::OAuth(_)));
    }

    #[test]
    fn test_error_conversion_from_platform_error() {
        let error: PromocastError = PlatformError::Network("timeout".to_string()).into();
        assert!(matches!(error, PromocastError::Platform(_)));
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Network("Connection failed".to_string());
        let cloned = original.clone();
        assert_eq!(format!("{}", original), format!("{}", cloned));
    }
}
