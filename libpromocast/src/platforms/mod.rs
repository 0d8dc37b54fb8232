//! Platform publisher abstraction and implementations
//!
//! Each supported platform implements the [`PlatformPublisher`] trait,
//! translating a post's text and media into the platform's API call and
//! normalizing the response into an external post id or a typed error.
//! Publishers are selected through a [`PublisherRegistry`] keyed by
//! platform; adding a platform means registering an implementation, not
//! editing a dispatch chain.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{PlatformError, PromocastError, Result};
use crate::types::Platform;

pub mod facebook;
pub mod tiktok;
pub mod x;

// Mock publisher is available for all builds to support integration tests
pub mod mock;

/// Everything a publisher needs to make one platform call.
///
/// The access token is a secret: implementations must never include it
/// in error messages or logs.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub content: String,
    pub access_token: String,
    pub media_url: Option<String>,
    /// Platform-side account reference (the credential's external id).
    /// Facebook uses it as the target page id.
    pub account_ref: Option<String>,
}

/// Normalized outcome of a successful platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub external_post_id: String,
}

/// Capability interface implemented once per platform.
#[async_trait]
pub trait PlatformPublisher: Send + Sync {
    /// Lowercase platform identifier (e.g. "x", "facebook")
    fn name(&self) -> &str;

    /// Publish one post. Transport failures and non-success HTTP status
    /// are wrapped into `PlatformError` carrying the platform name and
    /// either the parsed error body or the raw status code.
    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome>;
}

/// Publisher lookup keyed by platform identifier.
pub struct PublisherRegistry {
    publishers: HashMap<Platform, Arc<dyn PlatformPublisher>>,
}

impl PublisherRegistry {
    pub fn new() -> Self {
        Self {
            publishers: HashMap::new(),
        }
    }

    /// Registry with every built-in publisher, sharing one HTTP client
    /// with the configured timeout.
    pub fn with_defaults(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()
            .map_err(|e| {
                PromocastError::InvalidInput(format!("Failed to build HTTP client: {}", e))
            })?;

        let mut registry = Self::new();
        registry.register(Platform::X, Arc::new(x::XPublisher::new(client.clone())));
        registry.register(
            Platform::Tiktok,
            Arc::new(tiktok::TiktokPublisher::new(client.clone())),
        );
        registry.register(
            Platform::Facebook,
            Arc::new(facebook::FacebookPublisher::new(client)),
        );
        Ok(registry)
    }

    pub fn register(&mut self, platform: Platform, publisher: Arc<dyn PlatformPublisher>) {
        self.publishers.insert(platform, publisher);
    }

    /// Look up the publisher for a platform; unsupported platforms fail
    /// fast with `NotImplemented`.
    pub fn get(&self, platform: Platform) -> Result<Arc<dyn PlatformPublisher>> {
        self.publishers.get(&platform).cloned().ok_or_else(|| {
            PlatformError::NotImplemented(format!(
                "Publishing to platform '{}' is not yet implemented",
                platform
            ))
            .into()
        })
    }
}

impl Default for PublisherRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the error message for a non-success platform response: the
/// parsed JSON error body when it is one, otherwise the raw status code.
/// The access token never reaches this function.
pub(crate) fn response_failure(platform: &str, status: reqwest::StatusCode, body: &str) -> PlatformError {
    let detail = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value.to_string(),
        Err(_) => format!("Status: {}", status.as_u16()),
    };
    PlatformError::Posting(format!("Failed to post to {} - {}", platform, detail))
}
