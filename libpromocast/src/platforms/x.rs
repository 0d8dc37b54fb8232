//! X (Twitter) publisher
//!
//! Posts text through the v2 tweet-creation endpoint with a bearer
//! token. Media attachment is not supported yet: the X API requires a
//! separate chunked upload flow, so a media URL is accepted and ignored.

use async_trait::async_trait;
use tracing::warn;

use crate::error::{PlatformError, Result};
use crate::platforms::{response_failure, PlatformPublisher, PublishOutcome, PublishRequest};

const DEFAULT_API_BASE: &str = "https://api.twitter.com";

pub struct XPublisher {
    client: reqwest::Client,
    api_base: String,
}

impl XPublisher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Override the API base URL (tests).
    pub fn with_api_base(client: reqwest::Client, api_base: String) -> Self {
        Self { client, api_base }
    }
}

#[async_trait]
impl PlatformPublisher for XPublisher {
    fn name(&self) -> &str {
        "x"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        if request.media_url.is_some() {
            // TODO: chunked media upload via the v1.1 media endpoint
            warn!("media attachment is not supported on x; posting text only");
        }

        let url = format!("{}/2/tweets", self.api_base);
        let payload = serde_json::json!({ "text": request.content });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&request.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                PlatformError::Network(format!("Failed to post to x: {}", e.without_url()))
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(response_failure("x", status, &body).into());
        }

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|_| {
            PlatformError::Posting(format!("Unexpected response format from x: {}", body))
        })?;

        match value["data"]["id"].as_str() {
            Some(id) => Ok(PublishOutcome {
                external_post_id: id.to_string(),
            }),
            None => Err(PlatformError::Posting(format!(
                "Unexpected response format from x: {}",
                value
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name() {
        let publisher = XPublisher::new(reqwest::Client::new());
        assert_eq!(publisher.name(), "x");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let publisher =
            XPublisher::with_api_base(client, "http://127.0.0.1:9".to_string());

        let request = PublishRequest {
            content: "hello".to_string(),
            access_token: "secret-token".to_string(),
            media_url: None,
            account_ref: None,
        };

        let err = publisher.publish(&request).await.unwrap_err();
        let msg = format!("{}", err);
        assert!(msg.contains("Failed to post to x"));
        // The token must never leak into error text
        assert!(!msg.contains("secret-token"));
    }
}
