//! TikTok publisher
//!
//! Initializes a publish through the v2 video-publish-init endpoint.
//! TikTok only accepts video content, and the upload flow itself is not
//! implemented, so real calls fail unless the platform returns a
//! `publish_id` for the init request. This is a known limitation and the
//! adapter must not paper over it by succeeding silently.

use async_trait::async_trait;

use crate::error::{PlatformError, Result};
use crate::platforms::{response_failure, PlatformPublisher, PublishOutcome, PublishRequest};

const DEFAULT_API_BASE: &str = "https://open.tiktokapis.com";

/// TikTok caps post titles at 100 characters.
const TITLE_LIMIT: usize = 100;

pub struct TiktokPublisher {
    client: reqwest::Client,
    api_base: String,
}

impl TiktokPublisher {
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

fn truncate_title(content: &str) -> String {
    content.chars().take(TITLE_LIMIT).collect()
}

#[async_trait]
impl PlatformPublisher for TiktokPublisher {
    fn name(&self) -> &str {
        "tiktok"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        let url = format!("{}/v2/post/publish/video/init/", self.api_base);

        // TODO: real video upload workflow; FILE_UPLOAD init alone is not
        // enough for TikTok to accept a post
        let payload = serde_json::json!({
            "post_info": {
                "title": truncate_title(&request.content),
                "privacy_level": "PUBLIC_TO_EVERYONE",
                "disable_duet": false,
                "disable_comment": false,
                "disable_stitch": false,
                "video_cover_timestamp_ms": 1000
            },
            "source_info": {
                "source": "FILE_UPLOAD"
            }
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&request.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                PlatformError::Network(format!("Failed to post to tiktok: {}", e.without_url()))
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(response_failure("tiktok", status, &body).into());
        }

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|_| {
            PlatformError::Posting(format!("Unexpected response format from tiktok: {}", body))
        })?;

        match value["data"]["publish_id"].as_str() {
            Some(id) => Ok(PublishOutcome {
                external_post_id: id.to_string(),
            }),
            None => Err(PlatformError::Posting(format!(
                "Unexpected response format from tiktok: {}",
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
        let publisher = TiktokPublisher::new(reqwest::Client::new());
        assert_eq!(publisher.name(), "tiktok");
    }

    #[test]
    fn test_truncate_title_short_content() {
        assert_eq!(truncate_title("hello"), "hello");
    }

    #[test]
    fn test_truncate_title_caps_at_100_chars() {
        let long = "a".repeat(250);
        let title = truncate_title(&long);
        assert_eq!(title.chars().count(), 100);
    }

    #[test]
    fn test_truncate_title_is_character_based() {
        // Multi-byte characters count as one each
        let long: String = "é".repeat(150);
        let title = truncate_title(&long);
        assert_eq!(title.chars().count(), 100);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let publisher =
            TiktokPublisher::with_api_base(client, "http://127.0.0.1:9".to_string());

        let request = PublishRequest {
            content: "hello".to_string(),
            access_token: "secret-token".to_string(),
            media_url: None,
            account_ref: None,
        };

        let err = publisher.publish(&request).await.unwrap_err();
        let msg = format!("{}", err);
        assert!(msg.contains("Failed to post to tiktok"));
        assert!(!msg.contains("secret-token"));
    }
}
