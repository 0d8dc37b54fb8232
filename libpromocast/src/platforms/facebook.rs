//! Facebook publisher
//!
//! Posts to a page through the Graph API. With a media URL the page's
//! photo-upload endpoint is used, otherwise the feed endpoint. The page
//! id comes from the credential's external id (`account_ref`).
//!
//! Graph API authentication puts the access token in the query string,
//! so every error path must strip the request URL before formatting.

use async_trait::async_trait;

use crate::error::{PlatformError, Result};
use crate::platforms::{response_failure, PlatformPublisher, PublishOutcome, PublishRequest};

const DEFAULT_API_BASE: &str = "https://graph.facebook.com/v18.0";

pub struct FacebookPublisher {
    client: reqwest::Client,
    api_base: String,
}

impl FacebookPublisher {
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
impl PlatformPublisher for FacebookPublisher {
    fn name(&self) -> &str {
        "facebook"
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        let page_id = request.account_ref.as_deref().ok_or_else(|| {
            PlatformError::Posting(
                "Facebook page id is required for posting (no account reference on the credential)"
                    .to_string(),
            )
        })?;

        let mut params: Vec<(&str, &str)> = vec![
            ("message", request.content.as_str()),
            ("access_token", request.access_token.as_str()),
        ];
        let url = match &request.media_url {
            Some(media_url) => {
                params.push(("url", media_url.as_str()));
                format!("{}/{}/photos", self.api_base, page_id)
            }
            None => format!("{}/{}/feed", self.api_base, page_id),
        };

        let response = self
            .client
            .post(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                PlatformError::Network(format!(
                    "Failed to post to facebook: {}",
                    e.without_url()
                ))
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(response_failure("facebook", status, &body).into());
        }

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|_| {
            PlatformError::Posting(format!(
                "Unexpected response format from facebook: {}",
                body
            ))
        })?;

        match value["id"].as_str() {
            Some(id) => Ok(PublishOutcome {
                external_post_id: id.to_string(),
            }),
            None => Err(PlatformError::Posting(format!(
                "Unexpected response format from facebook: {}",
                value
            ))
            .into()),
        }
    }
}
