//! Scheduled-post dispatch orchestration
//!
//! Takes a due post from the queue to a platform call and back to a
//! terminal status. The claim step (`scheduled` -> `publishing`) is a
//! conditional update at the storage layer, so concurrent dispatchers
//! cannot double-publish the same post. A failed platform call marks the
//! post `failed` and then propagates the error; the status mutation is
//! deliberate so failed attempts are distinguishable from pending ones.

use tracing::{info, warn};

use crate::db::Database;
use crate::error::{DispatchError, PromocastError, Result};
use crate::platforms::{PublishRequest, PublisherRegistry};
use crate::types::ScheduledPost;

pub struct Dispatcher {
    db: Database,
    registry: PublisherRegistry,
}

impl Dispatcher {
    pub fn new(db: Database, registry: PublisherRegistry) -> Self {
        Self { db, registry }
    }

    /// Publish a single post.
    ///
    /// Precondition failures (not scheduled, no connected profile, no
    /// token) release the claim and leave the post as it was. Platform
    /// failures mark it `failed` exactly once and propagate.
    pub async fn publish(&self, post_id: i64) -> Result<ScheduledPost> {
        let post = self
            .db
            .get_post(post_id)
            .await?
            .ok_or(DispatchError::PostNotFound(post_id))?;

        // Atomic claim; losing the race means someone else owns this post
        if !self.db.claim_post(post_id).await? {
            let status = self
                .db
                .get_post(post_id)
                .await?
                .map(|p| p.status.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(DispatchError::NotScheduled {
                id: post_id,
                status,
            }
            .into());
        }

        let credential = match self
            .db
            .get_connected_credential(post.account_id, post.platform)
            .await?
        {
            Some(credential) => credential,
            None => {
                self.db.release_claim(post_id).await?;
                return Err(DispatchError::NoConnectedProfile {
                    account_id: post.account_id,
                    platform: post.platform,
                }
                .into());
            }
        };

        let access_token = match &credential.access_token {
            Some(token) => token.clone(),
            None => {
                self.db.release_claim(post_id).await?;
                return Err(DispatchError::MissingAccessToken {
                    credential_id: credential.id,
                }
                .into());
            }
        };

        // A dangling media reference degrades to "no media"
        let media_url = match post.media_asset_id {
            Some(asset_id) => self
                .db
                .get_media_asset(asset_id)
                .await?
                .map(|asset| asset.storage_url),
            None => None,
        };

        let publisher = match self.registry.get(post.platform) {
            Ok(publisher) => publisher,
            Err(e) => {
                // Unsupported platform counts as a publish failure, same
                // as an upstream rejection
                self.db.mark_failed(post_id).await?;
                return Err(e);
            }
        };

        let request = PublishRequest {
            content: post.content.clone(),
            access_token,
            media_url,
            account_ref: credential.external_id.clone(),
        };

        match publisher.publish(&request).await {
            Ok(outcome) => {
                self.db
                    .mark_posted(post_id, &outcome.external_post_id)
                    .await?;
                info!(
                    post_id,
                    platform = %post.platform,
                    external_post_id = %outcome.external_post_id,
                    "post published"
                );
                self.db
                    .get_post(post_id)
                    .await?
                    .ok_or_else(|| DispatchError::PostNotFound(post_id).into())
            }
            Err(e) => {
                self.db.mark_failed(post_id).await?;
                warn!(post_id, platform = %post.platform, "publish failed: {}", e);
                Err(e)
            }
        }
    }

    /// Publish every post whose scheduled time has passed and which is
    /// still in `scheduled` status. Ordering across due posts is
    /// unspecified. Per-post failures are recorded and do not stop the
    /// batch; the returned list holds every attempted post in its final
    /// state.
    pub async fn publish_due(&self, now: i64) -> Result<Vec<ScheduledPost>> {
        let due = self.db.get_due_posts(now).await?;
        if due.is_empty() {
            return Ok(Vec::new());
        }

        info!("found {} post(s) due for publishing", due.len());

        let mut results = Vec::with_capacity(due.len());
        for post in due {
            match self.publish(post.id).await {
                Ok(updated) => results.push(updated),
                Err(PromocastError::Platform(e)) => {
                    warn!(post_id = post.id, "publish failed: {}", e);
                    if let Some(updated) = self.db.get_post(post.id).await? {
                        results.push(updated);
                    }
                }
                Err(e) => {
                    // Claimed by a concurrent dispatcher or a precondition
                    // the operator has to fix; leave it out of the batch
                    warn!(post_id = post.id, "skipping post: {}", e);
                }
            }
        }

        Ok(results)
    }
}
