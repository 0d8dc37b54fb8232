//! Database operations for Promocast

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use crate::error::{PromocastError, Result};
use crate::types::{
    Credential, CredentialStatus, MediaAsset, NewPost, Platform, PostStatus, ScheduledPost,
    MAX_CONTENT_CHARS,
};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(crate::error::DbError::IoError)?;
        }

        // Use mode=rwc to allow creating the database file if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(crate::error::DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(crate::error::DbError::MigrationError)?;

        Ok(Self { pool })
    }

    // ========================================================================
    // Scheduled posts
    // ========================================================================

    /// Enqueue a new post. Validates content bounds and the referenced
    /// media asset (a missing asset is rejected here; it only becomes
    /// permissive once the post is already in the queue).
    pub async fn create_post(&self, new_post: &NewPost) -> Result<ScheduledPost> {
        if new_post.content.trim().is_empty() {
            return Err(PromocastError::InvalidInput(
                "Content cannot be empty".to_string(),
            ));
        }
        let char_count = new_post.content.chars().count();
        if char_count > MAX_CONTENT_CHARS {
            return Err(PromocastError::InvalidInput(format!(
                "Content exceeds {} character limit (current: {} characters)",
                MAX_CONTENT_CHARS, char_count
            )));
        }
        if let Some(asset_id) = new_post.media_asset_id {
            if self.get_media_asset(asset_id).await?.is_none() {
                return Err(PromocastError::InvalidInput(format!(
                    "Invalid media_asset_id: {}",
                    asset_id
                )));
            }
        }

        let created_at = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO posts
                (account_id, campaign_id, platform, content, media_asset_id,
                 scheduled_at, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 'scheduled', ?)
            "#,
        )
        .bind(new_post.account_id)
        .bind(new_post.campaign_id)
        .bind(new_post.platform.as_str())
        .bind(&new_post.content)
        .bind(new_post.media_asset_id)
        .bind(new_post.scheduled_at)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        let id = result.last_insert_rowid();
        Ok(ScheduledPost {
            id,
            account_id: new_post.account_id,
            campaign_id: new_post.campaign_id,
            platform: new_post.platform,
            content: new_post.content.clone(),
            media_asset_id: new_post.media_asset_id,
            scheduled_at: new_post.scheduled_at,
            status: PostStatus::Scheduled,
            external_post_id: None,
            created_at,
        })
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: i64) -> Result<Option<ScheduledPost>> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, campaign_id, platform, content, media_asset_id,
                   scheduled_at, status, external_post_id, created_at
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        row.map(row_to_post).transpose()
    }

    /// All posts still in `scheduled` status whose time has passed.
    /// Ordering across due posts is unspecified.
    pub async fn get_due_posts(&self, now: i64) -> Result<Vec<ScheduledPost>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, campaign_id, platform, content, media_asset_id,
                   scheduled_at, status, external_post_id, created_at
            FROM posts
            WHERE status = 'scheduled' AND scheduled_at <= ?
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        rows.into_iter().map(row_to_post).collect()
    }

    /// Atomically claim a post for publishing: `scheduled` -> `publishing`.
    ///
    /// Returns false when the post is in any other state, which serializes
    /// concurrent dispatch attempts at the storage layer.
    pub async fn claim_post(&self, post_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET status = 'publishing'
            WHERE id = ? AND status = 'scheduled'
            "#,
        )
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Return a claimed post to the queue after a precondition failure.
    pub async fn release_claim(&self, post_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts SET status = 'scheduled'
            WHERE id = ? AND status = 'publishing'
            "#,
        )
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Record a successful publish: status `posted` plus the external id.
    pub async fn mark_posted(&self, post_id: i64, external_post_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts SET status = 'posted', external_post_id = ?
            WHERE id = ?
            "#,
        )
        .bind(external_post_id)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Record a failed publish attempt. The external post id stays unset.
    pub async fn mark_failed(&self, post_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE posts SET status = 'failed'
            WHERE id = ?
            "#,
        )
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(())
    }

    /// Cancel a post that has not been dispatched yet. Returns false if
    /// the post was not in `scheduled` status.
    pub async fn cancel_post(&self, post_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts SET status = 'canceled'
            WHERE id = ? AND status = 'scheduled'
            "#,
        )
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    /// Insert or update the credential row for (account, platform).
    ///
    /// There is at most one row per pair; a successful re-authorization
    /// updates it in place and flips the status back to `connected`.
    pub async fn upsert_credential(
        &self,
        account_id: i64,
        platform: Platform,
        handle: &str,
        external_id: Option<&str>,
        access_token: &str,
    ) -> Result<Credential> {
        let created_at = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO credentials
                (account_id, platform, handle, external_id, access_token, status, created_at)
            VALUES (?, ?, ?, ?, ?, 'connected', ?)
            ON CONFLICT (account_id, platform) DO UPDATE SET
                handle = excluded.handle,
                external_id = excluded.external_id,
                access_token = excluded.access_token,
                status = 'connected'
            "#,
        )
        .bind(account_id)
        .bind(platform.as_str())
        .bind(handle)
        .bind(external_id)
        .bind(access_token)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        self.get_credential(account_id, platform)
            .await?
            .ok_or_else(|| {
                crate::error::DbError::SqlxError(sqlx::Error::RowNotFound).into()
            })
    }

    /// Get the credential row for (account, platform), any status.
    pub async fn get_credential(
        &self,
        account_id: i64,
        platform: Platform,
    ) -> Result<Option<Credential>> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, platform, handle, external_id, access_token, status, created_at
            FROM credentials
            WHERE account_id = ? AND platform = ?
            "#,
        )
        .bind(account_id)
        .bind(platform.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        row.map(row_to_credential).transpose()
    }

    /// Get the credential for (account, platform) only if it is connected.
    pub async fn get_connected_credential(
        &self,
        account_id: i64,
        platform: Platform,
    ) -> Result<Option<Credential>> {
        Ok(self
            .get_credential(account_id, platform)
            .await?
            .filter(|c| c.status == CredentialStatus::Connected))
    }

    /// All connected credentials for an account.
    pub async fn get_connected_credentials(&self, account_id: i64) -> Result<Vec<Credential>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, platform, handle, external_id, access_token, status, created_at
            FROM credentials
            WHERE account_id = ? AND status = 'connected'
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        rows.into_iter().map(row_to_credential).collect()
    }

    /// Flip a credential to `disconnected` and clear its token.
    ///
    /// Returns false if no row exists for the pair. Safe to repeat: a row
    /// already disconnected is updated again without effect.
    pub async fn disconnect_credential(
        &self,
        account_id: i64,
        platform: Platform,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE credentials SET status = 'disconnected', access_token = NULL
            WHERE account_id = ? AND platform = ?
            "#,
        )
        .bind(account_id)
        .bind(platform.as_str())
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    // ========================================================================
    // Media assets
    // ========================================================================

    /// Register a media asset reference
    pub async fn create_media_asset(
        &self,
        account_id: i64,
        title: Option<&str>,
        storage_url: &str,
        mime_type: Option<&str>,
    ) -> Result<MediaAsset> {
        let created_at = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO media_assets (account_id, title, storage_url, mime_type, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(account_id)
        .bind(title)
        .bind(storage_url)
        .bind(mime_type)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(MediaAsset {
            id: result.last_insert_rowid(),
            account_id,
            title: title.map(str::to_string),
            storage_url: storage_url.to_string(),
            mime_type: mime_type.map(str::to_string),
            created_at,
        })
    }

    /// Get a media asset by ID
    pub async fn get_media_asset(&self, asset_id: i64) -> Result<Option<MediaAsset>> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, title, storage_url, mime_type, created_at
            FROM media_assets WHERE id = ?
            "#,
        )
        .bind(asset_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(crate::error::DbError::SqlxError)?;

        Ok(row.map(|r| MediaAsset {
            id: r.get("id"),
            account_id: r.get("account_id"),
            title: r.get("title"),
            storage_url: r.get("storage_url"),
            mime_type: r.get("mime_type"),
            created_at: r.get("created_at"),
        }))
    }
}

fn row_to_post(r: sqlx::sqlite::SqliteRow) -> Result<ScheduledPost> {
    let platform: String = r.get("platform");
    let status: String = r.get("status");
    Ok(ScheduledPost {
        id: r.get("id"),
        account_id: r.get("account_id"),
        campaign_id: r.get("campaign_id"),
        platform: platform
            .parse()
            .map_err(PromocastError::InvalidInput)?,
        content: r.get("content"),
        media_asset_id: r.get("media_asset_id"),
        scheduled_at: r.get("scheduled_at"),
        status: status.parse().map_err(PromocastError::InvalidInput)?,
        external_post_id: r.get("external_post_id"),
        created_at: r.get("created_at"),
    })
}

fn row_to_credential(r: sqlx::sqlite::SqliteRow) -> Result<Credential> {
    let platform: String = r.get("platform");
    let status: String = r.get("status");
    Ok(Credential {
        id: r.get("id"),
        account_id: r.get("account_id"),
        platform: platform
            .parse()
            .map_err(PromocastError::InvalidInput)?,
        handle: r.get("handle"),
        external_id: r.get("external_id"),
        access_token: r.get("access_token"),
        status: status.parse().map_err(PromocastError::InvalidInput)?,
        created_at: r.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        (dir, db)
    }

    fn new_post(account_id: i64, platform: Platform, scheduled_at: i64) -> NewPost {
        NewPost {
            account_id,
            campaign_id: None,
            platform,
            content: "hello".to_string(),
            media_asset_id: None,
            scheduled_at,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let (_dir, db) = test_db().await;

        let post = db.create_post(&new_post(1, Platform::X, 100)).await.unwrap();
        assert_eq!(post.status, PostStatus::Scheduled);
        assert_eq!(post.external_post_id, None);

        let fetched = db.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.content, "hello");
        assert_eq!(fetched.platform, Platform::X);
        assert_eq!(fetched.scheduled_at, 100);
    }

    #[tokio::test]
    async fn test_create_post_rejects_empty_content() {
        let (_dir, db) = test_db().await;

        let mut post = new_post(1, Platform::X, 100);
        post.content = "   ".to_string();
        let result = db.create_post(&post).await;
        assert!(matches!(result, Err(PromocastError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_create_post_rejects_long_content() {
        let (_dir, db) = test_db().await;

        let mut post = new_post(1, Platform::X, 100);
        post.content = "a".repeat(MAX_CONTENT_CHARS + 1);
        let result = db.create_post(&post).await;
        assert!(matches!(result, Err(PromocastError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_create_post_rejects_dangling_media_asset() {
        let (_dir, db) = test_db().await;

        let mut post = new_post(1, Platform::X, 100);
        post.media_asset_id = Some(999);
        let result = db.create_post(&post).await;
        assert!(matches!(result, Err(PromocastError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_get_due_posts() {
        let (_dir, db) = test_db().await;

        let due = db.create_post(&new_post(1, Platform::X, 100)).await.unwrap();
        let future = db.create_post(&new_post(1, Platform::X, 200)).await.unwrap();

        let posts = db.get_due_posts(150).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, due.id);

        // A claimed post is no longer due
        assert!(db.claim_post(due.id).await.unwrap());
        assert!(db.get_due_posts(150).await.unwrap().is_empty());

        let posts = db.get_due_posts(300).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, future.id);
    }

    #[tokio::test]
    async fn test_claim_post_is_single_shot() {
        let (_dir, db) = test_db().await;

        let post = db.create_post(&new_post(1, Platform::X, 100)).await.unwrap();
        assert!(db.claim_post(post.id).await.unwrap());
        assert!(!db.claim_post(post.id).await.unwrap());

        let fetched = db.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, PostStatus::Publishing);
    }

    #[tokio::test]
    async fn test_release_claim_restores_scheduled() {
        let (_dir, db) = test_db().await;

        let post = db.create_post(&new_post(1, Platform::X, 100)).await.unwrap();
        assert!(db.claim_post(post.id).await.unwrap());
        db.release_claim(post.id).await.unwrap();

        let fetched = db.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, PostStatus::Scheduled);
        assert!(db.claim_post(post.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_posted_sets_external_id() {
        let (_dir, db) = test_db().await;

        let post = db.create_post(&new_post(1, Platform::X, 100)).await.unwrap();
        db.claim_post(post.id).await.unwrap();
        db.mark_posted(post.id, "999").await.unwrap();

        let fetched = db.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, PostStatus::Posted);
        assert_eq!(fetched.external_post_id, Some("999".to_string()));
    }

    #[tokio::test]
    async fn test_mark_failed_leaves_external_id_unset() {
        let (_dir, db) = test_db().await;

        let post = db.create_post(&new_post(1, Platform::X, 100)).await.unwrap();
        db.claim_post(post.id).await.unwrap();
        db.mark_failed(post.id).await.unwrap();

        let fetched = db.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, PostStatus::Failed);
        assert_eq!(fetched.external_post_id, None);
    }

    #[tokio::test]
    async fn test_cancel_post_only_from_scheduled() {
        let (_dir, db) = test_db().await;

        let post = db.create_post(&new_post(1, Platform::X, 100)).await.unwrap();
        assert!(db.cancel_post(post.id).await.unwrap());
        assert!(!db.cancel_post(post.id).await.unwrap());

        let fetched = db.get_post(post.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, PostStatus::Canceled);
    }

    #[tokio::test]
    async fn test_upsert_credential_updates_in_place() {
        let (_dir, db) = test_db().await;

        let first = db
            .upsert_credential(1, Platform::X, "oldhandle", Some("111"), "token-a")
            .await
            .unwrap();
        assert_eq!(first.status, CredentialStatus::Connected);

        let second = db
            .upsert_credential(1, Platform::X, "newhandle", Some("111"), "token-b")
            .await
            .unwrap();

        // Same row, updated fields
        assert_eq!(second.id, first.id);
        assert_eq!(second.handle, "newhandle");
        assert_eq!(second.access_token, Some("token-b".to_string()));

        // Different platform gets its own row
        let other = db
            .upsert_credential(1, Platform::Facebook, "page", Some("222"), "token-c")
            .await
            .unwrap();
        assert_ne!(other.id, first.id);
    }

    #[tokio::test]
    async fn test_disconnect_credential() {
        let (_dir, db) = test_db().await;

        assert!(!db.disconnect_credential(1, Platform::X).await.unwrap());

        db.upsert_credential(1, Platform::X, "h", None, "tok")
            .await
            .unwrap();
        assert!(db.disconnect_credential(1, Platform::X).await.unwrap());

        let cred = db.get_credential(1, Platform::X).await.unwrap().unwrap();
        assert_eq!(cred.status, CredentialStatus::Disconnected);
        assert_eq!(cred.access_token, None);

        // Repeat disconnect still reports the row as present
        assert!(db.disconnect_credential(1, Platform::X).await.unwrap());

        assert!(db
            .get_connected_credential(1, Platform::X)
            .await
            .unwrap()
            .is_none());

        // Re-authorization flips the row back to connected
        db.upsert_credential(1, Platform::X, "h", None, "tok2")
            .await
            .unwrap();
        let cred = db
            .get_connected_credential(1, Platform::X)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cred.access_token, Some("tok2".to_string()));
    }

    #[tokio::test]
    async fn test_media_asset_round_trip() {
        let (_dir, db) = test_db().await;

        let asset = db
            .create_media_asset(1, Some("Launch banner"), "https://cdn.example.com/a.png", Some("image/png"))
            .await
            .unwrap();

        let fetched = db.get_media_asset(asset.id).await.unwrap().unwrap();
        assert_eq!(fetched.storage_url, "https://cdn.example.com/a.png");
        assert_eq!(fetched.mime_type, Some("image/png".to_string()));

        assert!(db.get_media_asset(asset.id + 1).await.unwrap().is_none());
    }
}
