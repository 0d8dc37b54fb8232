//! OAuth authorization flows for platform credentials
//!
//! Issues authorization URLs (with CSRF state and, where the platform
//! supports it, PKCE), exchanges callback codes for access tokens, and
//! maintains the credential rows in the database. One credential row
//! exists per (account, platform); completing a flow upserts it.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{Config, ProviderConfig};
use crate::db::Database;
use crate::error::{OAuthError, PromocastError, Result};
use crate::types::{ConnectionStatus, Credential, CredentialStatus, Platform};

pub mod pending;
pub mod pkce;

use pending::{PendingAuthorization, PendingStore};

/// How long an issued authorization URL stays redeemable.
const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(600);

/// Fully-resolved OAuth endpoints and client registration for one platform.
#[derive(Debug, Clone)]
struct ProviderSettings {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
    authorize_url: String,
    token_url: String,
    userinfo_url: String,
    use_pkce: bool,
    /// Whether the token endpoint wants client credentials as HTTP Basic
    /// auth instead of form fields.
    basic_auth: bool,
}

impl ProviderSettings {
    fn resolve(platform: Platform, cfg: &ProviderConfig) -> Option<Self> {
        let (authorize_url, token_url, userinfo_url, default_scopes, use_pkce, basic_auth): (
            &str,
            &str,
            &str,
            &[&str],
            bool,
            bool,
        ) = match platform {
            Platform::X => (
                "https://twitter.com/i/oauth2/authorize",
                "https://api.twitter.com/2/oauth2/token",
                "https://api.twitter.com/2/users/me",
                &["tweet.read", "tweet.write", "users.read", "offline.access"],
                true,
                true,
            ),
            Platform::Tiktok => (
                "https://www.tiktok.com/v2/auth/authorize/",
                "https://open.tiktokapis.com/v2/oauth/token/",
                "https://open.tiktokapis.com/v2/user/info/",
                &["user.info.basic", "video.publish"],
                true,
                false,
            ),
            Platform::Facebook => (
                "https://www.facebook.com/v18.0/dialog/oauth",
                "https://graph.facebook.com/v18.0/oauth/access_token",
                "https://graph.facebook.com/v18.0/me",
                &["pages_manage_posts", "pages_read_engagement"],
                false,
                false,
            ),
            _ => return None,
        };

        let scopes = if cfg.scopes.is_empty() {
            default_scopes.iter().map(|s| s.to_string()).collect()
        } else {
            cfg.scopes.clone()
        };

        Some(Self {
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            redirect_uri: cfg.redirect_uri.clone(),
            scopes,
            authorize_url: cfg
                .authorize_url
                .clone()
                .unwrap_or_else(|| authorize_url.to_string()),
            token_url: cfg.token_url.clone().unwrap_or_else(|| token_url.to_string()),
            userinfo_url: cfg
                .userinfo_url
                .clone()
                .unwrap_or_else(|| userinfo_url.to_string()),
            use_pkce,
            basic_auth,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Manages authorization attempts and the credential store.
pub struct OAuthManager {
    db: Database,
    http: reqwest::Client,
    oauth: crate::config::OAuthConfig,
    pending: PendingStore,
}

impl OAuthManager {
    pub fn new(db: Database, config: &Config) -> Result<Self> {
        Self::with_pending_ttl(db, config, DEFAULT_PENDING_TTL)
    }

    pub fn with_pending_ttl(db: Database, config: &Config, ttl: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()
            .map_err(|e| {
                PromocastError::InvalidInput(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            db,
            http,
            oauth: config.oauth.clone(),
            pending: PendingStore::new(ttl),
        })
    }

    fn provider(&self, platform: Platform) -> Result<ProviderSettings> {
        let cfg = self
            .oauth
            .provider(platform)
            .ok_or(OAuthError::UnconfiguredPlatform(platform))?;
        if cfg.client_id.is_empty() || cfg.client_secret.is_empty() {
            return Err(OAuthError::UnconfiguredPlatform(platform).into());
        }
        ProviderSettings::resolve(platform, cfg)
            .ok_or_else(|| OAuthError::UnconfiguredPlatform(platform).into())
    }

    /// Issue an authorization URL for an account on a platform and track
    /// the attempt until the callback arrives.
    pub fn begin_authorization(&self, account_id: i64, platform: Platform) -> Result<String> {
        let settings = self.provider(platform)?;

        let state = pkce::generate_state();
        let verifier = settings.use_pkce.then(pkce::generate_verifier);

        let mut params: Vec<(&str, String)> = vec![
            ("response_type", "code".to_string()),
            ("client_id", settings.client_id.clone()),
            ("redirect_uri", settings.redirect_uri.clone()),
            ("scope", settings.scopes.join(" ")),
            ("state", state.clone()),
        ];
        if let Some(verifier) = &verifier {
            params.push(("code_challenge", pkce::derive_challenge(verifier)));
            params.push(("code_challenge_method", "S256".to_string()));
        }

        let url = reqwest::Url::parse_with_params(&settings.authorize_url, &params)
            .map_err(|e| {
                PromocastError::InvalidInput(format!(
                    "Invalid authorize URL for {}: {}",
                    platform, e
                ))
            })?;

        self.pending
            .insert(state, PendingAuthorization::new(account_id, verifier));

        info!(account_id, platform = %platform, "issued authorization URL");
        Ok(url.to_string())
    }

    /// Complete an authorization flow from the platform callback.
    ///
    /// The state token is verified and consumed before any network call;
    /// replaying a callback fails with `InvalidState`.
    pub async fn complete_authorization(
        &self,
        platform: Platform,
        code: &str,
        state: &str,
        error: Option<&str>,
    ) -> Result<Credential> {
        if let Some(description) = error {
            // A denied attempt still burns its state token
            self.pending.consume(state);
            return Err(OAuthError::AuthorizationDenied(description.to_string()).into());
        }

        let pending = self
            .pending
            .consume(state)
            .ok_or(OAuthError::InvalidState)?;
        let settings = self.provider(platform)?;

        let access_token = self.exchange_code(&settings, platform, code, &pending).await?;

        // Best-effort identity lookup; a failure here is not fatal.
        let (handle, external_id) = self
            .fetch_identity(&settings, platform, &access_token)
            .await;

        let credential = self
            .db
            .upsert_credential(
                pending.account_id,
                platform,
                &handle,
                external_id.as_deref(),
                &access_token,
            )
            .await?;

        info!(
            account_id = pending.account_id,
            platform = %platform,
            handle = %handle,
            "platform credential connected"
        );
        Ok(credential)
    }

    async fn exchange_code(
        &self,
        settings: &ProviderSettings,
        platform: Platform,
        code: &str,
        pending: &PendingAuthorization,
    ) -> Result<String> {
        let mut form: Vec<(&str, String)> = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("client_id", settings.client_id.clone()),
            ("redirect_uri", settings.redirect_uri.clone()),
        ];
        if let Some(verifier) = &pending.code_verifier {
            form.push(("code_verifier", verifier.clone()));
        }
        if !settings.basic_auth {
            form.push(("client_secret", settings.client_secret.clone()));
        }

        let mut request = self.http.post(&settings.token_url).form(&form);
        if settings.basic_auth {
            request = request.basic_auth(&settings.client_id, Some(&settings.client_secret));
        }

        let response = request.send().await.map_err(|e| {
            OAuthError::TokenExchangeFailed(format!("{}: {}", platform, e.without_url()))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::TokenExchangeFailed(format!(
                "{} token endpoint returned {}: {}",
                platform, status, body
            ))
            .into());
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            OAuthError::TokenExchangeFailed(format!(
                "{} returned an unreadable token response: {}",
                platform,
                e.without_url()
            ))
        })?;

        Ok(token.access_token)
    }

    async fn fetch_identity(
        &self,
        settings: &ProviderSettings,
        platform: Platform,
        access_token: &str,
    ) -> (String, Option<String>) {
        let response = match self
            .http
            .get(&settings.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(platform = %platform, "identity lookup failed: {}", e.without_url());
                return ("unknown".to_string(), None);
            }
        };

        if !response.status().is_success() {
            warn!(
                platform = %platform,
                status = %response.status(),
                "identity lookup returned an error status"
            );
            return ("unknown".to_string(), None);
        }

        match response.json::<serde_json::Value>().await {
            Ok(value) => parse_identity(platform, &value),
            Err(e) => {
                warn!(platform = %platform, "unreadable identity response: {}", e.without_url());
                ("unknown".to_string(), None)
            }
        }
    }

    /// Set the credential to `disconnected` and clear the token.
    pub async fn disconnect(&self, account_id: i64, platform: Platform) -> Result<()> {
        if !self.db.disconnect_credential(account_id, platform).await? {
            return Err(OAuthError::NotFound(platform).into());
        }
        info!(account_id, platform = %platform, "platform credential disconnected");
        Ok(())
    }

    /// Connection status for one platform.
    pub async fn status(&self, account_id: i64, platform: Platform) -> Result<ConnectionStatus> {
        let credential = self.db.get_credential(account_id, platform).await?;
        Ok(match credential {
            Some(c) if c.status == CredentialStatus::Connected && c.access_token.is_some() => {
                ConnectionStatus {
                    connected: true,
                    handle: Some(c.handle),
                }
            }
            _ => ConnectionStatus::disconnected(),
        })
    }

    /// Connection status for every known platform.
    pub async fn status_all(
        &self,
        account_id: i64,
    ) -> Result<HashMap<Platform, ConnectionStatus>> {
        let mut map: HashMap<Platform, ConnectionStatus> = Platform::ALL
            .iter()
            .map(|p| (*p, ConnectionStatus::disconnected()))
            .collect();

        for credential in self.db.get_connected_credentials(account_id).await? {
            if credential.access_token.is_some() {
                map.insert(
                    credential.platform,
                    ConnectionStatus {
                        connected: true,
                        handle: Some(credential.handle),
                    },
                );
            }
        }

        Ok(map)
    }

    /// Number of authorization attempts currently awaiting a callback.
    pub fn pending_authorizations(&self) -> usize {
        self.pending.len()
    }
}

fn parse_identity(platform: Platform, value: &serde_json::Value) -> (String, Option<String>) {
    let (handle, id) = match platform {
        Platform::X => (
            value["data"]["username"].as_str(),
            value["data"]["id"].as_str(),
        ),
        Platform::Facebook => (value["name"].as_str(), value["id"].as_str()),
        Platform::Tiktok => (
            value["data"]["user"]["display_name"].as_str(),
            value["data"]["user"]["open_id"].as_str(),
        ),
        _ => (None, None),
    };
    (
        handle.unwrap_or("unknown").to_string(),
        id.map(str::to_string),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, HttpConfig, OAuthConfig};
    use crate::error::PromocastError;

    fn x_provider() -> ProviderConfig {
        ProviderConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_uri: "https://api.example.com/oauth/x/callback".to_string(),
            scopes: vec![],
            authorize_url: None,
            // Unroutable: connection refused immediately, no real exchange
            token_url: Some("http://127.0.0.1:9/token".to_string()),
            userinfo_url: Some("http://127.0.0.1:9/me".to_string()),
        }
    }

    fn test_config(x: Option<ProviderConfig>) -> Config {
        Config {
            database: DatabaseConfig {
                path: String::new(),
            },
            http: HttpConfig {
                timeout_secs: 2,
                frontend_url: "http://localhost:5173".to_string(),
            },
            oauth: OAuthConfig {
                x,
                tiktok: None,
                facebook: None,
            },
        }
    }

    async fn test_manager(x: Option<ProviderConfig>) -> (tempfile::TempDir, OAuthManager) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        let manager = OAuthManager::new(db, &test_config(x)).unwrap();
        (dir, manager)
    }

    fn state_from_url(url: &str) -> String {
        let parsed = reqwest::Url::parse(url).unwrap();
        parsed
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.to_string())
            .unwrap()
    }

    #[tokio::test]
    async fn test_begin_authorization_unconfigured_platform() {
        let (_dir, manager) = test_manager(None).await;

        let result = manager.begin_authorization(1, Platform::X);
        assert!(matches!(
            result,
            Err(PromocastError::OAuth(OAuthError::UnconfiguredPlatform(Platform::X)))
        ));

        // Platforms without any OAuth support behave the same way
        let result = manager.begin_authorization(1, Platform::Youtube);
        assert!(matches!(
            result,
            Err(PromocastError::OAuth(OAuthError::UnconfiguredPlatform(_)))
        ));
    }

    #[tokio::test]
    async fn test_begin_authorization_builds_pkce_url() {
        let (_dir, manager) = test_manager(Some(x_provider())).await;

        let url = manager.begin_authorization(1, Platform::X).unwrap();
        let parsed = reqwest::Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("twitter.com"));

        let pairs: HashMap<String, String> = parsed
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "client-id");
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["code_challenge"].len(), 43);
        assert!(pairs["scope"].contains("tweet.write"));
        assert!(pairs["state"].len() >= 43);

        assert_eq!(manager.pending_authorizations(), 1);
    }

    #[tokio::test]
    async fn test_complete_with_unknown_state_fails_before_exchange() {
        let (_dir, manager) = test_manager(Some(x_provider())).await;

        let result = manager
            .complete_authorization(Platform::X, "code", "forged-state", None)
            .await;
        assert!(matches!(
            result,
            Err(PromocastError::OAuth(OAuthError::InvalidState))
        ));
    }

    #[tokio::test]
    async fn test_complete_with_platform_error_is_denied() {
        let (_dir, manager) = test_manager(Some(x_provider())).await;
        let url = manager.begin_authorization(1, Platform::X).unwrap();
        let state = state_from_url(&url);

        let result = manager
            .complete_authorization(Platform::X, "", &state, Some("user denied access"))
            .await;
        match result {
            Err(PromocastError::OAuth(OAuthError::AuthorizationDenied(msg))) => {
                assert_eq!(msg, "user denied access");
            }
            other => panic!("expected AuthorizationDenied, got {:?}", other.err()),
        }

        // The denial consumed the state; the token cannot be redeemed later
        assert_eq!(manager.pending_authorizations(), 0);
        let result = manager
            .complete_authorization(Platform::X, "code", &state, None)
            .await;
        assert!(matches!(
            result,
            Err(PromocastError::OAuth(OAuthError::InvalidState))
        ));
    }

    #[tokio::test]
    async fn test_state_is_consumed_exactly_once() {
        let (_dir, manager) = test_manager(Some(x_provider())).await;
        let url = manager.begin_authorization(1, Platform::X).unwrap();
        let state = state_from_url(&url);

        // First attempt consumes the state and then fails at the (dead)
        // token endpoint
        let result = manager
            .complete_authorization(Platform::X, "code", &state, None)
            .await;
        assert!(matches!(
            result,
            Err(PromocastError::OAuth(OAuthError::TokenExchangeFailed(_)))
        ));
        assert_eq!(manager.pending_authorizations(), 0);

        // Replaying the same callback is rejected as invalid state
        let result = manager
            .complete_authorization(Platform::X, "code", &state, None)
            .await;
        assert!(matches!(
            result,
            Err(PromocastError::OAuth(OAuthError::InvalidState))
        ));
    }

    #[tokio::test]
    async fn test_expired_pending_authorization_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oauth.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        let manager =
            OAuthManager::with_pending_ttl(db, &test_config(Some(x_provider())), Duration::ZERO)
                .unwrap();

        let url = manager.begin_authorization(1, Platform::X).unwrap();
        let state = state_from_url(&url);

        let result = manager
            .complete_authorization(Platform::X, "code", &state, None)
            .await;
        assert!(matches!(
            result,
            Err(PromocastError::OAuth(OAuthError::InvalidState))
        ));
    }

    #[tokio::test]
    async fn test_status_and_disconnect() {
        let (_dir, manager) = test_manager(Some(x_provider())).await;

        // No credential yet
        let status = manager.status(1, Platform::X).await.unwrap();
        assert!(!status.connected);
        assert_eq!(status.handle, None);

        let result = manager.disconnect(1, Platform::X).await;
        assert!(matches!(
            result,
            Err(PromocastError::OAuth(OAuthError::NotFound(Platform::X)))
        ));

        manager
            .db
            .upsert_credential(1, Platform::X, "acme", Some("42"), "tok")
            .await
            .unwrap();

        let status = manager.status(1, Platform::X).await.unwrap();
        assert!(status.connected);
        assert_eq!(status.handle, Some("acme".to_string()));

        manager.disconnect(1, Platform::X).await.unwrap();
        let status = manager.status(1, Platform::X).await.unwrap();
        assert!(!status.connected);

        // Second disconnect still succeeds: the row exists
        manager.disconnect(1, Platform::X).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_all_covers_every_platform() {
        let (_dir, manager) = test_manager(Some(x_provider())).await;
        manager
            .db
            .upsert_credential(1, Platform::X, "acme", None, "tok")
            .await
            .unwrap();

        let map = manager.status_all(1).await.unwrap();
        assert_eq!(map.len(), Platform::ALL.len());
        assert!(map[&Platform::X].connected);
        assert!(!map[&Platform::Facebook].connected);
        assert!(!map[&Platform::Youtube].connected);
    }

    #[test]
    fn test_parse_identity_x() {
        let value = serde_json::json!({
            "data": { "id": "2244994945", "username": "acmesocial", "name": "Acme" }
        });
        let (handle, id) = parse_identity(Platform::X, &value);
        assert_eq!(handle, "acmesocial");
        assert_eq!(id, Some("2244994945".to_string()));
    }

    #[test]
    fn test_parse_identity_facebook() {
        let value = serde_json::json!({ "id": "10158", "name": "Acme Page" });
        let (handle, id) = parse_identity(Platform::Facebook, &value);
        assert_eq!(handle, "Acme Page");
        assert_eq!(id, Some("10158".to_string()));
    }

    #[test]
    fn test_parse_identity_defaults_to_unknown() {
        let value = serde_json::json!({ "unexpected": true });
        let (handle, id) = parse_identity(Platform::X, &value);
        assert_eq!(handle, "unknown");
        assert_eq!(id, None);
    }
}
