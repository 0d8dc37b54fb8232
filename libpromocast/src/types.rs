//! Core types for Promocast

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum length of post content, in characters.
pub const MAX_CONTENT_CHARS: usize = 2000;

/// Social platforms known to the system.
///
/// Only `x`, `tiktok`, and `facebook` have publisher implementations;
/// the rest are valid targets for scheduling but fail at dispatch time
/// with a not-implemented error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    Tiktok,
    X,
    Youtube,
    Linkedin,
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::Tiktok,
        Platform::X,
        Platform::Youtube,
        Platform::Linkedin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::X => "x",
            Platform::Youtube => "youtube",
            Platform::Linkedin => "linkedin",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::Tiktok),
            "x" | "twitter" => Ok(Platform::X),
            "youtube" => Ok(Platform::Youtube),
            "linkedin" => Ok(Platform::Linkedin),
            _ => Err(format!(
                "Invalid platform: '{}'. Valid options: facebook, instagram, tiktok, x, youtube, linkedin",
                s
            )),
        }
    }
}

/// Lifecycle of a scheduled post.
///
/// Transitions are one-directional from `Scheduled`. `Publishing` is the
/// in-flight claim marker: the dispatcher moves a post there with a
/// conditional update before making any outbound call, so two concurrent
/// dispatches cannot both publish the same post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Scheduled,
    Publishing,
    Posted,
    Failed,
    Canceled,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Posted => "posted",
            PostStatus::Failed => "failed",
            PostStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(PostStatus::Scheduled),
            "publishing" => Ok(PostStatus::Publishing),
            "posted" => Ok(PostStatus::Posted),
            "failed" => Ok(PostStatus::Failed),
            "canceled" => Ok(PostStatus::Canceled),
            _ => Err(format!("Invalid post status: '{}'", s)),
        }
    }
}

/// Connection state of a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStatus {
    Connected,
    Disconnected,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialStatus::Connected => "connected",
            CredentialStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CredentialStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "connected" => Ok(CredentialStatus::Connected),
            "disconnected" => Ok(CredentialStatus::Disconnected),
            _ => Err(format!("Invalid credential status: '{}'", s)),
        }
    }
}

/// One OAuth credential per (account, platform) pair.
///
/// Rows are never deleted; disconnecting flips the status and clears the
/// token. The access token is an opaque secret and must never be logged
/// or included in error messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: i64,
    pub account_id: i64,
    pub platform: Platform,
    pub handle: String,
    pub external_id: Option<String>,
    pub access_token: Option<String>,
    pub status: CredentialStatus,
    pub created_at: i64,
}

/// Connection status as reported to callers. `connected` is true only
/// when the row status is `connected` and a token is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub handle: Option<String>,
}

impl ConnectionStatus {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            handle: None,
        }
    }
}

/// A post waiting in the queue to be published to one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: i64,
    pub account_id: i64,
    pub campaign_id: Option<i64>,
    pub platform: Platform,
    pub content: String,
    pub media_asset_id: Option<i64>,
    pub scheduled_at: i64,
    pub status: PostStatus,
    pub external_post_id: Option<String>,
    pub created_at: i64,
}

/// Fields required to enqueue a new post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub account_id: i64,
    pub campaign_id: Option<i64>,
    pub platform: Platform,
    pub content: String,
    pub media_asset_id: Option<i64>,
    pub scheduled_at: i64,
}

/// An account-owned media reference attached to posts by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: i64,
    pub account_id: i64,
    pub title: Option<String>,
    pub storage_url: String,
    pub mime_type: Option<String>,
    pub created_at: i64,
}
