//! Promocast - social publishing core for marketing back-offices
//!
//! This library provides the OAuth connection flows, credential store,
//! platform publisher adapters, and the scheduled-post dispatcher shared
//! by the Promocast command-line tools.

pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod oauth;
pub mod platforms;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use dispatcher::Dispatcher;
pub use error::{PromocastError, Result};
pub use oauth::OAuthManager;
pub use platforms::{PlatformPublisher, PublisherRegistry};
pub use types::{
    ConnectionStatus, Credential, MediaAsset, NewPost, Platform, PostStatus, ScheduledPost,
};
