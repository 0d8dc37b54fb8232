//! Mock publisher implementation for testing
//!
//! A configurable publisher that records every call it receives, so
//! dispatcher tests can assert on call counts, tokens, and content
//! without network access or platform credentials.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{PlatformError, Result};
use crate::platforms::{PlatformPublisher, PublishOutcome, PublishRequest};

/// Mock publisher for tests
pub struct MockPublisher {
    name: String,
    /// External post id returned on success; None makes the call fail
    result_id: Option<String>,
    error: Option<String>,
    calls: Arc<Mutex<Vec<PublishRequest>>>,
}

impl MockPublisher {
    /// A publisher that succeeds with the given external post id
    pub fn success_with_id(name: &str, external_post_id: &str) -> Self {
        Self {
            name: name.to_string(),
            result_id: Some(external_post_id.to_string()),
            error: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A publisher that always succeeds with a fixed id
    pub fn success(name: &str) -> Self {
        Self::success_with_id(name, "mock-post-id")
    }

    /// A publisher that always fails with the given error message
    pub fn failure(name: &str, error: &str) -> Self {
        Self {
            name: name.to_string(),
            result_id: None,
            error: Some(error.to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of publish calls received
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Every request received, in order
    pub fn calls(&self) -> Vec<PublishRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Shared handle to the recorded calls, usable after the publisher
    /// has been moved into a registry
    pub fn call_log(&self) -> Arc<Mutex<Vec<PublishRequest>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl PlatformPublisher for MockPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        self.calls.lock().unwrap().push(request.clone());

        match &self.result_id {
            Some(id) => Ok(PublishOutcome {
                external_post_id: id.clone(),
            }),
            None => {
                let message = self
                    .error
                    .clone()
                    .unwrap_or_else(|| "Mock publishing failed".to_string());
                Err(PlatformError::Posting(message).into())
            }
        }
    }
}
