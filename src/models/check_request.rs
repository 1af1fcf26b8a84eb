use serde::Serialize;
use std::time::Duration;
use url::Url;
use validator::Validate;

use crate::utils::error::{AppError, Result};

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Everything one check run needs. Built once per invocation and never
/// mutated afterwards; use the accessors to read it.
#[derive(Debug, Clone, Serialize, Validate, PartialEq, Eq)]
pub struct CheckRequest {
    #[validate(url(message = "url must be a well-formed absolute URL"))]
    url: String,
    #[validate(length(min = 1, message = "selector must not be empty"))]
    selector: String,
    expected_text: String,
    #[validate(range(min = 1, message = "timeout must be at least one second"))]
    timeout_seconds: u64,
}

impl CheckRequest {
    pub fn new(
        url: impl Into<String>,
        selector: impl Into<String>,
        expected_text: impl Into<String>,
        timeout_seconds: Option<u64>,
    ) -> Result<Self> {
        let request = Self {
            url: url.into().trim().to_string(),
            selector: selector.into().trim().to_string(),
            expected_text: expected_text.into(),
            timeout_seconds: timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
        };

        request.validate()?;

        // The browser only loads web pages; reject mailto:, data: and friends early.
        let parsed = Url::parse(&request.url)
            .map_err(|e| AppError::Validation(format!("url: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "url: unsupported scheme '{}', expected http or https",
                parsed.scheme()
            )));
        }

        Ok(request)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn expected_text(&self) -> &str {
        &self.expected_text
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
