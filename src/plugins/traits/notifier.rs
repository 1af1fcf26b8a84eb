use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{describe_found, CheckOutcome, CheckRequest, CheckResult};
use crate::utils::error::AppError;

pub const ALERT_HEADLINE: &str = "The webpage has changed!";

/// Alert produced for one failed check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationMessage {
    pub url: String,
    pub selector: String,
    pub outcome: CheckOutcome,
    pub expected: String,
    pub found: Option<String>,
    pub subject: String,
}

impl NotificationMessage {
    /// `None` when the check matched and there is nothing to report.
    pub fn for_check(request: &CheckRequest, result: &CheckResult, subject: &str) -> Option<Self> {
        if result.matched() {
            return None;
        }

        Some(Self {
            url: request.url().to_string(),
            selector: request.selector().to_string(),
            outcome: result.outcome,
            expected: result.expected_text.clone(),
            found: result.actual_text.clone(),
            subject: subject.to_string(),
        })
    }

    pub fn found_description(&self) -> String {
        describe_found(self.found.as_deref(), &self.selector)
    }

    /// Same for every alert; the found part tells a missing element apart.
    pub fn headline(&self) -> &'static str {
        ALERT_HEADLINE
    }

    /// One-line summary, short enough for an SMS gateway.
    pub fn summary(&self) -> String {
        format!(
            "{} Expected: {} | Found: {}",
            self.headline(),
            self.expected,
            self.found_description()
        )
    }

    /// Summary plus the page URL.
    pub fn text(&self) -> String {
        format!("{}\nURL: {}", self.summary(), self.url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub delivered: usize,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn delivered(message_id: Option<String>, delivered: usize) -> Self {
        Self {
            success: true,
            message_id,
            delivered,
            error: None,
        }
    }
}

/// One outbound alert channel (email, SMS gateway, Telegram...).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    /// Plugin metadata
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;
    fn description(&self) -> &str;

    /// Send one alert. An `Err` means nothing was delivered on this channel.
    async fn notify(&self, message: &NotificationMessage) -> Result<NotificationResult, AppError>;
}
