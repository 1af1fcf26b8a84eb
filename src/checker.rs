use chrono::{DateTime, Utc};
use std::time::Instant;

use crate::extractor::SelectorExtractor;
use crate::fetcher::PageFetcher;
use crate::models::{CheckOutcome, CheckRequest, CheckResult};
use crate::plugins::manager::{DispatchReport, PluginManager};
use crate::plugins::traits::NotificationMessage;
use crate::utils::error::Result;

pub const DEFAULT_SUBJECT: &str = "Website check alert";

/// Summary of one completed run.
#[derive(Debug)]
pub struct RunReport {
    pub result: CheckResult,
    /// `None` when the text matched and nothing was sent.
    pub dispatch: Option<DispatchReport>,
    pub checked_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn notified(&self) -> bool {
        self.dispatch.is_some()
    }
}

/// Process exit status for a run: only fetch/extraction errors are failures.
pub fn exit_status(run: &Result<RunReport>) -> u8 {
    match run {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Runs one check: fetch, extract, compare and, on mismatch, alert every
/// configured channel.
pub struct PageChecker {
    fetcher: Box<dyn PageFetcher>,
    notifiers: PluginManager,
    subject: String,
}

impl PageChecker {
    pub fn new(fetcher: Box<dyn PageFetcher>, notifiers: PluginManager) -> Self {
        Self {
            fetcher,
            notifiers,
            subject: DEFAULT_SUBJECT.to_string(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub async fn run(&self, request: &CheckRequest) -> Result<RunReport> {
        let checked_at = Utc::now();
        let start_time = Instant::now();

        match self.check(request).await {
            Ok(result) => {
                let dispatch = self.alert(request, &result).await;
                Ok(RunReport {
                    result,
                    dispatch,
                    checked_at,
                    elapsed_ms: start_time.elapsed().as_millis() as u64,
                })
            }
            Err(e) => {
                tracing::error!(
                    outcome = "error",
                    url = %request.url(),
                    selector = %request.selector(),
                    error = %e,
                    "Check failed, no notification sent"
                );
                Err(e)
            }
        }
    }

    /// Fetch and compare without notifying anyone.
    pub async fn check(&self, request: &CheckRequest) -> Result<CheckResult> {
        // Parse first so a bad selector never launches a browser.
        let extractor = SelectorExtractor::new(request.selector())?;

        tracing::info!(
            url = %request.url(),
            selector = %extractor.as_str(),
            timeout_seconds = request.timeout_seconds(),
            "Fetch started"
        );

        let document = match self.fetcher.fetch(request).await {
            Ok(document) => document,
            Err(e) => {
                tracing::error!(url = %request.url(), error = %e, "Fetch failed");
                return Err(e);
            }
        };

        tracing::info!(
            url = %request.url(),
            final_url = %document.final_url(),
            load_time_ms = document.load_time_ms(),
            "Fetch succeeded"
        );

        let result = extractor.compare(&document, request.expected_text());
        drop(document);

        match result.outcome {
            CheckOutcome::Matched => tracing::info!(
                outcome = %result.outcome,
                expected = %result.expected_text,
                "Extracted text matches expected"
            ),
            CheckOutcome::TextMismatch => tracing::info!(
                outcome = %result.outcome,
                expected = %result.expected_text,
                found = %result.found_description(request.selector()),
                "Extracted text differs from expected"
            ),
            CheckOutcome::SelectorAbsent => tracing::warn!(
                outcome = %result.outcome,
                selector = %request.selector(),
                "No element found for selector"
            ),
        }

        Ok(result)
    }

    async fn alert(&self, request: &CheckRequest, result: &CheckResult) -> Option<DispatchReport> {
        let Some(message) = NotificationMessage::for_check(request, result, &self.subject) else {
            tracing::info!(outcome = "matched", url = %request.url(), "Text matches expected, nothing to send");
            return None;
        };

        if self.notifiers.is_empty() {
            tracing::warn!(url = %request.url(), "Mismatch detected but no notification channels are configured");
        }

        let report = self.notifiers.dispatch(&message).await;

        tracing::info!(
            outcome = "mismatch_notified",
            url = %request.url(),
            check = %result.outcome,
            channels = report.attempted(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "{}",
            message.summary()
        );

        Some(report)
    }
}
