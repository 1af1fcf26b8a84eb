use scraper::{Html, Selector};

use crate::fetcher::RenderedDocument;
use crate::models::{CheckOutcome, CheckResult};
use crate::utils::error::{AppError, Result};

/// Collapse every run of Unicode whitespace (including NBSP, tabs and
/// newlines) into one ASCII space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A parsed CSS selector bound to the text it came from.
#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    raw: String,
    selector: Selector,
}

impl SelectorExtractor {
    pub fn new(selector: &str) -> Result<Self> {
        let raw = selector.trim();
        if raw.is_empty() {
            return Err(AppError::InvalidSelector {
                selector: selector.to_string(),
                message: "selector is empty".to_string(),
            });
        }

        let parsed = Selector::parse(raw).map_err(|e| AppError::InvalidSelector {
            selector: raw.to_string(),
            message: format!("{:?}", e),
        })?;

        Ok(Self {
            raw: raw.to_string(),
            selector: parsed,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Normalized `textContent` of the first match in document order, or
    /// `None` when nothing matches.
    pub fn extract(&self, document: &Html) -> Option<String> {
        document
            .select(&self.selector)
            .next()
            .map(|element| normalize_whitespace(&element.text().collect::<String>()))
    }

    /// Number of elements the selector matches.
    pub fn count(&self, document: &Html) -> usize {
        document.select(&self.selector).count()
    }

    pub fn compare(&self, document: &RenderedDocument, expected_text: &str) -> CheckResult {
        let html = document.parse();
        let actual_text = self.extract(&html);

        tracing::debug!(
            selector = %self.raw,
            matches = self.count(&html),
            "Selector evaluated"
        );

        compare_text(actual_text, expected_text)
    }
}

/// Exact, case-sensitive comparison after normalizing both sides.
pub fn compare_text(actual_text: Option<String>, expected_text: &str) -> CheckResult {
    let outcome = match &actual_text {
        None => CheckOutcome::SelectorAbsent,
        Some(text) if *text == normalize_whitespace(expected_text) => CheckOutcome::Matched,
        Some(_) => CheckOutcome::TextMismatch,
    };

    CheckResult {
        outcome,
        actual_text,
        expected_text: expected_text.to_string(),
    }
}
